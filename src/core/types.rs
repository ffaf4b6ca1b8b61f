use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const DEFAULT_INFLATION_RATE: f64 = 0.03;
pub const DEFAULT_RETURN_RATE: f64 = 0.07;
pub const DEFAULT_HEALTHCARE_INFLATION_RATE: f64 = 0.05;
pub const DEFAULT_TAX_BRACKET_INFLATION_RATE: f64 = 0.025;
pub const DEFAULT_BASIS_START: f64 = 0.9;
pub const DEFAULT_BASIS_END: f64 = 0.1;
pub const BASIS_DECAY_YEARS: u32 = 30;

pub const MEDICARE_AGE: u32 = 65;
pub const SOCIAL_SECURITY_FULL_AGE: u32 = 67;
pub const SOCIAL_SECURITY_EARLY_ADJUSTMENT: f64 = 0.0666;
pub const SOCIAL_SECURITY_DELAYED_ADJUSTMENT: f64 = 0.08;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilingStatus {
    Single,
    MarriedFilingJointly,
    MarriedFilingSeparately,
    HeadOfHousehold,
}

impl FilingStatus {
    /// Key used for this status in the reference data tables.
    pub fn table_key(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::MarriedFilingJointly => "married_jointly",
            Self::MarriedFilingSeparately => "married_separately",
            Self::HeadOfHousehold => "head_of_household",
        }
    }
}

/// Caller-supplied parameters for one projection. Money amounts are in
/// today's dollars; rates are fractions (0.03 == 3%).
#[derive(Debug, Clone)]
pub struct SimulationInputs {
    pub current_age: u32,
    pub retirement_age: u32,
    pub life_expectancy: u32,
    pub savings_cash: f64,
    pub savings_pre_tax: f64,
    pub investments_post_tax: f64,
    pub savings_roth: f64,
    pub savings_hsa: f64,
    pub annual_income: f64,
    pub annual_expenses: f64,
    pub social_security_at_67: f64,
    pub social_security_start_age: u32,
    pub state: String,
    pub filing_status: FilingStatus,
    /// Calendar year of the first simulated year; the current year when unset.
    pub start_year: Option<i32>,
    pub inflation_rate: Option<f64>,
    pub return_rate: Option<f64>,
    pub healthcare_inflation_rate: Option<f64>,
    pub tax_bracket_inflation_rate: Option<f64>,
    pub capital_gains_basis_start: Option<f64>,
    pub capital_gains_basis_end: Option<f64>,
}

/// Economic assumptions after applying defaults to the optional overrides.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Assumptions {
    pub inflation_rate: f64,
    pub return_rate: f64,
    pub healthcare_inflation_rate: f64,
    pub tax_bracket_inflation_rate: f64,
    pub basis_start: f64,
    pub basis_end: f64,
    pub basis_decay_years: u32,
}

impl Assumptions {
    pub fn resolve(inputs: &SimulationInputs) -> Self {
        Self {
            inflation_rate: rate_or(inputs.inflation_rate, DEFAULT_INFLATION_RATE),
            return_rate: rate_or(inputs.return_rate, DEFAULT_RETURN_RATE),
            healthcare_inflation_rate: rate_or(
                inputs.healthcare_inflation_rate,
                DEFAULT_HEALTHCARE_INFLATION_RATE,
            ),
            tax_bracket_inflation_rate: rate_or(
                inputs.tax_bracket_inflation_rate,
                DEFAULT_TAX_BRACKET_INFLATION_RATE,
            ),
            basis_start: rate_or(inputs.capital_gains_basis_start, DEFAULT_BASIS_START)
                .clamp(0.0, 1.0),
            basis_end: rate_or(inputs.capital_gains_basis_end, DEFAULT_BASIS_END).clamp(0.0, 1.0),
            basis_decay_years: BASIS_DECAY_YEARS,
        }
    }
}

fn rate_or(value: Option<f64>, default: f64) -> f64 {
    match value {
        Some(v) if v.is_finite() && v > -1.0 => v,
        _ => default,
    }
}

/// `(1 + rate)^years`, the growth factor shared by every inflation rule.
pub fn compound_factor(rate: f64, years: u32) -> f64 {
    (1.0 + rate).powi(years as i32)
}

/// The five asset buckets. Only `cash` may carry a negative balance between
/// years (unfunded needs and unpaid tax land there).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Buckets {
    pub cash: f64,
    pub pre_tax: f64,
    pub post_tax: f64,
    pub roth: f64,
    pub hsa: f64,
}

impl Buckets {
    pub fn total(&self) -> f64 {
        self.cash + self.pre_tax + self.post_tax + self.roth + self.hsa
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearLog {
    pub year: i32,
    pub age: u32,
    pub is_retired: bool,
    pub assets_start: f64,
    pub investment_growth: f64,
    pub income: f64,
    pub withdrawals: f64,
    pub taxes: f64,
    pub healthcare: f64,
    pub expenses: f64,
    pub assets_end: f64,
    pub cash_end: f64,
    pub pre_tax_end: f64,
    pub post_tax_end: f64,
    pub roth_end: f64,
    pub hsa_end: f64,
    pub required_distribution: f64,
    pub realized_gains: f64,
    pub healthcare_paid_by_hsa: f64,
    pub unfunded: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub is_solvent: bool,
    /// January 1 of the year the money runs out; `None` when solvent.
    pub solvent_date: Option<NaiveDate>,
    pub final_net_worth: f64,
    pub history: Vec<YearLog>,
}
