//! Read-only reference tables consumed by the engine: federal brackets,
//! per-state tax rules, healthcare base costs, the RMD divisor table and the
//! FICA / Social Security constants.
//!
//! The tables ship with the crate under `data/` and can also be loaded from a
//! directory holding files with the same names.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::error::ReferenceDataError;
use super::types::FilingStatus;

pub const FEDERAL_TAX_FILE: &str = "federal_tax.json";
pub const STATE_TAX_FILE: &str = "state_tax.json";
pub const HEALTHCARE_FILE: &str = "healthcare.json";
pub const RMD_TABLE_FILE: &str = "rmd_table.json";
pub const TAX_CONSTANTS_FILE: &str = "tax_constants.json";

const BUNDLED_FEDERAL_TAX: &str = include_str!("../../data/federal_tax.json");
const BUNDLED_STATE_TAX: &str = include_str!("../../data/state_tax.json");
const BUNDLED_HEALTHCARE: &str = include_str!("../../data/healthcare.json");
const BUNDLED_RMD_TABLE: &str = include_str!("../../data/rmd_table.json");
const BUNDLED_TAX_CONSTANTS: &str = include_str!("../../data/tax_constants.json");

const BOUNDARY_EPS: f64 = 1e-6;

/// One marginal bracket; `max == None` marks the unbounded top bracket.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Bracket {
    pub rate: f64,
    pub min: f64,
    #[serde(default)]
    pub max: Option<f64>,
}

impl Bracket {
    pub fn upper(&self) -> f64 {
        self.max.unwrap_or(f64::INFINITY)
    }
}

/// State bracket: the next entry's `min` is this entry's implicit max.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct StateBracket {
    pub rate: f64,
    pub min: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FederalTaxTable {
    pub year: i32,
    pub standard_deduction: HashMap<String, f64>,
    pub brackets: HashMap<String, Vec<Bracket>>,
    pub capital_gains: HashMap<String, Vec<Bracket>>,
}

impl FederalTaxTable {
    pub fn standard_deduction(&self, status: FilingStatus) -> f64 {
        self.standard_deduction
            .get(status.table_key())
            .copied()
            .unwrap_or(0.0)
    }

    pub fn income_brackets(&self, status: FilingStatus) -> Option<&[Bracket]> {
        self.brackets.get(status.table_key()).map(Vec::as_slice)
    }

    pub fn capital_gains_brackets(&self, status: FilingStatus) -> Option<&[Bracket]> {
        self.capital_gains.get(status.table_key()).map(Vec::as_slice)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IncomeTaxRule {
    None,
    Flat { rate: f64 },
    Progressive { brackets: Vec<StateBracket> },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CapitalGainsRule {
    None,
    Flat { rate: f64 },
    Progressive { brackets: Vec<StateBracket> },
    SameAsIncome,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StateTaxConfig {
    pub name: String,
    #[serde(default)]
    pub standard_deduction: HashMap<String, f64>,
    pub income_tax: IncomeTaxRule,
    #[serde(default)]
    pub capital_gains: Option<CapitalGainsRule>,
}

impl StateTaxConfig {
    pub fn standard_deduction(&self, status: FilingStatus) -> f64 {
        self.standard_deduction
            .get(status.table_key())
            .copied()
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PreMedicareCost {
    pub base: f64,
    pub age_multiplier: f64,
    pub deductible: f64,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct MedicareCost {
    pub total: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HealthcareCostTable {
    pub pre_medicare_annual_cost: PreMedicareCost,
    pub medicare_annual_cost: MedicareCost,
    #[serde(default)]
    pub state_multipliers: HashMap<String, f64>,
}

impl HealthcareCostTable {
    /// Unknown states cost the national baseline.
    pub fn state_multiplier(&self, state_code: &str) -> f64 {
        self.state_multipliers
            .get(&normalize_state_code(state_code))
            .copied()
            .filter(|m| m.is_finite() && *m > 0.0)
            .unwrap_or(1.0)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RmdTable {
    pub divisors: BTreeMap<u32, f64>,
}

impl RmdTable {
    pub fn first_age(&self) -> Option<u32> {
        self.divisors.keys().next().copied()
    }

    /// Ages past the end of the table reuse the last divisor.
    pub fn divisor(&self, age: u32) -> Option<f64> {
        if age < self.first_age()? {
            return None;
        }
        self.divisors
            .range(..=age)
            .next_back()
            .map(|(_, divisor)| *divisor)
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct FicaConstants {
    pub social_security_rate: f64,
    pub medicare_rate: f64,
    pub social_security_wage_base: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SocialSecurityThresholds {
    pub base: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaxConstants {
    pub fica: FicaConstants,
    pub social_security_thresholds: HashMap<String, SocialSecurityThresholds>,
}

impl TaxConstants {
    pub fn social_security_thresholds(
        &self,
        status: FilingStatus,
    ) -> Option<SocialSecurityThresholds> {
        self.social_security_thresholds
            .get(status.table_key())
            .copied()
    }
}

/// Raw JSON documents for each table.
#[derive(Debug, Clone, Copy)]
pub struct ReferenceJson<'a> {
    pub federal_tax: &'a str,
    pub state_tax: &'a str,
    pub healthcare: &'a str,
    pub rmd_table: &'a str,
    pub tax_constants: &'a str,
}

#[derive(Debug, Clone)]
pub struct ReferenceData {
    pub federal: FederalTaxTable,
    pub states: HashMap<String, StateTaxConfig>,
    pub healthcare: HealthcareCostTable,
    pub rmd: RmdTable,
    pub constants: TaxConstants,
}

impl ReferenceData {
    pub fn bundled() -> Result<Self, ReferenceDataError> {
        Self::from_json_parts(ReferenceJson {
            federal_tax: BUNDLED_FEDERAL_TAX,
            state_tax: BUNDLED_STATE_TAX,
            healthcare: BUNDLED_HEALTHCARE,
            rmd_table: BUNDLED_RMD_TABLE,
            tax_constants: BUNDLED_TAX_CONSTANTS,
        })
    }

    pub fn from_dir(dir: &Path) -> Result<Self, ReferenceDataError> {
        let federal_tax = read_table(dir, FEDERAL_TAX_FILE, "federal tax")?;
        let state_tax = read_table(dir, STATE_TAX_FILE, "state tax")?;
        let healthcare = read_table(dir, HEALTHCARE_FILE, "healthcare")?;
        let rmd_table = read_table(dir, RMD_TABLE_FILE, "rmd")?;
        let tax_constants = read_table(dir, TAX_CONSTANTS_FILE, "tax constants")?;

        Self::from_json_parts(ReferenceJson {
            federal_tax: &federal_tax,
            state_tax: &state_tax,
            healthcare: &healthcare,
            rmd_table: &rmd_table,
            tax_constants: &tax_constants,
        })
    }

    pub fn from_json_parts(parts: ReferenceJson<'_>) -> Result<Self, ReferenceDataError> {
        let federal: FederalTaxTable = parse_table(parts.federal_tax, "federal tax")?;
        let raw_states: HashMap<String, StateTaxConfig> =
            parse_table(parts.state_tax, "state tax")?;
        let healthcare: HealthcareCostTable = parse_table(parts.healthcare, "healthcare")?;
        let rmd: RmdTable = parse_table(parts.rmd_table, "rmd")?;
        let constants: TaxConstants = parse_table(parts.tax_constants, "tax constants")?;

        for (key, brackets) in &federal.brackets {
            validate_federal_brackets("federal income", key, brackets)?;
        }
        for (key, brackets) in &federal.capital_gains {
            validate_federal_brackets("federal capital gains", key, brackets)?;
        }

        let mut states = HashMap::with_capacity(raw_states.len());
        for (code, config) in raw_states {
            if let IncomeTaxRule::Progressive { brackets } = &config.income_tax {
                validate_state_brackets("state income", &code, brackets)?;
            }
            if let Some(CapitalGainsRule::Progressive { brackets }) = &config.capital_gains {
                validate_state_brackets("state capital gains", &code, brackets)?;
            }
            states.insert(normalize_state_code(&code), config);
        }

        Ok(Self {
            federal,
            states,
            healthcare,
            rmd,
            constants,
        })
    }

    pub fn state(&self, state_code: &str) -> Option<&StateTaxConfig> {
        self.states.get(&normalize_state_code(state_code))
    }
}

fn normalize_state_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

fn read_table(dir: &Path, file: &str, table: &'static str) -> Result<String, ReferenceDataError> {
    let path = dir.join(file);
    fs::read_to_string(&path).map_err(|source| ReferenceDataError::Io {
        table,
        path,
        source,
    })
}

fn parse_table<T: DeserializeOwned>(
    json: &str,
    table: &'static str,
) -> Result<T, ReferenceDataError> {
    serde_json::from_str(json).map_err(|source| ReferenceDataError::Parse { table, source })
}

fn validate_federal_brackets(
    table: &'static str,
    key: &str,
    brackets: &[Bracket],
) -> Result<(), ReferenceDataError> {
    for (index, pair) in brackets.windows(2).enumerate() {
        let Some(prev_max) = pair[0].max else {
            return Err(ReferenceDataError::UnboundedInnerBracket {
                table,
                key: key.to_string(),
            });
        };
        if (pair[1].min - prev_max).abs() > BOUNDARY_EPS {
            return Err(ReferenceDataError::NonContiguousBrackets {
                table,
                key: key.to_string(),
                index: index + 1,
            });
        }
    }
    Ok(())
}

fn validate_state_brackets(
    table: &'static str,
    key: &str,
    brackets: &[StateBracket],
) -> Result<(), ReferenceDataError> {
    for (index, pair) in brackets.windows(2).enumerate() {
        if pair[1].min <= pair[0].min {
            return Err(ReferenceDataError::NonContiguousBrackets {
                table,
                key: key.to_string(),
                index: index + 1,
            });
        }
    }
    Ok(())
}
