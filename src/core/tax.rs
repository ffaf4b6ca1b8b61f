//! Tax primitives. Everything here is a pure function of the year's income
//! figures and the (already inflation-scaled) reference tables.

use super::distributions::early_withdrawal_penalty;
use super::reference::{
    Bracket, CapitalGainsRule, FicaConstants, IncomeTaxRule, ReferenceData,
    SocialSecurityThresholds, StateBracket, StateTaxConfig,
};
use super::types::FilingStatus;

const SS_LOWER_TIER_RATE: f64 = 0.5;
const SS_UPPER_TIER_RATE: f64 = 0.85;

/// Standard marginal tax: each bracket taxes only the slice of income that
/// falls inside it.
pub fn marginal_tax(taxable_income: f64, brackets: &[Bracket]) -> f64 {
    if taxable_income.is_nan() || taxable_income <= 0.0 {
        return 0.0;
    }

    let mut tax = 0.0;
    for bracket in brackets {
        if taxable_income > bracket.min {
            let in_bracket = taxable_income.min(bracket.upper()) - bracket.min;
            tax += in_bracket.max(0.0) * bracket.rate;
        }
    }
    tax
}

/// Scales every bracket boundary by `factor`. Unbounded tops stay unbounded.
pub fn inflate_brackets(brackets: &[Bracket], factor: f64) -> Vec<Bracket> {
    brackets
        .iter()
        .map(|b| Bracket {
            rate: b.rate,
            min: b.min * factor,
            max: b.max.map(|max| max * factor),
        })
        .collect()
}

/// Federal capital-gains tax with gains stacked on top of ordinary taxable
/// income, so each slice of gain is taxed at the rate of the bracket it lands in.
pub fn capital_gains_tax(taxable_ordinary_income: f64, gains: f64, brackets: &[Bracket]) -> f64 {
    if gains.is_nan() || gains <= 0.0 {
        return 0.0;
    }

    let mut floor = taxable_ordinary_income.max(0.0);
    let mut remaining = gains;
    let mut tax = 0.0;

    for bracket in brackets {
        if remaining <= 0.0 {
            break;
        }
        let lower = floor.max(bracket.min);
        let upper = (floor + remaining).min(bracket.upper());
        let overlap = upper - lower;
        if overlap <= 0.0 {
            continue;
        }
        tax += overlap * bracket.rate;
        floor += overlap;
        remaining -= overlap;
    }
    tax
}

/// Taxable portion of Social Security under the provisional-income method.
/// `other_taxable_income` must already include labor, taxable withdrawals,
/// cash yield and realized gains for the year.
pub fn taxable_social_security(
    other_taxable_income: f64,
    benefit: f64,
    thresholds: SocialSecurityThresholds,
) -> f64 {
    if benefit.is_nan() || benefit <= 0.0 {
        return 0.0;
    }

    let provisional = other_taxable_income.max(0.0) + SS_LOWER_TIER_RATE * benefit;
    let base = thresholds.base;
    let upper = thresholds.upper.max(base);
    let cap = SS_UPPER_TIER_RATE * benefit;

    let taxable = if provisional <= base {
        0.0
    } else if provisional <= upper {
        SS_LOWER_TIER_RATE * (provisional - base)
    } else {
        (SS_LOWER_TIER_RATE * benefit).min(SS_LOWER_TIER_RATE * (upper - base))
            + SS_UPPER_TIER_RATE * (provisional - upper)
    };
    taxable.min(cap)
}

/// Marginal tax over state brackets whose max is the next bracket's min.
pub fn state_progressive_tax(amount: f64, brackets: &[StateBracket], factor: f64) -> f64 {
    if amount.is_nan() || amount <= 0.0 {
        return 0.0;
    }

    let mut tax = 0.0;
    for (idx, current) in brackets.iter().enumerate() {
        let min = current.min * factor;
        let max = brackets
            .get(idx + 1)
            .map(|next| next.min * factor)
            .unwrap_or(f64::INFINITY);
        if amount > min {
            tax += (amount.min(max) - min) * current.rate;
        }
    }
    tax
}

fn income_rule_tax(amount: f64, rule: &IncomeTaxRule, factor: f64) -> f64 {
    match rule {
        IncomeTaxRule::None => 0.0,
        IncomeTaxRule::Flat { rate } => amount.max(0.0) * rate,
        IncomeTaxRule::Progressive { brackets } => state_progressive_tax(amount, brackets, factor),
    }
}

fn gains_rule_tax(gains: f64, rule: &CapitalGainsRule, factor: f64) -> f64 {
    match rule {
        CapitalGainsRule::None | CapitalGainsRule::SameAsIncome => 0.0,
        CapitalGainsRule::Flat { rate } => gains.max(0.0) * rate,
        CapitalGainsRule::Progressive { brackets } => {
            state_progressive_tax(gains, brackets, factor)
        }
    }
}

/// State income plus capital-gains tax. A missing config means no state tax.
///
/// When the state has no separate gains rule (or taxes gains as income) the
/// two are combined into one base and the state deduction is taken once.
pub fn state_tax(
    ordinary_income: f64,
    capital_gains: f64,
    config: Option<&StateTaxConfig>,
    status: FilingStatus,
    bracket_factor: f64,
) -> f64 {
    let Some(config) = config else {
        return 0.0;
    };
    let deduction = config.standard_deduction(status) * bracket_factor;
    let gains = capital_gains.max(0.0);

    match &config.capital_gains {
        None | Some(CapitalGainsRule::SameAsIncome) => {
            let base = (ordinary_income.max(0.0) + gains - deduction).max(0.0);
            income_rule_tax(base, &config.income_tax, bracket_factor)
        }
        Some(rule) => {
            let base = (ordinary_income.max(0.0) - deduction).max(0.0);
            income_rule_tax(base, &config.income_tax, bracket_factor)
                + gains_rule_tax(gains, rule, bracket_factor)
        }
    }
}

/// Payroll tax on labor income only. The wage base grows with `wage_factor`.
pub fn fica_tax(labor_income: f64, fica: &FicaConstants, wage_factor: f64) -> f64 {
    if labor_income.is_nan() || labor_income <= 0.0 {
        return 0.0;
    }
    let wage_base = fica.social_security_wage_base * wage_factor;
    labor_income.min(wage_base) * fica.social_security_rate + labor_income * fica.medicare_rate
}

/// Income figures for one simulated year, gathered before taxes are computed.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TaxYearIncome {
    pub age: u32,
    pub labor: f64,
    pub social_security: f64,
    /// RMD plus voluntary pre-tax withdrawals.
    pub pre_tax_withdrawn: f64,
    pub voluntary_pre_tax: f64,
    pub cash_yield: f64,
    pub realized_gains: f64,
}

/// Per-year scaling of the tax structure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaxFactors {
    /// Applied to bracket boundaries and standard deductions.
    pub bracket: f64,
    /// Applied to the FICA wage base (general inflation).
    pub wage: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TaxBill {
    pub taxable_social_security: f64,
    pub ordinary_income: f64,
    pub taxable_ordinary_income: f64,
    pub federal: f64,
    pub state: f64,
    pub capital_gains: f64,
    pub fica: f64,
    pub early_withdrawal_penalty: f64,
}

impl TaxBill {
    pub fn total(&self) -> f64 {
        self.federal + self.state + self.capital_gains + self.fica + self.early_withdrawal_penalty
    }
}

/// Runs every tax regime for the year in a single pass. Social Security
/// taxability uses the year's other income as already determined; it is not
/// iterated to convergence with the withdrawals.
pub fn compute_tax_bill(
    income: &TaxYearIncome,
    reference: &ReferenceData,
    state: Option<&StateTaxConfig>,
    status: FilingStatus,
    factors: TaxFactors,
) -> TaxBill {
    let other_income =
        income.labor + income.pre_tax_withdrawn + income.cash_yield + income.realized_gains;
    let taxable_social_security = reference
        .constants
        .social_security_thresholds(status)
        .map(|t| taxable_social_security(other_income, income.social_security, t))
        .unwrap_or(SS_UPPER_TIER_RATE * income.social_security.max(0.0));

    let ordinary_income =
        income.labor + taxable_social_security + income.pre_tax_withdrawn + income.cash_yield;
    let deduction = reference.federal.standard_deduction(status) * factors.bracket;
    let taxable_ordinary_income = (ordinary_income - deduction).max(0.0);

    let federal = reference
        .federal
        .income_brackets(status)
        .map(|b| marginal_tax(taxable_ordinary_income, &inflate_brackets(b, factors.bracket)))
        .unwrap_or(0.0);
    let capital_gains = reference
        .federal
        .capital_gains_brackets(status)
        .map(|b| {
            capital_gains_tax(
                taxable_ordinary_income,
                income.realized_gains,
                &inflate_brackets(b, factors.bracket),
            )
        })
        .unwrap_or(0.0);

    TaxBill {
        taxable_social_security,
        ordinary_income,
        taxable_ordinary_income,
        federal,
        state: state_tax(
            ordinary_income,
            income.realized_gains,
            state,
            status,
            factors.bracket,
        ),
        capital_gains,
        fica: fica_tax(income.labor, &reference.constants.fica, factors.wage),
        early_withdrawal_penalty: early_withdrawal_penalty(income.age, income.voluntary_pre_tax),
    }
}
