mod distributions;
mod engine;
mod error;
mod healthcare;
mod reference;
mod solver;
mod tax;
mod types;
mod withdrawal;

pub use distributions::{
    EARLY_WITHDRAWAL_PENALTY_RATE, PENALTY_FREE_AGE, RMD_START_AGE, early_withdrawal_penalty,
    required_minimum_distribution,
};
pub use engine::simulate;
pub use error::ReferenceDataError;
pub use healthcare::{HealthcareCost, healthcare_cost};
pub use reference::{
    Bracket, CapitalGainsRule, FederalTaxTable, FicaConstants, HealthcareCostTable,
    IncomeTaxRule, MedicareCost, PreMedicareCost, ReferenceData, ReferenceJson, RmdTable,
    SocialSecurityThresholds, StateBracket, StateTaxConfig, TaxConstants,
};
pub use solver::{
    AgeEvaluation, FEASIBLE_AGE_CEILING, FeasibleAgeConfig, FeasibleAgeResult, SearchStrategy,
    find_feasible_retirement_age,
};
pub use tax::{
    TaxBill, TaxFactors, TaxYearIncome, capital_gains_tax, compute_tax_bill, fica_tax,
    inflate_brackets, marginal_tax, state_progressive_tax, state_tax, taxable_social_security,
};
pub use types::{
    Assumptions, Buckets, FilingStatus, SimulationInputs, SimulationResult, YearLog,
    compound_factor,
};
pub use withdrawal::{
    PRE_TAX_GROSS_UP, TaxPayment, WithdrawalOutcome, basis_fraction, contribute_surplus,
    pay_from_hsa, pay_tax_bill, run_withdrawal_waterfall,
};
