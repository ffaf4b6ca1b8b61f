use super::reference::RmdTable;

pub const RMD_START_AGE: u32 = 73;
/// Stands in for the statutory 59 1/2.
pub const PENALTY_FREE_AGE: u32 = 60;
pub const EARLY_WITHDRAWAL_PENALTY_RATE: f64 = 0.10;

/// Forced distribution from the pre-tax bucket for the year.
pub fn required_minimum_distribution(age: u32, pre_tax_balance: f64, table: &RmdTable) -> f64 {
    if age < RMD_START_AGE || pre_tax_balance <= 0.0 {
        return 0.0;
    }
    match table.divisor(age) {
        Some(divisor) if divisor > 0.0 => (pre_tax_balance / divisor).min(pre_tax_balance),
        _ => 0.0,
    }
}

/// Penalty on voluntary pre-tax withdrawals taken before the penalty-free age.
/// RMDs are never passed in here; they cannot start before 73 anyway.
pub fn early_withdrawal_penalty(age: u32, voluntary_pre_tax_withdrawn: f64) -> f64 {
    if age >= PENALTY_FREE_AGE || voluntary_pre_tax_withdrawn <= 0.0 {
        return 0.0;
    }
    voluntary_pre_tax_withdrawn * EARLY_WITHDRAWAL_PENALTY_RATE
}
