use super::reference::HealthcareCostTable;
use super::types::{MEDICARE_AGE, compound_factor};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HealthcareCost {
    pub total: f64,
    /// Portion that may be paid from the HSA.
    pub hsa_eligible: f64,
}

/// Annual healthcare cost for `age`, inflated `years_passed` years at the
/// healthcare inflation rate.
///
/// Before Medicare age only the deductible is HSA-eligible (premiums are not a
/// qualified expense); from Medicare age on the whole cost is.
pub fn healthcare_cost(
    age: u32,
    state_code: &str,
    years_passed: u32,
    healthcare_inflation_rate: f64,
    table: &HealthcareCostTable,
) -> HealthcareCost {
    let factor = compound_factor(healthcare_inflation_rate, years_passed);

    if age >= MEDICARE_AGE {
        let total = (table.medicare_annual_cost.total * factor).max(0.0);
        return HealthcareCost {
            total,
            hsa_eligible: total,
        };
    }

    let pre = table.pre_medicare_annual_cost;
    let premium = (pre.base
        * (1.0 + age as f64 * pre.age_multiplier)
        * table.state_multiplier(state_code)
        * factor)
        .max(0.0);
    let deductible = (pre.deductible * factor).max(0.0);

    HealthcareCost {
        total: premium + deductible,
        hsa_eligible: deductible,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::reference::{MedicareCost, PreMedicareCost};
    use std::collections::HashMap;

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn table() -> HealthcareCostTable {
        HealthcareCostTable {
            pre_medicare_annual_cost: PreMedicareCost {
                base: 6_000.0,
                age_multiplier: 0.02,
                deductible: 2_500.0,
            },
            medicare_annual_cost: MedicareCost { total: 6_500.0 },
            state_multipliers: HashMap::from([
                ("CA".to_string(), 1.15),
                ("AL".to_string(), 0.85),
            ]),
        }
    }

    #[test]
    fn pre_medicare_cost_splits_premium_and_deductible() {
        let cost = healthcare_cost(50, "CA", 0, 0.05, &table());
        // 6000 * (1 + 50 * 0.02) * 1.15 = 13,800
        assert_approx(cost.total, 13_800.0 + 2_500.0);
        assert_approx(cost.hsa_eligible, 2_500.0);
    }

    #[test]
    fn unknown_state_uses_baseline_multiplier() {
        let cost = healthcare_cost(50, "ZZ", 0, 0.05, &table());
        assert_approx(cost.total, 12_000.0 + 2_500.0);
    }

    #[test]
    fn higher_state_multiplier_costs_more() {
        let ca = healthcare_cost(40, "CA", 3, 0.05, &table());
        let al = healthcare_cost(40, "AL", 3, 0.05, &table());
        assert!(ca.total > al.total);
        assert_approx(ca.hsa_eligible, al.hsa_eligible);
    }

    #[test]
    fn medicare_cost_is_flat_and_fully_eligible() {
        let ca = healthcare_cost(65, "CA", 0, 0.05, &table());
        let al = healthcare_cost(80, "AL", 0, 0.05, &table());
        assert_approx(ca.total, 6_500.0);
        assert_approx(ca.hsa_eligible, 6_500.0);
        assert_approx(al.total, 6_500.0);
    }

    #[test]
    fn healthcare_inflation_compounds() {
        let cost = healthcare_cost(70, "TX", 2, 0.05, &table());
        assert_approx(cost.total, 6_500.0 * 1.05 * 1.05);
    }
}
