use super::types::{Assumptions, Buckets};

/// Gross-up applied when tax is paid out of pre-tax money, standing in for the
/// tax owed on that withdrawal itself. Not solved recursively.
pub const PRE_TAX_GROSS_UP: f64 = 1.25;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum BucketKind {
    Cash,
    PostTax,
    PreTax,
    Roth,
}

const DRAW_ORDER: [BucketKind; 4] = [
    BucketKind::Cash,
    BucketKind::PostTax,
    BucketKind::PreTax,
    BucketKind::Roth,
];

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WithdrawalOutcome {
    pub from_cash: f64,
    pub from_post_tax: f64,
    /// Voluntary pre-tax draw, on top of any RMD.
    pub from_pre_tax: f64,
    pub from_roth: f64,
    /// Need left over once every bucket is empty.
    pub unfunded: f64,
    pub realized_gains: f64,
}

impl WithdrawalOutcome {
    pub fn funded_total(&self) -> f64 {
        self.from_cash + self.from_post_tax + self.from_pre_tax + self.from_roth
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TaxPayment {
    pub from_cash: f64,
    pub from_post_tax: f64,
    /// Gross amount taken from pre-tax, including the gross-up.
    pub from_pre_tax: f64,
    pub from_roth: f64,
    /// Extra pre-tax money spent on the gross-up.
    pub gross_up_cost: f64,
    pub unpaid: f64,
}

/// Fraction of a brokerage withdrawal treated as return of principal. Moves
/// linearly from `basis_start` to `basis_end` over the decay window, then holds.
pub fn basis_fraction(years_passed: u32, assumptions: &Assumptions) -> f64 {
    let duration = assumptions.basis_decay_years;
    if duration == 0 || years_passed >= duration {
        return assumptions.basis_end;
    }
    let progress = years_passed as f64 / duration as f64;
    assumptions.basis_start + (assumptions.basis_end - assumptions.basis_start) * progress
}

/// Pays the HSA-eligible part of healthcare from the HSA. Never takes more
/// than the eligible amount, whatever the balance.
pub fn pay_from_hsa(hsa_eligible: f64, buckets: &mut Buckets) -> f64 {
    let paid = buckets.hsa.max(0.0).min(hsa_eligible.max(0.0));
    buckets.hsa -= paid;
    paid
}

/// Draws `need` from cash, then post-tax, then pre-tax, then Roth, draining
/// each bucket before touching the next. The HSA is never part of this order.
pub fn run_withdrawal_waterfall(
    need: f64,
    buckets: &mut Buckets,
    basis_fraction: f64,
) -> WithdrawalOutcome {
    let mut outcome = WithdrawalOutcome::default();
    let mut remaining = need.max(0.0);

    for kind in DRAW_ORDER {
        if remaining <= 0.0 {
            break;
        }
        let drawn = draw(bucket_mut(buckets, kind), remaining);
        match kind {
            BucketKind::Cash => outcome.from_cash = drawn,
            BucketKind::PostTax => outcome.from_post_tax = drawn,
            BucketKind::PreTax => outcome.from_pre_tax = drawn,
            BucketKind::Roth => outcome.from_roth = drawn,
        }
        remaining -= drawn;
    }

    outcome.unfunded = remaining.max(0.0);
    outcome.realized_gains = outcome.from_post_tax * (1.0 - basis_fraction.clamp(0.0, 1.0));
    outcome
}

/// Surplus is reinvested in the brokerage bucket. No lot-level basis is kept.
pub fn contribute_surplus(surplus: f64, buckets: &mut Buckets) {
    if surplus > 0.0 {
        buckets.post_tax += surplus;
    }
}

/// Pays the year's tax bill in the same bucket order as withdrawals. Whatever
/// cannot be paid is reported as `unpaid` for the caller to carry as debt.
pub fn pay_tax_bill(bill: f64, buckets: &mut Buckets) -> TaxPayment {
    let mut payment = TaxPayment::default();
    let mut remaining = bill.max(0.0);

    for kind in DRAW_ORDER {
        if remaining <= 0.0 {
            break;
        }
        match kind {
            BucketKind::PreTax => {
                let gross = draw(&mut buckets.pre_tax, remaining * PRE_TAX_GROSS_UP);
                let covered = gross / PRE_TAX_GROSS_UP;
                payment.from_pre_tax = gross;
                payment.gross_up_cost = gross - covered;
                remaining -= covered;
            }
            BucketKind::Cash => {
                payment.from_cash = draw(&mut buckets.cash, remaining);
                remaining -= payment.from_cash;
            }
            BucketKind::PostTax => {
                payment.from_post_tax = draw(&mut buckets.post_tax, remaining);
                remaining -= payment.from_post_tax;
            }
            BucketKind::Roth => {
                payment.from_roth = draw(&mut buckets.roth, remaining);
                remaining -= payment.from_roth;
            }
        }
    }

    payment.unpaid = remaining.max(0.0);
    payment
}

fn bucket_mut(buckets: &mut Buckets, kind: BucketKind) -> &mut f64 {
    match kind {
        BucketKind::Cash => &mut buckets.cash,
        BucketKind::PostTax => &mut buckets.post_tax,
        BucketKind::PreTax => &mut buckets.pre_tax,
        BucketKind::Roth => &mut buckets.roth,
    }
}

fn draw(balance: &mut f64, target: f64) -> f64 {
    let x = balance.max(0.0).min(target.max(0.0));
    *balance -= x;
    x
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::BASIS_DECAY_YEARS;
    use proptest::prelude::{prop_assert, proptest};

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn assumptions() -> Assumptions {
        Assumptions {
            inflation_rate: 0.03,
            return_rate: 0.07,
            healthcare_inflation_rate: 0.05,
            tax_bracket_inflation_rate: 0.025,
            basis_start: 0.9,
            basis_end: 0.1,
            basis_decay_years: BASIS_DECAY_YEARS,
        }
    }

    fn buckets() -> Buckets {
        Buckets {
            cash: 1_000.0,
            pre_tax: 10_000.0,
            post_tax: 2_000.0,
            roth: 5_000.0,
            hsa: 50_000.0,
        }
    }

    #[test]
    fn basis_fraction_decays_linearly_then_holds() {
        let a = assumptions();
        assert_approx(basis_fraction(0, &a), 0.9);
        assert_approx(basis_fraction(15, &a), 0.5);
        assert_approx(basis_fraction(30, &a), 0.1);
        assert_approx(basis_fraction(45, &a), 0.1);
    }

    #[test]
    fn waterfall_drains_buckets_in_order() {
        let mut b = buckets();
        let outcome = run_withdrawal_waterfall(4_500.0, &mut b, 0.5);

        assert_approx(outcome.from_cash, 1_000.0);
        assert_approx(outcome.from_post_tax, 2_000.0);
        assert_approx(outcome.from_pre_tax, 1_500.0);
        assert_approx(outcome.from_roth, 0.0);
        assert_approx(outcome.unfunded, 0.0);
        assert_approx(outcome.realized_gains, 1_000.0);
        assert_approx(b.cash, 0.0);
        assert_approx(b.post_tax, 0.0);
        assert_approx(b.pre_tax, 8_500.0);
        assert_approx(b.roth, 5_000.0);
        assert_approx(b.hsa, 50_000.0);
    }

    #[test]
    fn waterfall_reports_unfunded_need_without_touching_hsa() {
        let mut b = buckets();
        let outcome = run_withdrawal_waterfall(30_000.0, &mut b, 0.9);

        assert_approx(outcome.funded_total(), 18_000.0);
        assert_approx(outcome.unfunded, 12_000.0);
        assert_approx(b.hsa, 50_000.0);
        assert_approx(b.roth, 0.0);
    }

    #[test]
    fn waterfall_skips_negative_cash() {
        let mut b = buckets();
        b.cash = -3_000.0;
        let outcome = run_withdrawal_waterfall(500.0, &mut b, 0.9);
        assert_approx(outcome.from_cash, 0.0);
        assert_approx(outcome.from_post_tax, 500.0);
        assert_approx(b.cash, -3_000.0);
    }

    #[test]
    fn hsa_pays_only_the_eligible_amount() {
        let mut b = buckets();
        assert_approx(pay_from_hsa(2_500.0, &mut b), 2_500.0);
        assert_approx(b.hsa, 47_500.0);

        b.hsa = 1_000.0;
        assert_approx(pay_from_hsa(2_500.0, &mut b), 1_000.0);
        assert_approx(b.hsa, 0.0);
    }

    #[test]
    fn surplus_goes_to_post_tax() {
        let mut b = buckets();
        contribute_surplus(750.0, &mut b);
        contribute_surplus(-10.0, &mut b);
        assert_approx(b.post_tax, 2_750.0);
    }

    #[test]
    fn tax_paid_from_pre_tax_is_grossed_up() {
        let mut b = Buckets {
            cash: 100.0,
            pre_tax: 10_000.0,
            ..Buckets::default()
        };
        let payment = pay_tax_bill(1_100.0, &mut b);

        assert_approx(payment.from_cash, 100.0);
        assert_approx(payment.from_pre_tax, 1_250.0);
        assert_approx(payment.gross_up_cost, 250.0);
        assert_approx(payment.unpaid, 0.0);
        assert_approx(b.pre_tax, 8_750.0);
    }

    #[test]
    fn tax_falls_through_to_roth_then_unpaid() {
        let mut b = Buckets {
            pre_tax: 125.0,
            roth: 200.0,
            ..Buckets::default()
        };
        let payment = pay_tax_bill(500.0, &mut b);

        assert_approx(payment.from_pre_tax, 125.0);
        assert_approx(payment.from_roth, 200.0);
        assert_approx(payment.unpaid, 200.0);
        assert_approx(b.pre_tax, 0.0);
        assert_approx(b.roth, 0.0);
    }

    proptest! {
        #[test]
        fn waterfall_conserves_money(
            need in 0.0f64..100_000.0,
            cash in 0.0f64..20_000.0,
            post in 0.0f64..20_000.0,
            pre in 0.0f64..20_000.0,
            roth in 0.0f64..20_000.0,
        ) {
            let mut b = Buckets { cash, pre_tax: pre, post_tax: post, roth, hsa: 1_000.0 };
            let before = b.total();
            let outcome = run_withdrawal_waterfall(need, &mut b, 0.5);
            prop_assert!((outcome.funded_total() + outcome.unfunded - need).abs() <= EPS);
            prop_assert!((before - b.total() - outcome.funded_total()).abs() <= EPS);
            prop_assert!((b.hsa - 1_000.0).abs() <= EPS);
        }
    }
}
