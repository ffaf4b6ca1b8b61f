use chrono::{Datelike, Local, NaiveDate};
use tracing::{debug, info, warn};

use super::distributions::required_minimum_distribution;
use super::healthcare::healthcare_cost;
use super::reference::{ReferenceData, StateTaxConfig};
use super::tax::{TaxFactors, TaxYearIncome, compute_tax_bill};
use super::types::{
    Assumptions, Buckets, SOCIAL_SECURITY_DELAYED_ADJUSTMENT, SOCIAL_SECURITY_EARLY_ADJUSTMENT,
    SOCIAL_SECURITY_FULL_AGE, SimulationInputs, SimulationResult, YearLog, compound_factor,
};
use super::withdrawal::{
    basis_fraction, contribute_surplus, pay_from_hsa, pay_tax_bill, run_withdrawal_waterfall,
};

/// Mutable state owned by one run of the loop.
#[derive(Debug, Clone, Copy)]
struct SimulationState {
    year: i32,
    age: u32,
    buckets: Buckets,
}

/// Everything that stays fixed across the years of one run.
struct RunContext<'a> {
    inputs: &'a SimulationInputs,
    reference: &'a ReferenceData,
    state_tax: Option<&'a StateTaxConfig>,
    assumptions: Assumptions,
    start_year: i32,
    annual_income: f64,
    annual_expenses: f64,
    social_security_at_67: f64,
}

/// Projects the household year by year from `current_age` through
/// `life_expectancy`, stopping early the first year total assets end negative.
///
/// Stateless across calls: identical inputs and reference data always give an
/// identical result.
pub fn simulate(inputs: &SimulationInputs, reference: &ReferenceData) -> SimulationResult {
    let ctx = RunContext {
        inputs,
        reference,
        state_tax: reference.state(&inputs.state),
        assumptions: Assumptions::resolve(inputs),
        start_year: inputs.start_year.unwrap_or_else(|| Local::now().year()),
        annual_income: money(inputs.annual_income),
        annual_expenses: money(inputs.annual_expenses),
        social_security_at_67: money(inputs.social_security_at_67),
    };
    report_configuration_gaps(&ctx);

    let mut state = SimulationState {
        year: ctx.start_year,
        age: inputs.current_age,
        buckets: Buckets {
            cash: money(inputs.savings_cash),
            pre_tax: money(inputs.savings_pre_tax),
            post_tax: money(inputs.investments_post_tax),
            roth: money(inputs.savings_roth),
            hsa: money(inputs.savings_hsa),
        },
    };
    let starting_total = state.buckets.total();

    let mut history =
        Vec::with_capacity(inputs.life_expectancy.saturating_sub(inputs.current_age) as usize + 1);

    while state.age <= inputs.life_expectancy {
        let log = simulate_year(&ctx, &mut state);
        debug!(
            year = log.year,
            age = log.age,
            assets_end = log.assets_end,
            taxes = log.taxes,
            "simulated year"
        );
        let insolvent = log.assets_end < 0.0;
        history.push(log);

        if insolvent {
            info!(
                year = state.year,
                age = state.age,
                "total assets negative; stopping projection"
            );
            break;
        }

        state.year += 1;
        state.age += 1;
    }

    build_result(history, inputs.life_expectancy, state.year, starting_total)
}

fn simulate_year(ctx: &RunContext<'_>, state: &mut SimulationState) -> YearLog {
    let inputs = ctx.inputs;
    let assumptions = &ctx.assumptions;
    let age = state.age;
    let years_passed = (state.year - ctx.start_year).max(0) as u32;
    let price_factor = compound_factor(assumptions.inflation_rate, years_passed);
    let buckets = &mut state.buckets;

    let is_retired = age >= inputs.retirement_age;
    let assets_start = buckets.total();

    // Income
    let labor = if is_retired {
        0.0
    } else {
        ctx.annual_income * price_factor
    };
    let social_security = social_security_income(ctx, age, is_retired) * price_factor;

    // Forced distribution
    let rmd = required_minimum_distribution(age, buckets.pre_tax, &ctx.reference.rmd);
    buckets.pre_tax -= rmd;

    // Healthcare, HSA-eligible part first
    let healthcare = healthcare_cost(
        age,
        &inputs.state,
        years_passed,
        assumptions.healthcare_inflation_rate,
        &ctx.reference.healthcare,
    );
    let paid_by_hsa = pay_from_hsa(healthcare.hsa_eligible, buckets);

    // Withdrawals or contributions
    let expenses = ctx.annual_expenses * price_factor;
    let gross_needs = expenses + (healthcare.total - paid_by_hsa);
    let available = labor + social_security + rmd;
    let withdrawal_needed = (gross_needs - available).max(0.0);
    let surplus = (available - gross_needs).max(0.0);

    let withdrawal = run_withdrawal_waterfall(
        withdrawal_needed,
        buckets,
        basis_fraction(years_passed, assumptions),
    );
    contribute_surplus(surplus, buckets);

    // Growth; cash yields the general inflation rate
    let cash_yield = buckets.cash.max(0.0) * assumptions.inflation_rate;
    let invested_growth = (buckets.pre_tax + buckets.post_tax + buckets.roth + buckets.hsa)
        * assumptions.return_rate;
    buckets.cash += cash_yield;
    buckets.pre_tax *= 1.0 + assumptions.return_rate;
    buckets.post_tax *= 1.0 + assumptions.return_rate;
    buckets.roth *= 1.0 + assumptions.return_rate;
    buckets.hsa *= 1.0 + assumptions.return_rate;

    // Taxes
    let tax_income = TaxYearIncome {
        age,
        labor,
        social_security,
        pre_tax_withdrawn: rmd + withdrawal.from_pre_tax,
        voluntary_pre_tax: withdrawal.from_pre_tax,
        cash_yield,
        realized_gains: withdrawal.realized_gains,
    };
    let bill = compute_tax_bill(
        &tax_income,
        ctx.reference,
        ctx.state_tax,
        inputs.filing_status,
        TaxFactors {
            bracket: compound_factor(assumptions.tax_bracket_inflation_rate, years_passed),
            wage: price_factor,
        },
    );
    let payment = pay_tax_bill(bill.total(), buckets);

    // Whatever could not be funded is carried as debt in cash
    let unfunded = withdrawal.unfunded + payment.unpaid;
    buckets.cash -= unfunded;

    YearLog {
        year: state.year,
        age,
        is_retired,
        assets_start,
        investment_growth: cash_yield + invested_growth,
        income: labor + social_security + cash_yield,
        withdrawals: withdrawal.funded_total() + rmd + paid_by_hsa,
        taxes: bill.total() + payment.gross_up_cost,
        healthcare: healthcare.total,
        expenses,
        assets_end: buckets.total(),
        cash_end: buckets.cash,
        pre_tax_end: buckets.pre_tax,
        post_tax_end: buckets.post_tax,
        roth_end: buckets.roth,
        hsa_end: buckets.hsa,
        required_distribution: rmd,
        realized_gains: withdrawal.realized_gains,
        healthcare_paid_by_hsa: paid_by_hsa,
        unfunded,
    }
}

/// Benefit in start-year dollars, adjusted for claiming before or after 67.
fn social_security_income(ctx: &RunContext<'_>, age: u32, is_retired: bool) -> f64 {
    let start_age = ctx.inputs.social_security_start_age;
    if !is_retired || age < start_age {
        return 0.0;
    }
    let variance = start_age as f64 - SOCIAL_SECURITY_FULL_AGE as f64;
    let adjustment = if variance < 0.0 {
        SOCIAL_SECURITY_EARLY_ADJUSTMENT
    } else {
        SOCIAL_SECURITY_DELAYED_ADJUSTMENT
    };
    (ctx.social_security_at_67 * (1.0 + variance * adjustment)).max(0.0)
}

fn build_result(
    history: Vec<YearLog>,
    life_expectancy: u32,
    final_year: i32,
    starting_total: f64,
) -> SimulationResult {
    let is_solvent = history
        .last()
        .is_some_and(|last| last.assets_end >= 0.0 && last.age >= life_expectancy);

    let solvent_date = if is_solvent {
        None
    } else {
        let fail_year = history
            .iter()
            .find(|h| h.assets_end < 0.0)
            .map(|h| h.year)
            .unwrap_or(final_year);
        NaiveDate::from_ymd_opt(fail_year, 1, 1)
    };

    let final_net_worth = history
        .last()
        .map(|h| h.assets_end)
        .unwrap_or(starting_total);

    SimulationResult {
        is_solvent,
        solvent_date,
        final_net_worth,
        history,
    }
}

fn report_configuration_gaps(ctx: &RunContext<'_>) {
    let status = ctx.inputs.filing_status;
    if ctx.state_tax.is_none() {
        warn!(
            state = %ctx.inputs.state,
            "unknown state code; state tax treated as zero"
        );
    }
    if ctx.reference.federal.income_brackets(status).is_none() {
        warn!(
            filing_status = status.table_key(),
            "no federal brackets for filing status; federal income tax treated as zero"
        );
    }
    if ctx.reference.federal.capital_gains_brackets(status).is_none() {
        warn!(
            filing_status = status.table_key(),
            "no capital gains brackets for filing status; federal gains tax treated as zero"
        );
    }
    if ctx.reference.constants.social_security_thresholds(status).is_none() {
        warn!(
            filing_status = status.table_key(),
            "no Social Security thresholds for filing status; 85% of benefits taxed"
        );
    }
}

/// Non-finite or negative money inputs count as zero.
fn money(value: f64) -> f64 {
    if value.is_finite() { value.max(0.0) } else { 0.0 }
}
