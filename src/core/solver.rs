use chrono::Datelike;
use serde::Serialize;
use tracing::debug;

use super::engine::simulate;
use super::reference::ReferenceData;
use super::types::SimulationInputs;

/// Highest retirement age the search will try by default.
pub const FEASIBLE_AGE_CEILING: u32 = 80;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SearchStrategy {
    /// Tries every age upward and stops at the first solvent one.
    LinearScan,
    /// Halves the age range each step. Assumes a later retirement never
    /// turns a solvent plan insolvent.
    Bisection,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeasibleAgeConfig {
    pub strategy: SearchStrategy,
    pub max_age: u32,
}

impl Default for FeasibleAgeConfig {
    fn default() -> Self {
        Self {
            strategy: SearchStrategy::LinearScan,
            max_age: FEASIBLE_AGE_CEILING,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgeEvaluation {
    pub age: u32,
    pub is_solvent: bool,
    pub final_net_worth: f64,
    pub insolvency_year: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeasibleAgeResult {
    pub requested_age: u32,
    pub strategy: SearchStrategy,
    pub max_age: u32,
    pub feasible_age: Option<u32>,
    /// Every simulation run, in the order it was made.
    pub evaluations: Vec<AgeEvaluation>,
    pub feasible: bool,
    pub message: String,
}

/// Finds the earliest retirement age at or after the requested one that stays
/// solvent through life expectancy. Only `retirement_age` varies between runs.
pub fn find_feasible_retirement_age(
    inputs: &SimulationInputs,
    reference: &ReferenceData,
    config: FeasibleAgeConfig,
) -> Result<FeasibleAgeResult, String> {
    validate_config(inputs, config)?;

    let requested_age = inputs.retirement_age;
    let mut evaluations = Vec::new();

    let requested = evaluate_age(inputs, reference, requested_age);
    evaluations.push(requested);

    let feasible_age = if requested.is_solvent {
        Some(requested_age)
    } else {
        match config.strategy {
            SearchStrategy::LinearScan => {
                linear_scan(inputs, reference, requested_age, config.max_age, &mut evaluations)
            }
            SearchStrategy::Bisection => {
                bisect(inputs, reference, requested_age, config.max_age, &mut evaluations)
            }
        }
    };

    let message = match feasible_age {
        Some(age) if age == requested_age => "Plan is solvent at the requested age.".to_string(),
        Some(age) => format!("Earliest solvent retirement age is {age}."),
        None => format!(
            "No solvent retirement age found up to {}.",
            config.max_age
        ),
    };

    Ok(FeasibleAgeResult {
        requested_age,
        strategy: config.strategy,
        max_age: config.max_age,
        feasible_age,
        evaluations,
        feasible: feasible_age.is_some(),
        message,
    })
}

fn linear_scan(
    inputs: &SimulationInputs,
    reference: &ReferenceData,
    requested_age: u32,
    max_age: u32,
    evaluations: &mut Vec<AgeEvaluation>,
) -> Option<u32> {
    for age in (requested_age + 1)..=max_age {
        let eval = evaluate_age(inputs, reference, age);
        evaluations.push(eval);
        if eval.is_solvent {
            return Some(age);
        }
    }
    None
}

/// `lo` is always a known-insolvent age and `hi` a known-solvent one.
fn bisect(
    inputs: &SimulationInputs,
    reference: &ReferenceData,
    requested_age: u32,
    max_age: u32,
    evaluations: &mut Vec<AgeEvaluation>,
) -> Option<u32> {
    if max_age <= requested_age {
        return None;
    }
    let top = evaluate_age(inputs, reference, max_age);
    evaluations.push(top);
    if !top.is_solvent {
        return None;
    }

    let mut lo = requested_age;
    let mut hi = max_age;
    while hi - lo > 1 {
        let mid = lo + (hi - lo) / 2;
        let eval = evaluate_age(inputs, reference, mid);
        evaluations.push(eval);
        if eval.is_solvent {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    Some(hi)
}

fn evaluate_age(inputs: &SimulationInputs, reference: &ReferenceData, age: u32) -> AgeEvaluation {
    let mut candidate = inputs.clone();
    candidate.retirement_age = age;
    let result = simulate(&candidate, reference);
    debug!(
        retirement_age = age,
        is_solvent = result.is_solvent,
        "evaluated retirement age"
    );
    AgeEvaluation {
        age,
        is_solvent: result.is_solvent,
        final_net_worth: result.final_net_worth,
        insolvency_year: result.solvent_date.map(|date| date.year()),
    }
}

fn validate_config(inputs: &SimulationInputs, config: FeasibleAgeConfig) -> Result<(), String> {
    if config.max_age < inputs.retirement_age {
        return Err("max_age must be >= retirement_age".to_string());
    }
    if inputs.current_age > inputs.life_expectancy {
        return Err("current_age must be <= life_expectancy".to_string());
    }
    Ok(())
}
