use axum::{
    Router,
    extract::{Json, Query, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use crate::core::{
    FEASIBLE_AGE_CEILING, FeasibleAgeConfig, FeasibleAgeResult, FilingStatus, ReferenceData,
    SearchStrategy, SimulationInputs, SimulationResult, find_feasible_retirement_age, simulate,
};

const MIN_SOCIAL_SECURITY_START_AGE: u32 = 62;
const MAX_SOCIAL_SECURITY_START_AGE: u32 = 70;
const MAX_LIFE_EXPECTANCY: u32 = 120;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliFilingStatus {
    Single,
    MarriedFilingJointly,
    MarriedFilingSeparately,
    HeadOfHousehold,
}

impl From<CliFilingStatus> for FilingStatus {
    fn from(value: CliFilingStatus) -> Self {
        match value {
            CliFilingStatus::Single => FilingStatus::Single,
            CliFilingStatus::MarriedFilingJointly => FilingStatus::MarriedFilingJointly,
            CliFilingStatus::MarriedFilingSeparately => FilingStatus::MarriedFilingSeparately,
            CliFilingStatus::HeadOfHousehold => FilingStatus::HeadOfHousehold,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliSearchStrategy {
    LinearScan,
    Bisection,
}

impl From<CliSearchStrategy> for SearchStrategy {
    fn from(value: CliSearchStrategy) -> Self {
        match value {
            CliSearchStrategy::LinearScan => SearchStrategy::LinearScan,
            CliSearchStrategy::Bisection => SearchStrategy::Bisection,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiFilingStatus {
    Single,
    #[serde(
        alias = "marriedFilingJointly",
        alias = "married_filing_jointly",
        alias = "married_jointly",
        alias = "married"
    )]
    MarriedFilingJointly,
    #[serde(
        alias = "marriedFilingSeparately",
        alias = "married_filing_separately",
        alias = "married_separately"
    )]
    MarriedFilingSeparately,
    #[serde(alias = "headOfHousehold", alias = "head_of_household")]
    HeadOfHousehold,
}

impl From<ApiFilingStatus> for CliFilingStatus {
    fn from(value: ApiFilingStatus) -> Self {
        match value {
            ApiFilingStatus::Single => CliFilingStatus::Single,
            ApiFilingStatus::MarriedFilingJointly => CliFilingStatus::MarriedFilingJointly,
            ApiFilingStatus::MarriedFilingSeparately => CliFilingStatus::MarriedFilingSeparately,
            ApiFilingStatus::HeadOfHousehold => CliFilingStatus::HeadOfHousehold,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiSearchStrategy {
    #[serde(alias = "linearScan", alias = "linear_scan", alias = "linear")]
    LinearScan,
    #[serde(alias = "bisect")]
    Bisection,
}

impl From<ApiSearchStrategy> for CliSearchStrategy {
    fn from(value: ApiSearchStrategy) -> Self {
        match value {
            ApiSearchStrategy::LinearScan => CliSearchStrategy::LinearScan,
            ApiSearchStrategy::Bisection => CliSearchStrategy::Bisection,
        }
    }
}

/// Request body or query string. Every field is optional and overrides the
/// API defaults. Rates are percentages.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    current_age: Option<u32>,
    retirement_age: Option<u32>,
    life_expectancy: Option<u32>,

    savings_cash: Option<f64>,
    savings_pre_tax: Option<f64>,
    #[serde(alias = "savingsPostTax")]
    investments_post_tax: Option<f64>,
    savings_roth: Option<f64>,
    #[serde(alias = "savingsHSA")]
    savings_hsa: Option<f64>,

    annual_income: Option<f64>,
    annual_expenses: Option<f64>,
    social_security_at_67: Option<f64>,
    social_security_start_age: Option<u32>,
    state: Option<String>,
    filing_status: Option<ApiFilingStatus>,
    start_year: Option<i32>,

    inflation_rate: Option<f64>,
    return_rate: Option<f64>,
    healthcare_inflation_rate: Option<f64>,
    tax_bracket_inflation_rate: Option<f64>,
    capital_gains_basis_start: Option<f64>,
    capital_gains_basis_end: Option<f64>,

    search_max_age: Option<u32>,
    search_strategy: Option<ApiSearchStrategy>,
}

#[derive(Parser, Debug)]
#[command(
    name = "retire simulate",
    about = "Year-by-year US retirement projection (taxes, healthcare, RMDs, withdrawal order)"
)]
struct Cli {
    #[arg(long)]
    current_age: u32,
    #[arg(long)]
    retirement_age: u32,
    #[arg(long)]
    life_expectancy: u32,
    #[arg(long, default_value_t = 0.0)]
    savings_cash: f64,
    #[arg(long, default_value_t = 0.0, help = "401(k)/traditional IRA balance")]
    savings_pre_tax: f64,
    #[arg(long, default_value_t = 0.0, help = "Taxable brokerage balance")]
    investments_post_tax: f64,
    #[arg(long, default_value_t = 0.0)]
    savings_roth: f64,
    #[arg(long, default_value_t = 0.0)]
    savings_hsa: f64,
    #[arg(long, default_value_t = 0.0, help = "Annual labor income in today's dollars")]
    annual_income: f64,
    #[arg(long, help = "Annual spending in today's dollars, excluding healthcare")]
    annual_expenses: f64,
    #[arg(
        long = "social-security-at-67",
        default_value_t = 0.0,
        help = "Annual Social Security benefit if claimed at 67"
    )]
    social_security_at_67: f64,
    #[arg(long, default_value_t = 67, help = "Claiming age, 62 to 70")]
    social_security_start_age: u32,
    #[arg(long, default_value = "CA", help = "Two-letter state code")]
    state: String,
    #[arg(long, value_enum, default_value_t = CliFilingStatus::Single)]
    filing_status: CliFilingStatus,
    #[arg(long, help = "Calendar year of the first simulated year; defaults to this year")]
    start_year: Option<i32>,
    #[arg(long, help = "General inflation in percent (default 3)")]
    inflation_rate: Option<f64>,
    #[arg(long, help = "Investment return in percent (default 7)")]
    return_rate: Option<f64>,
    #[arg(long, help = "Healthcare cost inflation in percent (default 5)")]
    healthcare_inflation_rate: Option<f64>,
    #[arg(long, help = "Tax bracket indexing in percent (default 2.5)")]
    tax_bracket_inflation_rate: Option<f64>,
    #[arg(long, help = "Brokerage cost basis share at start in percent (default 90)")]
    capital_gains_basis_start: Option<f64>,
    #[arg(long, help = "Brokerage cost basis share after 30 years in percent (default 10)")]
    capital_gains_basis_end: Option<f64>,
    #[arg(
        long,
        default_value_t = FEASIBLE_AGE_CEILING,
        help = "Latest retirement age tried when insolvent"
    )]
    search_max_age: u32,
    #[arg(long, value_enum, default_value_t = CliSearchStrategy::LinearScan)]
    search_strategy: CliSearchStrategy,
    #[arg(long, help = "Directory holding replacement reference tables")]
    data_dir: Option<PathBuf>,
}

#[derive(Debug)]
struct ApiRequest {
    inputs: SimulationInputs,
    search: FeasibleAgeConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    #[serde(flatten)]
    result: SimulationResult,
    /// Present only when the requested plan runs out of money.
    feasible_retirement: Option<FeasibleAgeResult>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn build_inputs(cli: &Cli) -> Result<SimulationInputs, String> {
    if cli.life_expectancy < cli.current_age {
        return Err("--life-expectancy must be >= --current-age".to_string());
    }

    if cli.life_expectancy > MAX_LIFE_EXPECTANCY {
        return Err(format!("--life-expectancy must be <= {MAX_LIFE_EXPECTANCY}"));
    }

    if !(MIN_SOCIAL_SECURITY_START_AGE..=MAX_SOCIAL_SECURITY_START_AGE)
        .contains(&cli.social_security_start_age)
    {
        return Err(format!(
            "--social-security-start-age must be between {} and {}",
            MIN_SOCIAL_SECURITY_START_AGE, MAX_SOCIAL_SECURITY_START_AGE
        ));
    }

    for (flag, value) in [
        ("--savings-cash", cli.savings_cash),
        ("--savings-pre-tax", cli.savings_pre_tax),
        ("--investments-post-tax", cli.investments_post_tax),
        ("--savings-roth", cli.savings_roth),
        ("--savings-hsa", cli.savings_hsa),
        ("--annual-income", cli.annual_income),
        ("--annual-expenses", cli.annual_expenses),
        ("--social-security-at-67", cli.social_security_at_67),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(format!("{flag} must be >= 0"));
        }
    }

    let state = cli.state.trim().to_ascii_uppercase();
    if state.len() != 2 || !state.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err("--state must be a two-letter state code".to_string());
    }

    Ok(SimulationInputs {
        current_age: cli.current_age,
        retirement_age: cli.retirement_age,
        life_expectancy: cli.life_expectancy,
        savings_cash: cli.savings_cash,
        savings_pre_tax: cli.savings_pre_tax,
        investments_post_tax: cli.investments_post_tax,
        savings_roth: cli.savings_roth,
        savings_hsa: cli.savings_hsa,
        annual_income: cli.annual_income,
        annual_expenses: cli.annual_expenses,
        social_security_at_67: cli.social_security_at_67,
        social_security_start_age: cli.social_security_start_age,
        state,
        filing_status: cli.filing_status.into(),
        start_year: cli.start_year,
        inflation_rate: growth_rate("--inflation-rate", cli.inflation_rate)?,
        return_rate: growth_rate("--return-rate", cli.return_rate)?,
        healthcare_inflation_rate: growth_rate(
            "--healthcare-inflation-rate",
            cli.healthcare_inflation_rate,
        )?,
        tax_bracket_inflation_rate: growth_rate(
            "--tax-bracket-inflation-rate",
            cli.tax_bracket_inflation_rate,
        )?,
        capital_gains_basis_start: basis_share(
            "--capital-gains-basis-start",
            cli.capital_gains_basis_start,
        )?,
        capital_gains_basis_end: basis_share(
            "--capital-gains-basis-end",
            cli.capital_gains_basis_end,
        )?,
    })
}

fn build_request(cli: &Cli) -> Result<ApiRequest, String> {
    let inputs = build_inputs(cli)?;
    Ok(ApiRequest {
        inputs,
        search: FeasibleAgeConfig {
            strategy: cli.search_strategy.into(),
            max_age: cli.search_max_age,
        },
    })
}

/// Percent in, fraction out. Anything at or below -100% would flip the sign of
/// every balance.
fn growth_rate(flag: &str, percent: Option<f64>) -> Result<Option<f64>, String> {
    match percent {
        None => Ok(None),
        Some(v) if v.is_finite() && v > -100.0 => Ok(Some(v / 100.0)),
        Some(_) => Err(format!("{flag} must be > -100")),
    }
}

fn basis_share(flag: &str, percent: Option<f64>) -> Result<Option<f64>, String> {
    match percent {
        None => Ok(None),
        Some(v) if (0.0..=100.0).contains(&v) => Ok(Some(v / 100.0)),
        Some(_) => Err(format!("{flag} must be between 0 and 100")),
    }
}

fn run_request(
    request: &ApiRequest,
    reference: &ReferenceData,
) -> Result<SimulateResponse, String> {
    let result = simulate(&request.inputs, reference);
    let feasible_retirement = if result.is_solvent {
        None
    } else {
        // A requested age past the ceiling leaves nothing to search, not a bad request
        let search = FeasibleAgeConfig {
            max_age: request.search.max_age.max(request.inputs.retirement_age),
            ..request.search
        };
        Some(find_feasible_retirement_age(
            &request.inputs,
            reference,
            search,
        )?)
    };
    Ok(SimulateResponse {
        result,
        feasible_retirement,
    })
}

/// Runs one projection from command-line flags (program name excluded) and
/// returns the pretty-printed JSON response.
pub fn run_cli<I, T>(args: I) -> Result<String, String>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let argv = std::iter::once(std::ffi::OsString::from("retire-simulate"))
        .chain(args.into_iter().map(Into::into));
    let cli = Cli::try_parse_from(argv).map_err(|e| e.to_string())?;

    let reference = match &cli.data_dir {
        Some(dir) => ReferenceData::from_dir(dir),
        None => ReferenceData::bundled(),
    }
    .map_err(|e| e.to_string())?;

    let request = build_request(&cli)?;
    let response = run_request(&request, &reference)?;
    serde_json::to_string_pretty(&response).map_err(|e| format!("failed to encode result: {e}"))
}

pub async fn run_http_server(port: u16, reference: ReferenceData) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = router(Arc::new(reference));

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "retirement projection API listening");

    axum::serve(listener, app).await
}

fn router(reference: Arc<ReferenceData>) -> Router {
    Router::new()
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .route(
            "/api/feasible-age",
            get(feasible_age_get_handler).post(feasible_age_post_handler),
        )
        .fallback(not_found_handler)
        .with_state(reference)
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn simulate_get_handler(
    State(reference): State<Arc<ReferenceData>>,
    Query(payload): Query<SimulatePayload>,
) -> Response {
    simulate_handler_impl(&reference, payload)
}

async fn simulate_post_handler(
    State(reference): State<Arc<ReferenceData>>,
    Json(payload): Json<SimulatePayload>,
) -> Response {
    simulate_handler_impl(&reference, payload)
}

fn simulate_handler_impl(reference: &ReferenceData, payload: SimulatePayload) -> Response {
    let request = match api_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };
    match run_request(&request, reference) {
        Ok(response) => json_response(StatusCode::OK, response),
        Err(msg) => error_response(StatusCode::BAD_REQUEST, &msg),
    }
}

async fn feasible_age_get_handler(
    State(reference): State<Arc<ReferenceData>>,
    Query(payload): Query<SimulatePayload>,
) -> Response {
    feasible_age_handler_impl(&reference, payload)
}

async fn feasible_age_post_handler(
    State(reference): State<Arc<ReferenceData>>,
    Json(payload): Json<SimulatePayload>,
) -> Response {
    feasible_age_handler_impl(&reference, payload)
}

fn feasible_age_handler_impl(reference: &ReferenceData, payload: SimulatePayload) -> Response {
    let request = match api_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };
    match find_feasible_retirement_age(&request.inputs, reference, request.search) {
        Ok(result) => json_response(StatusCode::OK, result),
        Err(msg) => error_response(StatusCode::BAD_REQUEST, &msg),
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn api_request_from_json(json: &str) -> Result<ApiRequest, String> {
    let payload = serde_json::from_str::<SimulatePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    api_request_from_payload(payload)
}

fn api_request_from_payload(payload: SimulatePayload) -> Result<ApiRequest, String> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.current_age {
        cli.current_age = v;
    }
    if let Some(v) = payload.retirement_age {
        cli.retirement_age = v;
    }
    if let Some(v) = payload.life_expectancy {
        cli.life_expectancy = v;
    }

    if let Some(v) = payload.savings_cash {
        cli.savings_cash = v;
    }
    if let Some(v) = payload.savings_pre_tax {
        cli.savings_pre_tax = v;
    }
    if let Some(v) = payload.investments_post_tax {
        cli.investments_post_tax = v;
    }
    if let Some(v) = payload.savings_roth {
        cli.savings_roth = v;
    }
    if let Some(v) = payload.savings_hsa {
        cli.savings_hsa = v;
    }

    if let Some(v) = payload.annual_income {
        cli.annual_income = v;
    }
    if let Some(v) = payload.annual_expenses {
        cli.annual_expenses = v;
    }
    if let Some(v) = payload.social_security_at_67 {
        cli.social_security_at_67 = v;
    }
    if let Some(v) = payload.social_security_start_age {
        cli.social_security_start_age = v;
    }
    if let Some(v) = payload.state {
        cli.state = v;
    }
    if let Some(v) = payload.filing_status {
        cli.filing_status = v.into();
    }
    if payload.start_year.is_some() {
        cli.start_year = payload.start_year;
    }

    if payload.inflation_rate.is_some() {
        cli.inflation_rate = payload.inflation_rate;
    }
    if payload.return_rate.is_some() {
        cli.return_rate = payload.return_rate;
    }
    if payload.healthcare_inflation_rate.is_some() {
        cli.healthcare_inflation_rate = payload.healthcare_inflation_rate;
    }
    if payload.tax_bracket_inflation_rate.is_some() {
        cli.tax_bracket_inflation_rate = payload.tax_bracket_inflation_rate;
    }
    if payload.capital_gains_basis_start.is_some() {
        cli.capital_gains_basis_start = payload.capital_gains_basis_start;
    }
    if payload.capital_gains_basis_end.is_some() {
        cli.capital_gains_basis_end = payload.capital_gains_basis_end;
    }

    if let Some(v) = payload.search_max_age {
        cli.search_max_age = v;
    }
    if let Some(v) = payload.search_strategy {
        cli.search_strategy = v.into();
    }

    build_request(&cli)
}

fn default_cli_for_api() -> Cli {
    Cli {
        current_age: 30,
        retirement_age: 65,
        life_expectancy: 85,
        savings_cash: 10_000.0,
        savings_pre_tax: 100_000.0,
        investments_post_tax: 50_000.0,
        savings_roth: 0.0,
        savings_hsa: 0.0,
        annual_income: 80_000.0,
        annual_expenses: 50_000.0,
        social_security_at_67: 25_000.0,
        social_security_start_age: 67,
        state: "CA".to_string(),
        filing_status: CliFilingStatus::Single,
        start_year: None,
        inflation_rate: None,
        return_rate: None,
        healthcare_inflation_rate: None,
        tax_bracket_inflation_rate: None,
        capital_gains_basis_start: None,
        capital_gains_basis_end: None,
        search_max_age: FEASIBLE_AGE_CEILING,
        search_strategy: CliSearchStrategy::LinearScan,
        data_dir: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn sample_cli() -> Cli {
        default_cli_for_api()
    }

    fn reference() -> ReferenceData {
        ReferenceData::bundled().expect("bundled reference data")
    }

    #[test]
    fn build_inputs_converts_percent_rates() {
        let mut cli = sample_cli();
        cli.inflation_rate = Some(2.5);
        cli.return_rate = Some(-3.0);
        cli.capital_gains_basis_start = Some(80.0);

        let inputs = build_inputs(&cli).expect("valid inputs");
        assert_approx(inputs.inflation_rate.expect("set"), 0.025);
        assert_approx(inputs.return_rate.expect("set"), -0.03);
        assert_approx(inputs.capital_gains_basis_start.expect("set"), 0.8);
        assert_eq!(inputs.healthcare_inflation_rate, None);
    }

    #[test]
    fn build_inputs_normalizes_state_code() {
        let mut cli = sample_cli();
        cli.state = " ny ".to_string();
        let inputs = build_inputs(&cli).expect("valid inputs");
        assert_eq!(inputs.state, "NY");

        cli.state = "New York".to_string();
        let err = build_inputs(&cli).expect_err("must reject long state name");
        assert!(err.contains("--state"));
    }

    #[test]
    fn build_inputs_rejects_out_of_range_social_security_age() {
        let mut cli = sample_cli();
        cli.social_security_start_age = 61;
        let err = build_inputs(&cli).expect_err("must reject early claiming age");
        assert!(err.contains("--social-security-start-age"));

        cli.social_security_start_age = 71;
        assert!(build_inputs(&cli).is_err());
    }

    #[test]
    fn build_inputs_rejects_life_expectancy_before_current_age() {
        let mut cli = sample_cli();
        cli.current_age = 60;
        cli.life_expectancy = 59;
        let err = build_inputs(&cli).expect_err("must reject unordered ages");
        assert!(err.contains("--life-expectancy"));
    }

    #[test]
    fn build_inputs_rejects_negative_balances_and_bad_rates() {
        let mut cli = sample_cli();
        cli.savings_roth = -1.0;
        let err = build_inputs(&cli).expect_err("must reject negative balance");
        assert!(err.contains("--savings-roth"));

        let mut cli = sample_cli();
        cli.return_rate = Some(-100.0);
        let err = build_inputs(&cli).expect_err("must reject <= -100 return");
        assert!(err.contains("--return-rate"));

        let mut cli = sample_cli();
        cli.capital_gains_basis_end = Some(120.0);
        let err = build_inputs(&cli).expect_err("must reject basis above 100");
        assert!(err.contains("--capital-gains-basis-end"));
    }

    #[test]
    fn solvent_plan_past_search_ceiling_is_accepted() {
        let json = r#"{
            "currentAge": 60,
            "retirementAge": 82,
            "lifeExpectancy": 90,
            "savingsCash": 50000000,
            "state": "TX",
            "startYear": 2025
        }"#;
        let payload = serde_json::from_str::<SimulatePayload>(json).expect("valid json");
        let response = simulate_handler_impl(&reference(), payload);
        assert_eq!(response.status(), StatusCode::OK);

        let request = api_request_from_json(json).expect("ceiling only matters for a search");
        let response = run_request(&request, &reference()).expect("runs");
        assert!(response.result.is_solvent);
        assert!(response.feasible_retirement.is_none());
    }

    #[test]
    fn insolvent_plan_past_search_ceiling_reports_no_feasible_age() {
        let json = r#"{
            "currentAge": 60,
            "retirementAge": 82,
            "lifeExpectancy": 90,
            "savingsCash": 0,
            "savingsPreTax": 0,
            "savingsPostTax": 0,
            "annualIncome": 0,
            "annualExpenses": 40000,
            "state": "TX",
            "startYear": 2025
        }"#;
        let request = api_request_from_json(json).expect("valid payload");
        let response = run_request(&request, &reference()).expect("runs");
        assert!(!response.result.is_solvent);

        let search = response.feasible_retirement.expect("search reported");
        assert!(!search.feasible);
        assert_eq!(search.feasible_age, None);
        assert_eq!(search.evaluations.len(), 1);
    }

    #[test]
    fn feasible_age_route_rejects_ceiling_below_requested_age() {
        let payload = serde_json::from_str::<SimulatePayload>(
            r#"{"retirementAge": 82, "startYear": 2025}"#,
        )
        .expect("valid json");
        let response = feasible_age_handler_impl(&reference(), payload);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn api_request_from_json_parses_web_keys() {
        let json = r#"{
            "currentAge": 45,
            "retirementAge": 60,
            "lifeExpectancy": 92,
            "savingsCash": 20000,
            "savingsPreTax": 400000,
            "savingsPostTax": 150000,
            "savingsRoth": 60000,
            "savingsHSA": 15000,
            "annualIncome": 140000,
            "annualExpenses": 70000,
            "socialSecurityAt67": 30000,
            "socialSecurityStartAge": 70,
            "state": "wa",
            "filingStatus": "marriedFilingJointly",
            "startYear": 2030,
            "inflationRate": 2,
            "searchStrategy": "bisection",
            "searchMaxAge": 75
        }"#;

        let request = api_request_from_json(json).expect("valid payload");
        let inputs = &request.inputs;
        assert_eq!(inputs.current_age, 45);
        assert_eq!(inputs.retirement_age, 60);
        assert_eq!(inputs.life_expectancy, 92);
        assert_approx(inputs.investments_post_tax, 150_000.0);
        assert_approx(inputs.savings_hsa, 15_000.0);
        assert_approx(inputs.social_security_at_67, 30_000.0);
        assert_eq!(inputs.social_security_start_age, 70);
        assert_eq!(inputs.state, "WA");
        assert_eq!(inputs.filing_status, FilingStatus::MarriedFilingJointly);
        assert_eq!(inputs.start_year, Some(2030));
        assert_approx(inputs.inflation_rate.expect("set"), 0.02);
        assert_eq!(inputs.return_rate, None);
        assert_eq!(request.search.strategy, SearchStrategy::Bisection);
        assert_eq!(request.search.max_age, 75);
    }

    #[test]
    fn api_request_from_json_accepts_table_style_filing_status() {
        let request = api_request_from_json(r#"{"filingStatus":"head_of_household"}"#)
            .expect("valid payload");
        assert_eq!(request.inputs.filing_status, FilingStatus::HeadOfHousehold);

        let request =
            api_request_from_json(r#"{"filingStatus":"married_separately"}"#).expect("valid");
        assert_eq!(
            request.inputs.filing_status,
            FilingStatus::MarriedFilingSeparately
        );
    }

    #[test]
    fn api_request_from_empty_json_uses_defaults() {
        let request = api_request_from_json("{}").expect("defaults are valid");
        assert_eq!(request.inputs.current_age, 30);
        assert_eq!(request.inputs.retirement_age, 65);
        assert_eq!(request.inputs.state, "CA");
        assert_eq!(request.search, FeasibleAgeConfig::default());
    }

    #[test]
    fn api_request_from_json_rejects_unknown_enum_values() {
        let err = api_request_from_json(r#"{"filingStatus":"widowed"}"#)
            .expect_err("must reject unknown status");
        assert!(err.contains("Invalid API JSON payload"));
    }

    #[test]
    fn insolvent_response_carries_feasible_search() {
        let json = r#"{
            "currentAge": 50,
            "retirementAge": 50,
            "lifeExpectancy": 70,
            "savingsCash": 0,
            "savingsPreTax": 0,
            "savingsPostTax": 0,
            "annualIncome": 120000,
            "annualExpenses": 40000,
            "socialSecurityAt67": 0,
            "state": "TX",
            "startYear": 2025,
            "inflationRate": 0,
            "returnRate": 0,
            "healthcareInflationRate": 0,
            "taxBracketInflationRate": 0
        }"#;
        let request = api_request_from_json(json).expect("valid payload");
        let response = run_request(&request, &reference()).expect("search runs");
        let value = serde_json::to_value(&response).expect("serializes");

        assert_eq!(value["isSolvent"], false);
        assert_eq!(value["solventDate"], "2025-01-01");
        assert_eq!(value["history"][0]["age"], 50);
        assert!(value["history"][0].get("cashEnd").is_some());
        assert_eq!(value["feasibleRetirement"]["requestedAge"], 50);
        assert_eq!(value["feasibleRetirement"]["feasible"], true);
    }

    #[test]
    fn solvent_response_omits_search_result() {
        let json = r#"{"savingsCash": 50000000, "startYear": 2025}"#;
        let request = api_request_from_json(json).expect("valid payload");
        let response = run_request(&request, &reference()).expect("runs");
        let value = serde_json::to_value(&response).expect("serializes");

        assert_eq!(value["isSolvent"], true);
        assert!(value["solventDate"].is_null());
        assert!(value["feasibleRetirement"].is_null());
        assert_eq!(value["history"].as_array().map(Vec::len), Some(56));
    }

    #[test]
    fn run_cli_prints_json_result() {
        let output = run_cli([
            "--current-age",
            "64",
            "--retirement-age",
            "64",
            "--life-expectancy",
            "66",
            "--savings-cash",
            "2000000",
            "--annual-expenses",
            "40000",
            "--state",
            "TX",
            "--start-year",
            "2025",
            "--filing-status",
            "married-filing-jointly",
        ])
        .expect("cli run succeeds");
        let value: serde_json::Value = serde_json::from_str(&output).expect("valid json");
        assert_eq!(value["isSolvent"], true);
        assert_eq!(value["history"].as_array().map(Vec::len), Some(3));
        assert_eq!(value["history"][2]["year"], 2027);
    }

    #[test]
    fn run_cli_reports_missing_required_flag() {
        let err = run_cli(["--current-age", "40"]).expect_err("must fail");
        assert!(err.contains("--retirement-age"));
    }

    #[test]
    fn run_cli_reports_bad_data_dir() {
        let err = run_cli([
            "--current-age",
            "40",
            "--retirement-age",
            "60",
            "--life-expectancy",
            "90",
            "--annual-expenses",
            "1000",
            "--data-dir",
            "/definitely/not/a/real/dir",
        ])
        .expect_err("must fail");
        assert!(err.contains("failed to read"));
    }
}
