use axum::{
    Router,
    extract::{Json, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fmt::Write;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::net::TcpListener;

use crate::core::{
    Assumptions, MAX_AGE, PlanError, PlanParameters, PlanResult, PlanSession, PostCheck,
    SolveConfig, compute_plan, describe_plan, format_currency,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliPostCheck {
    Strict,
    Lenient,
}

impl From<CliPostCheck> for PostCheck {
    fn from(value: CliPostCheck) -> Self {
        match value {
            CliPostCheck::Strict => PostCheck::Strict,
            CliPostCheck::Lenient => PostCheck::Lenient,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiPostCheck {
    #[serde(alias = "STRICT")]
    Strict,
    #[serde(alias = "LENIENT")]
    Lenient,
}

impl From<ApiPostCheck> for CliPostCheck {
    fn from(value: ApiPostCheck) -> Self {
        match value {
            ApiPostCheck::Strict => CliPostCheck::Strict,
            ApiPostCheck::Lenient => CliPostCheck::Lenient,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PlanPayload {
    current_age: Option<u32>,
    retirement_age: Option<u32>,
    #[serde(alias = "desiredIncome")]
    desired_monthly_income: Option<f64>,
    #[serde(alias = "extraExpense")]
    extra_annual_expense: Option<f64>,
    current_investment: Option<f64>,
    inflation_rate: Option<f64>,
    return_rate: Option<f64>,
    expense_interval_months: Option<u32>,
    post_check: Option<ApiPostCheck>,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "retirement-plan",
    about = "Monthly contribution needed to fund a perpetual, inflation-adjusted retirement income"
)]
struct Cli {
    #[arg(long, default_value_t = 43)]
    current_age: u32,
    #[arg(long, default_value_t = 65)]
    retirement_age: u32,
    #[arg(
        long,
        default_value_t = 9000.0,
        help = "Desired monthly income at retirement, in today's money"
    )]
    desired_monthly_income: f64,
    #[arg(
        long,
        default_value_t = 0.0,
        help = "Recurring extra expense in today's money, paid every --expense-interval-months"
    )]
    extra_annual_expense: f64,
    #[arg(long, default_value_t = 0.0, help = "Lump sum already invested")]
    current_investment: f64,
    #[arg(long, default_value_t = 4.0, help = "Annual inflation in percent")]
    inflation_rate: f64,
    #[arg(
        long,
        default_value_t = 20.0,
        help = "Annual return in percent, compounded monthly"
    )]
    return_rate: f64,
    #[arg(long, default_value_t = 12)]
    expense_interval_months: u32,
    #[arg(
        long,
        value_enum,
        default_value_t = CliPostCheck::Strict,
        help = "Strict re-simulates the answer and rejects shortfalls; lenient returns the last tried value"
    )]
    post_check: CliPostCheck,
    #[arg(long, help = "Print the JSON response instead of text")]
    json: bool,
}

#[derive(Debug, Clone)]
struct PlanRequest {
    parameters: PlanParameters,
    assumptions: Assumptions,
    config: SolveConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PlanResponse<'a> {
    index: usize,
    total: usize,
    summary: String,
    plan: &'a PlanResult,
}

impl<'a> PlanResponse<'a> {
    fn new(index: usize, total: usize, plan: &'a PlanResult) -> Self {
        Self {
            index,
            total,
            summary: describe_plan(plan),
            plan,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PlansResponse<'a> {
    current_index: Option<usize>,
    plans: &'a [PlanResult],
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Clone, Default)]
struct AppState {
    session: Arc<Mutex<PlanSession>>,
}

impl AppState {
    fn session(&self) -> MutexGuard<'_, PlanSession> {
        // Append-only: a poisoned lock still holds a consistent list.
        self.session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Navigation {
    Stay,
    Next,
    Previous,
}

fn build_request(cli: &Cli) -> Result<PlanRequest, String> {
    if cli.retirement_age <= cli.current_age {
        return Err("--retirement-age must be > --current-age".to_string());
    }
    if cli.retirement_age > MAX_AGE {
        return Err(format!("--retirement-age must be <= {MAX_AGE}"));
    }

    for (name, value) in [
        ("--desired-monthly-income", cli.desired_monthly_income),
        ("--extra-annual-expense", cli.extra_annual_expense),
        ("--current-investment", cli.current_investment),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(format!("{name} must be >= 0"));
        }
    }

    if !cli.inflation_rate.is_finite() || cli.inflation_rate <= -100.0 {
        return Err("--inflation-rate must be > -100".to_string());
    }

    if !cli.return_rate.is_finite() || cli.return_rate <= 0.0 {
        return Err("--return-rate must be > 0".to_string());
    }

    if cli.expense_interval_months == 0 {
        return Err("--expense-interval-months must be > 0".to_string());
    }

    Ok(PlanRequest {
        parameters: PlanParameters {
            current_age: cli.current_age,
            retirement_age: cli.retirement_age,
            desired_monthly_income: cli.desired_monthly_income,
            extra_annual_expense: cli.extra_annual_expense,
            current_investment: cli.current_investment,
        },
        assumptions: Assumptions {
            inflation_rate: cli.inflation_rate / 100.0,
            return_rate: cli.return_rate / 100.0,
            expense_interval_months: cli.expense_interval_months,
        },
        config: SolveConfig {
            post_check: cli.post_check.into(),
            ..SolveConfig::default()
        },
    })
}

pub fn run_cli<I, T>(args: I) -> Result<(), String>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    let request = build_request(&cli)?;
    let plan = compute_plan(&request.parameters, &request.assumptions, &request.config)
        .map_err(|e| e.to_string())?;

    if cli.json {
        let json = serde_json::to_string_pretty(&PlanResponse::new(0, 1, &plan))
            .map_err(|e| format!("Failed to serialize plan: {e}"))?;
        println!("{json}");
    } else {
        print!("{}", render_text(&plan));
    }
    Ok(())
}

fn render_text(plan: &PlanResult) -> String {
    let mut out = describe_plan(plan);
    out.push_str("\n\n  Age            Capital\n");
    for point in &plan.projection {
        let _ = writeln!(
            out,
            "{:>5.1}  {:>17}",
            point.age,
            format!("${}", format_currency(point.capital))
        );
    }
    out
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/plan", get(plan_get_handler).post(plan_post_handler))
        .route("/api/plans", get(plans_handler))
        .route("/api/plans/current", get(current_plan_handler))
        .route("/api/plans/next", post(next_plan_handler))
        .route("/api/plans/previous", post(previous_plan_handler))
        .fallback(not_found_handler)
        .with_state(state)
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = router(AppState::default());

    let listener = TcpListener::bind(addr).await?;
    log::info!("retirement plan API listening on http://{addr}");
    println!("Retirement plan HTTP API listening on http://{addr}");
    println!("Local access: http://127.0.0.1:{port}/api/plan");

    axum::serve(listener, app).await
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn plan_get_handler(
    State(state): State<AppState>,
    Query(payload): Query<PlanPayload>,
) -> Response {
    plan_handler_impl(&state, payload)
}

async fn plan_post_handler(
    State(state): State<AppState>,
    Json(payload): Json<PlanPayload>,
) -> Response {
    plan_handler_impl(&state, payload)
}

fn plan_handler_impl(state: &AppState, payload: PlanPayload) -> Response {
    let request = match plan_request_from_payload(payload) {
        Ok(request) => request,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };

    // Solve outside the lock; only the append touches shared state.
    let plan = match compute_plan(&request.parameters, &request.assumptions, &request.config) {
        Ok(plan) => plan,
        Err(err) => return error_response(status_for(&err), &err.to_string()),
    };

    let mut session = state.session();
    let index = session.push(plan);
    log::info!(
        "stored plan {index} (ages {}..{}, monthly investment {:.2})",
        request.parameters.current_age,
        request.parameters.retirement_age,
        session.plans()[index].monthly_investment
    );
    json_response(
        StatusCode::OK,
        PlanResponse::new(index, session.len(), &session.plans()[index]),
    )
}

async fn plans_handler(State(state): State<AppState>) -> Response {
    let session = state.session();
    json_response(
        StatusCode::OK,
        PlansResponse {
            current_index: session.current_index(),
            plans: session.plans(),
        },
    )
}

async fn current_plan_handler(State(state): State<AppState>) -> Response {
    navigate(&state, Navigation::Stay)
}

async fn next_plan_handler(State(state): State<AppState>) -> Response {
    navigate(&state, Navigation::Next)
}

async fn previous_plan_handler(State(state): State<AppState>) -> Response {
    navigate(&state, Navigation::Previous)
}

fn navigate(state: &AppState, navigation: Navigation) -> Response {
    let mut session = state.session();
    match navigation {
        Navigation::Stay => {}
        Navigation::Next => {
            session.next_plan();
        }
        Navigation::Previous => {
            session.previous_plan();
        }
    }

    let (Some(index), Some(plan)) = (session.current_index(), session.current()) else {
        return error_response(StatusCode::NOT_FOUND, "No plans computed yet");
    };
    json_response(StatusCode::OK, PlanResponse::new(index, session.len(), plan))
}

fn status_for(err: &PlanError) -> StatusCode {
    match err {
        PlanError::InvalidAgeRange { .. } | PlanError::InvalidInput { .. } => {
            StatusCode::BAD_REQUEST
        }
        PlanError::GoalUnreachable(_) => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
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
fn plan_request_from_json(json: &str) -> Result<PlanRequest, String> {
    let payload = serde_json::from_str::<PlanPayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    plan_request_from_payload(payload)
}

fn plan_request_from_payload(payload: PlanPayload) -> Result<PlanRequest, String> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.current_age {
        cli.current_age = v;
    }
    if let Some(v) = payload.retirement_age {
        cli.retirement_age = v;
    }
    if let Some(v) = payload.desired_monthly_income {
        cli.desired_monthly_income = v;
    }
    if let Some(v) = payload.extra_annual_expense {
        cli.extra_annual_expense = v;
    }
    if let Some(v) = payload.current_investment {
        cli.current_investment = v;
    }
    if let Some(v) = payload.inflation_rate {
        cli.inflation_rate = v;
    }
    if let Some(v) = payload.return_rate {
        cli.return_rate = v;
    }
    if let Some(v) = payload.expense_interval_months {
        cli.expense_interval_months = v;
    }
    if let Some(v) = payload.post_check {
        cli.post_check = v.into();
    }

    build_request(&cli)
}

fn default_cli_for_api() -> Cli {
    Cli {
        current_age: 43,
        retirement_age: 65,
        desired_monthly_income: 9_000.0,
        extra_annual_expense: 0.0,
        current_investment: 0.0,
        inflation_rate: 4.0,
        return_rate: 20.0,
        expense_interval_months: 12,
        post_check: CliPostCheck::Strict,
        json: false,
    }
}
