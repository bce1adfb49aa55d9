use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::candidates::{CandidateRecord, CandidateSnapshot};
use crate::config::Config;
use crate::pareto::{load_pareto, ParetoFrontier};
use crate::portfolio::compare::{compare_scenarios, ScenarioComparison};
use crate::portfolio::greedy::run_scenario;
use crate::portfolio::summary::{
    build_recommendations, by_district, cost_per_ton_leaderboard, totals, CostPerTon,
    DistrictAggregate, PortfolioTotals, Recommendation,
};
use crate::portfolio::{Portfolio, PortfolioError};
use crate::scenario::{Scenario, ScenarioOverrides};

/// Shared read-only state. Every request evaluates against the same snapshot.
#[derive(Clone)]
pub struct ApiState {
    config: Arc<Config>,
    snapshot: Option<Arc<CandidateSnapshot>>,
}

impl ApiState {
    pub fn new(config: Config, snapshot: Option<CandidateSnapshot>) -> Self {
        Self {
            config: Arc::new(config),
            snapshot: snapshot.map(Arc::new),
        }
    }
}

#[derive(Debug, Serialize)]
struct ApiResponse<T: Serialize> {
    ok: bool,
    data: T,
}

#[derive(Debug, Serialize)]
struct ApiErrorBody {
    ok: bool,
    error: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(error: impl std::fmt::Display) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: error.to_string(),
        }
    }
}

impl From<PortfolioError> for ApiError {
    fn from(error: PortfolioError) -> Self {
        Self::bad_request(error.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ApiErrorBody {
            ok: false,
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<ApiResponse<T>>, ApiError>;

#[derive(Debug, Clone, Default, Deserialize)]
struct SelectRequest {
    #[serde(flatten)]
    overrides: ScenarioOverrides,
    /// Evaluate these rows instead of the loaded snapshot.
    candidates: Option<Vec<CandidateRecord>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct CompareRequest {
    #[serde(default)]
    baseline: ScenarioOverrides,
    #[serde(default)]
    alternative: ScenarioOverrides,
    candidates: Option<Vec<CandidateRecord>>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    candidates_loaded: usize,
    fingerprint: Option<String>,
}

#[derive(Debug, Serialize)]
struct SelectResponse {
    fingerprint: String,
    scenario: Scenario,
    portfolio: Portfolio,
    totals: PortfolioTotals,
    by_district: Vec<DistrictAggregate>,
    leaderboard: Vec<CostPerTon>,
    recommendations: Vec<Recommendation>,
}

#[derive(Debug, Serialize)]
struct CompareResponse {
    fingerprint: String,
    comparison: ScenarioComparison,
}

pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/v1/config", get(show_config))
        .route("/v1/select", post(select))
        .route("/v1/compare", post(compare))
        .route("/v1/pareto", get(pareto))
        .layer(cors)
        .with_state(state)
}

pub async fn run_server(
    config: Config,
    snapshot: Option<CandidateSnapshot>,
    bind: SocketAddr,
) -> Result<()> {
    let state = ApiState::new(config, snapshot);
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("REST API listening on http://{bind}");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn health(State(state): State<ApiState>) -> Json<ApiResponse<HealthResponse>> {
    ok(HealthResponse {
        status: "ok",
        candidates_loaded: state.snapshot.as_ref().map_or(0, |s| s.len()),
        fingerprint: state.snapshot.as_ref().map(|s| s.fingerprint.clone()),
    })
}

async fn show_config(State(state): State<ApiState>) -> Json<ApiResponse<Config>> {
    ok(state.config.as_ref().clone())
}

async fn select(
    State(state): State<ApiState>,
    payload: std::result::Result<Json<SelectRequest>, JsonRejection>,
) -> ApiResult<SelectResponse> {
    let Json(request) = payload?;
    let snapshot = resolve_snapshot(&state, request.candidates)?;
    let scenario = state.config.scenario().with_overrides(request.overrides);
    let portfolio = run_scenario(&snapshot.records, &scenario)?;

    Ok(ok(SelectResponse {
        fingerprint: snapshot.fingerprint.clone(),
        totals: totals(&portfolio),
        by_district: by_district(&portfolio),
        leaderboard: cost_per_ton_leaderboard(&portfolio),
        recommendations: build_recommendations(&portfolio, &scenario),
        scenario,
        portfolio,
    }))
}

async fn compare(
    State(state): State<ApiState>,
    payload: std::result::Result<Json<CompareRequest>, JsonRejection>,
) -> ApiResult<CompareResponse> {
    let Json(request) = payload?;
    if request.alternative.is_empty() {
        return Err(ApiError::bad_request(
            "alternative scenario must change at least one lever",
        ));
    }
    let snapshot = resolve_snapshot(&state, request.candidates)?;
    let baseline = state.config.scenario().with_overrides(request.baseline);
    let alternative = baseline.clone().with_overrides(request.alternative);
    let comparison = compare_scenarios(&snapshot.records, &baseline, &alternative)?;

    Ok(ok(CompareResponse {
        fingerprint: snapshot.fingerprint.clone(),
        comparison,
    }))
}

async fn pareto(State(state): State<ApiState>) -> ApiResult<Option<ParetoFrontier>> {
    let frontier = load_pareto(
        &state.config.resolved_pareto_path(),
        state.config.artifacts.preview_rows,
    )
    .map_err(ApiError::internal)?;
    Ok(ok(frontier))
}

fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse { ok: true, data })
}

fn resolve_snapshot(
    state: &ApiState,
    inline: Option<Vec<CandidateRecord>>,
) -> std::result::Result<Arc<CandidateSnapshot>, ApiError> {
    if let Some(records) = inline {
        let snapshot = CandidateSnapshot::with_fingerprint("request", records);
        if state.config.cleaning.clip_negatives {
            return Ok(Arc::new(snapshot.with_negatives_clipped().0));
        }
        return Ok(Arc::new(snapshot));
    }
    state
        .snapshot
        .clone()
        .ok_or_else(|| {
            ApiError::bad_request("no candidate table loaded; send `candidates` inline")
        })
}
