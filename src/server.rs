use std::net::SocketAddr;

use anyhow::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::pipeline::{DecisionPipeline, DecisionReport, DecisionRequest, ScenarioReport};

#[derive(Clone)]
struct ApiState {
    pipeline: DecisionPipeline,
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

impl From<PipelineError> for ApiError {
    fn from(error: PipelineError) -> Self {
        let status = match error {
            PipelineError::Input(_) => StatusCode::BAD_REQUEST,
            PipelineError::Capacity(_) => StatusCode::UNPROCESSABLE_ENTITY,
            PipelineError::Aborted(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: error.to_string(),
        }
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

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    provider: String,
}

fn router(pipeline: DecisionPipeline) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health))
        .route("/api/scenarios", post(scenarios))
        .route("/api/decide", post(decide))
        .layer(cors)
        .with_state(ApiState { pipeline })
}

pub async fn run_server(pipeline: DecisionPipeline, bind: SocketAddr) -> Result<()> {
    let app = router(pipeline);
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("REST API listening on http://{bind}");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health(State(state): State<ApiState>) -> Json<ApiResponse<HealthResponse>> {
    ok(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        provider: state.pipeline.provider_name().to_string(),
    })
}

async fn scenarios(
    State(state): State<ApiState>,
    Json(body): Json<serde_json::Value>,
) -> ApiResult<ScenarioReport> {
    let request = parse_request(body)?;
    let report = state.pipeline.evaluate(&request).await.map_err(rejected)?;
    Ok(ok(report))
}

async fn decide(
    State(state): State<ApiState>,
    Json(body): Json<serde_json::Value>,
) -> ApiResult<DecisionReport> {
    let request = parse_request(body)?;
    let report = state.pipeline.run(&request).await.map_err(rejected)?;
    Ok(ok(report))
}

/// Out-of-range fields fail during deserialization; they are still input
/// errors and answer 400.
fn parse_request(body: serde_json::Value) -> Result<DecisionRequest, ApiError> {
    DecisionRequest::from_value(body).map_err(|e| rejected(e.into()))
}

fn rejected(error: PipelineError) -> ApiError {
    warn!("request rejected: {error}");
    ApiError::from(error)
}

fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse { ok: true, data })
}
