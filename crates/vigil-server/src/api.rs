pub mod alerts;

use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};
use vigil_common::types::MetricSample;

/// API error envelope.
#[derive(Serialize, ToSchema)]
pub struct ApiError {
    /// Error code (0 on success)
    pub err_code: i32,
    /// Error message
    pub err_msg: String,
    /// Request trace ID
    pub trace_id: String,
}

/// Uniform API response wrapper.
#[derive(Serialize)]
pub struct ApiResponse<T>
where
    T: Serialize,
{
    /// Error code (0 on success)
    pub err_code: i32,
    /// Error message (`success` on success)
    pub err_msg: String,
    /// Request trace ID
    pub trace_id: String,
    /// Payload, when the endpoint returns data
    pub data: Option<T>,
}

pub fn success_response<T>(status: StatusCode, trace_id: &str, data: T) -> Response
where
    T: Serialize,
{
    (
        status,
        Json(ApiResponse {
            err_code: 0,
            err_msg: "success".to_string(),
            trace_id: trace_id.to_string(),
            data: Some(data),
        }),
    )
        .into_response()
}

pub fn success_empty_response(status: StatusCode, trace_id: &str, msg: &str) -> Response {
    (
        status,
        Json(ApiResponse::<Value> {
            err_code: 0,
            err_msg: msg.to_string(),
            trace_id: trace_id.to_string(),
            data: None,
        }),
    )
        .into_response()
}

fn to_custom_error_code(code: &str) -> i32 {
    match code {
        "bad_request" => 1001,
        "not_found" => 1004,
        "conflict" => 1005,
        "invalid_rule" => 1101,
        "internal_error" => 1500,
        _ => 1999,
    }
}

pub fn error_response(status: StatusCode, trace_id: &str, code: &str, msg: &str) -> Response {
    (
        status,
        Json(ApiResponse::<Value> {
            err_code: to_custom_error_code(code),
            err_msg: msg.to_string(),
            trace_id: trace_id.to_string(),
            data: None,
        }),
    )
        .into_response()
}

/// Service health summary.
#[derive(Serialize, ToSchema)]
struct HealthResponse {
    version: String,
    uptime_secs: i64,
    /// Samples currently held in the metric buffer
    buffered_samples: usize,
    /// Distinct metric names known to the buffer
    metric_count: usize,
    /// Alerts in Active or Acknowledged state
    active_alerts: usize,
}

#[utoipa::path(
    get,
    path = "/v1/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service health summary", body = HealthResponse)
    )
)]
async fn health(
    State(state): State<AppState>,
    Extension(trace_id): Extension<TraceId>,
) -> Response {
    let uptime = Utc::now() - state.start_time;
    success_response(
        StatusCode::OK,
        &trace_id,
        HealthResponse {
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_secs: uptime.num_seconds(),
            buffered_samples: state.buffer.len(),
            metric_count: state.buffer.metric_names().len(),
            active_alerts: state.lifecycle.active_alerts(None).len(),
        },
    )
}

/// Metric ingestion batch.
#[derive(Deserialize, ToSchema)]
struct IngestRequest {
    samples: Vec<MetricSample>,
}

#[derive(Serialize, ToSchema)]
struct IngestResponse {
    accepted: usize,
}

/// Accepts a batch of metric samples from probes.
#[utoipa::path(
    post,
    path = "/v1/metrics/ingest",
    tag = "Metrics",
    request_body = IngestRequest,
    responses(
        (status = 200, description = "Samples accepted", body = IngestResponse),
        (status = 400, description = "Malformed batch", body = ApiError)
    )
)]
async fn ingest_metrics(
    State(state): State<AppState>,
    Extension(trace_id): Extension<TraceId>,
    Json(req): Json<IngestRequest>,
) -> Response {
    if req.samples.is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            &trace_id,
            "bad_request",
            "batch must contain at least one sample",
        );
    }

    let accepted = req.samples.len();
    for sample in req.samples {
        state.buffer.add(sample);
    }
    tracing::debug!(trace_id = %trace_id.0, accepted, "Ingested metric samples");
    success_response(StatusCode::OK, &trace_id, IngestResponse { accepted })
}

/// Snapshot of the most recent sample per metric.
#[utoipa::path(
    get,
    path = "/v1/metrics/latest",
    tag = "Metrics",
    responses(
        (status = 200, description = "Latest sample per metric", body = [MetricSample])
    )
)]
async fn latest_metrics(
    State(state): State<AppState>,
    Extension(trace_id): Extension<TraceId>,
) -> Response {
    let mut samples = state.buffer.latest_all();
    samples.sort_by(|a, b| a.name.cmp(&b.name));
    success_response(StatusCode::OK, &trace_id, samples)
}

#[derive(Deserialize, IntoParams)]
struct HistoryQuery {
    /// Only samples at or after this RFC 3339 timestamp
    since: Option<DateTime<Utc>>,
}

/// Buffered samples for one metric, oldest first.
#[utoipa::path(
    get,
    path = "/v1/metrics/{name}/history",
    tag = "Metrics",
    params(
        ("name" = String, Path, description = "Metric name"),
        HistoryQuery
    ),
    responses(
        (status = 200, description = "Buffered samples", body = [MetricSample])
    )
)]
async fn metric_history(
    State(state): State<AppState>,
    Extension(trace_id): Extension<TraceId>,
    Path(name): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Response {
    let samples = state.buffer.query(&name, query.since);
    success_response(StatusCode::OK, &trace_id, samples)
}

pub fn routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(health))
        .routes(routes!(ingest_metrics))
        .routes(routes!(latest_metrics))
        .routes(routes!(metric_history))
}
