use crate::api::{error_response, success_empty_response, success_response, ApiError};
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::{IntoParams, ToSchema};
use utoipa_axum::{router::OpenApiRouter, routes};
use vigil_alert::{AlertError, AlertRule};
use vigil_common::types::{Alert, Severity};
use vigil_notify::dispatcher::ChannelStats;

#[derive(Deserialize, IntoParams)]
struct ActiveAlertsQuery {
    /// Only alerts of this severity
    severity: Option<Severity>,
}

/// Alerts currently in Active or Acknowledged state, newest first.
#[utoipa::path(
    get,
    path = "/v1/alerts/active",
    tag = "Alerts",
    params(ActiveAlertsQuery),
    responses(
        (status = 200, description = "Active alerts", body = [Alert])
    )
)]
async fn list_active_alerts(
    State(state): State<AppState>,
    Extension(trace_id): Extension<TraceId>,
    Query(query): Query<ActiveAlertsQuery>,
) -> Response {
    let alerts = state.lifecycle.active_alerts(query.severity);
    success_response(StatusCode::OK, &trace_id, alerts)
}

#[derive(Deserialize, IntoParams)]
struct HistoryAlertsQuery {
    /// Only alerts resolved within the last N hours
    hours: Option<u32>,
    severity: Option<Severity>,
}

/// Resolved alerts, in resolution order.
#[utoipa::path(
    get,
    path = "/v1/alerts/history",
    tag = "Alerts",
    params(HistoryAlertsQuery),
    responses(
        (status = 200, description = "Resolved alerts", body = [Alert])
    )
)]
async fn alert_history(
    State(state): State<AppState>,
    Extension(trace_id): Extension<TraceId>,
    Query(query): Query<HistoryAlertsQuery>,
) -> Response {
    let since = query
        .hours
        .map(|h| Utc::now() - chrono::Duration::hours(h as i64));
    let alerts = state.lifecycle.history(since, query.severity);
    success_response(StatusCode::OK, &trace_id, alerts)
}

#[derive(Deserialize, ToSchema)]
struct AcknowledgeRequest {
    /// Who is acknowledging (operator handle)
    by: String,
}

/// Marks an active alert as acknowledged.
#[utoipa::path(
    post,
    path = "/v1/alerts/{id}/acknowledge",
    tag = "Alerts",
    params(("id" = String, Path, description = "Alert id (`rule:metric`)")),
    request_body = AcknowledgeRequest,
    responses(
        (status = 200, description = "Acknowledged alert", body = Alert),
        (status = 404, description = "Unknown or already resolved alert", body = ApiError)
    )
)]
async fn acknowledge_alert(
    State(state): State<AppState>,
    Extension(trace_id): Extension<TraceId>,
    Path(id): Path<String>,
    Json(req): Json<AcknowledgeRequest>,
) -> Response {
    if req.by.trim().is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            &trace_id,
            "bad_request",
            "'by' must not be empty",
        );
    }
    match state.lifecycle.acknowledge(&id, &req.by) {
        Ok(alert) => success_response(StatusCode::OK, &trace_id, alert),
        Err(e @ AlertError::NotFound(_)) => {
            error_response(StatusCode::NOT_FOUND, &trace_id, "not_found", &e.to_string())
        }
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            &trace_id,
            "internal_error",
            &e.to_string(),
        ),
    }
}

/// The configured rule set.
#[utoipa::path(
    get,
    path = "/v1/rules",
    tag = "Rules",
    responses(
        (status = 200, description = "Configured rules", body = [AlertRule])
    )
)]
async fn list_rules(
    State(state): State<AppState>,
    Extension(trace_id): Extension<TraceId>,
) -> Response {
    let rules = state.lock_evaluator().rules().to_vec();
    success_response(StatusCode::OK, &trace_id, rules)
}

/// Adds a rule at runtime. It participates from the next evaluation tick.
#[utoipa::path(
    post,
    path = "/v1/rules",
    tag = "Rules",
    request_body = AlertRule,
    responses(
        (status = 201, description = "Rule created", body = AlertRule),
        (status = 400, description = "Invalid rule definition", body = ApiError),
        (status = 409, description = "Rule name already in use", body = ApiError)
    )
)]
async fn create_rule(
    State(state): State<AppState>,
    Extension(trace_id): Extension<TraceId>,
    Json(rule): Json<AlertRule>,
) -> Response {
    let mut evaluator = state.lock_evaluator();
    if evaluator.get_rule(&rule.name).is_some() {
        return error_response(
            StatusCode::CONFLICT,
            &trace_id,
            "conflict",
            &format!("rule '{}' already exists", rule.name),
        );
    }
    match evaluator.add_rule(rule.clone()) {
        Ok(()) => {
            tracing::info!(rule = %rule.name, "Rule created");
            success_response(StatusCode::CREATED, &trace_id, rule)
        }
        Err(e) => error_response(
            StatusCode::BAD_REQUEST,
            &trace_id,
            "invalid_rule",
            &e.to_string(),
        ),
    }
}

/// Replaces a rule definition. Its sustain timers restart.
#[utoipa::path(
    put,
    path = "/v1/rules/{name}",
    tag = "Rules",
    params(("name" = String, Path, description = "Rule name")),
    request_body = AlertRule,
    responses(
        (status = 200, description = "Rule updated", body = AlertRule),
        (status = 400, description = "Invalid rule definition", body = ApiError),
        (status = 404, description = "Unknown rule", body = ApiError)
    )
)]
async fn update_rule(
    State(state): State<AppState>,
    Extension(trace_id): Extension<TraceId>,
    Path(name): Path<String>,
    Json(rule): Json<AlertRule>,
) -> Response {
    if rule.name != name {
        return error_response(
            StatusCode::BAD_REQUEST,
            &trace_id,
            "bad_request",
            "rule name in body must match the path",
        );
    }
    match state.lock_evaluator().update_rule(rule.clone()) {
        Ok(()) => {
            tracing::info!(rule = %name, "Rule updated");
            success_response(StatusCode::OK, &trace_id, rule)
        }
        Err(e @ AlertError::NotFound(_)) => {
            error_response(StatusCode::NOT_FOUND, &trace_id, "not_found", &e.to_string())
        }
        Err(e) => error_response(
            StatusCode::BAD_REQUEST,
            &trace_id,
            "invalid_rule",
            &e.to_string(),
        ),
    }
}

/// Removes a rule. Alerts it already opened stay in the registry.
#[utoipa::path(
    delete,
    path = "/v1/rules/{name}",
    tag = "Rules",
    params(("name" = String, Path, description = "Rule name")),
    responses(
        (status = 200, description = "Rule deleted"),
        (status = 404, description = "Unknown rule", body = ApiError)
    )
)]
async fn delete_rule(
    State(state): State<AppState>,
    Extension(trace_id): Extension<TraceId>,
    Path(name): Path<String>,
) -> Response {
    if state.lock_evaluator().remove_rule(&name) {
        tracing::info!(rule = %name, "Rule deleted");
        success_empty_response(StatusCode::OK, &trace_id, "rule deleted")
    } else {
        error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            &format!("rule '{name}' not found"),
        )
    }
}

/// One configured channel with redacted config and delivery counters.
#[derive(Serialize, ToSchema)]
struct ChannelSummary {
    name: String,
    #[serde(rename = "type")]
    channel_type: String,
    min_severity: Severity,
    enabled: bool,
    /// Plugin config with secrets masked
    #[schema(value_type = Object)]
    config: Value,
    stats: ChannelStats,
}

/// The configured notification channels and their delivery statistics.
#[utoipa::path(
    get,
    path = "/v1/channels",
    tag = "Channels",
    responses(
        (status = 200, description = "Configured channels", body = [ChannelSummary])
    )
)]
async fn list_channels(
    State(state): State<AppState>,
    Extension(trace_id): Extension<TraceId>,
) -> Response {
    let stats = state.dispatcher.stats().await;
    let channels: Vec<ChannelSummary> = state
        .dispatcher
        .channel_configs()
        .into_iter()
        .map(|config| {
            let redacted = state
                .registry
                .get_plugin(&config.channel_type)
                .map(|p| p.redact_config(&config.config))
                .unwrap_or_else(|| config.config.clone());
            ChannelSummary {
                name: config.name.clone(),
                channel_type: config.channel_type.clone(),
                min_severity: config.min_severity,
                enabled: config.enabled,
                config: redacted,
                stats: stats.get(&config.name).copied().unwrap_or_default(),
            }
        })
        .collect();
    success_response(StatusCode::OK, &trace_id, channels)
}

pub fn routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_active_alerts))
        .routes(routes!(alert_history))
        .routes(routes!(acknowledge_alert))
        .routes(routes!(list_rules, create_rule))
        .routes(routes!(update_rule, delete_rule))
        .routes(routes!(list_channels))
}
