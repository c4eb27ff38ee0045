use crate::state::AppState;
use crate::{api, logging};
use axum::http::HeaderValue;
use axum::middleware;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "vigil API",
        description = "vigil health monitoring and alerting REST API",
    ),
    tags(
        (name = "Health", description = "Service health"),
        (name = "Metrics", description = "Metric ingestion and queries"),
        (name = "Alerts", description = "Active alerts and history"),
        (name = "Rules", description = "Alert rule management"),
        (name = "Channels", description = "Notification channels")
    )
)]
struct ApiDoc;

pub fn build_http_app(state: AppState) -> Router {
    let (router, core_spec) = api::routes().split_for_parts();
    let (alerts_router, alerts_spec) = api::alerts::routes().split_for_parts();

    let mut spec = ApiDoc::openapi();
    spec.merge(core_spec);
    spec.merge(alerts_spec);

    let cors = if state.config.cors_allowed_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .cors_allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    router
        .merge(alerts_router)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/v1/openapi.json", spec))
        .layer(cors)
        .layer(middleware::from_fn(logging::request_logging))
}
