use std::any::Any;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{middleware, Extension, Json, Router};
use serde_json::json;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tracing::error;
use waitlist::config::RateLimitConfig;
use waitlist::rate_limit::{enforce_rate_limit, RateLimiter};
use waitlist::storage::{ConnectionStatus, DocumentStore};
use waitlist::waitlist::{internal_error_response, waitlist_router, WaitlistService};

use crate::infra::AppState;

/// Full application router: waitlist intake plus health, readiness, and log stubs.
pub(crate) fn with_service_routes<S>(
    service: Arc<WaitlistService<S>>,
    limits: RateLimitConfig,
) -> Router
where
    S: DocumentStore + 'static,
{
    let state = AppState {
        storage: service.gateway().clone(),
    };
    let default_limiter = RateLimiter::new(limits.default_quotas());
    let waitlist_limiter = default_limiter.with_route_quotas(limits.waitlist_quotas());

    let service_routes = Router::new()
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/api/logs", get(logs_endpoint))
        .route_layer(middleware::from_fn_with_state(
            default_limiter,
            enforce_rate_limit,
        ));

    waitlist_router(service, waitlist_limiter)
        .merge(service_routes)
        .layer(Extension(state))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(CorsLayer::permissive())
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "message": "Backend is running" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let status = state.storage.status();
    let code = match status {
        ConnectionStatus::Connected => StatusCode::OK,
        ConnectionStatus::Degraded => StatusCode::SERVICE_UNAVAILABLE,
    };
    let label = match status {
        ConnectionStatus::Connected => "ready",
        ConnectionStatus::Degraded => "degraded",
    };

    (code, Json(json!({ "status": label, "storage": status })))
}

pub(crate) async fn logs_endpoint() -> Json<serde_json::Value> {
    Json(json!({ "logs": ["Logs functionality reset"] }))
}

fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(%detail, "request handler panicked");
    internal_error_response()
}
