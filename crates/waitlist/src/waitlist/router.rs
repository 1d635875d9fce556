use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;

use super::service::WaitlistService;
use crate::rate_limit::{enforce_rate_limit, RateLimiter};
use crate::storage::DocumentStore;

/// Router exposing `POST /api/waitlist` behind its own per-client limiter.
pub fn waitlist_router<S>(service: Arc<WaitlistService<S>>, limiter: RateLimiter) -> Router
where
    S: DocumentStore + 'static,
{
    Router::new()
        .route("/api/waitlist", post(submit_handler::<S>))
        .route_layer(middleware::from_fn_with_state(limiter, enforce_rate_limit))
        .with_state(service)
}

pub(crate) async fn submit_handler<S>(
    State(service): State<Arc<WaitlistService<S>>>,
    body: Bytes,
) -> Response
where
    S: DocumentStore + 'static,
{
    match service.submit(&body).await {
        Ok(id) => (
            StatusCode::CREATED,
            Json(json!({
                "message": "Successfully added to waitlist",
                "id": id,
            })),
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}
