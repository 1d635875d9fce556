use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request};
use axum::response::Response;
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::rate_limit::{Quota, RateLimiter};
use crate::storage::{MemoryStore, ReconnectPolicy, StorageGateway};
use crate::waitlist::{waitlist_router, WaitlistService};

pub(super) fn fixed_clock() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 9, 24)
        .and_then(|date| date.and_hms_opt(14, 30, 5))
        .expect("valid timestamp")
}

pub(super) fn build_service(store: MemoryStore) -> Arc<WaitlistService<MemoryStore>> {
    let gateway = Arc::new(StorageGateway::new(
        Arc::new(store),
        ReconnectPolicy {
            attempts: 1,
            backoff: Duration::ZERO,
        },
    ));
    Arc::new(WaitlistService::with_clock(gateway, fixed_clock))
}

pub(super) fn build_router(service: Arc<WaitlistService<MemoryStore>>) -> axum::Router {
    waitlist_router(service, RateLimiter::new(vec![Quota::per_minute(5)]))
}

pub(super) fn json_request(body: impl Into<Body>) -> Request<Body> {
    Request::post("/api/waitlist")
        .header(header::CONTENT_TYPE, "application/json")
        .body(body.into())
        .expect("request builds")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 4096)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
