use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;
use waitlist::rate_limit::{Quota, RateLimiter};
use waitlist::storage::{
    CollectionKind, ConnectionStatus, MemoryStore, ReconnectPolicy, StorageGateway,
};
use waitlist::waitlist::{validate_email, waitlist_router, WaitlistService};

fn gateway(store: MemoryStore) -> Arc<StorageGateway<MemoryStore>> {
    Arc::new(StorageGateway::new(
        Arc::new(store),
        ReconnectPolicy {
            attempts: 1,
            backoff: Duration::ZERO,
        },
    ))
}

fn submission(first_name: &str, email: &str) -> Request<Body> {
    Request::post("/api/waitlist")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "first_name": first_name, "email": email }).to_string(),
        ))
        .expect("request builds")
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 4096)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn degraded_start_recovers_on_first_submission() {
    let store = MemoryStore::new();
    store.refuse_connects(1);
    let gateway = gateway(store);

    assert_eq!(gateway.connect().await, ConnectionStatus::Degraded);

    let service = Arc::new(WaitlistService::new(gateway.clone()));
    let router = waitlist_router(service, RateLimiter::new(vec![Quota::per_minute(5)]));
    let response = router
        .oneshot(submission("Ada", "ada@example.com"))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(gateway.status(), ConnectionStatus::Connected);
    assert_eq!(gateway.store().connect_attempts(), 2);
}

#[tokio::test]
async fn persisted_email_matches_normalized_input() {
    let gateway = gateway(MemoryStore::new());
    gateway.connect().await;
    let service = Arc::new(WaitlistService::new(gateway.clone()));
    let router = waitlist_router(service, RateLimiter::new(vec![Quota::per_minute(50)]));

    let inputs = [
        ("Ada", "Ada@Example.com"),
        ("Grace", "  grace.hopper+wl@NAVY.mil "),
        ("Linus", "linus@kernel.org"),
    ];

    for (name, email) in inputs {
        let response = router
            .clone()
            .oneshot(submission(name, email))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::CREATED);
        let payload = body_json(response).await;
        let id = payload["id"].as_str().expect("id present").to_string();

        let expected = validate_email(email.trim())
            .expect("valid email")
            .normalized();
        let stored = gateway.store().documents(CollectionKind::Waitlist);
        let (_, document) = stored
            .iter()
            .find(|(stored_id, _)| stored_id.0 == id)
            .expect("document stored under returned id");
        assert_eq!(document["email"], json!(expected));
        assert_eq!(document["first_name"], json!(name));
    }
}

#[tokio::test]
async fn overlong_name_is_rejected_without_a_write() {
    let gateway = gateway(MemoryStore::new());
    gateway.connect().await;
    let service = Arc::new(WaitlistService::new(gateway.clone()));
    let router = waitlist_router(service, RateLimiter::new(vec![Quota::per_minute(5)]));

    let response = router
        .oneshot(submission(&"n".repeat(101), "ada@example.com"))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], json!("Name is too long"));
    assert!(gateway.store().documents(CollectionKind::Waitlist).is_empty());
}

#[tokio::test]
async fn timestamps_are_server_assigned() {
    let gateway = gateway(MemoryStore::new());
    gateway.connect().await;
    let service = WaitlistService::new(gateway.clone());

    let body = json!({
        "first_name": "Ada",
        "email": "ada@example.com",
        "timestamp": "client-chosen",
    })
    .to_string();
    service.submit(body.as_bytes()).await.expect("stored");

    let stored = gateway.store().documents(CollectionKind::Waitlist);
    let timestamp = stored[0].1["timestamp"].as_str().expect("timestamp string");
    assert_ne!(timestamp, "client-chosen");
    assert!(chrono::NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%d %H:%M:%S").is_ok());
}
