use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{Local, NaiveDateTime};
use serde_json::json;
use tracing::{error, info};

use super::domain::WaitlistEntry;
use super::validation::{parse_body, validate_submission, ValidationError};
use crate::storage::{DocumentStore, InsertedId, StorageError, StorageGateway};

const INTERNAL_ERROR: &str = "Internal Server Error";

/// Validates submissions and hands them to the storage gateway.
pub struct WaitlistService<S> {
    gateway: Arc<StorageGateway<S>>,
    clock: fn() -> NaiveDateTime,
}

impl<S> WaitlistService<S>
where
    S: DocumentStore + 'static,
{
    pub fn new(gateway: Arc<StorageGateway<S>>) -> Self {
        Self::with_clock(gateway, || Local::now().naive_local())
    }

    pub fn with_clock(gateway: Arc<StorageGateway<S>>, clock: fn() -> NaiveDateTime) -> Self {
        Self { gateway, clock }
    }

    pub fn gateway(&self) -> &Arc<StorageGateway<S>> {
        &self.gateway
    }

    /// Runs a raw request body through validation and persistence.
    pub async fn submit(&self, body: &[u8]) -> Result<InsertedId, WaitlistError> {
        let fields = parse_body(body)?;
        let submission = validate_submission(&fields)?;
        let entry = WaitlistEntry::new(submission, (self.clock)());

        let id = self.gateway.save_waitlist_entry(&entry).await?;
        info!(%id, "waitlist entry saved");
        Ok(id)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WaitlistError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),
}

impl IntoResponse for WaitlistError {
    fn into_response(self) -> Response {
        match self {
            WaitlistError::Validation(err) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": err.to_string() })),
            )
                .into_response(),
            other => {
                // Details stay in the log; clients only see the generic message.
                error!(error = %other, "waitlist submission error");
                internal_error_response()
            }
        }
    }
}

/// Generic `500` body shared by storage failures and caught panics.
pub fn internal_error_response() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": INTERNAL_ERROR })),
    )
        .into_response()
}
