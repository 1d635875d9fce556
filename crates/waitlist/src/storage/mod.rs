//! Document-store persistence for jobs, resumes, and waitlist entries.
//!
//! [`StorageGateway`] is the only entry point the rest of the crate uses. It wraps a
//! [`DocumentStore`] backend (MongoDB in production, [`MemoryStore`] in tests and local
//! development) and turns every backend failure into a typed [`StorageError`].

pub mod gateway;
pub mod memory;
pub mod mongo;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

pub use gateway::{StorageGateway, StorageStatus};
pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// Schemaless JSON object written to a collection.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Logical collections owned by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    Jobs,
    Resumes,
    Waitlist,
}

impl CollectionKind {
    pub const ALL: [CollectionKind; 3] = [Self::Jobs, Self::Resumes, Self::Waitlist];

    pub fn name(self) -> &'static str {
        match self {
            Self::Jobs => "jobs",
            Self::Resumes => "resumes",
            Self::Waitlist => "waitlistform",
        }
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Server-generated identifier of an inserted document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct InsertedId(pub String);

impl fmt::Display for InsertedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of an unordered bulk insert in which every document was stored. Partial
/// failures surface as [`StorageError::PartialWrite`] instead.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkInsert {
    pub inserted: usize,
}

/// Whether the gateway currently holds usable collection handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connected,
    Degraded,
}

impl ConnectionStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Degraded => "degraded",
        }
    }
}

/// How many times the waitlist path reconnects before giving up on a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub attempts: u32,
    /// Pause before every attempt after the first.
    pub backoff: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            attempts: 1,
            backoff: Duration::ZERO,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("no connection string configured")]
    NotConfigured,
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("collection '{0}' is unavailable")]
    Unavailable(CollectionKind),
    #[error("document already exists")]
    Duplicate,
    #[error("document could not be encoded: {0}")]
    Encode(String),
    #[error("write failed: {0}")]
    Write(String),
    #[error("bulk write stored {inserted} of {total} documents")]
    PartialWrite { inserted: usize, total: usize },
}

/// Backend seam so the gateway can run against MongoDB or an in-memory double.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Establishes the connection, verifies liveness, and binds collection handles.
    async fn connect(&self) -> Result<(), StorageError>;

    fn is_bound(&self, collection: CollectionKind) -> bool;

    async fn insert_one(
        &self,
        collection: CollectionKind,
        document: Document,
    ) -> Result<InsertedId, StorageError>;

    /// Unordered insert: a failing document does not stop the rest.
    async fn insert_many(
        &self,
        collection: CollectionKind,
        documents: Vec<Document>,
    ) -> Result<BulkInsert, StorageError>;
}
