use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use super::{
    BulkInsert, CollectionKind, ConnectionStatus, Document, DocumentStore, InsertedId,
    ReconnectPolicy, StorageError,
};

/// Read-only view of the gateway's connection state for health surfaces.
pub trait StorageStatus: Send + Sync {
    fn status(&self) -> ConnectionStatus;
}

/// Owns the document store and exposes typed save operations per collection.
///
/// Backend failures never escape as panics: every operation returns either the inserted
/// identifier or a [`StorageError`], and every failure is logged here.
pub struct StorageGateway<S> {
    store: Arc<S>,
    policy: ReconnectPolicy,
}

impl<S> StorageGateway<S>
where
    S: DocumentStore + 'static,
{
    pub fn new(store: Arc<S>, policy: ReconnectPolicy) -> Self {
        Self { store, policy }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Connects the backend. Failure leaves the gateway degraded instead of erroring.
    pub async fn connect(&self) -> ConnectionStatus {
        match self.store.connect().await {
            Ok(()) => {
                info!("document store connected");
            }
            Err(StorageError::NotConfigured) => {
                warn!("MONGO_URI not set; running without document storage");
            }
            Err(err) => {
                error!(error = %err, "unable to connect to document store");
            }
        }
        self.status()
    }

    pub fn status(&self) -> ConnectionStatus {
        let bound = CollectionKind::ALL
            .iter()
            .all(|collection| self.store.is_bound(*collection));
        if bound {
            ConnectionStatus::Connected
        } else {
            ConnectionStatus::Degraded
        }
    }

    pub async fn save_job(&self, job: Document) -> Result<InsertedId, StorageError> {
        self.insert(CollectionKind::Jobs, job).await
    }

    /// Unordered bulk insert; an empty batch is a no-op.
    pub async fn save_jobs(&self, jobs: Vec<Document>) -> Result<BulkInsert, StorageError> {
        if jobs.is_empty() {
            return Ok(BulkInsert::default());
        }
        let collection = CollectionKind::Jobs;
        if !self.store.is_bound(collection) {
            return Err(StorageError::Unavailable(collection));
        }

        let count = jobs.len();
        self.store
            .insert_many(collection, jobs)
            .await
            .inspect(|outcome| info!(inserted = outcome.inserted, "saved job batch"))
            .inspect_err(|err| error!(error = %err, count, "error bulk saving jobs"))
    }

    pub async fn save_resume(&self, resume: Document) -> Result<InsertedId, StorageError> {
        self.insert(CollectionKind::Resumes, resume).await
    }

    /// Saves a waitlist entry, reconnecting per the policy if the handle is missing.
    pub async fn save_waitlist_entry<T>(&self, entry: &T) -> Result<InsertedId, StorageError>
    where
        T: Serialize,
    {
        let collection = CollectionKind::Waitlist;
        let document = encode(entry)?;

        if !self.store.is_bound(collection) {
            warn!(%collection, "collection handle missing, attempting to reconnect");
            self.reconnect().await;
        }
        if !self.store.is_bound(collection) {
            error!(%collection, "collection still unavailable after reconnect attempts");
            return Err(StorageError::Unavailable(collection));
        }

        self.store
            .insert_one(collection, document)
            .await
            .inspect_err(|err| error!(error = %err, "error inserting waitlist entry"))
    }

    async fn reconnect(&self) {
        for attempt in 1..=self.policy.attempts {
            if attempt > 1 && !self.policy.backoff.is_zero() {
                tokio::time::sleep(self.policy.backoff).await;
            }
            if self.connect().await == ConnectionStatus::Connected {
                return;
            }
        }
    }

    async fn insert(
        &self,
        collection: CollectionKind,
        document: Document,
    ) -> Result<InsertedId, StorageError> {
        if !self.store.is_bound(collection) {
            warn!(%collection, "dropping write, collection unavailable");
            return Err(StorageError::Unavailable(collection));
        }
        self.store
            .insert_one(collection, document)
            .await
            .inspect_err(|err| error!(%collection, error = %err, "insert failed"))
    }
}

impl<S> StorageStatus for StorageGateway<S>
where
    S: DocumentStore + 'static,
{
    fn status(&self) -> ConnectionStatus {
        StorageGateway::status(self)
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Document, StorageError> {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::Object(document)) => Ok(document),
        Ok(other) => Err(StorageError::Encode(format!(
            "expected a JSON object, got {other}"
        ))),
        Err(err) => Err(StorageError::Encode(err.to_string())),
    }
}
