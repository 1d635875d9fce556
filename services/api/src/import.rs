use std::path::PathBuf;

use clap::Args;
use waitlist::config::AppConfig;
use waitlist::error::AppError;
use waitlist::storage::{
    CollectionKind, ConnectionStatus, Document, DocumentStore, MongoStore, StorageError,
    StorageGateway,
};
use waitlist::telemetry;

use crate::infra::{build_gateway, load_documents};

#[derive(Args, Debug)]
pub(crate) struct ImportArgs {
    /// JSON file with one document or an array of documents
    pub(crate) path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ImportTarget {
    Jobs,
    Resumes,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct ImportSummary {
    pub(crate) inserted: usize,
    pub(crate) failed: usize,
}

pub(crate) async fn run_check() -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let gateway = build_gateway(MongoStore::new(&config.storage), &config.storage);
    let status = gateway.connect().await;
    println!(
        "document store: {} (database '{}')",
        status.label(),
        config.storage.database
    );

    match status {
        ConnectionStatus::Connected => Ok(()),
        ConnectionStatus::Degraded if config.storage.uri.is_none() => {
            Err(StorageError::NotConfigured.into())
        }
        ConnectionStatus::Degraded => Err(StorageError::Connection(
            "document store unreachable; see log for details".to_string(),
        )
        .into()),
    }
}

pub(crate) async fn run_import(target: ImportTarget, args: ImportArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let documents = load_documents(&args.path)?;
    let gateway = build_gateway(MongoStore::new(&config.storage), &config.storage);
    if gateway.connect().await == ConnectionStatus::Degraded {
        return Err(StorageError::Unavailable(target.collection()).into());
    }

    let total = documents.len();
    let summary = import_documents(&gateway, target, documents).await;
    println!(
        "{}: {} of {} documents written, {} failed",
        target.collection(),
        summary.inserted,
        total,
        summary.failed
    );
    Ok(())
}

impl ImportTarget {
    fn collection(self) -> CollectionKind {
        match self {
            Self::Jobs => CollectionKind::Jobs,
            Self::Resumes => CollectionKind::Resumes,
        }
    }
}

pub(crate) async fn import_documents<S>(
    gateway: &StorageGateway<S>,
    target: ImportTarget,
    documents: Vec<Document>,
) -> ImportSummary
where
    S: DocumentStore + 'static,
{
    match target {
        ImportTarget::Jobs => {
            let count = documents.len();
            match gateway.save_jobs(documents).await {
                Ok(outcome) => ImportSummary {
                    inserted: outcome.inserted,
                    failed: 0,
                },
                Err(StorageError::PartialWrite { inserted, total }) => ImportSummary {
                    inserted,
                    failed: total - inserted,
                },
                Err(_) => ImportSummary {
                    inserted: 0,
                    failed: count,
                },
            }
        }
        ImportTarget::Resumes => {
            let mut summary = ImportSummary::default();
            for document in documents {
                match gateway.save_resume(document).await {
                    Ok(_) => summary.inserted += 1,
                    Err(_) => summary.failed += 1,
                }
            }
            summary
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use waitlist::storage::{MemoryStore, ReconnectPolicy};

    fn document(value: serde_json::Value) -> Document {
        value.as_object().cloned().expect("object literal")
    }

    async fn connected_gateway() -> StorageGateway<MemoryStore> {
        let gateway = StorageGateway::new(Arc::new(MemoryStore::new()), ReconnectPolicy::default());
        gateway.connect().await;
        gateway
    }

    #[tokio::test]
    async fn job_import_counts_duplicates_as_failures() {
        let gateway = connected_gateway().await;
        let documents = vec![
            document(json!({ "_id": "li-1", "title": "SRE" })),
            document(json!({ "_id": "li-1", "title": "SRE" })),
            document(json!({ "_id": "li-2", "title": "QA" })),
        ];

        let summary = import_documents(&gateway, ImportTarget::Jobs, documents).await;

        assert_eq!(
            summary,
            ImportSummary {
                inserted: 2,
                failed: 1
            }
        );
        assert_eq!(gateway.store().documents(CollectionKind::Jobs).len(), 2);
    }

    #[tokio::test]
    async fn resume_import_writes_each_document() {
        let gateway = connected_gateway().await;
        let documents = vec![
            document(json!({ "name": "a.pdf" })),
            document(json!({ "name": "b.pdf" })),
        ];

        let summary = import_documents(&gateway, ImportTarget::Resumes, documents).await;

        assert_eq!(summary.inserted, 2);
        assert_eq!(gateway.store().documents(CollectionKind::Resumes).len(), 2);
    }

    #[tokio::test]
    async fn unavailable_storage_fails_every_document() {
        let gateway =
            StorageGateway::new(Arc::new(MemoryStore::unreachable()), ReconnectPolicy::default());
        let documents = vec![document(json!({ "title": "SRE" }))];

        let summary = import_documents(&gateway, ImportTarget::Jobs, documents).await;

        assert_eq!(
            summary,
            ImportSummary {
                inserted: 0,
                failed: 1
            }
        );
    }
}
