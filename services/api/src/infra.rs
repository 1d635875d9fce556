use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use waitlist::config::StorageConfig;
use waitlist::error::AppError;
use waitlist::storage::{Document, DocumentStore, StorageGateway, StorageStatus};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) storage: Arc<dyn StorageStatus>,
}

pub(crate) fn build_gateway<S>(store: S, config: &StorageConfig) -> Arc<StorageGateway<S>>
where
    S: DocumentStore + 'static,
{
    Arc::new(StorageGateway::new(Arc::new(store), config.reconnect))
}

/// Reads a JSON file holding one document or an array of documents.
pub(crate) fn load_documents(path: &Path) -> Result<Vec<Document>, AppError> {
    let raw = fs::read_to_string(path)?;
    parse_documents(&raw).map_err(|reason| AppError::DocumentFile {
        path: path.display().to_string(),
        reason,
    })
}

pub(crate) fn parse_documents(raw: &str) -> Result<Vec<Document>, String> {
    let value: Value = serde_json::from_str(raw).map_err(|err| err.to_string())?;
    match value {
        Value::Object(document) => Ok(vec![document]),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(index, item)| match item {
                Value::Object(document) => Ok(document),
                _ => Err(format!("entry {index} is not a JSON object")),
            })
            .collect(),
        _ => Err("expected a JSON object or an array of objects".to_string()),
    }
}
