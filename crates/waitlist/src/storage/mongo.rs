use std::sync::RwLock;

use async_trait::async_trait;
use mongodb::bson::{doc, Bson};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{ClientOptions, ServerApi, ServerApiVersion, Tls, TlsOptions};
use mongodb::{Client, Collection};
use tracing::info;

use super::{BulkInsert, CollectionKind, Document, DocumentStore, InsertedId, StorageError};
use crate::config::StorageConfig;

const DUPLICATE_KEY: i32 = 11000;

type BsonDocument = mongodb::bson::Document;

#[derive(Clone)]
struct BoundCollections {
    jobs: Collection<BsonDocument>,
    resumes: Collection<BsonDocument>,
    waitlist: Collection<BsonDocument>,
}

impl BoundCollections {
    fn get(&self, kind: CollectionKind) -> Collection<BsonDocument> {
        match kind {
            CollectionKind::Jobs => self.jobs.clone(),
            CollectionKind::Resumes => self.resumes.clone(),
            CollectionKind::Waitlist => self.waitlist.clone(),
        }
    }
}

/// MongoDB backend. Handles stay unbound until a `connect` succeeds.
pub struct MongoStore {
    uri: Option<String>,
    database: String,
    bound: RwLock<Option<BoundCollections>>,
}

impl MongoStore {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            uri: config.uri.clone(),
            database: config.database.clone(),
            bound: RwLock::new(None),
        }
    }

    fn collection(&self, kind: CollectionKind) -> Result<Collection<BsonDocument>, StorageError> {
        let guard = self
            .bound
            .read()
            .map_err(|_| StorageError::Unavailable(kind))?;
        guard
            .as_ref()
            .map(|bound| bound.get(kind))
            .ok_or(StorageError::Unavailable(kind))
    }

    async fn open(&self, uri: &str) -> Result<BoundCollections, mongodb::error::Error> {
        let mut options = ClientOptions::parse(uri).await?;
        options.server_api = Some(ServerApi::builder().version(ServerApiVersion::V1).build());
        if options.tls.is_none() {
            options.tls = Some(Tls::Enabled(TlsOptions::default()));
        }

        let client = Client::with_options(options)?;
        client.database("admin").run_command(doc! { "ping": 1 }).await?;
        info!(database = %self.database, "document store answered ping");

        let database = client.database(&self.database);
        Ok(BoundCollections {
            jobs: database.collection(CollectionKind::Jobs.name()),
            resumes: database.collection(CollectionKind::Resumes.name()),
            waitlist: database.collection(CollectionKind::Waitlist.name()),
        })
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn connect(&self) -> Result<(), StorageError> {
        let uri = self.uri.as_deref().ok_or(StorageError::NotConfigured)?;
        let collections = self
            .open(uri)
            .await
            .map_err(|err| StorageError::Connection(err.to_string()))?;

        let mut guard = self
            .bound
            .write()
            .map_err(|_| StorageError::Connection("collection lock poisoned".to_string()))?;
        *guard = Some(collections);
        Ok(())
    }

    fn is_bound(&self, _collection: CollectionKind) -> bool {
        self.bound
            .read()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    async fn insert_one(
        &self,
        collection: CollectionKind,
        document: Document,
    ) -> Result<InsertedId, StorageError> {
        let handle = self.collection(collection)?;
        let document = to_bson(document)?;
        let result = handle.insert_one(document).await.map_err(write_error)?;
        Ok(inserted_id(result.inserted_id))
    }

    async fn insert_many(
        &self,
        collection: CollectionKind,
        documents: Vec<Document>,
    ) -> Result<BulkInsert, StorageError> {
        let handle = self.collection(collection)?;
        let total = documents.len();
        let documents = documents
            .into_iter()
            .map(to_bson)
            .collect::<Result<Vec<_>, _>>()?;

        match handle.insert_many(documents).ordered(false).await {
            Ok(result) => Ok(BulkInsert {
                inserted: result.inserted_ids.len(),
            }),
            Err(err) => match *err.kind {
                ErrorKind::InsertMany(ref failure) => {
                    let failed = failure.write_errors.as_ref().map_or(0, Vec::len);
                    Err(StorageError::PartialWrite {
                        inserted: total.saturating_sub(failed),
                        total,
                    })
                }
                _ => Err(write_error(err)),
            },
        }
    }
}

fn to_bson(document: Document) -> Result<BsonDocument, StorageError> {
    mongodb::bson::to_document(&document).map_err(|err| StorageError::Encode(err.to_string()))
}

fn inserted_id(id: Bson) -> InsertedId {
    match id {
        Bson::ObjectId(oid) => InsertedId(oid.to_hex()),
        Bson::String(value) => InsertedId(value),
        other => InsertedId(other.to_string()),
    }
}

fn write_error(err: mongodb::error::Error) -> StorageError {
    match *err.kind {
        ErrorKind::Write(WriteFailure::WriteError(ref write)) if write.code == DUPLICATE_KEY => {
            StorageError::Duplicate
        }
        _ => StorageError::Write(err.to_string()),
    }
}
