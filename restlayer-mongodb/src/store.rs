use async_trait::async_trait;
use bson::{Document, doc};
use futures::TryStreamExt;
use mongodb::{
    Client, Collection as MongoCollection,
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::{ClientOptions, FindOptions, ReturnDocument},
};
use tracing::{debug, info};

use restlayer_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    error::{DocumentStoreError, DocumentStoreResult},
    id::{DocumentId, ID_FIELD},
    query::{Expr, Query},
};

use crate::query::MongoQueryTranslator;

/// Server error code for duplicate key violations.
const DUPLICATE_KEY: i32 = 11000;

fn backend_error(err: MongoError) -> DocumentStoreError {
    DocumentStoreError::Backend(err.to_string())
}

fn id_filter(id: &DocumentId) -> Document {
    doc! { ID_FIELD: id.to_bson() }
}

#[derive(Debug, Clone)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(collection_name)
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn insert_document(&self, document: Document, collection: &str) -> DocumentStoreResult<()> {
        let id = document
            .get(ID_FIELD)
            .and_then(DocumentId::from_bson)
            .map(|id| id.to_string())
            .unwrap_or_default();

        self.get_collection(collection)
            .insert_one(document)
            .await
            .map_err(|e| {
                let duplicate = matches!(
                    *e.kind,
                    ErrorKind::Write(WriteFailure::WriteError(ref failure)) if failure.code == DUPLICATE_KEY
                );

                if duplicate {
                    DocumentStoreError::DocumentAlreadyExists(id, collection.to_string())
                } else {
                    backend_error(e)
                }
            })?;

        Ok(())
    }

    async fn replace_document(&self, id: &DocumentId, mut document: Document, collection: &str) -> DocumentStoreResult<bool> {
        document.insert(ID_FIELD, id.to_bson());

        let result = self
            .get_collection(collection)
            .replace_one(id_filter(id), document)
            .await
            .map_err(backend_error)?;

        Ok(result.matched_count > 0)
    }

    async fn update_document(&self, id: &DocumentId, mut fields: Document, collection: &str) -> DocumentStoreResult<Option<Document>> {
        fields.remove(ID_FIELD);

        self.get_collection(collection)
            .find_one_and_update(id_filter(id), doc! { "$set": fields })
            .return_document(ReturnDocument::After)
            .await
            .map_err(backend_error)
    }

    async fn delete_document(&self, id: &DocumentId, collection: &str) -> DocumentStoreResult<bool> {
        let result = self
            .get_collection(collection)
            .delete_one(id_filter(id))
            .await
            .map_err(backend_error)?;

        Ok(result.deleted_count > 0)
    }

    async fn get_documents(&self, ids: Vec<DocumentId>, collection: &str) -> DocumentStoreResult<Vec<Document>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        let ids = ids
            .iter()
            .map(DocumentId::to_bson)
            .collect::<Vec<_>>();

        self.get_collection(collection)
            .find(doc! { ID_FIELD: { "$in": ids } })
            .await
            .map_err(backend_error)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(backend_error)
    }

    async fn query_documents(&self, query: Query, collection: &str) -> DocumentStoreResult<Vec<Document>> {
        let mut options = FindOptions::default();

        if let Some(limit) = query.limit {
            options.limit = Some(
                i64::try_from(limit)
                    .map_err(|_| DocumentStoreError::InvalidQuery(format!("limit {limit} is out of range")))?,
            );
        }
        if let Some(skip) = query.offset {
            options.skip = Some(
                u64::try_from(skip)
                    .map_err(|_| DocumentStoreError::InvalidQuery(format!("skip {skip} is out of range")))?,
            );
        }
        options.sort = MongoQueryTranslator::sort(&query.sort);
        options.projection = query
            .projection
            .as_ref()
            .and_then(MongoQueryTranslator::projection);

        let filter = MongoQueryTranslator::filter(query.filter.as_ref())?;
        debug!(collection, %filter, "mongodb find");

        self.get_collection(collection)
            .find(filter)
            .with_options(options)
            .await
            .map_err(backend_error)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(backend_error)
    }

    async fn count_documents(&self, filter: Option<Expr>, collection: &str) -> DocumentStoreResult<u64> {
        self.get_collection(collection)
            .count_documents(MongoQueryTranslator::filter(filter.as_ref())?)
            .await
            .map_err(backend_error)
    }

    async fn shutdown(&self) -> DocumentStoreResult<()> {
        debug!(database = %self.database, "closing mongodb client");
        self.client.clone().shutdown().await;

        Ok(())
    }
}

pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
        }
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        let client = Client::with_options(
            ClientOptions::parse(&self.dsn)
                .await
                .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?,
        )
        .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?;

        info!(database = %self.database, "connected to mongodb");

        Ok(MongoDbStore::new(client, self.database))
    }
}
