//! Storage backends.
//!
//! [`StoreBackend`] is the small set of raw document operations the REST
//! handlers are built on. Model rules (defaults, soft delete, population) live
//! above it in [`Collection`](crate::collection::Collection), so a backend only
//! stores, finds and counts BSON documents.
//!
//! [`DynStoreBackend`] is the object-safe mirror used behind `Arc<dyn _>`, and
//! [`StoreBackendBuilder`] creates backends asynchronously.
//!
//! ```ignore
//! let backend = InMemoryStore::builder().build().await?;
//!
//! let id = DocumentId::generate();
//! backend.insert_document(doc! { "_id": id.to_bson(), "name": "Alice" }, "users").await?;
//! assert_eq!(backend.count_documents(None, "users").await?, 1);
//! ```

use async_trait::async_trait;
use bson::Document;
use std::fmt::Debug;

use crate::{
    error::DocumentStoreResult,
    id::DocumentId,
    query::{Expr, Query},
};

/// Raw document operations over named collections.
///
/// Every stored document carries its identifier under `_id`. Identifiers are
/// passed as [`DocumentId`] and compared by variant: a native id never matches a
/// raw string id.
///
/// # Cancellation
///
/// Callers may drop any returned future (for example on a request timeout). Backends
/// must leave the store consistent when that happens between awaits.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Inserts a new document. The document must contain `_id`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::DocumentAlreadyExists`](crate::error::DocumentStoreError::DocumentAlreadyExists)
    /// if a document with the same id exists.
    async fn insert_document(
        &self,
        document: Document,
        collection: &str,
    ) -> DocumentStoreResult<()>;

    /// Replaces the document with the given id entirely.
    ///
    /// Returns `false` when no document has that id.
    async fn replace_document(
        &self,
        id: &DocumentId,
        document: Document,
        collection: &str,
    ) -> DocumentStoreResult<bool>;

    /// Sets the given fields on the document with the given id, leaving other fields untouched.
    ///
    /// Returns the updated document, or `None` when no document has that id.
    async fn update_document(
        &self,
        id: &DocumentId,
        fields: Document,
        collection: &str,
    ) -> DocumentStoreResult<Option<Document>>;

    /// Removes the document with the given id.
    ///
    /// Returns `false` when no document has that id.
    async fn delete_document(&self, id: &DocumentId, collection: &str) -> DocumentStoreResult<bool>;

    /// Retrieves documents by id. Missing ids are omitted from the result.
    async fn get_documents(
        &self,
        ids: Vec<DocumentId>,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Document>>;

    /// Runs a filtered, sorted and windowed query.
    ///
    /// Results keep insertion order unless the query sorts them.
    async fn query_documents(
        &self,
        query: Query,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Document>>;

    /// Counts documents matching the filter (all documents when `None`).
    async fn count_documents(
        &self,
        filter: Option<Expr>,
        collection: &str,
    ) -> DocumentStoreResult<u64>;

    /// Releases connections held by the backend. Does nothing by default.
    ///
    /// The backend must not be used afterwards.
    async fn shutdown(&self) -> DocumentStoreResult<()> {
        Ok(())
    }
}

#[async_trait]
impl<B> StoreBackend for &B
where
    B: StoreBackend,
{
    async fn insert_document(
        &self,
        document: Document,
        collection: &str,
    ) -> DocumentStoreResult<()> {
        (*self)
            .insert_document(document, collection)
            .await
    }

    async fn replace_document(
        &self,
        id: &DocumentId,
        document: Document,
        collection: &str,
    ) -> DocumentStoreResult<bool> {
        (*self)
            .replace_document(id, document, collection)
            .await
    }

    async fn update_document(
        &self,
        id: &DocumentId,
        fields: Document,
        collection: &str,
    ) -> DocumentStoreResult<Option<Document>> {
        (*self)
            .update_document(id, fields, collection)
            .await
    }

    async fn delete_document(&self, id: &DocumentId, collection: &str) -> DocumentStoreResult<bool> {
        (*self)
            .delete_document(id, collection)
            .await
    }

    async fn get_documents(
        &self,
        ids: Vec<DocumentId>,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Document>> {
        (*self)
            .get_documents(ids, collection)
            .await
    }

    async fn query_documents(
        &self,
        query: Query,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Document>> {
        (*self)
            .query_documents(query, collection)
            .await
    }

    async fn count_documents(
        &self,
        filter: Option<Expr>,
        collection: &str,
    ) -> DocumentStoreResult<u64> {
        (*self)
            .count_documents(filter, collection)
            .await
    }

    async fn shutdown(&self) -> DocumentStoreResult<()> {
        (*self).shutdown().await
    }
}

#[async_trait]
pub trait DynStoreBackend: Send + Sync + Debug {
    async fn insert_document(
        &self,
        document: Document,
        collection: &str,
    ) -> DocumentStoreResult<()>;
    async fn replace_document(
        &self,
        id: &DocumentId,
        document: Document,
        collection: &str,
    ) -> DocumentStoreResult<bool>;
    async fn update_document(
        &self,
        id: &DocumentId,
        fields: Document,
        collection: &str,
    ) -> DocumentStoreResult<Option<Document>>;
    async fn delete_document(&self, id: &DocumentId, collection: &str) -> DocumentStoreResult<bool>;
    async fn get_documents(
        &self,
        ids: Vec<DocumentId>,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Document>>;
    async fn query_documents(
        &self,
        query: Query,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Document>>;
    async fn count_documents(
        &self,
        filter: Option<Expr>,
        collection: &str,
    ) -> DocumentStoreResult<u64>;
    async fn shutdown(&self) -> DocumentStoreResult<()>;
}

#[async_trait]
impl<B: StoreBackend + Send + Sync + 'static> DynStoreBackend for B {
    async fn insert_document(
        &self,
        document: Document,
        collection: &str,
    ) -> DocumentStoreResult<()> {
        StoreBackend::insert_document(self, document, collection)
            .await
    }

    async fn replace_document(
        &self,
        id: &DocumentId,
        document: Document,
        collection: &str,
    ) -> DocumentStoreResult<bool> {
        StoreBackend::replace_document(self, id, document, collection)
            .await
    }

    async fn update_document(
        &self,
        id: &DocumentId,
        fields: Document,
        collection: &str,
    ) -> DocumentStoreResult<Option<Document>> {
        StoreBackend::update_document(self, id, fields, collection)
            .await
    }

    async fn delete_document(&self, id: &DocumentId, collection: &str) -> DocumentStoreResult<bool> {
        StoreBackend::delete_document(self, id, collection)
            .await
    }

    async fn get_documents(
        &self,
        ids: Vec<DocumentId>,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Document>> {
        StoreBackend::get_documents(self, ids, collection)
            .await
    }

    async fn query_documents(
        &self,
        query: Query,
        collection: &str,
    ) -> DocumentStoreResult<Vec<Document>> {
        StoreBackend::query_documents(self, query, collection)
            .await
    }

    async fn count_documents(
        &self,
        filter: Option<Expr>,
        collection: &str,
    ) -> DocumentStoreResult<u64> {
        StoreBackend::count_documents(self, filter, collection)
            .await
    }

    async fn shutdown(&self) -> DocumentStoreResult<()> {
        StoreBackend::shutdown(self).await
    }
}

#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DocumentStoreResult<Self::Backend>;
}
