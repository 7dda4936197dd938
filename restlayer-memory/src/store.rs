//! In-memory backend: BSON documents per collection, in insertion order,
//! behind a `mea` read-write lock.

use async_trait::async_trait;
use bson::{Bson, Document};
use mea::rwlock::RwLock;
use std::{cmp::Ordering, collections::HashMap, sync::Arc};
use tracing::trace;

use restlayer_core::{
    backend::{StoreBackend, StoreBackendBuilder},
    document::get_path,
    error::{DocumentStoreError, DocumentStoreResult},
    id::{DocumentId, ID_FIELD},
    query::{Expr, Projection, Query, Sort, SortDirection},
};

use crate::evaluator::{Comparable, DocumentEvaluator};

/// Documents of one collection, keyed by id and kept in insertion order.
#[derive(Debug, Default)]
struct CollectionData {
    order: Vec<DocumentId>,
    documents: HashMap<DocumentId, Document>,
}

impl CollectionData {
    fn iter(&self) -> impl Iterator<Item = &Document> {
        self.order
            .iter()
            .filter_map(|id| self.documents.get(id))
    }

    fn remove(&mut self, id: &DocumentId) -> bool {
        if self.documents.remove(id).is_none() {
            return false;
        }

        self.order.retain(|existing| existing != id);
        true
    }
}

type StoreMap = HashMap<String, CollectionData>;

/// In-memory [`StoreBackend`].
///
/// Clones share the same data. Every query scans the whole collection, which
/// suits tests and development datasets.
///
/// # Example
///
/// ```ignore
/// use restlayer_memory::InMemoryStore;
/// use restlayer::backend::StoreBackend;
/// use restlayer::id::DocumentId;
/// use bson::doc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = InMemoryStore::new();
///
///     let id = DocumentId::generate();
///     store.insert_document(doc! { "_id": id.to_bson(), "name": "Alice" }, "users").await?;
///
///     let docs = store.get_documents(vec![id], "users").await?;
///     assert_eq!(docs.len(), 1);
///
///     Ok(())
/// }
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// collection name -> documents
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
        }
    }

    /// Creates a builder for constructing an `InMemoryStore`.
    ///
    /// ```ignore
    /// let store = InMemoryStore::builder().build().await?;
    /// ```
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }
}

fn document_id(document: &Document, collection: &str) -> DocumentStoreResult<DocumentId> {
    document
        .get(ID_FIELD)
        .and_then(DocumentId::from_bson)
        .ok_or_else(|| DocumentStoreError::InvalidDocument(format!("document in {collection} has no usable {ID_FIELD}")))
}

fn compare_by(a: &Document, b: &Document, sort: &[Sort]) -> Ordering {
    for key in sort {
        let left = get_path(a, &key.field)
            .map(Comparable::from)
            .unwrap_or(Comparable::Null);
        let right = get_path(b, &key.field)
            .map(Comparable::from)
            .unwrap_or(Comparable::Null);

        let ordering = match key.direction {
            SortDirection::Asc => left.sort_cmp(&right),
            SortDirection::Desc => right.sort_cmp(&left),
        };

        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    Ordering::Equal
}

/// Sets `value` at a dotted path, creating intermediate sub-documents.
fn set_path(document: &mut Document, path: &str, value: Bson) {
    match path.split_once('.') {
        None => {
            document.insert(path, value);
        }
        Some((head, rest)) => {
            if !matches!(document.get(head), Some(Bson::Document(_))) {
                document.insert(head, Document::new());
            }

            if let Some(Bson::Document(inner)) = document.get_mut(head) {
                set_path(inner, rest, value);
            }
        }
    }
}

fn remove_path(document: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            document.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Bson::Document(inner)) = document.get_mut(head) {
                remove_path(inner, rest);
            }
        }
    }
}

/// Applies a field selection. `_id` is kept unless explicitly excluded.
fn project(document: &Document, projection: &Projection) -> Document {
    let mut projected = if projection.include.is_empty() {
        document.clone()
    } else {
        let mut selected = Document::new();

        if let Some(id) = document.get(ID_FIELD) {
            selected.insert(ID_FIELD, id.clone());
        }

        for field in &projection.include {
            if let Some(value) = get_path(document, field) {
                set_path(&mut selected, field, value.clone());
            }
        }

        selected
    };

    for field in &projection.exclude {
        remove_path(&mut projected, field);
    }

    projected
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn insert_document(&self, document: Document, collection: &str) -> DocumentStoreResult<()> {
        let id = document_id(&document, collection)?;

        let mut store = self.store.write().await;
        let data = store
            .entry(collection.to_string())
            .or_default();

        if data.documents.contains_key(&id) {
            return Err(DocumentStoreError::DocumentAlreadyExists(id.to_string(), collection.to_string()));
        }

        data.order.push(id.clone());
        data.documents.insert(id, document);

        Ok(())
    }

    async fn replace_document(&self, id: &DocumentId, document: Document, collection: &str) -> DocumentStoreResult<bool> {
        let mut store = self.store.write().await;

        let Some(existing) = store
            .get_mut(collection)
            .and_then(|data| data.documents.get_mut(id))
        else {
            return Ok(false);
        };

        *existing = document;
        existing.insert(ID_FIELD, id.to_bson());

        Ok(true)
    }

    async fn update_document(&self, id: &DocumentId, fields: Document, collection: &str) -> DocumentStoreResult<Option<Document>> {
        let mut store = self.store.write().await;

        let Some(existing) = store
            .get_mut(collection)
            .and_then(|data| data.documents.get_mut(id))
        else {
            return Ok(None);
        };

        for (path, value) in fields {
            if path != ID_FIELD {
                set_path(existing, &path, value);
            }
        }

        Ok(Some(existing.clone()))
    }

    async fn delete_document(&self, id: &DocumentId, collection: &str) -> DocumentStoreResult<bool> {
        let mut store = self.store.write().await;

        Ok(store
            .get_mut(collection)
            .is_some_and(|data| data.remove(id)))
    }

    async fn get_documents(&self, ids: Vec<DocumentId>, collection: &str) -> DocumentStoreResult<Vec<Document>> {
        let store = self.store.read().await;
        let Some(data) = store.get(collection) else {
            return Ok(vec![]);
        };

        Ok(ids
            .iter()
            .filter_map(|id| data.documents.get(id))
            .cloned()
            .collect())
    }

    async fn query_documents(&self, query: Query, collection: &str) -> DocumentStoreResult<Vec<Document>> {
        let store = self.store.read().await;
        let Some(data) = store.get(collection) else {
            return Ok(vec![]);
        };

        // Apply filter expressions if present
        let mut matched = match &query.filter {
            Some(filter) => DocumentEvaluator::filter_documents(data.iter(), filter)?,
            None => data.iter().collect::<Vec<_>>(),
        };

        // Stable, so ties keep insertion order
        if !query.sort.is_empty() {
            matched.sort_by(|a, b| compare_by(a, b, &query.sort));
        }

        let results = matched
            .into_iter()
            .skip(query.offset.unwrap_or(0))
            .take(query.limit.unwrap_or(usize::MAX))
            .map(|document| match &query.projection {
                Some(projection) => project(document, projection),
                None => document.clone(),
            })
            .collect::<Vec<_>>();

        trace!(collection, matched = results.len(), "in-memory query");

        Ok(results)
    }

    async fn count_documents(&self, filter: Option<Expr>, collection: &str) -> DocumentStoreResult<u64> {
        let store = self.store.read().await;
        let Some(data) = store.get(collection) else {
            return Ok(0);
        };

        let count = match &filter {
            Some(filter) => DocumentEvaluator::filter_documents(data.iter(), filter)?.len(),
            None => data.documents.len(),
        };

        Ok(count as u64)
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
#[derive(Default)]
pub struct InMemoryStoreBuilder;

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    /// Builds and returns a new [`InMemoryStore`] instance.
    ///
    /// This always succeeds and returns a freshly initialized store.
    async fn build(self) -> DocumentStoreResult<Self::Backend> {
        Ok(InMemoryStore::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use restlayer_core::query::Filter;

    async fn seeded() -> (InMemoryStore, Vec<DocumentId>) {
        let store = InMemoryStore::new();
        let mut ids = Vec::new();

        for (name, qty) in [("bolt", 3), ("nut", 1), ("washer", 2)] {
            let id = DocumentId::generate();
            store
                .insert_document(doc! { "_id": id.to_bson(), "name": name, "qty": qty }, "parts")
                .await
                .unwrap();
            ids.push(id);
        }

        (store, ids)
    }

    fn names(documents: &[Document]) -> Vec<&str> {
        documents
            .iter()
            .map(|d| d.get_str("name").unwrap())
            .collect()
    }

    #[tokio::test]
    async fn queries_keep_insertion_order() {
        let (store, _) = seeded().await;

        let found = store.query_documents(Query::new(), "parts").await.unwrap();
        assert_eq!(names(&found), vec!["bolt", "nut", "washer"]);
    }

    #[tokio::test]
    async fn sort_skip_and_limit() {
        let (store, _) = seeded().await;

        let query = Query::builder()
            .sort("qty", SortDirection::Desc)
            .offset(1)
            .limit(1)
            .build();

        let found = store.query_documents(query, "parts").await.unwrap();
        assert_eq!(names(&found), vec!["washer"]);
    }

    #[tokio::test]
    async fn projection_keeps_id_by_default() {
        let (store, _) = seeded().await;

        let query = Query::builder()
            .projection(Projection { include: vec!["name".into()], exclude: vec![] })
            .build();

        let found = store.query_documents(query, "parts").await.unwrap();
        assert!(found.iter().all(|d| d.contains_key("_id") && !d.contains_key("qty")));
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected() {
        let (store, ids) = seeded().await;

        let err = store
            .insert_document(doc! { "_id": ids[0].to_bson() }, "parts")
            .await
            .unwrap_err();

        assert!(matches!(err, DocumentStoreError::DocumentAlreadyExists(..)));
    }

    #[tokio::test]
    async fn update_sets_only_named_fields() {
        let (store, ids) = seeded().await;

        let updated = store
            .update_document(&ids[1], doc! { "qty": 9, "meta.color": "red" }, "parts")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.get_str("name").unwrap(), "nut");
        assert_eq!(updated.get_i32("qty").unwrap(), 9);
        assert_eq!(updated.get_document("meta").unwrap().get_str("color").unwrap(), "red");

        let missing = store
            .update_document(&DocumentId::generate(), doc! { "qty": 1 }, "parts")
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn replace_and_delete() {
        let (store, ids) = seeded().await;

        assert!(store.replace_document(&ids[0], doc! { "name": "rivet" }, "parts").await.unwrap());
        let found = store.get_documents(vec![ids[0].clone()], "parts").await.unwrap();
        assert_eq!(found[0].get_str("name").unwrap(), "rivet");
        assert!(!found[0].contains_key("qty"));

        assert!(store.delete_document(&ids[0], "parts").await.unwrap());
        assert!(!store.delete_document(&ids[0], "parts").await.unwrap());
        assert_eq!(store.count_documents(None, "parts").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn count_applies_filter() {
        let (store, _) = seeded().await;

        let count = store
            .count_documents(Some(Filter::gte("qty", 2)), "parts")
            .await
            .unwrap();

        assert_eq!(count, 2);
        assert_eq!(store.count_documents(None, "missing").await.unwrap(), 0);
    }
}
