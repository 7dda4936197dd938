//! Model-aware access to one collection.
//!
//! A [`Collection`] pairs a backend with a resolved [`Schema`] and layers the
//! model rules over raw backend calls: defaults and required fields on write,
//! reference casting, soft-delete scoping and relation population.
//!
//! # Example
//!
//! ```ignore
//! use restlayer::collection::Collection;
//! use restlayer::populate::parse_populate;
//!
//! let widgets = Collection::new(&backend, registry.get("Widget").unwrap(), &registry);
//!
//! let created = widgets.insert(doc! { "name": "bolt", "maker": maker_id }).await?;
//! let mut found = widgets.find(Query::new()).await?;
//! widgets.populate(&mut found, &parse_populate("maker")).await?;
//! ```

use bson::{Bson, Document, oid::ObjectId};
use futures::future::{BoxFuture, FutureExt};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::{
    backend::DynStoreBackend,
    document::{for_each_at_path_mut, values_at_path},
    error::{DocumentStoreError, DocumentStoreResult},
    id::{DocumentId, ID_FIELD},
    model::{DELETED_AT_FIELD, DELETED_FIELD, ModelRegistry, Schema},
    populate::PopulateDirective,
    query::{Expr, Filter, Query, conjoin},
};

/// A collection handle bound to a backend and the schema of its model.
///
/// # Type Parameters
///
/// * `'a` - Lifetime of the backend, schema and registry references
#[derive(Debug, Clone, Copy)]
pub struct Collection<'a> {
    backend: &'a dyn DynStoreBackend,
    schema: &'a Schema,
    registry: &'a ModelRegistry,
}

impl<'a> Collection<'a> {
    pub fn new(backend: &'a dyn DynStoreBackend, schema: &'a Schema, registry: &'a ModelRegistry) -> Self {
        Self { backend, schema, registry }
    }

    pub fn schema(&self) -> &'a Schema {
        self.schema
    }

    /// Name of the storage collection.
    pub fn name(&self) -> &'a str {
        self.schema.collection_name()
    }

    /// Restricts `filter` to documents that are not soft-deleted.
    ///
    /// Id strings compared against reference fields are cast the way
    /// [`Collection::insert`] stores them.
    fn scoped(&self, mut filter: Option<Expr>) -> Option<Expr> {
        if let Some(expr) = filter.as_mut() {
            self.cast_filter_refs(expr);
        }

        conjoin(filter, self.schema.live_filter())
    }

    fn cast_filter_refs(&self, expr: &mut Expr) {
        match expr {
            Expr::And(exprs) | Expr::Or(exprs) => exprs.iter_mut().for_each(|e| self.cast_filter_refs(e)),
            Expr::Not(inner) => self.cast_filter_refs(inner),
            Expr::Field { field, value, .. } if self.schema.ref_target(field).is_some() => match value {
                Bson::Array(items) => items.iter_mut().for_each(cast_object_id),
                other => cast_object_id(other),
            },
            Expr::Field { .. } | Expr::Exists(..) | Expr::Matches { .. } => {}
        }
    }

    fn id_filter(&self, id: &DocumentId, extra: Option<Expr>) -> Option<Expr> {
        self.scoped(conjoin(Some(Filter::eq(ID_FIELD, id.to_bson())), extra))
    }

    /// Runs a query against the collection.
    ///
    /// # Errors
    ///
    /// Returns a [`DocumentStoreError`] if the backend fails.
    pub async fn find(&self, mut query: Query) -> DocumentStoreResult<Vec<Document>> {
        query.filter = self.scoped(query.filter.take());

        self.backend
            .query_documents(query, self.name())
            .await
    }

    /// Counts documents matching `filter`.
    pub async fn count(&self, filter: Option<Expr>) -> DocumentStoreResult<u64> {
        self.backend
            .count_documents(self.scoped(filter), self.name())
            .await
    }

    /// Finds the document with the given id that also matches `extra`.
    pub async fn find_by_id(&self, id: &DocumentId, extra: Option<Expr>) -> DocumentStoreResult<Option<Document>> {
        let query = Query {
            filter: self.id_filter(id, extra),
            limit: Some(1),
            ..Query::default()
        };

        Ok(self
            .backend
            .query_documents(query, self.name())
            .await?
            .into_iter()
            .next())
    }

    /// Creates a document from a request body.
    ///
    /// Schema defaults fill missing fields, a fresh object id is assigned
    /// unless the body carries a usable `_id`, and reference fields holding id
    /// strings are stored as object ids.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidDocument`] when a required field is
    /// missing, or the backend's error if the insert fails.
    pub async fn insert(&self, body: Document) -> DocumentStoreResult<Document> {
        let id = body
            .get(ID_FIELD)
            .and_then(DocumentId::from_bson)
            .unwrap_or_else(DocumentId::generate);

        let document = self.prepare(&id, body)?;

        self.backend
            .insert_document(document.clone(), self.name())
            .await?;

        debug!(collection = self.name(), %id, "document inserted");

        Ok(document)
    }

    /// Replaces every field of an existing document with `body`.
    ///
    /// Returns `None` when no live document with that id matches `extra`.
    pub async fn replace(
        &self,
        id: &DocumentId,
        body: Document,
        extra: Option<Expr>,
    ) -> DocumentStoreResult<Option<Document>> {
        if self.find_by_id(id, extra).await?.is_none() {
            return Ok(None);
        }

        let document = self.prepare(id, body)?;

        let replaced = self
            .backend
            .replace_document(id, document.clone(), self.name())
            .await?;

        Ok(replaced.then_some(document))
    }

    /// Sets the fields in `fields` on an existing document, leaving the others untouched.
    ///
    /// `_id` in `fields` is ignored. Returns the updated document, or `None`
    /// when no live document with that id matches `extra`.
    pub async fn update(
        &self,
        id: &DocumentId,
        mut fields: Document,
        extra: Option<Expr>,
    ) -> DocumentStoreResult<Option<Document>> {
        if self.find_by_id(id, extra).await?.is_none() {
            return Ok(None);
        }

        fields.remove(ID_FIELD);
        self.cast_refs(&mut fields);

        if fields.is_empty() {
            return self.find_by_id(id, None).await;
        }

        self.backend
            .update_document(id, fields, self.name())
            .await
    }

    /// Deletes a document, flagging it instead when the model soft deletes.
    ///
    /// Returns `false` when no live document with that id matches `extra`.
    pub async fn delete(&self, id: &DocumentId, extra: Option<Expr>) -> DocumentStoreResult<bool> {
        if self.find_by_id(id, extra).await?.is_none() {
            return Ok(false);
        }

        if self.schema.is_soft_delete() {
            let mut flags = Document::new();
            flags.insert(DELETED_FIELD, true);
            flags.insert(DELETED_AT_FIELD, bson::DateTime::now());

            let updated = self
                .backend
                .update_document(id, flags, self.name())
                .await?;

            return Ok(updated.is_some());
        }

        self.backend
            .delete_document(id, self.name())
            .await
    }

    /// Replaces reference ids in `documents` with the documents they point at.
    ///
    /// Directives whose path is not a reference of this model are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::UnknownModel`] if a reference targets an
    /// unregistered model, or the backend's error if a lookup fails.
    pub fn populate<'b>(
        &'b self,
        documents: &'b mut [Document],
        directives: &'b [PopulateDirective],
    ) -> BoxFuture<'b, DocumentStoreResult<()>> {
        async move {
            for directive in directives {
                self.populate_one(documents, directive).await?;
            }

            Ok(())
        }
        .boxed()
    }

    async fn populate_one(&self, documents: &mut [Document], directive: &PopulateDirective) -> DocumentStoreResult<()> {
        let Some(target) = self.schema.ref_target(&directive.path) else {
            debug!(model = self.schema.name(), path = %directive.path, "populate path is not a reference, skipping");
            return Ok(());
        };

        let target_schema = self
            .registry
            .get(target)
            .ok_or_else(|| DocumentStoreError::UnknownModel(target.to_string()))?;

        let ids = referenced_ids(documents, &directive.path);
        if ids.is_empty() {
            return Ok(());
        }

        let mut targets = self
            .backend
            .get_documents(ids, target_schema.collection_name())
            .await?;

        if target_schema.is_soft_delete() {
            targets.retain(|doc| !matches!(doc.get(DELETED_FIELD), Some(Bson::Boolean(true))));
        }

        if let Some(child) = directive.populate.as_deref() {
            Collection::new(self.backend, target_schema, self.registry)
                .populate(&mut targets, std::slice::from_ref(child))
                .await?;
        }

        let by_id = targets
            .into_iter()
            .filter_map(|doc| {
                let id = doc.get(ID_FIELD).and_then(DocumentId::from_bson)?;
                Some((id, doc))
            })
            .collect::<HashMap<_, _>>();

        let lookup = |value: &Bson| {
            DocumentId::from_bson(value)
                .and_then(|id| by_id.get(&id))
                .map(|doc| Bson::Document(doc.clone()))
        };

        for document in documents.iter_mut() {
            for_each_at_path_mut(document, &directive.path, &mut |value| match value {
                Bson::Array(items) => {
                    *items = items.iter().filter_map(&lookup).collect();
                }
                Bson::Null => {}
                other => {
                    *other = lookup(other).unwrap_or(Bson::Null);
                }
            });
        }

        Ok(())
    }

    /// Builds the stored form of a body: `_id` first, then defaults, casts and validation.
    fn prepare(&self, id: &DocumentId, body: Document) -> DocumentStoreResult<Document> {
        let mut document = Document::new();
        document.insert(ID_FIELD, id.to_bson());

        for (key, value) in body {
            if key != ID_FIELD {
                document.insert(key, value);
            }
        }

        self.schema.apply_defaults(&mut document);
        self.cast_refs(&mut document);
        self.schema.validate(&document)?;

        Ok(document)
    }

    /// Stores reference ids given as hex strings as object ids.
    fn cast_refs(&self, document: &mut Document) {
        for (path, _) in self.schema.refs() {
            for_each_at_path_mut(document, path, &mut |value| match value {
                Bson::Array(items) => items.iter_mut().for_each(cast_object_id),
                other => cast_object_id(other),
            });
        }
    }
}

fn cast_object_id(value: &mut Bson) {
    if let Bson::String(s) = value
        && let Ok(oid) = ObjectId::parse_str(s.as_str())
    {
        *value = Bson::ObjectId(oid);
    }
}

/// Distinct ids stored at `path` across `documents`, in first-seen order.
fn referenced_ids(documents: &[Document], path: &str) -> Vec<DocumentId> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();

    let mut push = |value: &Bson| {
        if let Some(id) = DocumentId::from_bson(value)
            && seen.insert(id.clone())
        {
            ids.push(id);
        }
    };

    for document in documents {
        for value in values_at_path(document, path) {
            match value {
                Bson::Array(items) => items.iter().for_each(&mut push),
                other => push(other),
            }
        }
    }

    ids
}
