//! Main document store interface.
//!
//! A [`DocumentStore`] owns a type-erased backend together with the model
//! registry, and hands out [`Collection`] handles for registered models. It is
//! cheap to clone and meant to be shared across request handlers.
//!
//! # Example
//!
//! ```ignore
//! use restlayer::store::DocumentStore;
//! use restlayer::model::{ModelRegistry, Schema};
//!
//! let registry = ModelRegistry::new().with(Schema::new("Widget"));
//! let store = DocumentStore::new(backend, registry)?;
//!
//! let widgets = store.collection("Widget")?;
//! let count = widgets.count(None).await?;
//! ```

use std::sync::Arc;
use tracing::debug;

use crate::{
    backend::{DynStoreBackend, StoreBackend},
    collection::Collection,
    error::{DocumentStoreError, DocumentStoreResult},
    model::{ModelRegistry, Schema},
};

/// A shared handle on a backend and the models stored in it.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    backend: Arc<dyn DynStoreBackend>,
    registry: Arc<ModelRegistry>,
}

impl DocumentStore {
    /// Creates a store over `backend` serving the models in `registry`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::UnknownModel`] if a schema references a
    /// model that is not registered.
    pub fn new<B>(backend: B, registry: ModelRegistry) -> DocumentStoreResult<Self>
    where
        B: StoreBackend + 'static,
    {
        Self::from_dyn(Arc::new(backend), registry)
    }

    /// Creates a store over an already type-erased backend.
    pub fn from_dyn(backend: Arc<dyn DynStoreBackend>, registry: ModelRegistry) -> DocumentStoreResult<Self> {
        registry.validate()?;

        Ok(Self {
            backend,
            registry: Arc::new(registry),
        })
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn backend(&self) -> &dyn DynStoreBackend {
        &*self.backend
    }

    /// Returns a handle for the model registered as `name`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::UnknownModel`] if no such model is registered.
    pub fn collection(&self, name: &str) -> DocumentStoreResult<Collection<'_>> {
        let schema = self
            .registry
            .get(name)
            .ok_or_else(|| DocumentStoreError::UnknownModel(name.to_string()))?;

        Ok(self.collection_for(schema))
    }

    /// Closes the backend. Clones of this store must not be used afterwards.
    ///
    /// # Errors
    ///
    /// Returns the backend's error if releasing its resources fails.
    pub async fn shutdown(self) -> DocumentStoreResult<()> {
        self.backend.shutdown().await?;

        debug!(models = self.registry.len(), "document store shut down");

        Ok(())
    }

    /// Returns a handle for a schema already resolved from this store's registry.
    pub fn collection_for<'a>(&'a self, schema: &'a Schema) -> Collection<'a> {
        Collection::new(&*self.backend, schema, &self.registry)
    }
}
