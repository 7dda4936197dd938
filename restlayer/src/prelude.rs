//! Convenient re-exports of commonly used types from restlayer.
//!
//! ```ignore
//! use restlayer::prelude::*;
//! ```

pub use restlayer_core::{
    backend::{DynStoreBackend, StoreBackend, StoreBackendBuilder},
    collection::Collection,
    error::{DocumentStoreError, DocumentStoreResult},
    id::DocumentId,
    model::{CollectionDescriptor, Model, ModelRegistry, Schema},
    query::{Expr, FieldOp, Filter, Query, QueryBuilder, QueryVisitor, Sort, SortDirection},
    store::DocumentStore,
};

pub use crate::{
    config::RestOptions,
    error::{RestError, RestResult},
    hooks::{CriteriaHook, Rejection, RequestValidator},
    request::RequestInfo,
    router::router,
};

pub use bson::doc;
