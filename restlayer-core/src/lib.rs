//! Core building blocks of a thin REST layer over JSON document stores.
//!
//! This crate is the core of the restlayer project and provides:
//!
//! - **Identifiers** ([`id`]) - Native object ids and raw string ids taken from URL paths
//! - **Store backend abstraction** ([`backend`]) - Traits for implementing different storage backends
//! - **Query and filtering API** ([`query`]) - Filter expressions and structured queries
//! - **Query string translation** ([`querystring`]) - Turning `?a>1&sort=-b` into criteria and options
//! - **Population** ([`populate`]) - Parsing `populate` directives for reference expansion
//! - **Models** ([`model`]) - Schemas, the model registry and collection name resolution
//! - **Collections interface** ([`collection`]) - Model-aware CRUD and population over a backend
//! - **Document store** ([`store`]) - Shared handle over a backend and its registry
//! - **Document helpers** ([`document`]) - BSON/JSON conversion and dotted field paths
//! - **Error handling** ([`error`]) - Error types and result types
//!
//! # Example
//!
//! ```ignore
//! use restlayer::prelude::*;
//!
//! let registry = ModelRegistry::new()
//!     .with(Schema::new("Company"))
//!     .with(Schema::new("Widget").reference("maker", "Company"));
//!
//! let store = DocumentStore::new(InMemoryStore::new(), registry)?;
//! let widgets = store.collection("Widget")?;
//!
//! let widget = widgets.insert(doc! { "name": "bolt" }).await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as restlayer_core;

pub mod backend;
pub mod collection;
pub mod document;
pub mod error;
pub mod id;
pub mod model;
pub mod populate;
pub mod query;
pub mod querystring;
pub mod store;
