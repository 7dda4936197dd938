//! In-memory backend for restlayer.
//!
//! Filters are evaluated in process by [`evaluator`], with the matching rules
//! of a document database: array fields match element-wise and a missing field
//! equals `null`. Meant for tests and local development.
//!
//! ```ignore
//! use restlayer::{prelude::*, memory::InMemoryStore};
//!
//! let backend = InMemoryStore::builder().build().await?;
//! let store = DocumentStore::new(backend, ModelRegistry::new().with(Schema::new("User")))?;
//!
//! store.collection("User")?.insert(doc! { "name": "Alice" }).await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as restlayer_memory;

pub mod evaluator;
pub mod store;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
