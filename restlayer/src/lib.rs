//! A thin REST layer over JSON document stores.
//!
//! `restlayer` mounts CRUD routes for every model in a [`ModelRegistry`](model::ModelRegistry)
//! on an [`axum`] router. The collection segment of the URL picks the model
//! (`/order_items` serves `OrderItem`), the query string becomes filter
//! criteria and result options, and `populate` expands references into the
//! documents they point at.
//!
//! # Routes
//!
//! | Route | Effect |
//! |---|---|
//! | `GET /:collection` | list, with `X-Total-Count` |
//! | `GET /:collection/count` | `{"count": n}` |
//! | `GET /:collection/:id` | one document, or 404 |
//! | `POST /:collection` | create, 201 with `Location` |
//! | `PUT /:collection/:id` | replace every field |
//! | `PATCH /:collection/:id` | set the given fields |
//! | `DELETE /:collection/:id` | delete (or flag as deleted), 204 |
//!
//! Other method/route pairs answer 405.
//!
//! # Query strings
//!
//! ```text
//! GET /widgets?color=red&size>=3&tags=a,b&!maker&sort=-size,name&limit=10&populate=maker.country
//! ```
//!
//! # Quick Start
//!
//! ```ignore
//! use restlayer::{prelude::*, memory::InMemoryStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = ModelRegistry::new()
//!         .with(Schema::new("Company"))
//!         .with(Schema::new("Widget").reference("maker", "Company").required("name"));
//!
//!     let store = DocumentStore::new(InMemoryStore::builder().build().await?, registry)?;
//!     let app = axum::Router::new().nest("/api", router(store, RestOptions::new().envelope(true)));
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//!     axum::serve(listener, app).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing
//! - [`mongodb`] - Persistent MongoDB backend (requires `mongodb` feature)

#[allow(unused_extern_crates)]
extern crate self as restlayer;

pub mod config;
pub mod error;
pub mod handlers;
pub mod hooks;
pub mod pipeline;
pub mod prelude;
pub mod request;
pub mod router;

pub use restlayer_core::{backend, collection, document, id, model, populate, query, querystring, store};

pub use config::RestOptions;
pub use router::router;

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use restlayer_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use restlayer_mongodb::{MongoDbStore, MongoDbStoreBuilder};
}
