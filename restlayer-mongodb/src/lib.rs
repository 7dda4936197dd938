//! MongoDB backend for restlayer.
//!
//! [`MongoDbStore`] runs every [`StoreBackend`](restlayer_core::backend::StoreBackend)
//! operation with the official async driver; filters, sort keys and
//! projections are translated by [`query::MongoQueryTranslator`].
//!
//! Enable it through the facade's `mongodb` feature:
//!
//! ```toml
//! [dependencies]
//! restlayer = { version = "0.1", features = ["mongodb"] }
//! ```
//!
//! ```ignore
//! use restlayer::{backend::StoreBackendBuilder, mongodb::MongoDbStore};
//!
//! let backend = MongoDbStore::builder("mongodb://localhost:27017", "shop")
//!     .build()
//!     .await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as restlayer_mongodb;

pub mod query;
pub mod store;

pub use store::{MongoDbStore, MongoDbStoreBuilder};
