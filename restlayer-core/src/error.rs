//! Errors raised by models, query translation and storage backends.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocumentStoreError {
    /// A value could not be converted between JSON and BSON.
    #[error("Could not convert document: {0}")]
    Serialization(String),

    /// The backend could not be reached or set up.
    #[error("Store unavailable: {0}")]
    Initialization(String),

    /// `(id, collection)` of an insert that collided with a stored document.
    #[error("Duplicate id {0} in `{1}`")]
    DocumentAlreadyExists(String, String),

    /// `(id, collection)` of a write that matched nothing.
    #[error("No document {0} in `{1}`")]
    DocumentNotFound(String, String),

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    /// The document breaks a schema rule, e.g. a required field is missing.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Store failure: {0}")]
    Backend(String),
}

impl DocumentStoreError {
    /// Stable name of the error kind, sent to clients as `name`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Serialization(_) => "SerializationError",
            Self::Initialization(_) => "InitializationError",
            Self::DocumentAlreadyExists(..) => "DuplicateKeyError",
            Self::DocumentNotFound(..) => "DocumentNotFoundError",
            Self::UnknownModel(_) => "MissingSchemaError",
            Self::InvalidDocument(_) => "ValidationError",
            Self::InvalidQuery(_) => "CastError",
            Self::Backend(_) => "BackendError",
        }
    }
}

pub type DocumentStoreResult<T> = Result<T, DocumentStoreError>;

impl From<bson::error::Error> for DocumentStoreError {
    fn from(err: bson::error::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for DocumentStoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
