//! REST error translation.
//!
//! Every failure a handler can produce is a [`RestError`]. Its
//! [`IntoResponse`] implementation is the single place that decides the
//! status code and JSON body clients see.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{error, warn};

use restlayer_core::error::DocumentStoreError;

/// Result type for REST handlers
pub type RestResult<T> = Result<T, RestError>;

/// Errors surfaced by the REST layer.
#[derive(Debug, Error)]
pub enum RestError {
    /// The body was missing or held no data (`null`, `{}`, `[]`).
    #[error("No Request Body")]
    EmptyBody,

    /// The body was not a JSON object.
    #[error("{0}")]
    InvalidBody(String),

    /// A full replacement targeted a document that does not exist.
    #[error("Document not found")]
    DocumentNotFound,

    #[error("Not found")]
    NotFound,

    #[error("Method not allowed")]
    MethodNotAllowed,

    /// No model is registered for the collection segment.
    #[error("No model registered for collection `{0}`")]
    UnknownCollection(String),

    #[error(transparent)]
    Store(#[from] DocumentStoreError),

    /// A validator or criteria hook refused the request.
    #[error("{1}")]
    Rejected(StatusCode, String),

    /// The store did not answer within the mount's timeout.
    #[error("Request timed out")]
    Timeout,
}

impl RestError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            RestError::EmptyBody | RestError::InvalidBody(_) | RestError::DocumentNotFound => StatusCode::BAD_REQUEST,
            RestError::NotFound => StatusCode::NOT_FOUND,
            RestError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            RestError::UnknownCollection(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RestError::Store(DocumentStoreError::UnknownModel(_) | DocumentStoreError::Initialization(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            RestError::Store(_) => StatusCode::BAD_REQUEST,
            RestError::Rejected(status, _) => *status,
            RestError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// JSON body sent with this error.
    pub fn body(&self) -> Value {
        match self {
            RestError::EmptyBody | RestError::InvalidBody(_) | RestError::DocumentNotFound => {
                json!({ "errors": {}, "message": self.to_string() })
            }
            RestError::NotFound => json!({ "not_found": true }),
            RestError::MethodNotAllowed => json!({ "method_not_allowed": true }),
            RestError::Store(err) => json!({ "name": err.kind(), "message": err.to_string() }),
            RestError::UnknownCollection(_) | RestError::Rejected(..) | RestError::Timeout => {
                json!({ "message": self.to_string() })
            }
        }
    }
}

impl IntoResponse for RestError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "request failed");
        } else {
            warn!(status = status.as_u16(), error = %self, "request rejected");
        }

        (status, Json(self.body())).into_response()
    }
}
