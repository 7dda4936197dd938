//! Response assembly.
//!
//! Handlers fill a [`ResponseContext`] with a status, headers and an optional
//! payload, then call [`ResponseContext::send`]. Enveloping happens in between
//! and keys the payload by the collection's singular name for one document and
//! by its plural name for a list.

use axum::{
    Json,
    body::Body,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use bson::Document;
use serde_json::{Map, Value};
use tracing::warn;

use restlayer_core::{document::document_to_json, model::CollectionDescriptor};

/// Payload waiting to be sent.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    One(Value),
    Many(Vec<Value>),
    /// A value sent as-is, never enveloped.
    Raw(Value),
}

impl Payload {
    fn into_value(self) -> Value {
        match self {
            Payload::One(value) | Payload::Raw(value) => value,
            Payload::Many(values) => Value::Array(values),
        }
    }
}

/// Per-request response state.
#[derive(Debug)]
pub struct ResponseContext<'a> {
    descriptor: &'a CollectionDescriptor,
    status: StatusCode,
    headers: HeaderMap,
    payload: Option<Payload>,
    envelope: bool,
}

impl<'a> ResponseContext<'a> {
    pub fn new(descriptor: &'a CollectionDescriptor) -> Self {
        Self {
            descriptor,
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            payload: None,
            envelope: false,
        }
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    /// Adds a header. Values that are not valid header text are dropped.
    pub fn header(mut self, name: HeaderName, value: impl AsRef<str>) -> Self {
        match HeaderValue::from_str(value.as_ref()) {
            Ok(value) => {
                self.headers.insert(name, value);
            }
            Err(err) => warn!(header = %name, error = %err, "dropping invalid header value"),
        }
        self
    }

    pub fn one(mut self, document: &Document) -> Self {
        self.payload = Some(Payload::One(document_to_json(document)));
        self
    }

    pub fn many(mut self, documents: &[Document]) -> Self {
        self.payload = Some(Payload::Many(documents.iter().map(document_to_json).collect()));
        self
    }

    pub fn raw(mut self, value: Value) -> Self {
        self.payload = Some(Payload::Raw(value));
        self
    }

    pub fn envelope(mut self, enabled: bool) -> Self {
        self.envelope = enabled;
        self
    }

    fn body(self) -> Option<Value> {
        let payload = self.payload?;

        let key = match (&payload, self.envelope) {
            (Payload::One(_), true) => &self.descriptor.singular,
            (Payload::Many(_), true) => &self.descriptor.plural,
            _ => return Some(payload.into_value()),
        };

        let mut wrapped = Map::new();
        wrapped.insert(key.clone(), payload.into_value());
        Some(Value::Object(wrapped))
    }

    pub fn send(mut self) -> Response {
        let status = self.status;
        let headers = std::mem::take(&mut self.headers);

        match self.body() {
            Some(body) => (status, headers, Json(body)).into_response(),
            None => (status, headers, Body::empty()).into_response(),
        }
    }
}
