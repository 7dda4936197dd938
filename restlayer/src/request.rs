//! Per-request information shared with hooks and handlers.

use axum::{
    async_trait,
    extract::{FromRequestParts, OriginalUri},
    http::{Extensions, HeaderMap, Method, Uri, header::HOST, request::Parts},
};
use std::convert::Infallible;

/// Header set by proxies to the scheme the client used.
const FORWARDED_PROTO: &str = "x-forwarded-proto";

/// What hooks get to see of an incoming request.
///
/// The URI is the one the client sent, before any router nesting stripped a
/// prefix from it.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
}

impl RequestInfo {
    pub(crate) fn capture(method: &Method, uri: &Uri, headers: &HeaderMap, extensions: &Extensions) -> Self {
        let uri = extensions
            .get::<OriginalUri>()
            .map(|original| original.0.clone())
            .unwrap_or_else(|| uri.clone());

        Self {
            method: method.clone(),
            uri,
            headers: headers.clone(),
        }
    }

    /// Raw query string, without the leading `?`.
    pub fn query(&self) -> &str {
        self.uri.query().unwrap_or_default()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .and_then(|value| value.to_str().ok())
    }

    /// Absolute URL of the request path, without the query string.
    pub fn full_url(&self) -> String {
        let scheme = self
            .header(FORWARDED_PROTO)
            .or_else(|| self.uri.scheme_str())
            .unwrap_or("http");

        let host = self
            .header(HOST.as_str())
            .or_else(|| self.uri.authority().map(|a| a.as_str()))
            .unwrap_or("localhost");

        format!("{scheme}://{host}{}", self.uri.path())
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestInfo
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::capture(&parts.method, &parts.uri, &parts.headers, &parts.extensions))
    }
}
