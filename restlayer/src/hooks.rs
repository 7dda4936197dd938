//! Extension points of a mount.
//!
//! - [`RequestValidator`] gates every request before routing reaches a handler.
//! - [`CriteriaHook`] adds a filter to every lookup, e.g. to scope documents to
//!   the caller.
//!
//! Both are implemented for plain closures:
//!
//! ```ignore
//! let options = RestOptions::new()
//!     .validator(|request: &RequestInfo| match request.header("authorization") {
//!         Some(_) => Ok(()),
//!         None => Err(Rejection::new(StatusCode::UNAUTHORIZED, "token required")),
//!     })
//!     .criteria_hook(|request: &RequestInfo, _: &CollectionDescriptor| {
//!         request.header("x-tenant").map(|tenant| Filter::eq("tenant", tenant))
//!     });
//! ```

use async_trait::async_trait;
use axum::http::StatusCode;

use restlayer_core::{model::CollectionDescriptor, query::Expr};

use crate::{error::RestError, request::RequestInfo};

/// A refusal from a hook, answered with `status` and `{"message": message}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub status: StatusCode,
    pub message: String,
}

impl Rejection {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<Rejection> for RestError {
    fn from(rejection: Rejection) -> Self {
        RestError::Rejected(rejection.status, rejection.message)
    }
}

#[async_trait]
pub trait RequestValidator: Send + Sync {
    async fn validate(&self, request: &RequestInfo) -> Result<(), Rejection>;
}

#[async_trait]
impl<F> RequestValidator for F
where
    F: Fn(&RequestInfo) -> Result<(), Rejection> + Send + Sync,
{
    async fn validate(&self, request: &RequestInfo) -> Result<(), Rejection> {
        self(request)
    }
}

/// Supplies an extra filter ANDed into every lookup of a request.
#[async_trait]
pub trait CriteriaHook: Send + Sync {
    async fn criteria(
        &self,
        request: &RequestInfo,
        collection: &CollectionDescriptor,
    ) -> Result<Option<Expr>, Rejection>;
}

#[async_trait]
impl<F> CriteriaHook for F
where
    F: Fn(&RequestInfo, &CollectionDescriptor) -> Option<Expr> + Send + Sync,
{
    async fn criteria(
        &self,
        request: &RequestInfo,
        collection: &CollectionDescriptor,
    ) -> Result<Option<Expr>, Rejection> {
        Ok(self(request, collection))
    }
}
