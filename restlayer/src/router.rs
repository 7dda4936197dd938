//! Router assembly.
//!
//! ```ignore
//! let store = DocumentStore::new(InMemoryStore::builder().build().await?, registry)?;
//! let app = Router::new().nest("/api", restlayer::router(store, RestOptions::new()));
//! ```

use axum::{
    Router,
    extract::{Request, State},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use restlayer_core::store::DocumentStore;

use crate::{
    config::RestOptions,
    error::RestError,
    handlers::{RestState, create, list, method_not_allowed, read, remove, replace, update},
    request::RequestInfo,
};

/// Builds the REST routes for every model registered in `store`.
///
/// The returned router is self-contained and can be nested under any prefix.
pub fn router(store: DocumentStore, options: RestOptions) -> Router {
    let state = Arc::new(RestState::new(store, options));

    Router::new()
        .route(
            "/:collection",
            get(list)
                .post(create)
                .put(method_not_allowed)
                .patch(method_not_allowed)
                .delete(method_not_allowed),
        )
        .route(
            "/:collection/:id",
            get(read)
                .post(method_not_allowed)
                .put(replace)
                .patch(update)
                .delete(remove),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), validate_request))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Runs the mount's validator ahead of every matched route.
async fn validate_request(State(state): State<Arc<RestState>>, request: Request, next: Next) -> Response {
    if let Some(validator) = &state.options.validator {
        let info = RequestInfo::capture(request.method(), request.uri(), request.headers(), request.extensions());

        if let Err(rejection) = validator.validate(&info).await {
            return RestError::from(rejection).into_response();
        }
    }

    next.run(request).await
}
