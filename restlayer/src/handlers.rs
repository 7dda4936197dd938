//! Route handlers.
//!
//! Each handler resolves the collection segment to a model, runs its store
//! calls under the mount timeout and hands the result to a
//! [`ResponseContext`]. Failures are returned as [`RestError`] and rendered in
//! one place.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderName, StatusCode, header::LOCATION},
    response::Response,
};
use bson::Document;
use serde_json::{Value, json};
use std::{future::Future, sync::Arc};
use tracing::{debug, instrument};

use restlayer_core::{
    collection::Collection,
    document::json_to_document,
    id::{DocumentId, ID_FIELD, normalize_id},
    model::CollectionDescriptor,
    populate::{PopulateDirective, parse_populate},
    query::{Expr, conjoin},
    querystring::QueryParams,
    store::DocumentStore,
};

use crate::{
    config::RestOptions,
    error::{RestError, RestResult},
    pipeline::ResponseContext,
    request::RequestInfo,
};

const TOTAL_COUNT: HeaderName = HeaderName::from_static("x-total-count");

/// Path segment answered with the number of matching documents.
const COUNT_SEGMENT: &str = "count";

/// State shared by every handler of a mount.
#[derive(Debug)]
pub struct RestState {
    pub(crate) store: DocumentStore,
    pub(crate) options: RestOptions,
}

impl RestState {
    pub fn new(store: DocumentStore, options: RestOptions) -> Self {
        Self { store, options }
    }

    /// Maps a URL segment to its names and the model registered for it.
    fn resolve(&self, segment: &str) -> RestResult<(CollectionDescriptor, Collection<'_>)> {
        let descriptor = self.options.describe(segment);

        let schema = self
            .store
            .registry()
            .resolve(&descriptor)
            .map_err(|_| RestError::UnknownCollection(descriptor.class_name.clone()))?;

        Ok((descriptor, self.store.collection_for(schema)))
    }

    /// Awaits `work`, giving up with [`RestError::Timeout`] once the mount timeout elapses.
    async fn guard<T>(&self, work: impl Future<Output = RestResult<T>>) -> RestResult<T> {
        match self.options.timeout_duration() {
            Some(limit) => tokio::time::timeout(limit, work)
                .await
                .map_err(|_| RestError::Timeout)?,
            None => work.await,
        }
    }

    async fn extra_criteria(
        &self,
        request: &RequestInfo,
        descriptor: &CollectionDescriptor,
    ) -> RestResult<Option<Expr>> {
        match &self.options.criteria_hook {
            Some(hook) => Ok(hook.criteria(request, descriptor).await?),
            None => Ok(None),
        }
    }

    fn envelope(&self, params: &QueryParams) -> bool {
        self.options.envelope_for(params.get("envelope"))
    }
}

/// Populates the relations of a single document.
async fn populated(
    collection: &Collection<'_>,
    document: Document,
    directives: &[PopulateDirective],
) -> RestResult<Document> {
    let mut documents = [document];
    collection.populate(&mut documents, directives).await?;

    let [document] = documents;
    Ok(document)
}

fn directives(params: &QueryParams) -> Vec<PopulateDirective> {
    params
        .get("populate")
        .map(parse_populate)
        .unwrap_or_default()
}

/// Decodes a request body into a document.
///
/// No bytes, `null`, `""`, `[]` and `{}` count as an empty body.
fn parse_body(bytes: &[u8]) -> RestResult<Document> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(RestError::EmptyBody);
    }

    let value: Value = serde_json::from_slice(bytes).map_err(|e| RestError::InvalidBody(e.to_string()))?;

    match value {
        Value::Null => Err(RestError::EmptyBody),
        Value::String(text) if text.is_empty() => Err(RestError::EmptyBody),
        Value::Array(items) if items.is_empty() => Err(RestError::EmptyBody),
        Value::Object(fields) if fields.is_empty() => Err(RestError::EmptyBody),
        Value::Object(fields) => Ok(json_to_document(Value::Object(fields))?),
        _ => Err(RestError::InvalidBody("Request body must be a JSON object".to_string())),
    }
}

/// `GET /:collection`
#[instrument(skip(state, request))]
pub async fn list(
    State(state): State<Arc<RestState>>,
    Path(segment): Path<String>,
    request: RequestInfo,
) -> RestResult<Response> {
    let (descriptor, collection) = state.resolve(&segment)?;
    let params = QueryParams::parse(request.query())?;
    let directives = directives(&params);
    let extra = state.extra_criteria(&request, &descriptor).await?;

    let mut translated = params.translate()?;
    translated.options.limit = state.options.cap_limit(translated.options.limit);
    let query = translated.into_query(extra);

    let (total, documents) = state
        .guard(async {
            let total = collection.count(query.filter.clone()).await?;
            let mut documents = collection.find(query).await?;
            collection.populate(&mut documents, &directives).await?;
            Ok::<_, RestError>((total, documents))
        })
        .await?;

    debug!(total, returned = documents.len(), "listed documents");

    Ok(ResponseContext::new(&descriptor)
        .header(TOTAL_COUNT, total.to_string())
        .many(&documents)
        .envelope(state.envelope(&params))
        .send())
}

/// `GET /:collection/:id`, and `GET /:collection/count`.
#[instrument(skip(state, request))]
pub async fn read(
    State(state): State<Arc<RestState>>,
    Path((segment, id)): Path<(String, String)>,
    request: RequestInfo,
) -> RestResult<Response> {
    let (descriptor, collection) = state.resolve(&segment)?;
    let params = QueryParams::parse(request.query())?;
    let extra = state.extra_criteria(&request, &descriptor).await?;

    if id == COUNT_SEGMENT {
        let filter = conjoin(params.translate()?.criteria.into_filter(), extra);
        let count = state
            .guard(async { Ok::<_, RestError>(collection.count(filter).await?) })
            .await?;

        return Ok(ResponseContext::new(&descriptor)
            .raw(json!({ "count": count }))
            .send());
    }

    let id = normalize_id(&id);
    let directives = directives(&params);

    let document = state
        .guard(async {
            match collection.find_by_id(&id, extra).await? {
                Some(document) => Ok::<_, RestError>(Some(populated(&collection, document, &directives).await?)),
                None => Ok(None),
            }
        })
        .await?;

    let response = ResponseContext::new(&descriptor);

    Ok(match document {
        Some(document) => response
            .one(&document)
            .envelope(state.envelope(&params))
            .send(),
        None => response.status(StatusCode::NOT_FOUND).send(),
    })
}

/// `POST /:collection`
#[instrument(skip(state, request, body))]
pub async fn create(
    State(state): State<Arc<RestState>>,
    Path(segment): Path<String>,
    request: RequestInfo,
    body: Bytes,
) -> RestResult<Response> {
    let (descriptor, collection) = state.resolve(&segment)?;
    let params = QueryParams::parse(request.query())?;
    let body = parse_body(&body)?;
    let directives = directives(&params);

    let document = state
        .guard(async {
            let document = collection.insert(body).await?;
            populated(&collection, document, &directives).await
        })
        .await?;

    let mut response = ResponseContext::new(&descriptor).status(StatusCode::CREATED);

    if let Some(id) = document.get(ID_FIELD).and_then(DocumentId::from_bson) {
        response = response.header(LOCATION, format!("{}/{id}", request.full_url()));
    }

    Ok(response
        .one(&document)
        .envelope(state.envelope(&params))
        .send())
}

/// `PUT /:collection/:id`
#[instrument(skip(state, request, body))]
pub async fn replace(
    State(state): State<Arc<RestState>>,
    Path((segment, id)): Path<(String, String)>,
    request: RequestInfo,
    body: Bytes,
) -> RestResult<Response> {
    let (descriptor, collection) = state.resolve(&segment)?;
    let params = QueryParams::parse(request.query())?;
    let body = parse_body(&body)?;
    let extra = state.extra_criteria(&request, &descriptor).await?;
    let id = normalize_id(&id);
    let directives = directives(&params);

    let document = state
        .guard(async {
            let Some(document) = collection.replace(&id, body, extra).await? else {
                return Err(RestError::DocumentNotFound);
            };
            populated(&collection, document, &directives).await
        })
        .await?;

    Ok(ResponseContext::new(&descriptor)
        .one(&document)
        .envelope(state.envelope(&params))
        .send())
}

/// `PATCH /:collection/:id`
#[instrument(skip(state, request, body))]
pub async fn update(
    State(state): State<Arc<RestState>>,
    Path((segment, id)): Path<(String, String)>,
    request: RequestInfo,
    body: Bytes,
) -> RestResult<Response> {
    let (descriptor, collection) = state.resolve(&segment)?;
    let params = QueryParams::parse(request.query())?;
    let fields = parse_body(&body)?;
    let extra = state.extra_criteria(&request, &descriptor).await?;
    let id = normalize_id(&id);
    let directives = directives(&params);

    let document = state
        .guard(async {
            match collection.update(&id, fields, extra).await? {
                Some(document) => Ok::<_, RestError>(Some(populated(&collection, document, &directives).await?)),
                None => Ok(None),
            }
        })
        .await?;

    let response = ResponseContext::new(&descriptor);

    Ok(match document {
        Some(document) => response
            .one(&document)
            .envelope(state.envelope(&params))
            .send(),
        None => response.status(StatusCode::NOT_FOUND).send(),
    })
}

/// `DELETE /:collection/:id`
#[instrument(skip(state, request))]
pub async fn remove(
    State(state): State<Arc<RestState>>,
    Path((segment, id)): Path<(String, String)>,
    request: RequestInfo,
) -> RestResult<Response> {
    let (descriptor, collection) = state.resolve(&segment)?;
    let extra = state.extra_criteria(&request, &descriptor).await?;
    let id = normalize_id(&id);

    let deleted = state
        .guard(async { Ok::<_, RestError>(collection.delete(&id, extra).await?) })
        .await?;

    if !deleted {
        return Err(RestError::NotFound);
    }

    debug!(%id, "document deleted");

    Ok(ResponseContext::new(&descriptor)
        .status(StatusCode::NO_CONTENT)
        .send())
}

/// Answers the method/route pairs the mount does not support.
pub async fn method_not_allowed() -> RestError {
    RestError::MethodNotAllowed
}
