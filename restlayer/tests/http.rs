use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode},
};
use serde_json::{Value, json};
use tower::ServiceExt;

use restlayer::{
    hooks::Rejection,
    memory::InMemoryStore,
    model::{CollectionDescriptor, ModelRegistry, Schema},
    query::Filter,
    request::RequestInfo,
    router,
    store::DocumentStore,
    RestOptions,
};

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Option<Value>,
}

fn registry() -> ModelRegistry {
    ModelRegistry::new()
        .with(Schema::new("Company"))
        .with(
            Schema::new("Widget")
                .reference("maker", "Company")
                .default_value("color", "grey")
                .required("name"),
        )
        .with(Schema::new("Note").soft_delete(true))
}

fn app(options: RestOptions) -> Router {
    let store = DocumentStore::new(InMemoryStore::new(), registry()).unwrap();
    router(store, options)
}

async fn call(app: &Router, method: Method, uri: &str, headers: &[(&str, &str)], body: Option<&str>) -> Reply {
    let mut request = Request::builder()
        .method(method)
        .uri(uri)
        .header("host", "example.com");
    for (name, value) in headers {
        request = request.header(*name, *value);
    }

    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();

    let body = (!bytes.is_empty()).then(|| serde_json::from_slice(&bytes).unwrap());

    Reply { status, headers, body }
}

async fn create(app: &Router, uri: &str, body: Value) -> Value {
    let reply = call(app, Method::POST, uri, &[], Some(&body.to_string())).await;
    assert_eq!(reply.status, StatusCode::CREATED, "{:?}", reply.body);
    reply.body.unwrap()
}

fn id_of(document: &Value) -> &str {
    document["_id"].as_str().unwrap()
}

#[tokio::test]
async fn post_then_get_round_trips() {
    let app = app(RestOptions::new());

    let created = create(&app, "/widgets", json!({ "name": "bolt", "size": 3 })).await;
    assert_eq!(created["color"], "grey");
    assert_eq!(id_of(&created).len(), 24);

    let reply = call(&app, Method::GET, &format!("/widgets/{}", id_of(&created)), &[], None).await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body, Some(created));
}

#[tokio::test]
async fn create_answers_201_with_location() {
    let app = app(RestOptions::new());

    let reply = call(&app, Method::POST, "/widgets?envelope=false", &[], Some(r#"{"name":"x"}"#)).await;
    let body = reply.body.unwrap();

    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(
        reply.headers["location"],
        format!("http://example.com/widgets/{}", id_of(&body)).as_str()
    );
}

#[tokio::test]
async fn location_keeps_the_mount_prefix() {
    let store = DocumentStore::new(InMemoryStore::new(), registry()).unwrap();
    let app = Router::new().nest("/api", router(store, RestOptions::new()));

    let reply = call(&app, Method::POST, "/api/widgets", &[("x-forwarded-proto", "https")], Some(r#"{"name":"x"}"#)).await;
    let body = reply.body.unwrap();

    assert_eq!(
        reply.headers["location"],
        format!("https://example.com/api/widgets/{}", id_of(&body)).as_str()
    );
}

#[tokio::test]
async fn empty_bodies_are_rejected() {
    let app = app(RestOptions::new());

    for body in ["{}", "null", "[]", ""] {
        let reply = call(&app, Method::POST, "/widgets", &[], Some(body)).await;

        assert_eq!(reply.status, StatusCode::BAD_REQUEST, "{body:?}");
        assert_eq!(reply.body, Some(json!({ "errors": {}, "message": "No Request Body" })));
    }

    let reply = call(&app, Method::POST, "/widgets", &[], Some("[1]")).await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_required_fields_are_store_errors() {
    let app = app(RestOptions::new());

    let reply = call(&app, Method::POST, "/widgets", &[], Some(r#"{"color":"red"}"#)).await;

    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body.unwrap()["name"], "ValidationError");
}

#[tokio::test]
async fn envelope_is_toggled_by_the_opposite_literal() {
    let plain = app(RestOptions::new());
    let created = create(&plain, "/widgets", json!({ "name": "bolt" })).await;
    let path = format!("/widgets/{}", id_of(&created));

    let wrapped = call(&plain, Method::GET, &format!("{path}?envelope=true"), &[], None).await;
    assert_eq!(wrapped.body, Some(json!({ "widget": created.clone() })));

    let ignored = call(&plain, Method::GET, &format!("{path}?envelope=false"), &[], None).await;
    assert_eq!(ignored.body, Some(created.clone()));

    let enveloped = app(RestOptions::new().envelope(true));
    create(&enveloped, "/widgets?envelope=false", json!({ "name": "bolt" })).await;

    let list = call(&enveloped, Method::GET, "/widgets", &[], None).await;
    assert_eq!(list.body.unwrap()["widgets"].as_array().unwrap().len(), 1);

    let bare = call(&enveloped, Method::GET, "/widgets?envelope=false", &[], None).await;
    assert!(bare.body.unwrap().is_array());

    let junk = call(&enveloped, Method::GET, "/widgets?envelope=no", &[], None).await;
    assert!(junk.body.unwrap().get("widgets").is_some());
}

#[tokio::test]
async fn unsupported_routes_answer_405() {
    let app = app(RestOptions::new());

    for (method, uri) in [
        (Method::PUT, "/widgets"),
        (Method::PATCH, "/widgets"),
        (Method::DELETE, "/widgets"),
        (Method::PUT, "/gadgets"),
        (Method::POST, "/widgets/abc"),
    ] {
        let reply = call(&app, method.clone(), uri, &[], Some(r#"{"a":1}"#)).await;

        assert_eq!(reply.status, StatusCode::METHOD_NOT_ALLOWED, "{method} {uri}");
        assert_eq!(reply.body, Some(json!({ "method_not_allowed": true })));
    }
}

#[tokio::test]
async fn unknown_collections_are_server_errors() {
    let app = app(RestOptions::new());

    let reply = call(&app, Method::GET, "/gadgets", &[], None).await;

    assert_eq!(reply.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(reply.body.unwrap()["message"].as_str().unwrap().contains("Gadget"));
}

#[tokio::test]
async fn delete_then_get_is_404() {
    let app = app(RestOptions::new());

    let missing = call(&app, Method::DELETE, "/widgets/5f0c6c0a9d3e2a1b2c3d4e5f", &[], None).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.body, Some(json!({ "not_found": true })));

    let created = create(&app, "/widgets", json!({ "name": "bolt" })).await;
    let path = format!("/widgets/{}", id_of(&created));

    let deleted = call(&app, Method::DELETE, &path, &[], None).await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);
    assert_eq!(deleted.body, None);

    let gone = call(&app, Method::GET, &path, &[], None).await;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
    assert_eq!(gone.body, None);
}

#[tokio::test]
async fn soft_deleted_documents_disappear() {
    let app = app(RestOptions::new());

    let note = create(&app, "/notes", json!({ "text": "hi" })).await;
    let path = format!("/notes/{}", id_of(&note));

    assert_eq!(call(&app, Method::DELETE, &path, &[], None).await.status, StatusCode::NO_CONTENT);
    assert_eq!(call(&app, Method::GET, &path, &[], None).await.status, StatusCode::NOT_FOUND);
    assert_eq!(call(&app, Method::DELETE, &path, &[], None).await.status, StatusCode::NOT_FOUND);

    let count = call(&app, Method::GET, "/notes/count", &[], None).await;
    assert_eq!(count.body, Some(json!({ "count": 0 })));
}

#[tokio::test]
async fn patch_is_idempotent() {
    let app = app(RestOptions::new());

    let created = create(&app, "/widgets", json!({ "name": "bolt", "size": 1 })).await;
    let path = format!("/widgets/{}", id_of(&created));
    let patch = r#"{"size": 2, "_id": "ignored"}"#;

    let first = call(&app, Method::PATCH, &path, &[], Some(patch)).await;
    let second = call(&app, Method::PATCH, &path, &[], Some(patch)).await;

    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(first.body, second.body);

    let body = first.body.unwrap();
    assert_eq!(body["size"], 2);
    assert_eq!(body["name"], "bolt");
    assert_eq!(body["_id"], created["_id"]);

    let missing = call(&app, Method::PATCH, "/widgets/5f0c6c0a9d3e2a1b2c3d4e5f", &[], Some(patch)).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.body, None);
}

#[tokio::test]
async fn put_replaces_every_field() {
    let app = app(RestOptions::new());

    let created = create(&app, "/widgets", json!({ "name": "bolt", "size": 1, "color": "red" })).await;
    let path = format!("/widgets/{}", id_of(&created));

    let replaced = call(&app, Method::PUT, &path, &[], Some(r#"{"name": "nut"}"#)).await;
    let body = replaced.body.unwrap();

    assert_eq!(replaced.status, StatusCode::OK);
    assert_eq!(body["name"], "nut");
    assert_eq!(body["color"], "grey");
    assert!(body.get("size").is_none());
    assert_eq!(body["_id"], created["_id"]);

    let missing = call(&app, Method::PUT, "/widgets/5f0c6c0a9d3e2a1b2c3d4e5f", &[], Some(r#"{"name": "nut"}"#)).await;
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
    assert_eq!(missing.body, Some(json!({ "errors": {}, "message": "Document not found" })));
}

#[tokio::test]
async fn list_filters_sorts_and_counts() {
    let app = app(RestOptions::new());

    for (name, size, color) in [("a", 1, "red"), ("b", 5, "red"), ("c", 3, "blue"), ("d", 4, "red")] {
        create(&app, "/widgets", json!({ "name": name, "size": size, "color": color })).await;
    }

    let reply = call(&app, Method::GET, "/widgets?color=red&size%3E%3D2&sort=-size&limit=1", &[], None).await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.headers["x-total-count"], "2");

    let names: Vec<_> = reply.body.unwrap().as_array().unwrap().iter().map(|w| w["name"].clone()).collect();
    assert_eq!(names, vec![json!("b")]);

    let count = call(&app, Method::GET, "/widgets/count?color=red", &[], None).await;
    assert_eq!(count.body, Some(json!({ "count": 3 })));

    let projected = call(&app, Method::GET, "/widgets?fields=name&sort=name", &[], None).await;
    let first = projected.body.unwrap()[0].clone();
    assert_eq!(first["name"], "a");
    assert!(first.get("size").is_none());

    let bad = call(&app, Method::GET, "/widgets?limit=many", &[], None).await;
    assert_eq!(bad.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn max_limit_caps_list_size() {
    let app = app(RestOptions::new().max_limit(2));

    for name in ["a", "b", "c"] {
        create(&app, "/widgets", json!({ "name": name })).await;
    }

    for uri in ["/widgets", "/widgets?limit=10", "/widgets?limit=0"] {
        let reply = call(&app, Method::GET, uri, &[], None).await;

        assert_eq!(reply.headers["x-total-count"], "3");
        assert_eq!(reply.body.unwrap().as_array().unwrap().len(), 2);
    }
}

#[tokio::test]
async fn populate_expands_references() {
    let app = app(RestOptions::new());

    let company = create(&app, "/companies", json!({ "name": "Acme" })).await;
    let widget = create(&app, "/widgets", json!({ "name": "bolt", "maker": id_of(&company) })).await;
    assert_eq!(widget["maker"], company["_id"]);

    let path = format!("/widgets/{}?populate=maker", id_of(&widget));
    let reply = call(&app, Method::GET, &path, &[], None).await;

    assert_eq!(reply.body.unwrap()["maker"], company);

    let list = call(&app, Method::GET, "/widgets?populate=maker", &[], None).await;
    assert_eq!(list.body.unwrap()[0]["maker"]["name"], "Acme");
}

#[tokio::test]
async fn lists_filter_by_reference_id() {
    let app = app(RestOptions::new());

    let acme = create(&app, "/companies", json!({ "name": "Acme" })).await;
    let other = create(&app, "/companies", json!({ "name": "Other" })).await;
    create(&app, "/widgets", json!({ "name": "bolt", "maker": id_of(&acme) })).await;
    create(&app, "/widgets", json!({ "name": "nut", "maker": id_of(&other) })).await;

    let reply = call(&app, Method::GET, &format!("/widgets?maker={}", id_of(&acme)), &[], None).await;
    assert_eq!(reply.headers["x-total-count"], "1");
    assert_eq!(reply.body.unwrap()[0]["name"], "bolt");

    let both = format!("/widgets/count?maker={},{}", id_of(&acme), id_of(&other));
    let count = call(&app, Method::GET, &both, &[], None).await;
    assert_eq!(count.body, Some(json!({ "count": 2 })));

    let excluded = call(&app, Method::GET, &format!("/widgets?maker!={}", id_of(&acme)), &[], None).await;
    assert_eq!(excluded.body.unwrap()[0]["name"], "nut");
}

#[tokio::test]
async fn zero_limit_lists_everything() {
    let app = app(RestOptions::new());

    for name in ["a", "b"] {
        create(&app, "/widgets", json!({ "name": name })).await;
    }

    let reply = call(&app, Method::GET, "/widgets?limit=0", &[], None).await;

    assert_eq!(reply.headers["x-total-count"], "2");
    assert_eq!(reply.body.unwrap().as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn validator_gates_every_route() {
    let options = RestOptions::new().validator(|request: &RequestInfo| match request.header("authorization") {
        Some("Bearer ok") => Ok(()),
        _ => Err(Rejection::new(StatusCode::UNAUTHORIZED, "token required")),
    });
    let app = app(options);

    let denied = call(&app, Method::GET, "/widgets", &[], None).await;
    assert_eq!(denied.status, StatusCode::UNAUTHORIZED);
    assert_eq!(denied.body, Some(json!({ "message": "token required" })));

    let allowed = call(&app, Method::GET, "/widgets", &[("authorization", "Bearer ok")], None).await;
    assert_eq!(allowed.status, StatusCode::OK);
}

#[tokio::test]
async fn criteria_hook_scopes_lookups() {
    let options = RestOptions::new().criteria_hook(|request: &RequestInfo, _: &CollectionDescriptor| {
        request
            .header("x-tenant")
            .map(|tenant| Filter::eq("tenant", tenant))
    });
    let app = app(options);

    create(&app, "/widgets", json!({ "name": "a", "tenant": "one" })).await;
    let other = create(&app, "/widgets", json!({ "name": "b", "tenant": "two" })).await;

    let scoped = call(&app, Method::GET, "/widgets", &[("x-tenant", "one")], None).await;
    assert_eq!(scoped.headers["x-total-count"], "1");
    assert_eq!(scoped.body.unwrap()[0]["name"], "a");

    let path = format!("/widgets/{}", id_of(&other));
    let hidden = call(&app, Method::GET, &path, &[("x-tenant", "one")], None).await;
    assert_eq!(hidden.status, StatusCode::NOT_FOUND);

    let kept = call(&app, Method::DELETE, &path, &[("x-tenant", "one")], None).await;
    assert_eq!(kept.status, StatusCode::NOT_FOUND);

    let unscoped = call(&app, Method::GET, "/widgets/count", &[], None).await;
    assert_eq!(unscoped.body, Some(json!({ "count": 2 })));
}
