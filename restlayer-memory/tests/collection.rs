use bson::{Bson, doc, oid::ObjectId};

use restlayer_core::{
    backend::DynStoreBackend,
    error::DocumentStoreError,
    id::{DocumentId, normalize_id},
    model::{ModelRegistry, Schema},
    populate::parse_populate,
    query::{Filter, Query},
    store::DocumentStore,
};
use restlayer_memory::InMemoryStore;

fn store() -> DocumentStore {
    let registry = ModelRegistry::new()
        .with(Schema::new("Country"))
        .with(Schema::new("Company").reference("country", "Country"))
        .with(
            Schema::new("Widget")
                .reference("maker", "Company")
                .reference("parts", "Part")
                .default_value("color", "grey")
                .required("name"),
        )
        .with(Schema::new("Part").soft_delete(true));

    DocumentStore::new(InMemoryStore::new(), registry).unwrap()
}

#[tokio::test]
async fn insert_applies_defaults_and_assigns_ids() {
    let store = store();
    let widgets = store.collection("Widget").unwrap();

    let created = widgets.insert(doc! { "name": "bolt" }).await.unwrap();

    assert!(matches!(created.get("_id"), Some(Bson::ObjectId(_))));
    assert_eq!(created.get_str("color").unwrap(), "grey");
    assert_eq!(created.keys().next().map(String::as_str), Some("_id"));

    let err = widgets.insert(doc! { "color": "red" }).await.unwrap_err();
    assert!(matches!(err, DocumentStoreError::InvalidDocument(_)));
}

#[tokio::test]
async fn body_ids_are_normalized() {
    let store = store();
    let widgets = store.collection("Widget").unwrap();
    let oid = ObjectId::new();

    let native = widgets.insert(doc! { "_id": oid.to_hex(), "name": "a" }).await.unwrap();
    assert_eq!(native.get("_id"), Some(&Bson::ObjectId(oid)));

    let raw = widgets.insert(doc! { "_id": "custom", "name": "b" }).await.unwrap();
    assert_eq!(raw.get("_id"), Some(&Bson::String("custom".into())));

    assert!(widgets.find_by_id(&normalize_id("custom"), None).await.unwrap().is_some());
}

#[tokio::test]
async fn populate_replaces_refs_and_recurses() {
    let store = store();

    let country = store
        .collection("Country")
        .unwrap()
        .insert(doc! { "name": "NZ" })
        .await
        .unwrap();
    let company = store
        .collection("Company")
        .unwrap()
        .insert(doc! { "name": "Acme", "country": country.get("_id").unwrap().clone() })
        .await
        .unwrap();

    let widgets = store.collection("Widget").unwrap();
    let maker_hex = company.get_object_id("_id").unwrap().to_hex();
    widgets.insert(doc! { "name": "bolt", "maker": maker_hex }).await.unwrap();
    widgets.insert(doc! { "name": "orphan", "maker": ObjectId::new() }).await.unwrap();

    let mut found = widgets.find(Query::new()).await.unwrap();
    widgets
        .populate(&mut found, &parse_populate("maker.country"))
        .await
        .unwrap();

    let maker = found[0].get_document("maker").unwrap();
    assert_eq!(maker.get_str("name").unwrap(), "Acme");
    assert_eq!(maker.get_document("country").unwrap().get_str("name").unwrap(), "NZ");
    assert_eq!(found[1].get("maker"), Some(&Bson::Null));
}

#[tokio::test]
async fn populate_arrays_drop_missing_entries() {
    let store = store();
    let parts = store.collection("Part").unwrap();

    let kept = parts.insert(doc! { "name": "head" }).await.unwrap();
    let gone = parts.insert(doc! { "name": "shank" }).await.unwrap();
    let gone_id = DocumentId::from_bson(gone.get("_id").unwrap()).unwrap();
    assert!(parts.delete(&gone_id, None).await.unwrap());

    let widgets = store.collection("Widget").unwrap();
    widgets
        .insert(doc! {
            "name": "bolt",
            "parts": [kept.get("_id").unwrap().clone(), gone.get("_id").unwrap().clone(), ObjectId::new()],
        })
        .await
        .unwrap();

    let mut found = widgets.find(Query::new()).await.unwrap();
    widgets.populate(&mut found, &parse_populate("parts, unknown")).await.unwrap();

    let populated = found[0].get_array("parts").unwrap();
    assert_eq!(populated.len(), 1);
    assert_eq!(populated[0].as_document().unwrap().get_str("name").unwrap(), "head");
}

#[tokio::test]
async fn soft_deleted_documents_disappear_from_lookups() {
    let store = store();
    let parts = store.collection("Part").unwrap();

    let part = parts.insert(doc! { "name": "head" }).await.unwrap();
    let id = DocumentId::from_bson(part.get("_id").unwrap()).unwrap();

    assert!(parts.delete(&id, None).await.unwrap());
    assert!(parts.find_by_id(&id, None).await.unwrap().is_none());
    assert_eq!(parts.count(None).await.unwrap(), 0);
    assert!(!parts.delete(&id, None).await.unwrap());
    assert!(parts.update(&id, doc! { "name": "x" }, None).await.unwrap().is_none());

    let flagged = store
        .backend()
        .get_documents(vec![id], "parts")
        .await
        .unwrap();
    assert!(flagged[0].get_bool("deleted").unwrap());
    assert!(flagged[0].get_datetime("deleted_at").is_ok());
}

#[tokio::test]
async fn update_is_idempotent_and_respects_extra_filter() {
    let store = store();
    let widgets = store.collection("Widget").unwrap();

    let created = widgets.insert(doc! { "name": "bolt", "owner": "ann" }).await.unwrap();
    let id = DocumentId::from_bson(created.get("_id").unwrap()).unwrap();

    let first = widgets.update(&id, doc! { "color": "red" }, None).await.unwrap();
    let second = widgets.update(&id, doc! { "color": "red" }, None).await.unwrap();
    assert_eq!(first, second);

    let foreign = widgets
        .update(&id, doc! { "color": "blue" }, Some(Filter::eq("owner", "bob")))
        .await
        .unwrap();
    assert!(foreign.is_none());
}

#[tokio::test]
async fn replace_drops_unlisted_fields() {
    let store = store();
    let widgets = store.collection("Widget").unwrap();

    let created = widgets.insert(doc! { "name": "bolt", "size": 4 }).await.unwrap();
    let id = DocumentId::from_bson(created.get("_id").unwrap()).unwrap();

    let replaced = widgets
        .replace(&id, doc! { "_id": "ignored", "name": "nut" }, None)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(replaced.get("_id"), created.get("_id"));
    assert!(!replaced.contains_key("size"));
    assert_eq!(replaced.get_str("color").unwrap(), "grey");

    assert!(
        widgets
            .replace(&DocumentId::generate(), doc! { "name": "x" }, None)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn reference_filters_accept_id_strings() {
    let store = store();
    let company = store
        .collection("Company")
        .unwrap()
        .insert(doc! { "name": "Acme" })
        .await
        .unwrap();
    let maker = company.get_object_id("_id").unwrap();

    let widgets = store.collection("Widget").unwrap();
    widgets.insert(doc! { "name": "bolt", "maker": maker.to_hex() }).await.unwrap();
    widgets.insert(doc! { "name": "nut", "maker": ObjectId::new() }).await.unwrap();

    let by_maker = Query { filter: Some(Filter::eq("maker", maker.to_hex())), ..Query::default() };
    let found = widgets.find(by_maker).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].get_str("name").unwrap(), "bolt");

    let others = Filter::none_of("maker", vec![Bson::String(maker.to_hex())]);
    assert_eq!(widgets.count(Some(others)).await.unwrap(), 1);

    let unrelated = Filter::eq("name", maker.to_hex());
    assert_eq!(widgets.count(Some(unrelated)).await.unwrap(), 0);
}

#[tokio::test]
async fn shutdown_releases_the_backend() {
    let store = store();
    store.collection("Widget").unwrap().insert(doc! { "name": "bolt" }).await.unwrap();

    store.shutdown().await.unwrap();
}
