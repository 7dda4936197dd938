//! Document representation helpers.
//!
//! Documents are stored as BSON and travel over HTTP as JSON. This module
//! converts between the two and resolves dotted field paths (`owner.address`)
//! inside documents.
//!
//! Conversions are lossy in one deliberate direction: object ids and dates are
//! rendered as strings in JSON, the way clients expect to see them.

use bson::{Bson, Document};
use chrono::SecondsFormat;
use serde_json::{Map, Number, Value};

use crate::error::{DocumentStoreError, DocumentStoreResult};

/// Renders a BSON value as JSON.
///
/// Object ids become their 24-hex form and dates become RFC 3339 strings with
/// millisecond precision.
pub fn bson_to_json(value: &Bson) -> Value {
    match value {
        Bson::Null | Bson::Undefined => Value::Null,
        Bson::Boolean(b) => Value::Bool(*b),
        Bson::Int32(n) => Value::Number((*n).into()),
        Bson::Int64(n) => Value::Number((*n).into()),
        Bson::Double(n) => Number::from_f64(*n)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Bson::String(s) => Value::String(s.clone()),
        Bson::ObjectId(oid) => Value::String(oid.to_hex()),
        Bson::DateTime(dt) => Value::String(
            dt.to_chrono()
                .to_rfc3339_opts(SecondsFormat::Millis, true)
        ),
        Bson::Array(items) => Value::Array(items.iter().map(bson_to_json).collect()),
        Bson::Document(doc) => document_to_json(doc),
        other => Value::String(other.to_string()),
    }
}

/// Renders a document as a JSON object.
pub fn document_to_json(document: &Document) -> Value {
    Value::Object(
        document
            .iter()
            .map(|(k, v)| (k.clone(), bson_to_json(v)))
            .collect::<Map<_, _>>()
    )
}

/// Converts a JSON value to BSON.
///
/// Integers become `Int32` when they fit and `Int64` otherwise; every other
/// number becomes a `Double`. BSON has no unsigned 64-bit type, so integers
/// above `i64::MAX` are stored as the nearest `Double` and lose precision.
pub fn json_to_bson(value: Value) -> Bson {
    match value {
        Value::Null => Bson::Null,
        Value::Bool(b) => Bson::Boolean(b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => match i32::try_from(i) {
                Ok(small) => Bson::Int32(small),
                Err(_) => Bson::Int64(i),
            },
            None => Bson::Double(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => Bson::String(s),
        Value::Array(items) => Bson::Array(items.into_iter().map(json_to_bson).collect()),
        Value::Object(map) => Bson::Document(
            map.into_iter()
                .map(|(k, v)| (k, json_to_bson(v)))
                .collect::<Document>()
        ),
    }
}

/// Converts a JSON object to a document.
///
/// # Errors
///
/// Returns [`DocumentStoreError::InvalidDocument`] if the value is not an object.
pub fn json_to_document(value: Value) -> DocumentStoreResult<Document> {
    match json_to_bson(value) {
        Bson::Document(doc) => Ok(doc),
        other => Err(DocumentStoreError::InvalidDocument(format!(
            "expected a JSON object, got {:?}",
            other.element_type()
        ))),
    }
}

/// Looks up the value at a dotted path, descending through sub-documents only.
pub fn get_path<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = current.as_document()?.get(segment)?;
    }

    Some(current)
}

/// Collects every value at a dotted path, fanning out across arrays of sub-documents.
pub fn values_at_path<'a>(document: &'a Document, path: &str) -> Vec<&'a Bson> {
    let segments = path.split('.').collect::<Vec<_>>();
    let mut found = Vec::new();
    collect_values(document, &segments, &mut found);
    found
}

fn collect_values<'a>(document: &'a Document, segments: &[&str], found: &mut Vec<&'a Bson>) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };
    let Some(value) = document.get(*head) else {
        return;
    };

    if rest.is_empty() {
        found.push(value);
        return;
    }

    match value {
        Bson::Document(inner) => collect_values(inner, rest, found),
        Bson::Array(items) => {
            for item in items {
                if let Bson::Document(inner) = item {
                    collect_values(inner, rest, found);
                }
            }
        }
        _ => {}
    }
}

/// Applies `f` to every value at a dotted path, fanning out across arrays of sub-documents.
pub fn for_each_at_path_mut(document: &mut Document, path: &str, f: &mut dyn FnMut(&mut Bson)) {
    let segments = path.split('.').collect::<Vec<_>>();
    visit_values_mut(document, &segments, f);
}

fn visit_values_mut(document: &mut Document, segments: &[&str], f: &mut dyn FnMut(&mut Bson)) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };
    let Some(value) = document.get_mut(*head) else {
        return;
    };

    if rest.is_empty() {
        f(value);
        return;
    }

    match value {
        Bson::Document(inner) => visit_values_mut(inner, rest, f),
        Bson::Array(items) => {
            for item in items.iter_mut() {
                if let Bson::Document(inner) = item {
                    visit_values_mut(inner, rest, f);
                }
            }
        }
        _ => {}
    }
}
