//! Filter evaluation against stored documents.
//!
//! A comparison against an array field matches when any element matches, and
//! a missing field equals `null`.

use bson::{Bson, Document, datetime::DateTime, oid::ObjectId};
use regex::{Regex, RegexBuilder};
use std::{cmp::Ordering, collections::HashMap};

use restlayer_core::{
    document::get_path,
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, FieldOp, QueryVisitor},
};

/// Borrowed view of a BSON value with every number widened to `f64`.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    ObjectId(ObjectId),
    String(&'a str),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
}

impl Comparable<'_> {
    /// Position of the value's type in the cross-type sort order.
    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 0,
            Comparable::Number(_) => 1,
            Comparable::String(_) => 2,
            Comparable::Map(_) => 3,
            Comparable::Array(_) => 4,
            Comparable::ObjectId(_) => 5,
            Comparable::Bool(_) => 6,
            Comparable::DateTime(_) => 7,
        }
    }

    /// Total order used for sorting: by type first, then by value.
    pub(crate) fn sort_cmp(&self, other: &Self) -> Ordering {
        self.rank()
            .cmp(&other.rank())
            .then_with(|| self.partial_cmp(other).unwrap_or(Ordering::Equal))
    }
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Bson::Document(doc) => Comparable::Map(
                doc
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<HashMap<_, _>>()
            ),
            _ => Comparable::Null, // Other types are not comparable
        }
    }
}

impl PartialEq for Comparable<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialOrd for Comparable<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => Some(Ordering::Equal),
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Compiles a pattern with flag letters (`i`, `m`, `s`, `x`).
pub(crate) fn compile_pattern(pattern: &str, options: &str) -> DocumentStoreResult<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(options.contains('i'))
        .multi_line(options.contains('m'))
        .dot_matches_new_line(options.contains('s'))
        .ignore_whitespace(options.contains('x'))
        .build()
        .map_err(|e| DocumentStoreError::InvalidQuery(format!("invalid pattern `{pattern}`: {e}")))
}

pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> DocumentStoreResult<bool> {
        self.visit_expr(expr)
    }

    pub fn filter_documents(
        documents: impl IntoIterator<Item = &'a Document>,
        expr: &Expr,
    ) -> DocumentStoreResult<Vec<&'a Document>> {
        let mut matched = Vec::new();

        for document in documents {
            if DocumentEvaluator::new(document).evaluate(expr)? {
                matched.push(document);
            }
        }

        Ok(matched)
    }

    /// Equality with array fan-out; a missing field equals `null`.
    fn equals(field_value: Option<&Bson>, value: &Bson) -> bool {
        let expected = Comparable::from(value);

        match field_value.map(Comparable::from) {
            None => expected == Comparable::Null,
            Some(Comparable::Array(items)) => {
                items.iter().any(|item| item == &expected) || Comparable::Array(items) == expected
            }
            Some(actual) => actual == expected,
        }
    }

    fn any_of(field_value: Option<&Bson>, values: &Bson) -> bool {
        match values {
            Bson::Array(candidates) => candidates
                .iter()
                .any(|candidate| Self::equals(field_value, candidate)),
            single => Self::equals(field_value, single),
        }
    }

    fn compare(field_value: &Bson, op: &FieldOp, value: &Bson) -> bool {
        let expected = Comparable::from(value);

        let test = |actual: &Comparable<'_>| match actual.partial_cmp(&expected) {
            Some(ordering) => match op {
                FieldOp::Gt => ordering == Ordering::Greater,
                FieldOp::Gte => ordering != Ordering::Less,
                FieldOp::Lt => ordering == Ordering::Less,
                FieldOp::Lte => ordering != Ordering::Greater,
                _ => false,
            },
            None => false,
        };

        match Comparable::from(field_value) {
            Comparable::Array(items) => items.iter().any(test),
            actual => test(&actual),
        }
    }
}

impl QueryVisitor for DocumentEvaluator<'_> {
    type Output = bool;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if self.visit_expr(expr)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(!self.visit_expr(expr)?)
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(get_path(self.document, field).is_some() == should_exist)
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let field_value = get_path(self.document, field);

        Ok(match op {
            FieldOp::Eq => Self::equals(field_value, value),
            FieldOp::Ne => !Self::equals(field_value, value),
            FieldOp::AnyOf => Self::any_of(field_value, value),
            FieldOp::NoneOf => !Self::any_of(field_value, value),
            FieldOp::Gt | FieldOp::Gte | FieldOp::Lt | FieldOp::Lte => match field_value {
                Some(field_value) => Self::compare(field_value, op, value),
                None => false,
            },
        })
    }

    fn visit_matches(&mut self, field: &str, pattern: &str, options: &str) -> Result<Self::Output, Self::Error> {
        let regex = compile_pattern(pattern, options)?;

        Ok(match get_path(self.document, field) {
            Some(Bson::String(s)) => regex.is_match(s),
            Some(Bson::Array(items)) => items
                .iter()
                .any(|item| matches!(item, Bson::String(s) if regex.is_match(s))),
            _ => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use restlayer_core::query::Filter;

    fn eval(document: &Document, expr: Expr) -> bool {
        DocumentEvaluator::new(document)
            .evaluate(&expr)
            .unwrap()
    }

    #[test]
    fn numbers_compare_across_widths() {
        let document = doc! { "qty": 5_i32 };

        assert!(eval(&document, Filter::eq("qty", 5_i64)));
        assert!(eval(&document, Filter::gt("qty", 4.5)));
        assert!(!eval(&document, Filter::lt("qty", 5_i64)));
        assert!(eval(&document, Filter::lte("qty", 5_i64)));
    }

    #[test]
    fn not_equal_matches_missing_fields() {
        let document = doc! { "name": "bolt" };

        assert!(eval(&document, Filter::ne("deleted", true)));
        assert!(!eval(&doc! { "deleted": true }, Filter::ne("deleted", true)));
        assert!(eval(&document, Filter::eq("deleted", Bson::Null)));
    }

    #[test]
    fn arrays_match_on_any_element() {
        let document = doc! { "tags": ["red", "blue"] };

        assert!(eval(&document, Filter::eq("tags", "blue")));
        assert!(eval(&document, Filter::any_of("tags", vec!["green", "red"])));
        assert!(eval(&document, Filter::none_of("tags", vec!["green"])));
        assert!(!eval(&document, Filter::none_of("tags", vec!["red"])));
    }

    #[test]
    fn object_ids_and_dotted_paths() {
        let oid = ObjectId::new();
        let document = doc! { "_id": oid, "meta": { "owner": "ann" } };

        assert!(eval(&document, Filter::eq("_id", oid)));
        assert!(!eval(&document, Filter::eq("_id", oid.to_hex())));
        assert!(eval(&document, Filter::eq("meta.owner", "ann")));
        assert!(eval(&document, Filter::exists("meta.owner")));
        assert!(eval(&document, Filter::not_exists("meta.group")));
    }

    #[test]
    fn patterns_honor_flags() {
        let document = doc! { "name": "Hex Bolt" };

        assert!(eval(&document, Filter::matches("name", "^hex", "i")));
        assert!(!eval(&document, Filter::matches("name", "^hex", "")));
        assert!(DocumentEvaluator::new(&document).evaluate(&Filter::matches("name", "(", "")).is_err());
    }

    #[test]
    fn sort_order_ranks_types_first() {
        let null = Bson::Null;
        let number = Bson::Int32(10);
        let text = Bson::String("a".into());

        assert_eq!(Comparable::from(&null).sort_cmp(&Comparable::from(&number)), Ordering::Less);
        assert_eq!(Comparable::from(&text).sort_cmp(&Comparable::from(&number)), Ordering::Greater);
    }
}
