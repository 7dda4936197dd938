//! Query translation from restlayer filter expressions to MongoDB query syntax.
//!
//! This module translates restlayer's abstract query expressions into
//! MongoDB BSON documents for execution by the MongoDB query engine.

use bson::{Bson, Document, doc};

use restlayer_core::{
    error::DocumentStoreError,
    query::{Expr, FieldOp, Projection, QueryVisitor, Sort, SortDirection},
};

/// Translates restlayer query expressions into MongoDB query documents.
///
/// This struct implements the [`QueryVisitor`] trait to convert abstract
/// query expressions into MongoDB's native BSON query syntax.
pub(crate) struct MongoQueryTranslator;

impl MongoQueryTranslator {
    /// Translates an optional filter, matching everything when absent.
    pub(crate) fn filter(expr: Option<&Expr>) -> Result<Document, DocumentStoreError> {
        match expr {
            Some(expr) => MongoQueryTranslator.visit_expr(expr),
            None => Ok(doc! {}),
        }
    }

    pub(crate) fn sort(sort: &[Sort]) -> Option<Document> {
        if sort.is_empty() {
            return None;
        }

        Some(
            sort.iter()
                .map(|key| {
                    let direction = match key.direction {
                        SortDirection::Asc => 1,
                        SortDirection::Desc => -1,
                    };
                    (key.field.clone(), Bson::Int32(direction))
                })
                .collect(),
        )
    }

    /// Inclusion wins over exclusion, except that `_id` may always be excluded.
    pub(crate) fn projection(projection: &Projection) -> Option<Document> {
        let mut fields = Document::new();

        if projection.include.is_empty() {
            for field in &projection.exclude {
                fields.insert(field.clone(), 0);
            }
        } else {
            for field in &projection.include {
                fields.insert(field.clone(), 1);
            }
            if projection.exclude.iter().any(|f| f == "_id") {
                fields.insert("_id", 0);
            }
        }

        (!fields.is_empty()).then_some(fields)
    }
}

impl QueryVisitor for MongoQueryTranslator {
    type Output = Document;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$and": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$or": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            "$nor": [self.visit_expr(expr)?],
        })
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            field: { "$exists": should_exist },
        })
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let list = || match value {
            Bson::Array(items) => Bson::Array(items.clone()),
            single => Bson::Array(vec![single.clone()]),
        };

        Ok(doc! {
            field: match op {
                FieldOp::Eq => doc! { "$eq": value },
                FieldOp::Ne => doc! { "$ne": value },
                FieldOp::Gt => doc! { "$gt": value },
                FieldOp::Gte => doc! { "$gte": value },
                FieldOp::Lt => doc! { "$lt": value },
                FieldOp::Lte => doc! { "$lte": value },
                FieldOp::AnyOf => doc! { "$in": list() },
                FieldOp::NoneOf => doc! { "$nin": list() },
            }
        })
    }

    fn visit_matches(&mut self, field: &str, pattern: &str, options: &str) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            field: { "$regex": pattern, "$options": options },
        })
    }
}
