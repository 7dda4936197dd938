//! Backend-neutral queries.
//!
//! A [`Query`] carries an optional filter tree ([`Expr`]), sort keys, a
//! window (`offset`/`limit`) and a [`Projection`]. Backends never see query
//! strings; they walk the filter with a [`QueryVisitor`] and either evaluate it
//! or translate it to their native form.
//!
//! ```ignore
//! use restlayer::query::{Filter, Query, SortDirection};
//!
//! let query = Query::builder()
//!     .filter(Filter::gte("size", 3).and(Filter::any_of("color", vec!["red", "blue"])))
//!     .sort("size", SortDirection::Desc)
//!     .limit(10)
//!     .build();
//! ```

use bson::Bson;

use crate::error::DocumentStoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// One sort key. Dotted paths address nested fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

/// Field selection applied to returned documents.
///
/// When both lists are given, inclusion wins. `_id` stays unless it is listed
/// in `exclude`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl Projection {
    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }
}

/// Comparison applied by [`Expr::Field`].
///
/// Comparisons against an array field succeed when any element satisfies
/// them, except `Ne` and `NoneOf` which require that no element matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    /// Value is a list; matches when the field equals one of its entries.
    AnyOf,
    /// Value is a list; matches when the field equals none of its entries.
    NoneOf,
}

/// Filter tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
    /// `Exists(field, true)` requires the field, `Exists(field, false)` forbids it.
    Exists(String, bool),
    Field {
        field: String,
        op: FieldOp,
        value: Bson,
    },
    /// Regular expression test on a string field.
    Matches {
        field: String,
        pattern: String,
        /// Flag letters out of `i`, `m`, `s` and `x`.
        options: String,
    },
}

impl Expr {
    pub fn field(field: String, op: FieldOp, value: Bson) -> Self {
        Expr::Field { field, op, value }
    }

    /// The single field this expression tests, if it is a leaf.
    pub fn field_name(&self) -> Option<&str> {
        match self {
            Expr::Exists(field, _) | Expr::Field { field, .. } | Expr::Matches { field, .. } => Some(field),
            Expr::And(_) | Expr::Or(_) | Expr::Not(_) => None,
        }
    }

    /// ANDs `other` onto this expression, extending an existing `And` in place.
    pub fn and(self, other: Expr) -> Self {
        match self {
            Expr::And(mut all) => {
                all.push(other);
                Expr::And(all)
            }
            leaf => Expr::And(vec![leaf, other]),
        }
    }

    /// ORs `other` onto this expression, extending an existing `Or` in place.
    pub fn or(self, other: Expr) -> Self {
        match self {
            Expr::Or(mut any) => {
                any.push(other);
                Expr::Or(any)
            }
            leaf => Expr::Or(vec![leaf, other]),
        }
    }

    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }
}

/// ANDs two optional filters together.
pub fn conjoin(left: Option<Expr>, right: Option<Expr>) -> Option<Expr> {
    match (left, right) {
        (Some(left), Some(right)) => Some(left.and(right)),
        (left, None) => left,
        (None, right) => right,
    }
}

#[derive(Debug, Clone, Default)]
pub struct Query {
    pub filter: Option<Expr>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    /// Most significant key first.
    pub sort: Vec<Sort>,
    pub projection: Option<Projection>,
}

impl Query {
    /// An unfiltered, unbounded query.
    pub fn new() -> Self {
        Query::default()
    }

    pub fn builder() -> QueryBuilder {
        QueryBuilder::default()
    }
}

/// Shorthand constructors for [`Expr`] leaves.
pub struct Filter;

macro_rules! comparisons {
    ($($name:ident => $op:ident),* $(,)?) => {
        $(
            pub fn $name(field: impl Into<String>, value: impl Into<Bson>) -> Expr {
                Expr::field(field.into(), FieldOp::$op, value.into())
            }
        )*
    };
}

impl Filter {
    comparisons! {
        eq => Eq,
        ne => Ne,
        gt => Gt,
        gte => Gte,
        lt => Lt,
        lte => Lte,
        any_of => AnyOf,
        none_of => NoneOf,
    }

    pub fn exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), true)
    }

    pub fn not_exists(field: impl Into<String>) -> Expr {
        Expr::Exists(field.into(), false)
    }

    pub fn matches(field: impl Into<String>, pattern: impl Into<String>, options: impl Into<String>) -> Expr {
        Expr::Matches {
            field: field.into(),
            pattern: pattern.into(),
            options: options.into(),
        }
    }

    pub fn and(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::And(Vec::from_iter(exprs))
    }

    pub fn or(exprs: impl IntoIterator<Item = Expr>) -> Expr {
        Expr::Or(Vec::from_iter(exprs))
    }
}

/// Fluent construction of a [`Query`].
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Expr) -> Self {
        self.query.filter = Some(filter);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.query.offset = Some(offset);
        self
    }

    /// Appends a sort key after the ones already set.
    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.query.sort.push(Sort {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn projection(mut self, projection: Projection) -> Self {
        self.query.projection = Some(projection);
        self
    }

    pub fn build(self) -> Query {
        self.query
    }
}

/// Walks a filter tree.
///
/// Backends implement one method per node kind; [`QueryVisitor::visit_expr`]
/// dispatches on the node.
pub trait QueryVisitor {
    type Output;
    type Error: Into<DocumentStoreError>;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error>;

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error>;

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error>;

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error>;

    fn visit_matches(&mut self, field: &str, pattern: &str, options: &str) -> Result<Self::Output, Self::Error>;

    fn visit_expr(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        match expr {
            Expr::And(all) => self.visit_and(all),
            Expr::Or(any) => self.visit_or(any),
            Expr::Not(inner) => self.visit_not(inner),
            Expr::Exists(field, should_exist) => self.visit_exists(field, *should_exist),
            Expr::Field { field, op, value } => self.visit_field(field, op, value),
            Expr::Matches { field, pattern, options } => self.visit_matches(field, pattern, options),
        }
    }
}
