//! Translation of HTTP query strings into queries.
//!
//! Each `&`-separated term of the query string is either consumed by the
//! adapter itself ([`RESERVED_KEYS`]), an option (sorting, paging, field
//! selection), or a criterion on a document field:
//!
//! | term | criterion |
//! |---|---|
//! | `field=value` | equal |
//! | `field!=value` | not equal |
//! | `field>value`, `field>=value`, `field<value`, `field<=value` | comparison |
//! | `field=a,b` / `field!=a,b` | any of / none of |
//! | `field` / `!field` | exists / does not exist |
//! | `field=/pattern/i` | regular expression |
//!
//! Values are coerced to booleans, null, numbers and dates where they parse as
//! such. Quote a value (`name="10"`) to keep it a string.

use bson::{Bson, oid::ObjectId};
use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use std::sync::LazyLock;

use crate::{
    error::{DocumentStoreError, DocumentStoreResult},
    id::ID_FIELD,
    query::{Expr, Filter, Projection, Query, Sort, SortDirection},
};

/// Keys consumed by the adapter and never turned into criteria.
pub const RESERVED_KEYS: [&str; 2] = ["envelope", "populate"];

static TERM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(!?)([^><!=]+)(>=|<=|!=|=|>|<)?(.*)$").expect("valid term pattern")
});
static PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^/(.*)/([imsx]*)$").expect("valid pattern literal")
});
static INTEGER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^-?\d+$").expect("valid integer pattern"));
static DECIMAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^-?\d+(\.\d+)?([eE][-+]?\d+)?$").expect("valid decimal pattern")
});

/// Comparison written between a key and its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Operator {
    fn parse(token: &str) -> Option<Self> {
        match token {
            "=" => Some(Operator::Eq),
            "!=" => Some(Operator::Ne),
            ">" => Some(Operator::Gt),
            ">=" => Some(Operator::Gte),
            "<" => Some(Operator::Lt),
            "<=" => Some(Operator::Lte),
            _ => None,
        }
    }
}

/// One decoded term of a query string.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Term {
    negated: bool,
    key: String,
    op: Option<Operator>,
    value: String,
}

/// Decoded query string terms, in request order.
#[derive(Debug, Clone, Default)]
pub struct QueryParams {
    terms: Vec<Term>,
}

impl QueryParams {
    /// Decodes a raw query string (without the leading `?`).
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidQuery`] if a term is not valid UTF-8
    /// after percent-decoding.
    pub fn parse(raw: &str) -> DocumentStoreResult<Self> {
        let mut terms = Vec::new();

        for segment in raw.split('&').filter(|s| !s.is_empty()) {
            let decoded = urlencoding::decode(&segment.replace('+', " "))
                .map_err(|e| DocumentStoreError::InvalidQuery(e.to_string()))?
                .into_owned();

            let Some(captures) = TERM.captures(&decoded) else {
                return Err(DocumentStoreError::InvalidQuery(format!("cannot parse term `{decoded}`")));
            };

            terms.push(Term {
                negated: !captures[1].is_empty(),
                key: captures[2].trim().to_string(),
                op: captures.get(3).and_then(|m| Operator::parse(m.as_str())),
                value: captures[4].to_string(),
            });
        }

        Ok(Self { terms })
    }

    /// Value of the last `key=value` term for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.terms
            .iter()
            .rev()
            .find(|t| !t.negated && t.op == Some(Operator::Eq) && t.key == key)
            .map(|t| t.value.as_str())
    }

    /// Translates every non-reserved term into criteria and options.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidQuery`] for malformed option values
    /// or terms that combine `!` with an operator.
    pub fn translate(&self) -> DocumentStoreResult<QueryDescriptor> {
        let mut descriptor = QueryDescriptor::default();

        for term in &self.terms {
            if RESERVED_KEYS.contains(&term.key.as_str()) {
                continue;
            }

            if !term.negated && term.op == Some(Operator::Eq) && descriptor.options.apply(&term.key, &term.value)? {
                continue;
            }

            descriptor.criteria.push(criterion(term)?);
        }

        Ok(descriptor)
    }
}

/// Filter conditions taken from the query string, one entry per term.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Criteria(Vec<Expr>);

impl Criteria {
    pub fn push(&mut self, expr: Expr) {
        self.0.push(expr);
    }

    /// Combines all criteria into one filter, or `None` when there are none.
    pub fn into_filter(self) -> Option<Expr> {
        let mut exprs = self.0;
        match exprs.len() {
            0 => None,
            1 => exprs.pop(),
            _ => Some(Expr::And(exprs)),
        }
    }
}

/// Result options taken from the query string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    pub sort: Vec<Sort>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub fields: Option<Projection>,
}

impl QueryOptions {
    /// Applies `key=value` if `key` names an option. Returns whether it did.
    fn apply(&mut self, key: &str, value: &str) -> DocumentStoreResult<bool> {
        match key {
            "sort" => {
                self.sort = parse_sort(value);
            }
            "limit" => {
                // `limit=0` means no limit.
                self.limit = Some(parse_count(key, value)?).filter(|&limit| limit > 0);
            }
            "skip" | "offset" => {
                self.offset = Some(parse_count(key, value)?);
            }
            "fields" | "select" => {
                self.fields = Some(parse_projection(value));
            }
            _ => return Ok(false),
        }

        Ok(true)
    }
}

/// Criteria plus options for one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryDescriptor {
    pub criteria: Criteria,
    pub options: QueryOptions,
}

impl QueryDescriptor {
    /// Builds the store query, ANDing `extra` into the criteria.
    pub fn into_query(self, extra: Option<Expr>) -> Query {
        Query {
            filter: crate::query::conjoin(self.criteria.into_filter(), extra),
            limit: self.options.limit,
            offset: self.options.offset,
            sort: self.options.sort,
            projection: self.options.fields.filter(|p| !p.is_empty()),
        }
    }
}

fn criterion(term: &Term) -> DocumentStoreResult<Expr> {
    let field = term.key.as_str();

    let Some(op) = term.op else {
        return Ok(if term.negated { Filter::not_exists(field) } else { Filter::exists(field) });
    };

    if term.negated {
        return Err(DocumentStoreError::InvalidQuery(format!(
            "`!{field}` cannot be combined with a comparison"
        )));
    }

    let value = term.value.as_str();

    Ok(match op {
        Operator::Eq | Operator::Ne => {
            let expr = if let Some(captures) = PATTERN.captures(value) {
                Filter::matches(field, &captures[1], &captures[2])
            } else if is_list(value) {
                let values = value
                    .split(',')
                    .map(|v| coerce(field, v))
                    .collect::<Vec<_>>();
                return Ok(match op {
                    Operator::Eq => Filter::any_of(field, values),
                    _ => Filter::none_of(field, values),
                });
            } else {
                Filter::eq(field, coerce(field, value))
            };

            match (op, expr) {
                (Operator::Ne, Expr::Field { field, value, .. }) => Filter::ne(field, value),
                (Operator::Ne, expr) => expr.not(),
                (_, expr) => expr,
            }
        }
        Operator::Gt => Filter::gt(field, coerce(field, value)),
        Operator::Gte => Filter::gte(field, coerce(field, value)),
        Operator::Lt => Filter::lt(field, coerce(field, value)),
        Operator::Lte => Filter::lte(field, coerce(field, value)),
    })
}

fn is_list(value: &str) -> bool {
    value.contains(',') && !is_quoted(value)
}

fn is_quoted(value: &str) -> bool {
    value.len() >= 2
        && ((value.starts_with('"') && value.ends_with('"'))
            || (value.starts_with('\'') && value.ends_with('\'')))
}

/// Converts a raw query value into the most specific BSON value it spells.
fn coerce(field: &str, raw: &str) -> Bson {
    if is_quoted(raw) {
        return Bson::String(raw[1..raw.len() - 1].to_string());
    }

    match raw {
        "true" => return Bson::Boolean(true),
        "false" => return Bson::Boolean(false),
        "null" => return Bson::Null,
        _ => {}
    }

    if INTEGER.is_match(raw) {
        if let Ok(n) = raw.parse::<i64>() {
            return Bson::Int64(n);
        }
    }
    if DECIMAL.is_match(raw) {
        if let Ok(n) = raw.parse::<f64>() {
            return Bson::Double(n);
        }
    }

    if field == ID_FIELD || field.ends_with("._id") {
        if let Ok(oid) = ObjectId::parse_str(raw) {
            return Bson::ObjectId(oid);
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Bson::DateTime(bson::DateTime::from_chrono(dt.with_timezone(&Utc)));
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Bson::DateTime(bson::DateTime::from_chrono(midnight.and_utc()));
        }
    }

    Bson::String(raw.to_string())
}

fn parse_sort(value: &str) -> Vec<Sort> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|key| match key.strip_prefix('-') {
            Some(field) => Sort { field: field.to_string(), direction: SortDirection::Desc },
            None => Sort {
                field: key.trim_start_matches('+').to_string(),
                direction: SortDirection::Asc,
            },
        })
        .collect()
}

fn parse_count(key: &str, value: &str) -> DocumentStoreResult<usize> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|_| DocumentStoreError::InvalidQuery(format!("`{key}` must be a non-negative integer, got `{value}`")))
}

fn parse_projection(value: &str) -> Projection {
    let mut projection = Projection::default();

    for field in value
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
    {
        match field.strip_prefix('-') {
            Some(excluded) => projection.exclude.push(excluded.to_string()),
            None => projection.include.push(field.trim_start_matches('+').to_string()),
        }
    }

    projection
}
