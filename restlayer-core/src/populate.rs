//! Relation population directives.
//!
//! The `populate` query parameter is a comma-separated list of relation paths.
//! Each entry is split on its first dot: the head names the relation on the
//! requested model, the remainder names a relation on the populated model.
//! `->` inside the head stands for a dot, so `meta->owner` addresses the
//! nested field `meta.owner`.
//!
//! ```ignore
//! let directives = parse_populate("owner.company, parts");
//! assert_eq!(directives[0].path, "owner");
//! assert_eq!(directives[0].populate.as_deref().map(|d| d.path.as_str()), Some("company"));
//! assert_eq!(directives[1].path, "parts");
//! ```

/// Token rewritten to a dot inside a directive path.
pub const ARROW: &str = "->";

/// One relation to populate, optionally followed by a relation on the populated documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopulateDirective {
    /// Dotted field path holding the reference(s).
    pub path: String,
    /// Population applied to the documents loaded for `path`.
    pub populate: Option<Box<PopulateDirective>>,
}

impl PopulateDirective {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into(), populate: None }
    }

    pub fn with_child(mut self, child: PopulateDirective) -> Self {
        self.populate = Some(Box::new(child));
        self
    }

    /// Parses a single comma-free token.
    fn parse_token(token: &str) -> Self {
        let (head, rest) = match token.split_once('.') {
            Some((head, rest)) => (head, Some(rest)),
            None => (token, None),
        };

        let directive = PopulateDirective::new(head.trim().replace(ARROW, "."));

        match rest.map(str::trim).filter(|r| !r.is_empty()) {
            Some(rest) => directive.with_child(PopulateDirective::new(rest)),
            None => directive,
        }
    }
}

/// Parses a `populate` parameter into directives, skipping empty entries.
pub fn parse_populate(value: &str) -> Vec<PopulateDirective> {
    value
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(PopulateDirective::parse_token)
        .collect()
}
