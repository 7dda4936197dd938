//! Document identifiers.
//!
//! Path parameters arrive as strings. A string that parses as a native
//! [`ObjectId`] is treated as one; anything else is kept verbatim so the store
//! can decide whether it matches a document.

use bson::{Bson, oid::ObjectId};
use std::fmt;

/// Field under which every stored document keeps its identifier.
pub const ID_FIELD: &str = "_id";

/// Identifier of a stored document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DocumentId {
    /// A native 12-byte object id.
    Native(ObjectId),
    /// Any other identifier, stored as a plain string.
    Raw(String),
}

impl DocumentId {
    /// Generates a fresh native identifier.
    pub fn generate() -> Self {
        DocumentId::Native(ObjectId::new())
    }

    /// Reads an identifier out of a BSON value, if the value can act as one.
    pub fn from_bson(value: &Bson) -> Option<Self> {
        match value {
            Bson::ObjectId(oid) => Some(DocumentId::Native(*oid)),
            Bson::String(s) => Some(normalize_id(s)),
            Bson::Int32(n) => Some(DocumentId::Raw(n.to_string())),
            Bson::Int64(n) => Some(DocumentId::Raw(n.to_string())),
            _ => None,
        }
    }

    pub fn to_bson(&self) -> Bson {
        match self {
            DocumentId::Native(oid) => Bson::ObjectId(*oid),
            DocumentId::Raw(s) => Bson::String(s.clone()),
        }
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentId::Native(oid) => write!(f, "{}", oid.to_hex()),
            DocumentId::Raw(s) => f.write_str(s),
        }
    }
}

impl From<ObjectId> for DocumentId {
    fn from(oid: ObjectId) -> Self {
        DocumentId::Native(oid)
    }
}

impl From<DocumentId> for Bson {
    fn from(id: DocumentId) -> Self {
        id.to_bson()
    }
}

/// Converts a path parameter into a [`DocumentId`].
///
/// Never fails: strings that are not valid object ids pass through as
/// [`DocumentId::Raw`].
pub fn normalize_id(id: &str) -> DocumentId {
    match ObjectId::parse_str(id) {
        Ok(oid) => DocumentId::Native(oid),
        Err(_) => DocumentId::Raw(id.to_string()),
    }
}
