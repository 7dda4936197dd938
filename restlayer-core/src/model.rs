//! Model schemas, the model registry and collection name resolution.
//!
//! A URL segment such as `order_items` is turned into a [`CollectionDescriptor`]
//! (`order_items`, `order_item`, `OrderItem`), and the class name is looked up
//! in a [`ModelRegistry`] built once at startup.
//!
//! # Example
//!
//! ```ignore
//! use restlayer::model::{ModelRegistry, Schema, CollectionDescriptor};
//!
//! let registry = ModelRegistry::new()
//!     .with(Schema::new("Company"))
//!     .with(Schema::new("Widget").reference("maker", "Company").required("name"));
//!
//! registry.validate()?;
//!
//! let descriptor = CollectionDescriptor::from_segment("widgets");
//! let schema = registry.resolve(&descriptor)?;
//! assert_eq!(schema.collection_name(), "widgets");
//! ```

use bson::{Bson, Document};
use inflector::{
    cases::snakecase::to_snake_case,
    string::{pluralize::to_plural, singularize::to_singular},
};
use std::collections::{BTreeMap, HashMap};

use crate::{
    document::get_path,
    error::{DocumentStoreError, DocumentStoreResult},
    query::{Expr, Filter},
};

/// Field set to `true` on soft-deleted documents.
pub const DELETED_FIELD: &str = "deleted";
/// Field holding the soft-deletion timestamp.
pub const DELETED_AT_FIELD: &str = "deleted_at";

/// Description of one model: where its documents live and how they relate to other models.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    name: String,
    collection: String,
    refs: BTreeMap<String, String>,
    defaults: Vec<(String, Bson)>,
    required: Vec<String>,
    soft_delete: bool,
}

impl Schema {
    /// Creates a schema for the model `name` (a class name such as `OrderItem`).
    ///
    /// The storage collection defaults to the snake-cased plural of the name
    /// (`order_items`).
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let collection = to_plural(&to_snake_case(&name));

        Self {
            name,
            collection,
            refs: BTreeMap::new(),
            defaults: Vec::new(),
            required: Vec::new(),
            soft_delete: false,
        }
    }

    /// Overrides the storage collection name.
    pub fn collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    /// Declares that the field at `path` holds id(s) of documents of `model`.
    pub fn reference(mut self, path: impl Into<String>, model: impl Into<String>) -> Self {
        self.refs.insert(path.into(), model.into());
        self
    }

    /// Value stored in `field` when a new document does not provide it.
    pub fn default_value(mut self, field: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.defaults.push((field.into(), value.into()));
        self
    }

    /// Marks `field` as required on insert and replace.
    pub fn required(mut self, field: impl Into<String>) -> Self {
        self.required.push(field.into());
        self
    }

    /// Deleting a document flags it instead of removing it.
    pub fn soft_delete(mut self, enabled: bool) -> Self {
        self.soft_delete = enabled;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn collection_name(&self) -> &str {
        &self.collection
    }

    pub fn is_soft_delete(&self) -> bool {
        self.soft_delete
    }

    /// Model referenced by the field at `path`, if any.
    pub fn ref_target(&self, path: &str) -> Option<&str> {
        self.refs.get(path).map(String::as_str)
    }

    pub fn refs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.refs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Fills in declared defaults for fields the document does not set.
    pub fn apply_defaults(&self, document: &mut Document) {
        for (field, value) in &self.defaults {
            if !document.contains_key(field) {
                document.insert(field.clone(), value.clone());
            }
        }
    }

    /// Checks required fields.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::InvalidDocument`] naming every missing field.
    pub fn validate(&self, document: &Document) -> DocumentStoreResult<()> {
        let missing = self
            .required
            .iter()
            .filter(|field| matches!(get_path(document, field), None | Some(Bson::Null)))
            .map(String::as_str)
            .collect::<Vec<_>>();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(DocumentStoreError::InvalidDocument(format!(
                "{} validation failed: missing required field(s) {}",
                self.name,
                missing.join(", ")
            )))
        }
    }

    /// Filter excluding soft-deleted documents, for models that soft delete.
    pub fn live_filter(&self) -> Option<Expr> {
        self.soft_delete.then(|| Filter::ne(DELETED_FIELD, true))
    }
}

/// Types that describe their own schema.
///
/// ```ignore
/// struct Widget;
///
/// impl Model for Widget {
///     fn schema() -> Schema {
///         Schema::new("Widget").required("name")
///     }
/// }
///
/// let registry = ModelRegistry::new().with_model::<Widget>();
/// ```
pub trait Model {
    fn schema() -> Schema;
}

/// Names derived from a collection URL segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionDescriptor {
    /// The segment as requested, e.g. `order_items`.
    pub plural: String,
    /// Singular form, e.g. `order_item`.
    pub singular: String,
    /// Model class name, e.g. `OrderItem`.
    pub class_name: String,
}

impl CollectionDescriptor {
    /// Derives the descriptor using the default English singularization.
    pub fn from_segment(segment: &str) -> Self {
        Self::with_singularizer(segment, &to_singular)
    }

    pub fn with_singularizer(segment: &str, singularize: &dyn Fn(&str) -> String) -> Self {
        let singular = singularize(segment);
        let class_name = class_name(&singular);

        Self {
            plural: segment.to_string(),
            singular,
            class_name,
        }
    }
}

/// Capitalizes each `_`-separated word and joins them: `order_item` → `OrderItem`.
pub fn class_name(singular: &str) -> String {
    singular
        .split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// Registered schemas, keyed by model class name.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: HashMap<String, Schema>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a schema, replacing any previous schema with the same name.
    pub fn register(&mut self, schema: Schema) -> &mut Self {
        self.models.insert(schema.name().to_string(), schema);
        self
    }

    pub fn with(mut self, schema: Schema) -> Self {
        self.register(schema);
        self
    }

    pub fn with_model<M: Model>(self) -> Self {
        self.with(M::schema())
    }

    pub fn get(&self, name: &str) -> Option<&Schema> {
        self.models.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Looks up the schema for a collection descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::UnknownModel`] when no model carries the
    /// descriptor's class name.
    pub fn resolve(&self, descriptor: &CollectionDescriptor) -> DocumentStoreResult<&Schema> {
        self.get(&descriptor.class_name)
            .ok_or_else(|| DocumentStoreError::UnknownModel(descriptor.class_name.clone()))
    }

    /// Checks that every reference points at a registered model.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::UnknownModel`] for the first dangling reference.
    pub fn validate(&self) -> DocumentStoreResult<()> {
        for schema in self.models.values() {
            for (path, target) in schema.refs() {
                if !self.models.contains_key(target) {
                    return Err(DocumentStoreError::UnknownModel(format!(
                        "{target} (referenced by {}.{path})",
                        schema.name()
                    )));
                }
            }
        }

        Ok(())
    }
}
