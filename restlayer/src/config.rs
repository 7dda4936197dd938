//! Mount options and model configuration files.

use serde::Deserialize;
use serde_json::{Map, Value};
use std::{collections::BTreeMap, fmt, sync::Arc, time::Duration};

use restlayer_core::{
    document::json_to_bson,
    error::DocumentStoreResult,
    model::{CollectionDescriptor, ModelRegistry, Schema},
};

use crate::hooks::{CriteriaHook, RequestValidator};

/// Turns a plural collection segment into its singular form.
pub type Singularizer = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Options of one REST mount.
///
/// The plain fields deserialize from configuration; hooks are attached with
/// the builder methods.
///
/// ```ignore
/// let options = RestOptions::new()
///     .envelope(true)
///     .max_limit(100)
///     .timeout(Duration::from_secs(5));
/// ```
#[derive(Clone, Default, Deserialize)]
pub struct RestOptions {
    /// Wrap payloads as `{name: payload}` unless the request toggles it off.
    #[serde(default)]
    pub(crate) envelope: bool,

    /// Upper bound (and default) for `limit` on list requests.
    #[serde(default)]
    pub(crate) max_limit: Option<usize>,

    /// Store calls taking longer than this answer 504.
    #[serde(default)]
    pub(crate) timeout_ms: Option<u64>,

    #[serde(skip)]
    pub(crate) validator: Option<Arc<dyn RequestValidator>>,

    #[serde(skip)]
    pub(crate) criteria_hook: Option<Arc<dyn CriteriaHook>>,

    #[serde(skip)]
    pub(crate) singularize: Option<Singularizer>,
}

impl RestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn envelope(mut self, enabled: bool) -> Self {
        self.envelope = enabled;
        self
    }

    pub fn max_limit(mut self, max_limit: usize) -> Self {
        self.max_limit = Some(max_limit);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn validator(mut self, validator: impl RequestValidator + 'static) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    pub fn criteria_hook(mut self, hook: impl CriteriaHook + 'static) -> Self {
        self.criteria_hook = Some(Arc::new(hook));
        self
    }

    /// Replaces the default English singularization of collection segments.
    pub fn singularize(mut self, singularize: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        self.singularize = Some(Arc::new(singularize));
        self
    }

    pub fn timeout_duration(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Derives the names for a collection segment.
    pub fn describe(&self, segment: &str) -> CollectionDescriptor {
        match &self.singularize {
            Some(singularize) => CollectionDescriptor::with_singularizer(segment, singularize.as_ref()),
            None => CollectionDescriptor::from_segment(segment),
        }
    }

    /// Whether to envelope a response, given the request's `envelope` parameter.
    ///
    /// The parameter only has an effect when it is the literal opposite of the
    /// mount default.
    pub fn envelope_for(&self, requested: Option<&str>) -> bool {
        let toggled = requested == Some(if self.envelope { "false" } else { "true" });
        self.envelope != toggled
    }

    /// Applies `max_limit` to a requested limit.
    pub fn cap_limit(&self, limit: Option<usize>) -> Option<usize> {
        match (limit, self.max_limit) {
            (Some(limit), Some(max)) => Some(limit.min(max)),
            (None, max) => max,
            (limit, None) => limit,
        }
    }
}

impl fmt::Debug for RestOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestOptions")
            .field("envelope", &self.envelope)
            .field("max_limit", &self.max_limit)
            .field("timeout_ms", &self.timeout_ms)
            .field("validator", &self.validator.is_some())
            .field("criteria_hook", &self.criteria_hook.is_some())
            .field("singularize", &self.singularize.is_some())
            .finish()
    }
}

/// One model as declared in a JSON model file.
///
/// ```json
/// {
///   "name": "Widget",
///   "refs": { "maker": "Company" },
///   "defaults": { "color": "grey" },
///   "required": ["name"],
///   "soft_delete": true
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct SchemaConfig {
    pub name: String,
    #[serde(default)]
    pub collection: Option<String>,
    #[serde(default)]
    pub refs: BTreeMap<String, String>,
    #[serde(default)]
    pub defaults: Map<String, Value>,
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default)]
    pub soft_delete: bool,
}

impl SchemaConfig {
    pub fn into_schema(self) -> Schema {
        let mut schema = Schema::new(self.name).soft_delete(self.soft_delete);

        if let Some(collection) = self.collection {
            schema = schema.collection(collection);
        }
        for (path, model) in self.refs {
            schema = schema.reference(path, model);
        }
        for (field, value) in self.defaults {
            schema = schema.default_value(field, json_to_bson(value));
        }
        for field in self.required {
            schema = schema.required(field);
        }

        schema
    }
}

/// Builds a registry from a JSON array of [`SchemaConfig`] entries.
///
/// # Errors
///
/// Fails on malformed JSON or when a reference names an unknown model.
pub fn load_registry(json: &str) -> DocumentStoreResult<ModelRegistry> {
    let configs = serde_json::from_str::<Vec<SchemaConfig>>(json)?;

    let registry = configs
        .into_iter()
        .map(SchemaConfig::into_schema)
        .fold(ModelRegistry::new(), ModelRegistry::with);

    registry.validate()?;

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_toggle_only_flips_on_the_opposite_literal() {
        let off = RestOptions::new();
        assert!(!off.envelope_for(None));
        assert!(off.envelope_for(Some("true")));
        assert!(!off.envelope_for(Some("false")));
        assert!(!off.envelope_for(Some("yes")));

        let on = RestOptions::new().envelope(true);
        assert!(on.envelope_for(None));
        assert!(!on.envelope_for(Some("false")));
        assert!(on.envelope_for(Some("true")));
    }

    #[test]
    fn max_limit_caps_and_defaults() {
        let options = RestOptions::new().max_limit(50);

        assert_eq!(options.cap_limit(Some(10)), Some(10));
        assert_eq!(options.cap_limit(Some(500)), Some(50));
        assert_eq!(options.cap_limit(None), Some(50));
        assert_eq!(RestOptions::new().cap_limit(None), None);
    }

    #[test]
    fn custom_singularizer_drives_descriptors() {
        let options = RestOptions::new().singularize(|plural: &str| plural.trim_end_matches("ies").to_string() + "y");

        assert_eq!(options.describe("categories").class_name, "Category");
        assert_eq!(RestOptions::new().describe("widgets").class_name, "Widget");
    }

    #[test]
    fn options_deserialize_without_hooks() {
        let options: RestOptions = serde_json::from_str(r#"{ "envelope": true, "timeout_ms": 250 }"#).unwrap();

        assert!(options.envelope);
        assert_eq!(options.timeout_duration(), Some(Duration::from_millis(250)));
        assert!(options.validator.is_none());
    }

    #[test]
    fn registry_loads_from_json() {
        let registry = load_registry(
            r#"[
                { "name": "Company" },
                { "name": "Widget", "refs": { "maker": "Company" }, "defaults": { "color": "grey" }, "required": ["name"] }
            ]"#,
        )
        .unwrap();

        let widget = registry.get("Widget").unwrap();
        assert_eq!(widget.collection_name(), "widgets");
        assert_eq!(widget.ref_target("maker"), Some("Company"));

        assert!(load_registry(r#"[{ "name": "Widget", "refs": { "maker": "Company" } }]"#).is_err());
        assert!(load_registry("not json").is_err());
    }
}
