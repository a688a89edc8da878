//! Flat attribute sets and the precedence rules used to build them
//!
//! Every record handed to the delivery client carries an [`AttributeSet`]
//! assembled by the [`AttributeNormalizer`]. Sources are applied lowest
//! precedence first, so a later source wins on key collision:
//!
//! 1. common attributes supplied at construction (`service.name`, ...)
//! 2. provenance markers (`instrumentation.provider`, `collector.name`)
//! 3. the per-process `service.instance.id`
//! 4. resource attributes
//! 5. instrumentation library name/version
//! 6. record-specific attributes (point labels, span intrinsics)

use opentelemetry::{InstrumentationScope, KeyValue, Value};
use opentelemetry_sdk::Resource;
use serde::Serialize;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;

/// Well-known attribute keys
pub mod names {
    /// Provenance marker naming the instrumentation provider
    pub const INSTRUMENTATION_PROVIDER: &str = "instrumentation.provider";
    /// Instrumentation library name
    pub const INSTRUMENTATION_NAME: &str = "instrumentation.name";
    /// Instrumentation library version
    pub const INSTRUMENTATION_VERSION: &str = "instrumentation.version";
    /// Provenance marker naming this exporter
    pub const COLLECTOR_NAME: &str = "collector.name";
    /// Service name
    pub const SERVICE_NAME: &str = "service.name";
    /// Stable per-process instance identifier
    pub const SERVICE_INSTANCE_ID: &str = "service.instance.id";
    /// Upper-case span kind
    pub const SPAN_KIND: &str = "span.kind";
    /// Error description for failed spans
    pub const ERROR_MESSAGE: &str = "error.message";
    /// Metric description
    pub const DESCRIPTOR_DESCRIPTION: &str = "description";
    /// Metric unit
    pub const DESCRIPTOR_UNIT: &str = "unit";
}

/// Value of [`names::INSTRUMENTATION_PROVIDER`]
pub const INSTRUMENTATION_PROVIDER_VALUE: &str = "opentelemetry";
/// Value of [`names::COLLECTOR_NAME`]
pub const COLLECTOR_NAME_VALUE: &str = "newrelic-opentelemetry-exporter";

/// A typed scalar attribute value
///
/// Doubles compare and hash by bit pattern, so NaN equals itself and sets
/// holding one can still be grouped by value.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// String value
    String(String),
    /// Boolean value
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Floating point value
    Double(f64),
}

impl AttributeValue {
    /// Convert an OpenTelemetry value, dropping arrays and other non-scalar values
    pub fn from_otel(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::I64(i) => Some(Self::Int(*i)),
            Value::F64(f) => Some(Self::Double(*f)),
            Value::String(s) => Some(Self::String(s.as_str().to_owned())),
            _ => None,
        }
    }
}

impl PartialEq for AttributeValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Double(a), Self::Double(b)) => a.to_bits() == b.to_bits(),
            _ => false,
        }
    }
}

impl Eq for AttributeValue {}

impl Hash for AttributeValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::String(s) => s.hash(state),
            Self::Bool(b) => b.hash(state),
            Self::Int(i) => i.hash(state),
            Self::Double(d) => d.to_bits().hash(state),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

/// Ordered, flat key/value attribute set with value semantics
///
/// Cloning produces an independent copy. [`AttributeSet::merge`] applies
/// another set on top of this one, the other set winning on collision.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct AttributeSet(BTreeMap<String, AttributeValue>);

impl AttributeSet {
    /// Create an empty attribute set
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a single attribute
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> &mut Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Builder-style [`AttributeSet::put`]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.put(key, value);
        self
    }

    /// Apply `other` on top of this set; `other` wins on key collision
    pub fn merge(&mut self, other: &AttributeSet) -> &mut Self {
        for (key, value) in &other.0 {
            self.0.insert(key.clone(), value.clone());
        }
        self
    }

    /// Insert OpenTelemetry key/values, skipping non-scalar values
    pub fn extend_from_key_values<'a>(&mut self, kvs: impl IntoIterator<Item = &'a KeyValue>) {
        for kv in kvs {
            if let Some(value) = AttributeValue::from_otel(&kv.value) {
                self.0.insert(kv.key.as_str().to_owned(), value);
            }
        }
    }

    /// Insert string labels
    pub fn extend_from_labels(&mut self, labels: &BTreeMap<String, String>) {
        for (key, value) in labels {
            self.0
                .insert(key.clone(), AttributeValue::String(value.clone()));
        }
    }

    /// Look up an attribute
    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.0.get(key)
    }

    /// Look up a string attribute
    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(AttributeValue::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Whether the key is present
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of attributes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate attributes in key order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttributeValue)> {
        self.0.iter()
    }
}

impl<K: Into<String>, V: Into<AttributeValue>> FromIterator<(K, V)> for AttributeSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl From<&Resource> for AttributeSet {
    fn from(resource: &Resource) -> Self {
        let mut attributes = AttributeSet::new();
        for (key, value) in resource.iter() {
            if let Some(value) = AttributeValue::from_otel(value) {
                attributes.put(key.as_str(), value);
            }
        }
        attributes
    }
}

/// Name and version of the code that produced a span or metric
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LibraryInfo {
    /// Library name, may be empty
    pub name: String,
    /// Library version
    pub version: Option<String>,
}

impl LibraryInfo {
    /// Create library info
    pub fn new(name: impl Into<String>, version: Option<String>) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }
}

impl From<&InstrumentationScope> for LibraryInfo {
    fn from(scope: &InstrumentationScope) -> Self {
        Self {
            name: scope.name().to_owned(),
            version: scope.version().map(ToOwned::to_owned),
        }
    }
}

/// Stable identifier for this process, generated once
pub fn service_instance_id() -> &'static str {
    static INSTANCE_ID: OnceLock<String> = OnceLock::new();
    INSTANCE_ID.get_or_init(|| uuid::Uuid::new_v4().to_string())
}

/// Builds flat attribute sets with fixed precedence
#[derive(Debug, Clone)]
pub struct AttributeNormalizer {
    common: AttributeSet,
}

impl AttributeNormalizer {
    /// Create a normalizer from the service-level attributes supplied at construction
    ///
    /// Provenance markers and the instance id are layered on top, in that order.
    pub fn new(common_attributes: &AttributeSet) -> Self {
        Self::with_instance_id(common_attributes, service_instance_id())
    }

    /// Create a normalizer with an explicit instance id
    pub fn with_instance_id(common_attributes: &AttributeSet, instance_id: &str) -> Self {
        let mut common = common_attributes.clone();
        common
            .put(names::INSTRUMENTATION_PROVIDER, INSTRUMENTATION_PROVIDER_VALUE)
            .put(names::COLLECTOR_NAME, COLLECTOR_NAME_VALUE)
            .put(names::SERVICE_INSTANCE_ID, instance_id);
        Self { common }
    }

    /// Common attributes, provenance markers and instance id (levels 1-3)
    pub fn common_attributes(&self) -> &AttributeSet {
        &self.common
    }

    /// Common attributes with the resource applied on top (levels 1-4)
    pub fn with_resource(&self, resource: Option<&AttributeSet>) -> AttributeSet {
        let mut attributes = self.common.clone();
        add_resource_attributes(&mut attributes, resource);
        attributes
    }

    /// All six levels merged into one set
    pub fn normalize(
        &self,
        resource: Option<&AttributeSet>,
        library: Option<&LibraryInfo>,
        specific: &AttributeSet,
    ) -> AttributeSet {
        let mut attributes = self.with_resource(resource);
        populate_library_info(&mut attributes, library);
        attributes.merge(specific);
        attributes
    }
}

/// Apply resource attributes; an absent resource is a no-op
pub fn add_resource_attributes(attributes: &mut AttributeSet, resource: Option<&AttributeSet>) {
    if let Some(resource) = resource {
        attributes.merge(resource);
    }
}

/// Apply instrumentation library name and version when present and non-empty
pub fn populate_library_info(attributes: &mut AttributeSet, library: Option<&LibraryInfo>) {
    let Some(library) = library else {
        return;
    };
    if !library.name.is_empty() {
        attributes.put(names::INSTRUMENTATION_NAME, library.name.as_str());
    }
    if let Some(version) = library.version.as_deref().filter(|v| !v.is_empty()) {
        attributes.put(names::INSTRUMENTATION_VERSION, version);
    }
}
