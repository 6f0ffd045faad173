//! Entity instances as seen by the guard.
//!
//! The guard only needs attribute lookup by name, the new-vs-persisted
//! distinction and a way to build a lookup instance from a primary key.
//! [`Record`] is an attribute-bag implementation usable with any store.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_ID_ATTRIBUTE: &str = "id";

/// An instance of a guarded entity type.
pub trait Entity: Clone + Send + Sync + 'static {
    /// Name of the entity type, used to find its shield.
    fn model_name(&self) -> &str;

    /// Name of the primary-key attribute.
    fn id_attribute(&self) -> &str;

    /// Attribute value by name, `None` when unset.
    fn get(&self, key: &str) -> Option<Value>;

    /// A fresh, empty instance of the same type keyed by `id`.
    fn keyed(&self, id: Value) -> Self;

    fn primary_key(&self) -> Option<Value> {
        self.get(self.id_attribute()).filter(|v| !v.is_null())
    }

    /// True while the instance has no persisted identity.
    fn is_new(&self) -> bool {
        self.primary_key().is_none()
    }
}

/// Render an attribute value the way it appears in ACL questions and
/// denial messages: strings without quotes, missing values as `null`.
pub fn display_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => "null".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn default_id_attribute() -> String {
    DEFAULT_ID_ATTRIBUTE.to_string()
}

/// A named bag of JSON attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    model: String,
    #[serde(default = "default_id_attribute")]
    id_attribute: String,
    #[serde(default)]
    attributes: Map<String, Value>,
}

impl Record {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            id_attribute: default_id_attribute(),
            attributes: Map::new(),
        }
    }

    pub fn with_id_attribute(mut self, id_attribute: impl Into<String>) -> Self {
        self.id_attribute = id_attribute.into();
        self
    }

    pub fn with_attributes(mut self, attributes: Map<String, Value>) -> Self {
        self.attributes = attributes;
        self
    }

    /// Builder-style attribute assignment
    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.attributes.remove(key)
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }

    pub fn into_attributes(self) -> Map<String, Value> {
        self.attributes
    }

    /// True when every attribute of `filter` is present here with an
    /// equal value.
    pub fn matches(&self, filter: &Record) -> bool {
        filter
            .attributes
            .iter()
            .all(|(key, value)| self.attributes.get(key) == Some(value))
    }
}

impl Entity for Record {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn id_attribute(&self) -> &str {
        &self.id_attribute
    }

    fn get(&self, key: &str) -> Option<Value> {
        self.attributes.get(key).cloned()
    }

    fn keyed(&self, id: Value) -> Self {
        Record::new(self.model.clone())
            .with_id_attribute(self.id_attribute.clone())
            .set(self.id_attribute.clone(), id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_is_new_until_keyed() {
        let study = Record::new("Study").set("label", "pilot");
        assert!(study.is_new());
        assert!(study.primary_key().is_none());

        let study = study.set("id", 1);
        assert!(!study.is_new());
        assert_eq!(study.primary_key(), Some(json!(1)));
    }

    #[test]
    fn test_null_primary_key_counts_as_new() {
        let study = Record::new("Study").set("id", Value::Null);
        assert!(study.is_new());
    }

    #[test]
    fn test_keyed_builds_empty_lookup() {
        let study = Record::new("Study")
            .with_id_attribute("study_id")
            .set("study_id", 7)
            .set("label", "mutated");

        let lookup = study.keyed(json!(7));
        assert_eq!(lookup.model_name(), "Study");
        assert_eq!(lookup.id_attribute(), "study_id");
        assert_eq!(lookup.attributes().len(), 1);
        assert_eq!(lookup.get("study_id"), Some(json!(7)));
        assert!(lookup.get("label").is_none());
    }

    #[test]
    fn test_matches_filter() {
        let study = Record::new("Study").set("id", 1).set("site_id", 10);
        assert!(study.matches(&Record::new("Study").set("site_id", 10)));
        assert!(study.matches(&Record::new("Study")));
        assert!(!study.matches(&Record::new("Study").set("site_id", 11)));
    }

    #[test]
    fn test_display_value() {
        assert_eq!(display_value(Some(&json!("abc"))), "abc");
        assert_eq!(display_value(Some(&json!(10))), "10");
        assert_eq!(display_value(None), "null");
        assert_eq!(display_value(Some(&Value::Null)), "null");
    }

    #[test]
    fn test_record_deserialize_defaults() {
        let record: Record = serde_json::from_value(json!({
            "model": "Study",
            "attributes": { "id": "1" }
        }))
        .unwrap();
        assert_eq!(record.id_attribute(), DEFAULT_ID_ATTRIBUTE);
        assert!(!record.is_new());
    }
}
