//! Document schema as stored in the content repository.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Named query parameters (`$name` placeholders).
pub type QueryParams = Map<String, Value>;

/// A single repository document.
///
/// System attributes keep their underscore-prefixed wire names; every
/// other attribute lives in `fields`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "_id")]
    pub id: String,

    #[serde(rename = "_type")]
    pub doc_type: String,

    /// Revision token assigned by the repository on every write
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,

    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn new(id: impl Into<String>, doc_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            doc_type: doc_type.into(),
            rev: None,
            fields: Map::new(),
        }
    }

    /// Set a top-level field.
    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// The `title` field when it is a string.
    pub fn title(&self) -> Option<&str> {
        self.fields.get("title").and_then(Value::as_str)
    }

    /// Copy of this document under another id, with the revision cleared.
    pub fn with_id(&self, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            doc_type: self.doc_type.clone(),
            rev: None,
            fields: self.fields.clone(),
        }
    }

    /// Build a document from an arbitrary JSON object.
    ///
    /// Fails when `_id` or `_type` is absent.
    pub fn from_value(value: Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }

    pub fn to_value(&self) -> Value {
        let mut map = self.fields.clone();
        map.insert("_id".to_string(), Value::String(self.id.clone()));
        map.insert("_type".to_string(), Value::String(self.doc_type.clone()));
        if let Some(rev) = &self.rev {
            map.insert("_rev".to_string(), Value::String(rev.clone()));
        }
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_system_attributes_and_flattens_fields() {
        let doc: Document = serde_json::from_value(json!({
            "_id": "post-1",
            "_type": "post",
            "_rev": "r1",
            "title": "Hello",
            "views": 3
        }))
        .unwrap();

        assert_eq!(doc.id, "post-1");
        assert_eq!(doc.doc_type, "post");
        assert_eq!(doc.rev.as_deref(), Some("r1"));
        assert_eq!(doc.title(), Some("Hello"));
        assert_eq!(doc.field("views"), Some(&json!(3)));
        assert!(!doc.fields.contains_key("_id"));
    }

    #[test]
    fn missing_type_is_rejected() {
        assert!(Document::from_value(json!({"_id": "x"})).is_err());
    }

    #[test]
    fn with_id_clears_revision() {
        let mut doc = Document::new("a", "post").with_field("title", json!("T"));
        doc.rev = Some("r9".to_string());
        let copy = doc.with_id("drafts.a");
        assert_eq!(copy.id, "drafts.a");
        assert!(copy.rev.is_none());
        assert_eq!(copy.title(), Some("T"));
    }

    #[test]
    fn to_value_omits_missing_revision() {
        let value = Document::new("a", "post").to_value();
        assert_eq!(value, json!({"_id": "a", "_type": "post"}));
    }
}
