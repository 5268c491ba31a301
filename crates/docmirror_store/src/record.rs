//! The record model shared by every docmirror adapter.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Client-writable record fields, keyed by field name.
pub type FieldMap = serde_json::Map<String, Value>;

/// Unique identifier for a record.
///
/// Identifiers are assigned by the server and immutable for the lifetime of
/// the record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Creates a new record ID.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the raw ID value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A single document as observed from the remote store.
///
/// Three fields are reserved and server-owned: the identifier and the two
/// timestamps. Everything the client may write lives in [`Record::fields`],
/// which keeps mutation payloads free of reserved fields by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Stable identifier, immutable once assigned.
    pub id: RecordId,
    /// Name of the collection this record originated from.
    #[serde(default)]
    pub collection: String,
    /// Creation timestamp, assigned by the server.
    #[serde(default)]
    pub created: String,
    /// Last-modification timestamp, assigned by the server.
    #[serde(default)]
    pub updated: String,
    /// Client-writable fields. Semantics are opaque to docmirror.
    #[serde(flatten)]
    pub fields: FieldMap,
}

impl Record {
    /// Creates a record with the given identifier and no fields.
    pub fn new(id: impl Into<RecordId>, collection: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            collection: collection.into(),
            created: String::new(),
            updated: String::new(),
            fields: FieldMap::new(),
        }
    }

    /// Returns a field value by name, if present.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Sets a single field, returning the previous value if any.
    pub fn set_field(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.fields.insert(name.into(), value)
    }

    /// Merges the given fields into this record, overwriting on collision.
    pub fn merge(&mut self, fields: &FieldMap) {
        for (name, value) in fields {
            self.fields.insert(name.clone(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_id_display() {
        let id = RecordId::new("r1");
        assert_eq!(format!("{id}"), "r1");
        assert_eq!(id.as_str(), "r1");
    }

    #[test]
    fn set_and_get_field() {
        let mut record = Record::new("r1", "posts");
        assert!(record.field("title").is_none());

        record.set_field("title", json!("hello"));
        assert_eq!(record.field("title"), Some(&json!("hello")));
    }

    #[test]
    fn merge_overwrites_on_collision() {
        let mut record = Record::new("r1", "posts");
        record.set_field("title", json!("old"));
        record.set_field("draft", json!(true));

        let mut incoming = FieldMap::new();
        incoming.insert("title".into(), json!("new"));
        record.merge(&incoming);

        assert_eq!(record.field("title"), Some(&json!("new")));
        assert_eq!(record.field("draft"), Some(&json!(true)));
    }

    #[test]
    fn reserved_fields_stay_out_of_field_map() {
        let record = Record {
            id: RecordId::new("r1"),
            collection: "posts".into(),
            created: "t0".into(),
            updated: "t0".into(),
            fields: FieldMap::new(),
        };
        assert!(record.field("id").is_none());
        assert!(record.field("created").is_none());
        assert!(record.field("updated").is_none());
    }

    #[test]
    fn record_serializes_fields_flat() {
        let mut record = Record::new("r1", "posts");
        record.set_field("title", json!("hello"));

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["id"], json!("r1"));
        assert_eq!(value["title"], json!("hello"));
    }
}
