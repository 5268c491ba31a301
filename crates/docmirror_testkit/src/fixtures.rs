//! Record and field-map fixtures.

use docmirror_store::{FieldMap, Record};
use serde_json::Value;

/// Builds a field map from name/value pairs.
pub fn fields(pairs: &[(&str, Value)]) -> FieldMap {
    let mut map = FieldMap::new();
    for (name, value) in pairs {
        map.insert((*name).to_string(), value.clone());
    }
    map
}

/// Builds a record with the given identifier, collection, and fields.
pub fn record_with(id: &str, collection: &str, pairs: &[(&str, Value)]) -> Record {
    let mut record = Record::new(id, collection);
    record.fields = fields(pairs);
    record
}
