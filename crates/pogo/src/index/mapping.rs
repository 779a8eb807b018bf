//! Static field mappings for the per-kind indices

use crate::kind::ArtifactKind;
use serde_json::{json, Map, Value};

/// Date layout of the `timestamp` field, matching the stored form.
pub const TIMESTAMP_FORMAT: &str = "yyyy-MM-dd HH:mm:ss";

/// Mapping of a single document field
pub fn field_mapping(field: &str) -> Value {
    match field {
        "timestamp" => json!({ "type": "date", "format": TIMESTAMP_FORMAT }),
        "message" => json!({ "type": "text" }),
        "success" => json!({ "type": "boolean" }),
        "contents" => json!({ "type": "binary" }),
        _ => json!({ "type": "keyword" }),
    }
}

/// `properties` object for the documents of `kind`
pub fn properties(kind: ArtifactKind) -> Value {
    let fields: Map<String, Value> = kind
        .insert_fields()
        .iter()
        .map(|field| (field.to_string(), field_mapping(field)))
        .collect();
    Value::Object(fields)
}
