use serde_json::{Map, Value};

/// Prunes a JSON tree down to what the mirror persists.
///
/// `null` is treated as missing: it is dropped from arrays and objects, and
/// an object left with no keys is itself missing. Arrays are kept even when
/// empty, since an empty id list is meaningful.
pub fn flatten(value: &Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Bool(_) | Value::Number(_) | Value::String(_) => Some(value.clone()),
        Value::Array(items) => Some(Value::Array(items.iter().filter_map(flatten).collect())),
        Value::Object(fields) => {
            let kept: Map<String, Value> = fields
                .iter()
                .filter_map(|(k, v)| flatten(v).map(|v| (k.clone(), v)))
                .collect();
            if kept.is_empty() {
                None
            } else {
                Some(Value::Object(kept))
            }
        }
    }
}

/// Flattens a whole document; an entirely empty document becomes `{}`.
pub(crate) fn flatten_document(value: &Value) -> Value {
    flatten(value).unwrap_or_else(|| Value::Object(Map::new()))
}
