//! JSON ↔ Firestore typed values.
//!
//! Firestore's REST API wraps every value in a single-key object naming its
//! type (`{"stringValue": "abate"}`). Integers travel as decimal strings.
//! Decoding maps `timestampValue`/`referenceValue`/`bytesValue` to plain
//! strings, which is how the model types store timestamps.

use serde_json::{json, Map, Value};

use crate::{Document, Fields, StoreError, StoreResult};

pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64().unwrap_or(0.0) }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => {
            if items.is_empty() {
                json!({ "arrayValue": {} })
            } else {
                let values: Vec<Value> = items.iter().map(encode_value).collect();
                json!({ "arrayValue": { "values": values } })
            }
        }
        Value::Object(map) => json!({ "mapValue": { "fields": encode_fields(map) } }),
    }
}

pub fn encode_fields(fields: &Fields) -> Map<String, Value> {
    fields
        .iter()
        .map(|(k, v)| (k.clone(), encode_value(v)))
        .collect()
}

pub fn decode_value(value: &Value) -> StoreResult<Value> {
    let obj = value
        .as_object()
        .filter(|o| o.len() == 1)
        .ok_or_else(|| invalid(format!("expected a typed value object, got {value}")))?;
    let (kind, inner) = obj.iter().next().ok_or_else(|| invalid("empty value".to_string()))?;

    match kind.as_str() {
        "nullValue" => Ok(Value::Null),
        "booleanValue" => inner
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| invalid(format!("bad booleanValue {inner}"))),
        "integerValue" => {
            let parsed = match inner {
                Value::String(s) => s.parse::<i64>().ok(),
                Value::Number(n) => n.as_i64(),
                _ => None,
            };
            parsed
                .map(Value::from)
                .ok_or_else(|| invalid(format!("bad integerValue {inner}")))
        }
        "doubleValue" => match inner {
            Value::Number(_) => Ok(inner.clone()),
            // NaN / Infinity arrive as strings; JSON cannot carry them.
            Value::String(_) => Ok(Value::Null),
            _ => Err(invalid(format!("bad doubleValue {inner}"))),
        },
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => inner
            .as_str()
            .map(|s| Value::String(s.to_string()))
            .ok_or_else(|| invalid(format!("bad {kind} {inner}"))),
        "geoPointValue" => Ok(inner.clone()),
        "arrayValue" => {
            let values = inner
                .get("values")
                .and_then(Value::as_array)
                .map(|items| items.iter().map(decode_value).collect::<StoreResult<Vec<_>>>())
                .transpose()?
                .unwrap_or_default();
            Ok(Value::Array(values))
        }
        "mapValue" => {
            let fields = match inner.get("fields").and_then(Value::as_object) {
                Some(f) => decode_fields(f)?,
                None => Map::new(),
            };
            Ok(Value::Object(fields))
        }
        other => Err(invalid(format!("unsupported value type `{other}`"))),
    }
}

pub fn decode_fields(fields: &Map<String, Value>) -> StoreResult<Fields> {
    fields
        .iter()
        .map(|(k, v)| decode_value(v).map(|v| (k.clone(), v)))
        .collect()
}

/// Decodes a REST `Document` resource (`{name, fields, createTime, updateTime}`).
pub fn decode_document(resource: &Value) -> StoreResult<Document> {
    let name = resource
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("document resource without name".to_string()))?;
    let id = name.rsplit('/').next().unwrap_or(name).to_string();
    let fields = match resource.get("fields").and_then(Value::as_object) {
        Some(f) => decode_fields(f)?,
        None => Map::new(),
    };
    Ok(Document::new(id, fields))
}

fn invalid(reason: String) -> StoreError {
    StoreError::Backend(format!("firestore value decode: {reason}"))
}
