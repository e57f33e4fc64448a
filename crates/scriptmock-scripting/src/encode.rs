//! Script value to JSON conversion
//!
//! | script value        | JSON            |
//! |---------------------|-----------------|
//! | `()`                | `null`          |
//! | bool / int / float  | bool / number   |
//! | string / char       | string          |
//! | array               | array           |
//! | object map          | object          |
//!
//! Non-finite floats and every other type (function pointers, blobs,
//! timestamps, custom types) cannot be represented and are rejected.

use rhai::{Array, Dynamic, ImmutableString, Map};
use serde::ser::Error as _;
use serde_json::{Number, Value};

/// Convert a script value to JSON.
pub fn to_json(value: &Dynamic) -> Result<Value, serde_json::Error> {
    if value.is_unit() {
        return Ok(Value::Null);
    }
    if let Ok(b) = value.as_bool() {
        return Ok(Value::Bool(b));
    }
    if let Ok(i) = value.as_int() {
        return Ok(Value::from(i));
    }
    if let Ok(f) = value.as_float() {
        return Number::from_f64(f)
            .map(Value::Number)
            .ok_or_else(|| serde_json::Error::custom(format!("unsupported value: {f}")));
    }
    if let Ok(c) = value.as_char() {
        return Ok(Value::String(c.to_string()));
    }
    if let Some(s) = value.read_lock::<ImmutableString>() {
        return Ok(Value::String(s.as_str().to_string()));
    }
    if let Some(array) = value.read_lock::<Array>() {
        return array.iter().map(to_json).collect::<Result<_, _>>().map(Value::Array);
    }
    if let Some(map) = value.read_lock::<Map>() {
        return map
            .iter()
            .map(|(key, v)| Ok::<_, serde_json::Error>((key.to_string(), to_json(v)?)))
            .collect::<Result<_, _>>()
            .map(Value::Object);
    }

    Err(serde_json::Error::custom(format!(
        "unsupported type: {}",
        value.type_name()
    )))
}
