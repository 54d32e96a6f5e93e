//! Wide-integer coercion for JSON consumers
//!
//! JavaScript numbers lose precision past 2^53 - 1. Group ids are 64-bit hashes and
//! routinely exceed that, so such values are emitted as decimal strings.

use serde::Serializer;
use serde_json::{Map, Number, Value};

/// Largest integer a double represents exactly
pub const MAX_SAFE_INTEGER: u64 = (1 << 53) - 1;

fn is_safe_u64(v: u64) -> bool {
    v <= MAX_SAFE_INTEGER
}

fn is_safe_i64(v: i64) -> bool {
    v.unsigned_abs() <= MAX_SAFE_INTEGER
}

fn coerce_number(n: &Number) -> Option<Value> {
    if let Some(u) = n.as_u64() {
        return (!is_safe_u64(u)).then(|| Value::String(u.to_string()));
    }
    if let Some(i) = n.as_i64() {
        return (!is_safe_i64(i)).then(|| Value::String(i.to_string()));
    }
    None
}

/// Convert unsafe integers in place, descending into arrays and objects
pub fn coerce_value(value: &mut Value) {
    match value {
        Value::Number(n) => {
            if let Some(s) = coerce_number(n) {
                *value = s;
            }
        }
        Value::Array(items) => items.iter_mut().for_each(coerce_value),
        Value::Object(map) => coerce_map(map),
        _ => {}
    }
}

pub fn coerce_map(map: &mut Map<String, Value>) {
    map.values_mut().for_each(coerce_value);
}

/// `serialize_with` helper for wide unsigned ids
pub fn serialize_safe_u64<S: Serializer>(v: &u64, serializer: S) -> Result<S::Ok, S::Error> {
    if is_safe_u64(*v) {
        serializer.serialize_u64(*v)
    } else {
        serializer.collect_str(v)
    }
}
