//! Canonical JSON serialization
//!
//! Deterministic, key-order independent stringification used as the input
//! to hash proofs. Arrays keep their order, object keys are emitted in
//! lexicographic (byte) order, strings use standard JSON quoting.
//!
//! Integral floats are emitted without a fractional part (`1.0` becomes `1`)
//! so that a value read back from storage as a float hashes the same as the
//! integer it was written as.

use serde::Serialize;
use serde_json::{Number, Value};

use crate::types::Result;

/// Largest integer a float can represent exactly (2^53)
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Serialize a JSON value into its canonical string form.
pub fn stable_stringify(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

/// Convert any serializable value to JSON and canonicalize it.
///
/// `None` fields become `null`; they are never dropped.
pub fn stable_stringify_serialize<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let json = serde_json::to_value(value)?;
    Ok(stable_stringify(&json))
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => write_number(out, n),
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();

            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(out, key);
                out.push(':');
                write_value(out, &map[key]);
            }
            out.push('}');
        }
    }
}

fn write_number(out: &mut String, n: &Number) {
    if n.is_i64() || n.is_u64() {
        out.push_str(&n.to_string());
        return;
    }

    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < MAX_SAFE_INTEGER => {
            out.push_str(&(f as i64).to_string());
        }
        _ => out.push_str(&n.to_string()),
    }
}

fn write_string(out: &mut String, s: &str) {
    // Serializing a str into JSON cannot fail
    match serde_json::to_string(s) {
        Ok(quoted) => out.push_str(&quoted),
        Err(_) => out.push_str("\"\""),
    }
}
