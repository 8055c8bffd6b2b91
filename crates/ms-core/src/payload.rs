//! Decoded message payloads

use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// The decoded form of a message payload
///
/// Inbound payloads are parsed as JSON first. Anything that is not JSON but is
/// valid UTF-8 is kept as text, everything else is passed through as raw bytes.
/// Decoding never fails.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Payload {
    /// A payload that parsed as JSON (including bare numbers, booleans, null)
    Json(Value),
    /// A non-JSON UTF-8 payload
    Text(String),
    /// A non-UTF-8 payload
    Binary(Vec<u8>),
}

impl Payload {
    /// Decode raw payload bytes
    pub fn decode(raw: &[u8]) -> Self {
        if let Ok(value) = serde_json::from_slice::<Value>(raw) {
            return Payload::Json(value);
        }
        match std::str::from_utf8(raw) {
            Ok(text) => Payload::Text(text.to_string()),
            Err(_) => Payload::Binary(raw.to_vec()),
        }
    }

    /// The JSON value, if this payload was JSON
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Payload::Json(v) => Some(v),
            _ => None,
        }
    }

    /// A string view of text payloads and JSON strings
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Payload::Json(Value::String(s)) => Some(s),
            Payload::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view; JSON numbers only
    pub fn as_f64(&self) -> Option<f64> {
        self.as_json().and_then(Value::as_f64)
    }

    /// Boolean view; JSON booleans only
    pub fn as_bool(&self) -> Option<bool> {
        self.as_json().and_then(Value::as_bool)
    }

    /// Convert into a JSON value. Binary payloads become an array of bytes.
    pub fn to_json(&self) -> Value {
        match self {
            Payload::Json(v) => v.clone(),
            Payload::Text(s) => Value::String(s.clone()),
            Payload::Binary(b) => Value::Array(b.iter().map(|x| Value::from(*x)).collect()),
        }
    }

    /// Walk nested object keys / array indices
    ///
    /// Returns `None` as soon as a step is missing.
    pub fn get_path<S: AsRef<str>>(&self, path: &[S]) -> Option<Value> {
        let mut current = self.as_json()?;
        for key in path {
            let key = key.as_ref();
            current = match current {
                Value::Object(map) => map.get(key)?,
                Value::Array(items) => items.get(key.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current.clone())
    }

    /// Loose truthiness used by the helper library
    ///
    /// `false`, `0`, `""`, `null` and NaN are falsy, everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Payload::Json(v) => json_truthy(v),
            Payload::Text(s) => !s.is_empty(),
            Payload::Binary(b) => !b.is_empty(),
        }
    }
}

pub(crate) fn json_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Structural equality with numbers compared by value (`1 == 1.0`)
fn json_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| json_eq(a, b))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(k, v)| y.get(k).map(|w| json_eq(v, w)).unwrap_or(false))
        }
        _ => a == b,
    }
}

impl PartialEq for Payload {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Payload::Json(a), Payload::Json(b)) => json_eq(a, b),
            (Payload::Json(Value::String(a)), Payload::Text(b))
            | (Payload::Text(a), Payload::Json(Value::String(b))) => a == b,
            (Payload::Text(a), Payload::Text(b)) => a == b,
            (Payload::Binary(a), Payload::Binary(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Json(Value::String(s)) => f.write_str(s),
            Payload::Json(v) => write!(f, "{}", v),
            Payload::Text(s) => f.write_str(s),
            Payload::Binary(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Json(value)
    }
}
