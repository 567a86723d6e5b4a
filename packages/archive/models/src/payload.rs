//! Normalization of the archive's "protected data" blobs.
//!
//! The search API is inconsistent about how it ships nested payloads such
//! as `pian_chranene_udaje` or `az_chranene_udaje`: the same field may
//! arrive as a JSON object, as a JSON-encoded string, or wrapped in a
//! single-element list. [`ProtectedData::normalize`] resolves all three
//! shapes into a plain object once, at the ingestion boundary.

use serde_json::{Map, Value};

/// Error returned when a string-encoded payload is not valid JSON.
#[derive(Debug, thiserror::Error)]
#[error("malformed protected data payload: {source}")]
pub struct PayloadError {
    #[from]
    source: serde_json::Error,
}

/// The wire shapes a protected-data field is known to take.
#[derive(Debug, Clone, Copy)]
enum RawPayload<'a> {
    Object(&'a Map<String, Value>),
    Encoded(&'a str),
    Wrapped(&'a [Value]),
    Absent,
}

impl<'a> RawPayload<'a> {
    fn classify(value: &'a Value) -> Self {
        match value {
            Value::Object(map) => Self::Object(map),
            Value::String(text) => Self::Encoded(text),
            Value::Array(items) => Self::Wrapped(items),
            Value::Null | Value::Bool(_) | Value::Number(_) => Self::Absent,
        }
    }
}

/// A normalized protected-data object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProtectedData(Map<String, Value>);

impl ProtectedData {
    /// Normalizes a raw payload into an object.
    ///
    /// Lists contribute their first element, strings are decoded as JSON,
    /// and anything else (including `null` and JSON strings that decode to
    /// a non-object) yields an empty payload.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError`] if a string payload is not valid JSON.
    pub fn normalize(value: &Value) -> Result<Self, PayloadError> {
        match RawPayload::classify(value) {
            RawPayload::Object(map) => Ok(Self(map.clone())),
            RawPayload::Encoded(text) if text.trim().is_empty() => Ok(Self::default()),
            RawPayload::Encoded(text) => {
                let decoded: Value = serde_json::from_str(text)?;
                Ok(match decoded {
                    Value::Object(map) => Self(map),
                    _ => Self::default(),
                })
            }
            RawPayload::Wrapped(items) => items
                .first()
                .map_or_else(|| Ok(Self::default()), Self::normalize),
            RawPayload::Absent => Ok(Self::default()),
        }
    }

    /// Same as [`Self::normalize`] for an optional field, treating a
    /// missing field as an empty payload.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError`] if a string payload is not valid JSON.
    pub fn normalize_field(value: Option<&Value>) -> Result<Self, PayloadError> {
        value.map_or_else(|| Ok(Self::default()), Self::normalize)
    }

    /// Returns the raw value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns the text held by a `{ "value": "..." }` wrapper under `key`
    /// (a bare string is accepted too). Empty strings count as absent.
    #[must_use]
    pub fn wrapped_text(&self, key: &str) -> Option<&str> {
        let value = self.0.get(key)?;
        let text = match value {
            Value::Object(inner) => inner.get("value")?.as_str()?,
            Value::String(text) => text.as_str(),
            _ => return None,
        };
        (!text.is_empty()).then_some(text)
    }

    /// Returns `true` if the payload holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
