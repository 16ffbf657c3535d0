//! Shared JSON extraction helpers for the provider decoders.
//!
//! Decoders parse the body into a typed envelope and then read the open
//! nested objects through an explicit field list, so nothing past the decoder
//! sees a `serde_json::Value`.

use super::{EventAttributes, WebhookError};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

pub(crate) type JsonObject = Map<String, Value>;

/// Parse `body` as a JSON object and deserialize it into `T`.
///
/// Non-object documents and type mismatches in the envelope are both
/// malformed payloads.
pub(crate) fn parse_envelope<T: DeserializeOwned>(body: &[u8]) -> Result<T, WebhookError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| WebhookError::malformed(format!("body is not valid JSON: {e}")))?;

    if !value.is_object() {
        return Err(WebhookError::malformed(format!(
            "expected a JSON object, got {}",
            json_kind(&value)
        )));
    }

    serde_json::from_value(value)
        .map_err(|e| WebhookError::malformed(format!("unexpected envelope shape: {e}")))
}

/// Read a dotted path (`source.amount`) as text.
///
/// Strings are returned as-is and numbers and booleans in their JSON form.
/// Anything else, including a missing path, reads as `""`.
pub(crate) fn text_at(object: Option<&JsonObject>, path: &str) -> String {
    let mut segments = path.split('.');
    let Some(first) = segments.next() else {
        return String::new();
    };

    let mut current = object.and_then(|o| o.get(first));
    for segment in segments {
        current = current.and_then(Value::as_object).and_then(|o| o.get(segment));
    }

    match current {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// Extract every field in `fields` from `object`, defaulting to `""`.
pub(crate) fn extract_attributes(
    object: Option<&JsonObject>,
    fields: &[&'static str],
) -> EventAttributes {
    let mut attributes = EventAttributes::new();
    for field in fields {
        attributes.insert(*field, text_at(object, field));
    }
    attributes
}

/// First non-empty value, or `""`.
pub(crate) fn first_non_empty<'a>(candidates: &[&'a str]) -> &'a str {
    candidates
        .iter()
        .copied()
        .find(|c| !c.is_empty())
        .unwrap_or("")
}

/// Unsigned decimal such as `100`, `100.5` or `.5`.
pub(crate) fn is_decimal_amount(value: &str) -> bool {
    let mut parts = value.splitn(2, '.');
    let whole = parts.next().unwrap_or("");
    let fraction = parts.next();

    let digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    match fraction {
        None => !whole.is_empty() && digits(whole),
        Some(fraction) => {
            (!whole.is_empty() || !fraction.is_empty()) && digits(whole) && digits(fraction)
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
#[path = "decode_tests.rs"]
mod tests;
