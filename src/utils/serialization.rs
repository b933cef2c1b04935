// src/utils/serialization.rs
//! Serialization utilities for authority responses.
//!
//! Authority replies are parsed as JSON before their status is inspected.
//! A failure body is expected to carry a `message` field; when it does not,
//! a per-operation fallback message is used instead.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json;

/// Serializes a value to a JSON string.
///
/// # Returns
/// - `Ok(String)` with JSON representation on success
/// - `Err(serde_json::Error)` if serialization fails
pub fn serialize<T: Serialize>(data: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(data)
}

/// Deserializes a value from a JSON string.
pub fn deserialize<'a, T: Deserialize<'a>>(data: &'a str) -> Result<T, serde_json::Error> {
    serde_json::from_str(data)
}

#[derive(Deserialize)]
struct MessageBody {
    #[serde(default)]
    message: Option<String>,
}

/// Extracts the `message` field of a JSON body.
///
/// Returns `fallback` if the body is not JSON, has no `message`, or the
/// message is blank.
pub fn message_or(body: &str, fallback: &str) -> String {
    deserialize::<MessageBody>(body)
        .ok()
        .and_then(|b| b.message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

/// Reads an optional string, treating `""` and `null` as absent.
pub fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_extracted() {
        let body = r#"{"message":"このCredential Nameは既に使用されています。"}"#;
        assert_eq!(
            message_or(body, "fallback"),
            "このCredential Nameは既に使用されています。"
        );
    }

    #[test]
    fn test_fallback_on_plain_text() {
        // net/http's http.Error writes text/plain bodies
        assert_eq!(message_or("Invalid VC format\n", "fallback"), "fallback");
    }

    #[test]
    fn test_fallback_on_missing_or_blank_message() {
        assert_eq!(message_or(r#"{"vp":"x"}"#, "fallback"), "fallback");
        assert_eq!(message_or(r#"{"message":"  "}"#, "fallback"), "fallback");
    }
}
