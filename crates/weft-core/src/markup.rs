//! Embedded component markup codec.
//!
//! The artifact delegate embeds structured components (flash cards) in the
//! document as labeled callout blocks carrying a Base64-encoded JSON payload:
//!
//! ```text
//! :::callout {type="flash-card" content="<base64 json>"}
//!
//! <json>
//!
//! :::
//! ```
//!
//! Encoding and decoding live here so the block syntax can be validated
//! independently of any producer.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::error::WeftError;

/// A component block parsed back out of artifact content.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedComponent {
    pub kind: String,
    pub payload: serde_json::Value,
}

/// Render a component block for the given kind and JSON payload.
pub fn encode_component(kind: &str, payload: &serde_json::Value) -> String {
    let json = payload.to_string();
    let content = STANDARD.encode(json.as_bytes());
    format!(":::callout {{type=\"{kind}\" content=\"{content}\"}}\n\n{json}\n\n:::")
}

/// Parse a component block produced by [`encode_component`].
///
/// The Base64 attribute is authoritative; the plain JSON body between the
/// fences is display-only and ignored here.
pub fn decode_component(block: &str) -> Result<DecodedComponent, WeftError> {
    let mut lines = block.trim().lines();
    let header = lines
        .next()
        .ok_or_else(|| WeftError::Markup("empty block".into()))?;

    let attrs = header
        .strip_prefix(":::callout {")
        .and_then(|rest| rest.strip_suffix('}'))
        .ok_or_else(|| WeftError::Markup(format!("not a callout header: {header}")))?;

    let kind = attr_value(attrs, "type")
        .ok_or_else(|| WeftError::Markup("missing type attribute".into()))?;
    let content = attr_value(attrs, "content")
        .ok_or_else(|| WeftError::Markup("missing content attribute".into()))?;

    if block.trim().lines().last() != Some(":::") {
        return Err(WeftError::Markup("unterminated callout block".into()));
    }

    let bytes = STANDARD
        .decode(content)
        .map_err(|e| WeftError::Markup(format!("bad base64 payload: {e}")))?;
    let payload = serde_json::from_slice(&bytes)
        .map_err(|e| WeftError::Markup(format!("payload is not JSON: {e}")))?;

    Ok(DecodedComponent {
        kind: kind.to_string(),
        payload,
    })
}

/// Extract `key="value"` from a callout attribute list.
fn attr_value<'a>(attrs: &'a str, key: &str) -> Option<&'a str> {
    let needle = format!("{key}=\"");
    let start = attrs.find(&needle)? + needle.len();
    let end = attrs[start..].find('"')?;
    Some(&attrs[start..start + end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_decode_round_trip() {
        let payload = json!({
            "title": "Capitals",
            "cards": [{"question": "Capital of France?", "answer": "Paris"}],
        });
        let block = encode_component("flash-card", &payload);
        assert!(block.starts_with(":::callout {type=\"flash-card\""));
        assert!(block.ends_with(":::"));

        let decoded = decode_component(&block).unwrap();
        assert_eq!(decoded.kind, "flash-card");
        assert_eq!(decoded.payload, payload);
    }

    #[test]
    fn test_block_contains_readable_json_body() {
        let payload = json!({"title": "T", "cards": []});
        let block = encode_component("flash-card", &payload);
        assert!(block.contains(&payload.to_string()));
    }

    #[test]
    fn test_decode_rejects_plain_text() {
        assert!(decode_component("just some prose").is_err());
    }

    #[test]
    fn test_decode_rejects_unterminated_block() {
        let payload = json!({"a": 1});
        let block = encode_component("flash-card", &payload);
        let truncated = block.trim_end_matches(":::");
        assert!(decode_component(truncated).is_err());
    }

    #[test]
    fn test_decode_rejects_garbage_content_attribute() {
        let block = ":::callout {type=\"flash-card\" content=\"%%%\"}\n\n{}\n\n:::";
        assert!(decode_component(block).is_err());
    }
}
