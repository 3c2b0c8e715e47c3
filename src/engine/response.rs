// ── Memory Engine: Completion Response Parsing ─────────────────────────────
//
// Completion services are asked to answer with a fenced ```json block.
// This module is the single boundary where that loosely-formatted output
// becomes typed data: extract the first fenced block, then parse-or-reject
// against a serde schema. Malformed provider output is caught here and
// converted into the documented soft-failure paths by the callers —
// `undefined`-shaped values never propagate into filtering logic.

use crate::atoms::error::MemoryResult;
use serde::de::DeserializeOwned;

/// Returns the contents of the first fenced ```json block, if any.
///
/// Accepts a bare ``` fence as a fallback since some models drop the
/// language tag; the subsequent typed parse still gates what gets through.
pub fn extract_fenced_json(response: &str) -> Option<&str> {
    for fence in ["```json", "```"] {
        if let Some(start) = response.find(fence) {
            let body_start = start + fence.len();
            if let Some(end) = response[body_start..].find("```") {
                return Some(response[body_start..body_start + end].trim());
            }
        }
    }
    None
}

/// Extract the first fenced JSON block and parse it strictly into `T`.
/// `None` if no fenced block exists; `Err` if the block is not valid `T`.
pub fn parse_fenced<T: DeserializeOwned>(response: &str) -> MemoryResult<Option<T>> {
    match extract_fenced_json(response) {
        Some(block) => Ok(Some(serde_json::from_str(block)?)),
        None => Ok(None),
    }
}

// ═════════════════════════════════════════════════════════════════════════════
// Tests
// ═════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Payload {
        value: i32,
    }

    #[test]
    fn test_extracts_json_fence() {
        let text = "Sure, here you go:\n```json\n{\"value\": 3}\n```\nDone.";
        assert_eq!(extract_fenced_json(text), Some("{\"value\": 3}"));
    }

    #[test]
    fn test_extracts_bare_fence() {
        let text = "```\n{\"value\": 7}\n```";
        assert_eq!(extract_fenced_json(text), Some("{\"value\": 7}"));
    }

    #[test]
    fn test_no_fence_is_none() {
        assert!(extract_fenced_json("no code block here").is_none());
        let parsed: Option<Payload> = parse_fenced("plain text").unwrap();
        assert!(parsed.is_none());
    }

    #[test]
    fn test_unterminated_fence_is_none() {
        assert!(extract_fenced_json("```json\n{\"value\": 1}").is_none());
    }

    #[test]
    fn test_malformed_block_is_error() {
        let text = "```json\n{\"value\": }\n```";
        assert!(parse_fenced::<Payload>(text).is_err());
    }

    #[test]
    fn test_wrong_shape_is_error() {
        let text = "```json\n{\"value\": \"not a number\"}\n```";
        assert!(parse_fenced::<Payload>(text).is_err());
    }

    #[test]
    fn test_parses_typed_payload() {
        let text = "```json\n{\"value\": 42}\n```";
        let parsed: Payload = parse_fenced(text).unwrap().unwrap();
        assert_eq!(parsed.value, 42);
    }
}
