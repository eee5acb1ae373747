//! Decode attempts as reported by a decoder engine, one per evaluated frame.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Payload of a successful decode
///
/// On the wire this is a flat object: `{"type": .., "content": .., ...}`.
/// Keys other than `type` and `content` are kept verbatim in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanPayload {
    /// Symbology tag (e.g. `QR_CODE`, `EAN_13`)
    #[serde(rename = "type", default)]
    pub format: String,
    #[serde(default)]
    pub content: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ScanPayload {
    pub fn new(format: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            content: content.into(),
            extra: Map::new(),
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DecodeOutcome {
    Found { payload: ScanPayload },
    NotFound,
    Error { detail: String },
}

/// One evaluation of a frame by the decoder engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodeAttempt {
    #[serde(flatten)]
    pub outcome: DecodeOutcome,
}

impl DecodeAttempt {
    pub fn found(payload: ScanPayload) -> Self {
        Self {
            outcome: DecodeOutcome::Found { payload },
        }
    }

    pub fn not_found() -> Self {
        Self {
            outcome: DecodeOutcome::NotFound,
        }
    }

    pub fn error(detail: impl Into<String>) -> Self {
        Self {
            outcome: DecodeOutcome::Error {
                detail: detail.into(),
            },
        }
    }

    /// Payload of a found attempt whose content is not empty
    pub fn found_payload(&self) -> Option<&ScanPayload> {
        match &self.outcome {
            DecodeOutcome::Found { payload } if !payload.content.is_empty() => Some(payload),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.outcome, DecodeOutcome::NotFound)
    }

    /// Parse one entry of a textual attempt script.
    ///
    /// `-` is a miss, `!detail` an error, `format:content` or bare `content`
    /// a hit (bare content is tagged `UNKNOWN`). An empty entry is a hit with
    /// empty content.
    pub fn parse_script_entry(entry: &str) -> Self {
        let entry = entry.trim();
        if entry == "-" {
            return Self::not_found();
        }
        if let Some(detail) = entry.strip_prefix('!') {
            return Self::error(detail);
        }
        match entry.split_once(':') {
            Some((format, content)) if !format.is_empty() => {
                Self::found(ScanPayload::new(format, content))
            }
            _ => Self::found(ScanPayload::new("UNKNOWN", entry)),
        }
    }
}

/// Parse a comma separated attempt script, see [`DecodeAttempt::parse_script_entry`]
pub fn parse_script(script: &str) -> Vec<DecodeAttempt> {
    if script.trim().is_empty() {
        return Vec::new();
    }
    script.split(',').map(DecodeAttempt::parse_script_entry).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_keeps_extension_data() {
        let payload: ScanPayload = serde_json::from_value(json!({
            "type": "QR_CODE",
            "content": "https://example.org",
            "points": [[1, 2], [3, 4]],
            "orientation": 90
        }))
        .unwrap();

        assert_eq!(payload.format, "QR_CODE");
        assert_eq!(payload.content, "https://example.org");
        assert_eq!(payload.extra.len(), 2);
        assert_eq!(payload.extra["orientation"], json!(90));

        let back = serde_json::to_value(&payload).unwrap();
        assert_eq!(back["points"], json!([[1, 2], [3, 4]]));

        let built = ScanPayload::new("QR_CODE", "https://example.org")
            .with_extra("points", json!([[1, 2], [3, 4]]))
            .with_extra("orientation", json!(90));
        assert_eq!(built, payload);
    }

    #[test]
    fn test_payload_missing_content_defaults_to_empty() {
        let payload: ScanPayload = serde_json::from_value(json!({"type": "EAN_13"})).unwrap();
        assert!(payload.content.is_empty());
        assert!(DecodeAttempt::found(payload).found_payload().is_none());
    }

    #[test]
    fn test_parse_script() {
        let attempts = parse_script("A,EAN_13:123,-,!bad frame,");
        assert_eq!(attempts.len(), 5);
        assert_eq!(attempts[0].found_payload().unwrap().format, "UNKNOWN");
        assert_eq!(attempts[1].found_payload().unwrap().format, "EAN_13");
        assert_eq!(attempts[1].found_payload().unwrap().content, "123");
        assert!(attempts[2].is_not_found());
        assert_eq!(attempts[3], DecodeAttempt::error("bad frame"));
        assert!(attempts[4].found_payload().is_none());
        assert!(!attempts[4].is_not_found());
    }

    #[test]
    fn test_parse_empty_script() {
        assert!(parse_script("  ").is_empty());
    }
}
