// Frame decoding
//
// Turns the opaque payload of a raw frame into a typed key → scalar map.
// A payload that is not a JSON object is a malformed frame; the poll loop
// logs it and keeps polling rather than aborting.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use thiserror::Error;
use tracing::trace;

use thinqpoll_api::RawFrame;

/// A raw scalar value as reported by the device: a string or an integer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Str(String),
    Int(i64),
}

impl FieldValue {
    /// The value as an integer, parsing string digits the way the
    /// merge rules need (`"5"` → 5).
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Str(s) => s.trim().parse().ok(),
        }
    }

    /// The value as an enum raw code for catalog option lookup.
    /// Integer codes are matched against string option keys.
    pub fn as_code(&self) -> String {
        match self {
            Self::Int(n) => n.to_string(),
            Self::Str(s) => s.clone(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Int(n) => write!(f, "{n}"),
        }
    }
}

/// Result of one successful decode of one raw frame.
pub type DecodedFrame = BTreeMap<String, FieldValue>;

/// The payload could not be parsed against the expected schema.
#[derive(Debug, Error)]
#[error("malformed frame: {reason}")]
pub struct DecodeError {
    pub reason: String,
}

/// Decode a raw frame's payload into a key → scalar map.
///
/// The payload must be a JSON object. String values and integer numbers
/// are kept; entries of any other shape are skipped -- the device mixes
/// nested diagnostics blobs into status frames and the pipeline only
/// interprets scalars.
pub fn decode_frame(frame: &RawFrame) -> Result<DecodedFrame, DecodeError> {
    let value: serde_json::Value =
        serde_json::from_slice(&frame.payload).map_err(|e| DecodeError {
            reason: format!("payload is not JSON: {e}"),
        })?;

    let serde_json::Value::Object(object) = value else {
        return Err(DecodeError {
            reason: "payload is not a JSON object".into(),
        });
    };

    let mut decoded = DecodedFrame::new();
    for (key, value) in object {
        match value {
            serde_json::Value::String(s) => {
                decoded.insert(key, FieldValue::Str(s));
            }
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => {
                    decoded.insert(key, FieldValue::Int(i));
                }
                None => trace!(key, "skipping non-integer numeric field"),
            },
            _ => trace!(key, "skipping non-scalar field"),
        }
    }

    Ok(decoded)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use chrono::Utc;

    use super::*;

    fn frame(payload: &[u8]) -> RawFrame {
        RawFrame {
            payload: payload.to_vec(),
            received_at: Utc::now(),
        }
    }

    #[test]
    fn decodes_scalar_fields() {
        let decoded =
            decode_frame(&frame(br#"{"Power": 2, "State": "Drying", "Extra": [1, 2]}"#)).unwrap();

        assert_eq!(decoded.get("Power"), Some(&FieldValue::Int(2)));
        assert_eq!(
            decoded.get("State"),
            Some(&FieldValue::Str("Drying".into()))
        );
        assert!(!decoded.contains_key("Extra"));
    }

    #[test]
    fn empty_object_decodes_to_empty_frame() {
        let decoded = decode_frame(&frame(b"{}")).unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn non_json_payload_is_malformed() {
        assert!(decode_frame(&frame(b"\x00\x01garbage")).is_err());
    }

    #[test]
    fn non_object_payload_is_malformed() {
        assert!(decode_frame(&frame(b"[1, 2, 3]")).is_err());
    }

    #[test]
    fn field_value_integer_parsing() {
        assert_eq!(FieldValue::Int(7).as_i64(), Some(7));
        assert_eq!(FieldValue::Str("30".into()).as_i64(), Some(30));
        assert_eq!(FieldValue::Str(" 5 ".into()).as_i64(), Some(5));
        assert_eq!(FieldValue::Str("cotton".into()).as_i64(), None);
    }
}
