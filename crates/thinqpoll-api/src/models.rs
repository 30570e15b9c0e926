// API response types
//
// Models for the appliance cloud's JSON API. Every response is wrapped in
// the `Envelope<T>` shape. Field descriptors use the service's model-info
// format: each entry is `{"type": "Enum"|"Range", "option": {...}}`.

use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::trace;

// ── Response envelope ────────────────────────────────────────────────

/// Standard service response envelope.
///
/// Every endpoint wraps its payload:
/// ```json
/// { "resultCode": "0000", "result": {...} }
/// ```
/// `resultCode` `"0000"` means success; `"0102"` means the access token
/// is stale.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    #[serde(rename = "resultCode")]
    pub result_code: String,
    #[serde(default = "Option::default", rename = "result")]
    pub result: Option<T>,
    #[serde(default, rename = "resultMessage")]
    pub result_message: Option<String>,
}

/// Result code indicating success.
pub(crate) const RC_OK: &str = "0000";
/// Result code for a stale access token.
pub(crate) const RC_NOT_LOGGED_IN: &str = "0102";
/// Result code from the monitor endpoint when no frame is ready yet.
pub(crate) const RC_NO_DATA: &str = "0106";

// ── Device ───────────────────────────────────────────────────────────

/// Device identity as reported by the device endpoint.
///
/// Fetched once per run; the identity fields become measurement tags.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceDescriptor {
    #[serde(rename = "deviceId")]
    pub device_id: String,
    #[serde(rename = "modelId")]
    pub model_id: String,
    #[serde(default, rename = "alias")]
    pub name: String,
    #[serde(default, rename = "type")]
    pub device_type: String,
}

// ── Model catalog ────────────────────────────────────────────────────

/// How a decoded field's raw value is to be interpreted.
///
/// An explicit tagged union matched exhaustively by the normalizer --
/// adding a third descriptor kind is a compile-time-checked change.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueDescriptor {
    /// Raw code → human label mapping. Codes are kept as strings because
    /// the service emits them both quoted and bare.
    Enum(BTreeMap<String, String>),
    /// Bounded numeric value. The bounds are opaque to the pipeline and
    /// passed through unchanged.
    Range(serde_json::Value),
}

/// Per-device-model table mapping field keys to their value descriptor.
///
/// Keys not present in the catalog are unrecognized fields and are
/// silently dropped by the normalizer.
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    descriptors: BTreeMap<String, ValueDescriptor>,
}

/// Raw model-info entry before descriptor-kind filtering.
#[derive(Debug, Deserialize)]
struct RawValueEntry {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    option: serde_json::Value,
}

/// Wire shape of the model-info endpoint: the `Value` section carries the
/// field descriptor table; the rest of the document is ignored.
#[derive(Debug, Deserialize)]
pub(crate) struct ModelInfoDocument {
    #[serde(default, rename = "Value")]
    value: BTreeMap<String, RawValueEntry>,
}

impl ModelCatalog {
    /// Look up the descriptor for a field key.
    pub fn descriptor(&self, key: &str) -> Option<&ValueDescriptor> {
        self.descriptors.get(key)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Build a catalog directly from key/descriptor pairs.
    pub fn from_descriptors(
        entries: impl IntoIterator<Item = (String, ValueDescriptor)>,
    ) -> Self {
        Self {
            descriptors: entries.into_iter().collect(),
        }
    }
}

impl From<ModelInfoDocument> for ModelCatalog {
    /// Entries of descriptor kinds the pipeline does not interpret
    /// (`Reference`, `Bit`, ...) are dropped here, so the normalizer sees
    /// them as unrecognized fields.
    fn from(doc: ModelInfoDocument) -> Self {
        let mut descriptors = BTreeMap::new();
        for (key, entry) in doc.value {
            let descriptor = match entry.kind.as_str() {
                "Enum" => {
                    let options: BTreeMap<String, String> =
                        match serde_json::from_value(entry.option) {
                            Ok(map) => map,
                            Err(e) => {
                                trace!(key, error = %e, "unusable enum options, dropping field");
                                continue;
                            }
                        };
                    ValueDescriptor::Enum(options)
                }
                "Range" => ValueDescriptor::Range(entry.option),
                other => {
                    trace!(key, kind = other, "unsupported descriptor kind, dropping field");
                    continue;
                }
            };
            descriptors.insert(key, descriptor);
        }
        Self { descriptors }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn catalog_parses_enum_and_range_entries() {
        let doc: ModelInfoDocument = serde_json::from_value(serde_json::json!({
            "Value": {
                "Power": { "type": "Enum", "option": { "0": "-", "2": "On" } },
                "Remain_Time_H": { "type": "Range", "option": { "min": 0, "max": 24 } },
            }
        }))
        .unwrap();

        let catalog = ModelCatalog::from(doc);
        assert_eq!(catalog.len(), 2);
        assert!(matches!(
            catalog.descriptor("Power"),
            Some(ValueDescriptor::Enum(_))
        ));
        assert!(matches!(
            catalog.descriptor("Remain_Time_H"),
            Some(ValueDescriptor::Range(_))
        ));
    }

    #[test]
    fn catalog_drops_unsupported_descriptor_kinds() {
        let doc: ModelInfoDocument = serde_json::from_value(serde_json::json!({
            "Value": {
                "Course": { "type": "Reference", "option": ["Course"] },
                "Power": { "type": "Enum", "option": { "2": "On" } },
            }
        }))
        .unwrap();

        let catalog = ModelCatalog::from(doc);
        assert!(catalog.descriptor("Course").is_none());
        assert!(catalog.descriptor("Power").is_some());
    }
}
