use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Classifier verdict for one file, as cached and as consumed by plan
/// building. The record is closed: known fields are typed, anything a newer
/// model emits lands in `extra` and survives a cache round-trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_name: Option<String>,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub reasoning: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Classification {
    pub fn new(category: impl Into<String>, confidence: f32) -> Self {
        Self {
            category: category.into(),
            suggested_name: None,
            confidence: confidence.clamp(0.0, 1.0),
            reasoning: String::new(),
            extra: BTreeMap::new(),
        }
    }

    /// Confidence clamped into [0, 1]; classifier output is untrusted.
    pub fn confidence_clamped(&self) -> f32 {
        if self.confidence.is_nan() {
            0.0
        } else {
            self.confidence.clamp(0.0, 1.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_clamps_confidence() {
        assert_eq!(Classification::new("docs", 1.7).confidence, 1.0);
        assert_eq!(Classification::new("docs", -0.2).confidence, 0.0);
    }

    #[test]
    fn test_extra_fields_round_trip() {
        let raw = r#"{"category":"invoices","confidence":0.9,"vendor":"acme"}"#;
        let parsed: Classification = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.category, "invoices");
        assert_eq!(parsed.extra["vendor"], serde_json::json!("acme"));

        let back = serde_json::to_value(&parsed).unwrap();
        assert_eq!(back["vendor"], serde_json::json!("acme"));
    }

    #[test]
    fn test_nan_confidence_reads_as_zero() {
        let mut c = Classification::new("x", 0.5);
        c.confidence = f32::NAN;
        assert_eq!(c.confidence_clamped(), 0.0);
    }
}
