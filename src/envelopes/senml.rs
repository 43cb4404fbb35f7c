//! SenML (RFC 8428) JSON records
//!
//! Only the labels the decoders look at are modelled. Unknown labels are
//! ignored when deserializing.

use serde::{Deserialize, Serialize};

/// One SenML record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SenmlRecord {
    /// Base name
    #[serde(rename = "bn", default, skip_serializing_if = "Option::is_none")]
    pub base_name: Option<String>,
    /// Base time, seconds since the epoch
    #[serde(rename = "bt", default, skip_serializing_if = "Option::is_none")]
    pub base_time: Option<f64>,
    /// Base unit
    #[serde(rename = "bu", default, skip_serializing_if = "Option::is_none")]
    pub base_unit: Option<String>,
    /// Name
    #[serde(rename = "n", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Unit
    #[serde(rename = "u", default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Numeric value
    #[serde(rename = "v", default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    /// String value
    #[serde(rename = "vs", default, skip_serializing_if = "Option::is_none")]
    pub string_value: Option<String>,
    /// Boolean value
    #[serde(rename = "vb", default, skip_serializing_if = "Option::is_none")]
    pub bool_value: Option<bool>,
    /// Time relative to the base time
    #[serde(rename = "t", default, skip_serializing_if = "Option::is_none")]
    pub time: Option<f64>,
}

impl SenmlRecord {
    pub fn base_name(&self) -> &str {
        self.base_name.as_deref().unwrap_or_default()
    }

    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_default()
    }

    pub fn string_value(&self) -> &str {
        self.string_value.as_deref().unwrap_or_default()
    }
}

/// An ordered list of records
pub type SenmlPack = Vec<SenmlRecord>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_labels() {
        let pack: SenmlPack = serde_json::from_str(
            r#"[{"bn":"urn:oma:lwm2m:ext:3303","bt":1700000000,"n":"0","vs":"S1"},
                {"n":"5700","v":21.5,"u":"Cel"}]"#,
        )
        .unwrap();

        assert_eq!(pack.len(), 2);
        assert_eq!(pack[0].base_name(), "urn:oma:lwm2m:ext:3303");
        assert_eq!(pack[0].base_time, Some(1_700_000_000.0));
        assert_eq!(pack[0].string_value(), "S1");
        assert_eq!(pack[1].name(), "5700");
        assert_eq!(pack[1].value, Some(21.5));
        assert_eq!(pack[1].string_value(), "");
    }
}
