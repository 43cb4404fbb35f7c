//! Canonical observation records
//!
//! Everything the ingestion pipeline produces ends up as a [`SensorObservation`]:
//! a batch of [`Observation`]s sharing one device id. The JSON field names are
//! the wire contract for both the REST API and the store.
//!
//! - [`quantity`] maps vendor measurement codes to quantity kinds
//! - [`normalize`] rounds measurement values
//! - [`dedup`] decides whether a candidate is stored or suppressed

pub mod dedup;
pub mod normalize;
pub mod quantity;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Schema-version tag carried on every batch produced by the decoders
pub const OBSERVATION_FORMAT: &str = "rec3.1.1";

/// A batch of observations reported by one device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorObservation {
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub device_id: String,
    #[serde(default)]
    pub observations: Vec<Observation>,
}

impl SensorObservation {
    /// Create an empty batch for a device in the canonical format
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            format: OBSERVATION_FORMAT.to_string(),
            device_id: device_id.into(),
            observations: Vec::new(),
        }
    }

    /// Builder-style push
    pub fn with_observation(mut self, observation: Observation) -> Self {
        self.observations.push(observation);
        self
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

/// One canonical time-series record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Observation {
    /// When the physical measurement happened, not when it was received
    pub observation_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_string: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_boolean: Option<bool>,
    pub quantity_kind: String,
    #[serde(default)]
    pub sensor_id: String,
}

impl Observation {
    /// Create an observation without any value fields set
    pub fn new(
        sensor_id: impl Into<String>,
        quantity_kind: impl Into<String>,
        observation_time: DateTime<Utc>,
    ) -> Self {
        Self {
            observation_time,
            value: None,
            value_string: None,
            value_boolean: None,
            quantity_kind: quantity_kind.into(),
            sensor_id: sensor_id.into(),
        }
    }

    pub fn with_value(mut self, value: Option<f64>) -> Self {
        self.value = value;
        self
    }

    pub fn with_value_string(mut self, value_string: Option<String>) -> Self {
        self.value_string = value_string;
        self
    }

    pub fn with_value_boolean(mut self, value_boolean: Option<bool>) -> Self {
        self.value_boolean = value_boolean;
        self
    }

    /// The value triple compared by the deduplication gate
    pub fn observed_value(&self) -> ObservedValue {
        ObservedValue {
            value: self.value,
            value_string: self.value_string.clone(),
            value_boolean: self.value_boolean,
        }
    }
}

/// The (value, valueString, valueBoolean) triple of a stored observation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservedValue {
    pub value: Option<f64>,
    pub value_string: Option<String>,
    pub value_boolean: Option<bool>,
}
