//! `message.accepted` envelopes
//!
//! Record 0 of the pack carries the sensor id (`vs`), the base time (`bt`)
//! and the LwM2M object URN (`bn`). Record 1 carries the measured value and
//! the resource name used to disambiguate the object.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::senml::SenmlPack;
use crate::observations::{
    normalize::{digits_for, round},
    quantity::map_quantity_kind,
    Observation, SensorObservation,
};

/// CloudEvents type of this envelope
pub const MESSAGE_ACCEPTED: &str = "message.accepted";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageAccepted {
    /// Device the pack came from; becomes the batch's device id
    #[serde(rename = "sensorID", default)]
    pub sensor_id: String,
    #[serde(default)]
    pub pack: SenmlPack,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl MessageAccepted {
    /// Map the pack to a single observation.
    ///
    /// Returns `None` when the pack has fewer than two records or when the
    /// sensor id or quantity kind resolves to an empty string.
    pub fn map_to_observation(&self) -> Option<SensorObservation> {
        let [head, measurement, ..] = self.pack.as_slice() else {
            debug!("pack for {} has {} records, need 2", self.sensor_id, self.pack.len());
            return None;
        };

        let sensor_id = head.string_value();
        let quantity_kind = map_quantity_kind(head.base_name(), measurement.name());
        if sensor_id.is_empty() || quantity_kind.is_empty() {
            debug!(
                "rejecting pack for {}: sensor id or quantity kind is empty",
                self.sensor_id
            );
            return None;
        }

        let observation_time = map_time(head.base_time.unwrap_or_default())?;
        let value = round(measurement.value, digits_for(&quantity_kind));
        let value_string = measurement
            .string_value
            .clone()
            .filter(|vs| !vs.is_empty());

        let observation = Observation::new(sensor_id, quantity_kind, observation_time)
            .with_value(value)
            .with_value_string(value_string)
            .with_value_boolean(measurement.bool_value);

        Some(SensorObservation::new(self.sensor_id.clone()).with_observation(observation))
    }
}

/// Epoch seconds to UTC, truncating fractional seconds
fn map_time(base_time: f64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(base_time as i64, 0)
}
