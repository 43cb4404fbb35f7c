//! `function.updated` envelopes
//!
//! On the wire the payload is one of several optional members named after
//! the `type` tag. Deserialization folds the tag and its member into a single
//! [`Function`] variant, so a tag without its payload never reaches the
//! decoder.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::observations::{
    normalize::{round, TEMPERATURE_DIGITS},
    quantity::kinds,
    Observation, SensorObservation,
};

/// CloudEvents type of this envelope
pub const FUNCTION_UPDATED: &str = "function.updated";

/// Sub-type that turns a presence function into a lifebuoy
pub const LIFEBUOY_SUBTYPE: &str = "lifebuoy";

const NANOS_PER_SECOND: f64 = 1_000_000_000.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Building {
    #[serde(default)]
    pub energy: f64,
    #[serde(default)]
    pub power: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Counter {
    #[serde(default)]
    pub counter: i64,
    #[serde(default)]
    pub state: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Level {
    #[serde(default)]
    pub current: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Presence {
    #[serde(default)]
    pub state: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Elapsed time in nanoseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    #[serde(default)]
    pub state: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterQuality {
    #[serde(default)]
    pub temperature: f64,
    pub timestamp: DateTime<Utc>,
}

/// Function payload keyed by the `type` tag
#[derive(Debug, Clone, PartialEq)]
pub enum Function {
    Building(Building),
    Counter(Counter),
    Level(Level),
    Presence(Presence),
    Timer(Timer),
    WaterQuality(WaterQuality),
    /// A tag this service does not store observations for
    Unsupported(String),
}

impl Function {
    /// The `type` tag of this payload
    pub fn type_name(&self) -> &str {
        match self {
            Function::Building(_) => "building",
            Function::Counter(_) => "counter",
            Function::Level(_) => "level",
            Function::Presence(_) => "presence",
            Function::Timer(_) => "timer",
            Function::WaterQuality(_) => "waterquality",
            Function::Unsupported(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "FunctionUpdatedWire")]
pub struct FunctionUpdated {
    pub id: String,
    pub sub_type: String,
    pub function: Function,
}

impl FunctionUpdated {
    pub fn new(id: impl Into<String>, sub_type: impl Into<String>, function: Function) -> Self {
        Self {
            id: id.into(),
            sub_type: sub_type.into(),
            function,
        }
    }

    /// `type:subType:id`, shared by every observation of the envelope
    pub fn device_id(&self) -> String {
        format!("{}:{}:{}", self.function.type_name(), self.sub_type, self.id)
    }

    /// Map to observations using the current time for wall-clock variants
    pub fn map_to_observation(&self) -> Option<SensorObservation> {
        self.map_to_observation_at(Utc::now())
    }

    /// Map to observations with `now` as the time of wall-clock variants.
    ///
    /// Returns `None` for unsupported types and for timers that have not
    /// reported both an end time and a duration.
    pub fn map_to_observation_at(&self, now: DateTime<Utc>) -> Option<SensorObservation> {
        let id = self.id.as_str();
        let batch = SensorObservation::new(self.device_id());

        let batch = match &self.function {
            Function::Building(b) => batch
                .with_observation(Observation::new(id, kinds::ENERGY, now).with_value(Some(b.energy)))
                .with_observation(Observation::new(id, kinds::POWER, now).with_value(Some(b.power))),
            Function::Counter(c) => batch.with_observation(
                Observation::new(id, kinds::LEVEL, now)
                    .with_value(Some(c.counter as f64))
                    .with_value_boolean(Some(c.state)),
            ),
            Function::Level(l) => batch
                .with_observation(Observation::new(id, kinds::LEVEL, now).with_value(Some(l.current))),
            Function::Presence(p) => {
                let kind = if self.sub_type == LIFEBUOY_SUBTYPE {
                    kinds::LIFEBUOY
                } else {
                    kinds::PRESENCE
                };
                batch.with_observation(
                    Observation::new(id, kind, now).with_value_boolean(Some(p.state)),
                )
            }
            Function::Timer(t) => {
                let (Some(end_time), Some(duration)) = (t.end_time, t.duration) else {
                    debug!("timer {} has no end time or duration yet", self.id);
                    return None;
                };
                batch.with_observation(
                    Observation::new(id, kinds::TIMER, end_time)
                        .with_value(Some(duration as f64 / NANOS_PER_SECOND))
                        .with_value_boolean(Some(t.state)),
                )
            }
            Function::WaterQuality(w) => batch.with_observation(
                Observation::new(id, kinds::TEMPERATURE, w.timestamp)
                    .with_value(round(Some(w.temperature), TEMPERATURE_DIGITS)),
            ),
            Function::Unsupported(name) => {
                debug!("function type '{}' is not stored", name);
                return None;
            }
        };

        Some(batch)
    }
}

/// Wire shape: one optional member per function type
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FunctionUpdatedWire {
    #[serde(default)]
    id: String,
    #[serde(rename = "type", default)]
    function_type: String,
    #[serde(default)]
    sub_type: String,
    building: Option<Building>,
    counter: Option<Counter>,
    level: Option<Level>,
    presence: Option<Presence>,
    timer: Option<Timer>,
    #[serde(rename = "waterquality")]
    water_quality: Option<WaterQuality>,
}

impl TryFrom<FunctionUpdatedWire> for FunctionUpdated {
    type Error = String;

    fn try_from(wire: FunctionUpdatedWire) -> Result<Self, Self::Error> {
        fn payload<T>(member: Option<T>, type_name: &str) -> Result<T, String> {
            member.ok_or_else(|| format!("function of type '{type_name}' has no '{type_name}' member"))
        }

        let t = wire.function_type.as_str();
        let function = match t {
            "building" => Function::Building(payload(wire.building, t)?),
            "counter" => Function::Counter(payload(wire.counter, t)?),
            "level" => Function::Level(payload(wire.level, t)?),
            "presence" => Function::Presence(payload(wire.presence, t)?),
            "timer" => Function::Timer(payload(wire.timer, t)?),
            "waterquality" => Function::WaterQuality(payload(wire.water_quality, t)?),
            _ => Function::Unsupported(wire.function_type.clone()),
        };

        Ok(FunctionUpdated {
            id: wire.id,
            sub_type: wire.sub_type,
            function,
        })
    }
}
