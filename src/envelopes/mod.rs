//! Inbound event envelopes
//!
//! Two event shapes arrive through the CloudEvents endpoint:
//!
//! - `message.accepted`: a SenML pack forwarded by the IoT agent
//! - `function.updated`: a typed function state change
//!
//! Both decode into a [`SensorObservation`] or are rejected as a whole.

pub mod function_updated;
pub mod message_accepted;
pub mod senml;

pub use function_updated::{Function, FunctionUpdated, FUNCTION_UPDATED};
pub use message_accepted::{MessageAccepted, MESSAGE_ACCEPTED};

use crate::error::{RecError, Result};
use crate::observations::SensorObservation;

/// An envelope selected by its event type
#[derive(Debug, Clone)]
pub enum Envelope {
    MessageAccepted(MessageAccepted),
    FunctionUpdated(FunctionUpdated),
}

impl Envelope {
    /// Parse event data according to the event type.
    ///
    /// Unknown event types are a rejection; malformed JSON is invalid input.
    pub fn parse(event_type: &str, data: &[u8]) -> Result<Self> {
        match event_type {
            MESSAGE_ACCEPTED => {
                let envelope = serde_json::from_slice(data).map_err(|e| {
                    RecError::invalid_input(format!("failed to parse {MESSAGE_ACCEPTED}: {e}"))
                })?;
                Ok(Envelope::MessageAccepted(envelope))
            }
            FUNCTION_UPDATED => {
                let envelope = serde_json::from_slice(data).map_err(|e| {
                    RecError::invalid_input(format!("failed to parse {FUNCTION_UPDATED}: {e}"))
                })?;
                Ok(Envelope::FunctionUpdated(envelope))
            }
            other => Err(RecError::rejected(format!(
                "unsupported event type '{other}'"
            ))),
        }
    }

    /// Event type name this envelope was parsed from
    pub fn event_type(&self) -> &'static str {
        match self {
            Envelope::MessageAccepted(_) => MESSAGE_ACCEPTED,
            Envelope::FunctionUpdated(_) => FUNCTION_UPDATED,
        }
    }

    /// Map to observations. `None` means the envelope is rejected.
    pub fn map_to_observation(&self) -> Option<SensorObservation> {
        match self {
            Envelope::MessageAccepted(m) => m.map_to_observation(),
            Envelope::FunctionUpdated(f) => f.map_to_observation(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_event_type_is_rejected() {
        let err = Envelope::parse("device.created", b"{}").unwrap_err();
        assert!(matches!(err, RecError::Rejected(_)));
    }

    #[test]
    fn test_malformed_json_is_invalid_input() {
        let err = Envelope::parse(MESSAGE_ACCEPTED, b"{not json").unwrap_err();
        assert!(matches!(err, RecError::InvalidInput(_)));
    }

    #[test]
    fn test_event_type_round_trips() {
        let envelope = Envelope::parse(
            FUNCTION_UPDATED,
            br#"{"id":"f1","type":"presence","subType":"","presence":{"state":true}}"#,
        )
        .unwrap();
        assert_eq!(envelope.event_type(), FUNCTION_UPDATED);
        assert_eq!(envelope.map_to_observation().map(|so| so.len()), Some(1));
    }
}
