//! CloudEvents HTTP protocol binding (binary and structured content modes)

use crate::error::{RecError, Result};
use axum::http::{header, HeaderMap};
use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;
use serde_json::Value;

pub const STRUCTURED_CONTENT_TYPE: &str = "application/cloudevents+json";
pub const SUPPORTED_SPEC_VERSIONS: &[&str] = &["1.0", "0.3"];

const CE_SPECVERSION: &str = "ce-specversion";
const CE_TYPE: &str = "ce-type";
const CE_ID: &str = "ce-id";
const CE_SOURCE: &str = "ce-source";

/// The event attributes this service reads, plus the raw data
#[derive(Debug, Clone, PartialEq)]
pub struct CloudEvent {
    pub spec_version: String,
    pub event_type: String,
    pub id: String,
    pub source: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Deserialize)]
struct StructuredEvent {
    #[serde(default)]
    specversion: String,
    #[serde(rename = "type", default)]
    event_type: String,
    #[serde(default)]
    id: String,
    #[serde(default)]
    source: String,
    data: Option<Value>,
    data_base64: Option<String>,
}

impl CloudEvent {
    /// Read an event from an HTTP request. The content type selects the mode.
    pub fn from_request(headers: &HeaderMap, body: &[u8]) -> Result<Self> {
        let structured = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.trim_start().starts_with(STRUCTURED_CONTENT_TYPE));

        let event = if structured {
            Self::from_structured(body)?
        } else {
            Self::from_binary(headers, body)?
        };
        event.validate()?;
        Ok(event)
    }

    fn from_binary(headers: &HeaderMap, body: &[u8]) -> Result<Self> {
        let attribute = |name: &str| -> Result<String> {
            headers
                .get(name)
                .map(|v| {
                    v.to_str()
                        .map(str::to_string)
                        .map_err(|_| RecError::invalid_input(format!("header {name} is not valid text")))
                })
                .transpose()?
                .ok_or_else(|| RecError::invalid_input(format!("missing header {name}")))
        };

        Ok(Self {
            spec_version: attribute(CE_SPECVERSION)?,
            event_type: attribute(CE_TYPE)?,
            id: attribute(CE_ID)?,
            source: attribute(CE_SOURCE)?,
            data: body.to_vec(),
        })
    }

    fn from_structured(body: &[u8]) -> Result<Self> {
        let event: StructuredEvent = serde_json::from_slice(body)
            .map_err(|e| RecError::invalid_input(format!("malformed structured event: {e}")))?;

        let data = match (event.data, event.data_base64) {
            (Some(_), Some(_)) => {
                return Err(RecError::invalid_input(
                    "structured event carries both 'data' and 'data_base64'",
                ))
            }
            (_, Some(encoded)) => general_purpose::STANDARD
                .decode(encoded.trim())
                .map_err(|e| RecError::invalid_input(format!("invalid 'data_base64': {e}")))?,
            (None | Some(Value::Null), None) => Vec::new(),
            (Some(data), None) => serde_json::to_vec(&data)?,
        };

        Ok(Self {
            spec_version: event.specversion,
            event_type: event.event_type,
            id: event.id,
            source: event.source,
            data,
        })
    }

    fn validate(&self) -> Result<()> {
        if !SUPPORTED_SPEC_VERSIONS.contains(&self.spec_version.as_str()) {
            return Err(RecError::invalid_input(format!(
                "unsupported specversion '{}'",
                self.spec_version
            )));
        }

        for (name, value) in [("type", &self.event_type), ("id", &self.id), ("source", &self.source)] {
            if value.is_empty() {
                return Err(RecError::invalid_input(format!("attribute '{name}' is empty")));
            }
        }
        Ok(())
    }
}
