//! RealEstateCore entities (spaces, buildings, sensors)
//!
//! Entities are JSON-LD documents. A child points at its parent through
//! `isPartOf`; the store keeps that link in a separate relation table.

use serde::{Deserialize, Serialize};

pub const SPACE_CONTEXT: &str = "https://dev.realestatecore.io/contexts/Space.jsonld";
pub const SPACE_TYPE: &str = "dtmi:org:w3id:rec:Space;1";
pub const SPACE_TYPE_NAME: &str = "space";
pub const BUILDING_CONTEXT: &str = "https://dev.realestatecore.io/contexts/Building.jsonld";
pub const BUILDING_TYPE: &str = "dtmi:org:w3id:rec:Building;1";
pub const BUILDING_TYPE_NAME: &str = "building";
pub const SENSOR_CONTEXT: &str = "https://dev.realestatecore.io/contexts/Sensor.jsonld";
pub const SENSOR_TYPE: &str = "dtmi:org:brickschema:schema:Brick:Sensor;1";
pub const SENSOR_TYPE_NAME: &str = "sensor";
pub const OBSERVATION_EVENT_CONTEXT: &str =
    "https://dev.realestatecore.io/contexts/ObservationEvent.jsonld";
pub const OBSERVATION_EVENT_TYPE: &str = "dtmi:org:w3id:rec:ObservationEvent;1";
pub const OBSERVATION_EVENT_TYPE_NAME: &str = "observationevent";

/// Reference to another entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@type")]
    pub entity_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(rename = "@context", default)]
    pub context: String,
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@type")]
    pub entity_type: String,
    #[serde(rename = "isPartOf", default, skip_serializing_if = "Option::is_none")]
    pub is_part_of: Option<Property>,
}

impl Entity {
    pub fn new(
        context: impl Into<String>,
        id: impl Into<String>,
        entity_type: impl Into<String>,
    ) -> Self {
        Self {
            context: context.into(),
            id: id.into(),
            entity_type: entity_type.into(),
            is_part_of: None,
        }
    }

    pub fn space(id: impl Into<String>) -> Self {
        Self::new(SPACE_CONTEXT, id, SPACE_TYPE)
    }

    pub fn building(id: impl Into<String>) -> Self {
        Self::new(BUILDING_CONTEXT, id, BUILDING_TYPE)
    }

    pub fn sensor(id: impl Into<String>) -> Self {
        Self::new(SENSOR_CONTEXT, id, SENSOR_TYPE)
    }

    /// Builder-style parent link
    pub fn part_of(mut self, id: impl Into<String>, entity_type: impl Into<String>) -> Self {
        self.is_part_of = Some(Property {
            id: id.into(),
            entity_type: entity_type.into(),
        });
        self
    }

    /// Reference to this entity, for use as another entity's parent
    pub fn as_property(&self) -> Property {
        Property {
            id: self.id.clone(),
            entity_type: self.entity_type.clone(),
        }
    }
}

/// Resolve a short type name (`space`, `building`, ...) to its type IRI.
pub fn type_from_type_name(type_name: &str) -> Option<&'static str> {
    match type_name.to_lowercase().as_str() {
        SPACE_TYPE_NAME => Some(SPACE_TYPE),
        BUILDING_TYPE_NAME => Some(BUILDING_TYPE),
        SENSOR_TYPE_NAME => Some(SENSOR_TYPE),
        OBSERVATION_EVENT_TYPE_NAME => Some(OBSERVATION_EVENT_TYPE),
        _ => None,
    }
}
