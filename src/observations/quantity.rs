//! Vendor measurement code to quantity kind mapping
//!
//! Vendor codes are LwM2M object URNs (`urn:oma:lwm2m:ext:<object id>`).
//! Codes without an entry are passed through unchanged so that new sensor
//! types are still stored, just under their raw code.

/// Prefix shared by all LwM2M object URNs
pub const LWM2M_PREFIX: &str = "urn:oma:lwm2m:ext:";

pub const AIR_QUALITY: &str = "urn:oma:lwm2m:ext:3428";
pub const CONDUCTIVITY: &str = "urn:oma:lwm2m:ext:3327";
pub const DIGITAL_INPUT: &str = "urn:oma:lwm2m:ext:3200";
pub const DISTANCE: &str = "urn:oma:lwm2m:ext:3330";
pub const ENERGY: &str = "urn:oma:lwm2m:ext:3331";
pub const HUMIDITY: &str = "urn:oma:lwm2m:ext:3304";
pub const ILLUMINANCE: &str = "urn:oma:lwm2m:ext:3301";
pub const POWER: &str = "urn:oma:lwm2m:ext:3328";
pub const PRESENCE: &str = "urn:oma:lwm2m:ext:3302";
pub const PRESSURE: &str = "urn:oma:lwm2m:ext:3323";
pub const TEMPERATURE: &str = "urn:oma:lwm2m:ext:3303";
pub const WATERMETER: &str = "urn:oma:lwm2m:ext:3424";

/// Resource name under the air quality object that carries a concentration
pub const CONCENTRATION_RESOURCE: &str = "17";

/// Quantity kinds used by the decoders
pub mod kinds {
    pub const CONCENTRATION: &str = "Concentration";
    pub const AIR_QUALITY: &str = "diwise:AirQuality";
    pub const ENERGY: &str = "Energy";
    pub const POWER: &str = "Power";
    pub const TEMPERATURE: &str = "Temperature";
    pub const LEVEL: &str = "diwise:Level";
    pub const PRESENCE: &str = "diwise:Presence";
    pub const LIFEBUOY: &str = "diwise:Lifebuoy";
    pub const TIMER: &str = "diwise:Timer";
}

/// Fixed code table. The air quality object is handled separately because
/// its kind depends on the resource name.
static QUANTITY_KINDS: &[(&str, &str)] = &[
    (CONDUCTIVITY, "Conductivity"),
    (DIGITAL_INPUT, "diwise:DigitalInput"),
    (DISTANCE, "Distance"),
    (ENERGY, kinds::ENERGY),
    (POWER, kinds::POWER),
    (PRESENCE, kinds::PRESENCE),
    (PRESSURE, "Pressure"),
    (TEMPERATURE, kinds::TEMPERATURE),
    (WATERMETER, "Volume"),
    (HUMIDITY, "RelativeHumidity"),
    (ILLUMINANCE, "Illuminance"),
];

/// Translate a vendor code into a canonical quantity kind.
///
/// Matching is case-insensitive. `disambiguator` only matters for the air
/// quality object. Unknown codes are returned as given.
pub fn map_quantity_kind(vendor_code: &str, disambiguator: &str) -> String {
    if vendor_code.eq_ignore_ascii_case(AIR_QUALITY) {
        return if disambiguator == CONCENTRATION_RESOURCE {
            kinds::CONCENTRATION.to_string()
        } else {
            kinds::AIR_QUALITY.to_string()
        };
    }

    QUANTITY_KINDS
        .iter()
        .find(|(code, _)| vendor_code.eq_ignore_ascii_case(code))
        .map(|(_, kind)| (*kind).to_string())
        .unwrap_or_else(|| vendor_code.to_string())
}
