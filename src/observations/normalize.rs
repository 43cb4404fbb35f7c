//! Decimal precision rules for measurement values

use super::quantity::kinds;

/// Digits kept for temperatures
pub const TEMPERATURE_DIGITS: u32 = 1;

/// Digits kept for every other quantity
pub const DEFAULT_DIGITS: u32 = 2;

/// Round `value` to `digits` decimal places, half away from zero.
///
/// Absence is preserved: `None` stays `None`.
pub fn round(value: Option<f64>, digits: u32) -> Option<f64> {
    let value = value?;
    let unit = 10f64.powi(digits as i32);
    Some((value * unit).round() / unit)
}

/// Precision used for a given quantity kind
pub fn digits_for(quantity_kind: &str) -> u32 {
    if quantity_kind == kinds::TEMPERATURE {
        TEMPERATURE_DIGITS
    } else {
        DEFAULT_DIGITS
    }
}
