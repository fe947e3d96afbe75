//! Numeric marshaling between host integers/floats and script numbers
//!
//! Script numbers are doubles. Host 64-bit integers stay plain numbers while
//! they are exactly representable and become script BigInts past that. The
//! negative cutoff is `< -MAX_SAFE_INTEGER`, so `-MAX_SAFE_INTEGER` itself
//! stays a number, mirroring the positive side.

use qjsw_engine::ArgValue;

/// Largest integer a double represents exactly (2^53 - 1)
pub const MAX_SAFE_INTEGER: i64 = (1 << 53) - 1;

/// Whether `value` survives a round trip through a script number
pub fn is_safe_integer(value: i64) -> bool {
    !(value > MAX_SAFE_INTEGER || value < -MAX_SAFE_INTEGER)
}

/// Host `i64` to script value
pub fn long_to_arg(value: i64) -> ArgValue {
    if !is_safe_integer(value) {
        ArgValue::BigInt(value)
    } else if let Ok(small) = i32::try_from(value) {
        ArgValue::Int(small)
    } else {
        ArgValue::Float(value as f64)
    }
}

/// Script double to host number.
///
/// Integral doubles within `i64` range come back as `Long`, everything else
/// (fractions, NaN, infinities) as `Double`.
pub fn classify_double(value: f64) -> Number {
    // i64::MAX as f64 rounds up to 2^63, which is out of range
    if value.is_finite()
        && value.floor() == value
        && value >= i64::MIN as f64
        && value < i64::MAX as f64
    {
        Number::Long(value as i64)
    } else {
        Number::Double(value)
    }
}

/// Host-side number shapes
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Long(i64),
    Double(f64),
}
