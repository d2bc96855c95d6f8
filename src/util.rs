use crate::{Error, Result};

/// Round to the nearest integer, with ties going to the even neighbor.
pub fn round_half_even(v: f64) -> f64 {
    let rounded = v.round();
    if (v - v.trunc()).abs() == 0.5 && rounded % 2.0 != 0.0 {
        rounded - v.signum()
    } else {
        rounded
    }
}

/// Convert a rounded value into a font unit field.
pub fn to_i16(v: f64) -> Result<i16> {
    if v.is_finite() && v >= f64::from(i16::MIN) && v <= f64::from(i16::MAX) {
        Ok(v as i16)
    } else {
        Err(Error::Overflow)
    }
}
