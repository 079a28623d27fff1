//! Temperature scales and the conversion arithmetic
//!
//! Both directions use truncating integer division, so a Fahrenheit value
//! converted to Celsius and back does not in general return the starting
//! value: `(100 - 32) * 5 / 9 = 37`, but `37 * 9 / 5 + 32 = 98`.

use serde::Serialize;

/// Scale named by the unit byte of a token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Unit {
    Fahrenheit,
    Celsius,
}

impl Unit {
    /// Map a unit byte onto a scale. Only upper-case `F` and `C` are recognized.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'F' => Some(Unit::Fahrenheit),
            b'C' => Some(Unit::Celsius),
            _ => None,
        }
    }

    /// Scale a value in this unit converts into
    pub fn target(self) -> Self {
        match self {
            Unit::Fahrenheit => Unit::Celsius,
            Unit::Celsius => Unit::Fahrenheit,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Unit::Fahrenheit => "Fahrenheit",
            Unit::Celsius => "Celsius",
        }
    }

    /// Convert `value`, given in this unit, into the other scale
    pub fn convert(self, value: i64) -> i64 {
        match self {
            Unit::Fahrenheit => fahrenheit_to_celsius(value),
            Unit::Celsius => celsius_to_fahrenheit(value),
        }
    }
}

/// `(f - 32) * 5 / 9`, truncating toward zero
pub fn fahrenheit_to_celsius(f: i64) -> i64 {
    (f - 32) * 5 / 9
}

/// `c * 9 / 5 + 32`, truncating toward zero before the offset is added
pub fn celsius_to_fahrenheit(c: i64) -> i64 {
    (c * 9) / 5 + 32
}
