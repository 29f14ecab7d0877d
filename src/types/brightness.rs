// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Brightness type for dimmer modules.
//!
//! Dimming-level attributes on the backend take a percentage target value.
//! This type keeps outbound values inside the 0-100 range.

use std::fmt;

use crate::error::ValueError;

/// Brightness level as a percentage (0-100).
///
/// # Examples
///
/// ```
/// use coviva_lib::types::Brightness;
///
/// let level = Brightness::new(75).unwrap();
/// assert_eq!(level.value(), 75);
///
/// assert_eq!(Brightness::MAX.value(), 100);
/// assert!(Brightness::new(101).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Brightness(u8);

impl Brightness {
    /// Minimum brightness (0%).
    pub const MIN: Self = Self(0);

    /// Maximum brightness (100%).
    pub const MAX: Self = Self(100);

    /// Creates a new brightness value.
    ///
    /// # Errors
    ///
    /// Returns `ValueError::OutOfRange` if value exceeds 100.
    pub fn new(value: u8) -> Result<Self, ValueError> {
        if value > 100 {
            return Err(ValueError::OutOfRange {
                min: 0,
                max: 100,
                actual: u16::from(value),
            });
        }
        Ok(Self(value))
    }

    /// Creates a brightness value, clamping to the valid range.
    #[must_use]
    pub const fn clamped(value: u8) -> Self {
        if value > 100 { Self(100) } else { Self(value) }
    }

    /// Converts a raw attribute value reported by the backend.
    ///
    /// Values are rounded and clamped into 0-100; NaN maps to 0.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_attribute_value(value: f64) -> Self {
        if value.is_nan() {
            return Self::MIN;
        }
        // Clamped first, so the cast cannot truncate.
        Self(value.round().clamp(0.0, 100.0) as u8)
    }

    /// Returns the brightness percentage value.
    #[must_use]
    pub const fn value(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for Brightness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

impl TryFrom<u8> for Brightness {
    type Error = ValueError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Brightness> for f64 {
    fn from(value: Brightness) -> Self {
        f64::from(value.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brightness_valid_values() {
        for v in 0..=100 {
            assert_eq!(Brightness::new(v).unwrap().value(), v);
        }
    }

    #[test]
    fn brightness_invalid_value() {
        assert_eq!(
            Brightness::new(101),
            Err(ValueError::OutOfRange {
                min: 0,
                max: 100,
                actual: 101
            })
        );
    }

    #[test]
    fn brightness_clamped() {
        assert_eq!(Brightness::clamped(50).value(), 50);
        assert_eq!(Brightness::clamped(255).value(), 100);
    }

    #[test]
    fn brightness_from_attribute_value() {
        assert_eq!(Brightness::from_attribute_value(42.4).value(), 42);
        assert_eq!(Brightness::from_attribute_value(-3.0).value(), 0);
        assert_eq!(Brightness::from_attribute_value(180.0).value(), 100);
        assert_eq!(Brightness::from_attribute_value(f64::NAN).value(), 0);
    }

    #[test]
    fn brightness_display() {
        assert_eq!(Brightness::new(75).unwrap().to_string(), "75%");
    }
}
