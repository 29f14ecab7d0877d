// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Capability descriptors ("profiles") of backend nodes.
//!
//! Every node carries an integer profile identifying the kind of physical
//! device it represents. The client only interprets a small set of them;
//! everything else is passed through as opaque data.
//!
//! # Examples
//!
//! ```
//! use coviva_lib::{AccessoryCategory, Profile};
//!
//! let dimmer = Profile::DIMMER;
//! assert!(dimmer.is_supported());
//! assert!(dimmer.supports_brightness());
//! assert_eq!(dimmer.name(), "Coviva Dimmer Module");
//! assert_eq!(dimmer.accessory_category(), Some(AccessoryCategory::DimmableLight));
//!
//! assert!(Profile::ON_OFF_MODULE.supports_brightness());
//!
//! let base = Profile::BASE_STATION;
//! assert!(!base.is_supported());
//! assert!(!base.supports_brightness());
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Capability descriptor of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Profile(pub u32);

/// Accessory category a supported profile maps to on the host side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessoryCategory {
    /// Plain on/off light.
    Light,
    /// Light with brightness control.
    DimmableLight,
}

impl Profile {
    /// The base station itself.
    pub const BASE_STATION: Self = Self(1);
    /// On/off switching module.
    pub const ON_OFF_MODULE: Self = Self(10);
    /// Dimmer module.
    pub const DIMMER: Self = Self(15);
    /// Netatmo weather base station.
    pub const NETATMO_WEATHER_STATION: Self = Self(3014);
    /// Netatmo outdoor thermometer.
    pub const NETATMO_OUTDOOR_THERMOMETER: Self = Self(3015);
    /// Netatmo rain gauge.
    pub const NETATMO_RAIN_GAUGE: Self = Self(3017);
    /// Netatmo wind gauge.
    pub const NETATMO_WIND_GAUGE: Self = Self(3023);
    /// Netatmo Welcome camera.
    pub const NETATMO_WELCOME_CAMERA: Self = Self(3026);
    /// Netatmo Presence camera.
    pub const NETATMO_PRESENCE_CAMERA: Self = Self(3027);

    /// Returns the raw profile value.
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Returns `true` if the client interprets nodes of this profile.
    #[must_use]
    pub const fn is_supported(self) -> bool {
        matches!(self.0, 10 | 15)
    }

    /// Returns `true` if dimming-level attributes are meaningful for this profile.
    ///
    /// On/off modules can drive dimmable lamps and report a dimming level
    /// alongside the switch state, so both supported profiles qualify.
    #[must_use]
    pub const fn supports_brightness(self) -> bool {
        matches!(self.0, 10 | 15)
    }

    /// Human-readable name of the profile.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self.0 {
            1 => "Coviva Base Station",
            10 => "Coviva On/Off Module",
            15 => "Coviva Dimmer Module",
            3014 => "Netatmo Weather Base Station",
            3015 => "Netatmo Weather Outdoor Thermometer",
            3017 => "Netatmo Weather Rain Gauge",
            3023 => "Netatmo Weather Wind Gauge",
            3026 => "Netatmo Welcome Camera",
            3027 => "Netatmo Presence Camera",
            _ => "Unknown",
        }
    }

    /// Accessory category for supported profiles.
    #[must_use]
    pub const fn accessory_category(self) -> Option<AccessoryCategory> {
        match self.0 {
            10 => Some(AccessoryCategory::Light),
            15 => Some(AccessoryCategory::DimmableLight),
            _ => None,
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.0)
    }
}

impl From<u32> for Profile {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_profiles() {
        assert!(Profile::ON_OFF_MODULE.is_supported());
        assert!(Profile::DIMMER.is_supported());
        assert!(!Profile::BASE_STATION.is_supported());
        assert!(!Profile::NETATMO_PRESENCE_CAMERA.is_supported());
        assert!(!Profile(4242).is_supported());
    }

    #[test]
    fn brightness_on_supported_profiles_only() {
        assert!(Profile::DIMMER.supports_brightness());
        assert!(Profile::ON_OFF_MODULE.supports_brightness());
        assert!(!Profile::BASE_STATION.supports_brightness());
        assert!(!Profile::NETATMO_WELCOME_CAMERA.supports_brightness());
        assert!(!Profile(4242).supports_brightness());
    }

    #[test]
    fn names() {
        assert_eq!(Profile::BASE_STATION.name(), "Coviva Base Station");
        assert_eq!(Profile::ON_OFF_MODULE.name(), "Coviva On/Off Module");
        assert_eq!(Profile::NETATMO_WIND_GAUGE.name(), "Netatmo Weather Wind Gauge");
        assert_eq!(Profile(99).name(), "Unknown");
    }

    #[test]
    fn accessory_categories() {
        assert_eq!(
            Profile::ON_OFF_MODULE.accessory_category(),
            Some(AccessoryCategory::Light)
        );
        assert_eq!(Profile::NETATMO_RAIN_GAUGE.accessory_category(), None);
    }

    #[test]
    fn display_includes_value() {
        assert_eq!(Profile::DIMMER.to_string(), "Coviva Dimmer Module (15)");
    }
}
