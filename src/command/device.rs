// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;

use crate::types::{AttributeKind, Brightness};

/// A write request issued by the host against one device.
///
/// Each command targets the first attribute of a given kind on the node.
///
/// # Examples
///
/// ```
/// use coviva_lib::command::DeviceCommand;
/// use coviva_lib::types::{AttributeKind, Brightness};
///
/// let dim = DeviceCommand::BrightnessSet(Brightness::new(30).unwrap());
/// assert_eq!(dim.attribute_kind(), AttributeKind::DIMMING_LEVEL);
/// assert!((dim.target_value() - 30.0).abs() < f64::EPSILON);
///
/// let parsed = DeviceCommand::from_name("turnOnOff", 0.0).unwrap();
/// assert_eq!(parsed, DeviceCommand::TurnOnOff(false));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum DeviceCommand {
    /// Switch the device on or off.
    TurnOnOff(bool),
    /// Set the dimming level.
    BrightnessSet(Brightness),
}

impl DeviceCommand {
    /// Builds a command from its host-side name and numeric payload.
    ///
    /// Returns `None` for unknown names. Brightness payloads are clamped.
    #[must_use]
    pub fn from_name(name: &str, value: f64) -> Option<Self> {
        match name {
            "turnOnOff" => Some(Self::TurnOnOff(value.abs() > 0.0)),
            "brightnessSet" => Some(Self::BrightnessSet(Brightness::from_attribute_value(
                value,
            ))),
            _ => None,
        }
    }

    /// Host-side name of the command.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::TurnOnOff(_) => "turnOnOff",
            Self::BrightnessSet(_) => "brightnessSet",
        }
    }

    /// Kind of attribute this command writes.
    #[must_use]
    pub const fn attribute_kind(&self) -> AttributeKind {
        match self {
            Self::TurnOnOff(_) => AttributeKind::ON_OFF,
            Self::BrightnessSet(_) => AttributeKind::DIMMING_LEVEL,
        }
    }

    /// Value sent as `target_value`.
    #[must_use]
    pub fn target_value(&self) -> f64 {
        match self {
            Self::TurnOnOff(on) => {
                if *on {
                    1.0
                } else {
                    0.0
                }
            }
            Self::BrightnessSet(level) => f64::from(*level),
        }
    }
}

impl fmt::Display for DeviceCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.target_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn on_off_values() {
        assert!((DeviceCommand::TurnOnOff(true).target_value() - 1.0).abs() < f64::EPSILON);
        assert!(DeviceCommand::TurnOnOff(false).target_value().abs() < f64::EPSILON);
    }

    #[test]
    fn from_name_known_and_unknown() {
        assert_eq!(
            DeviceCommand::from_name("turnOnOff", 1.0),
            Some(DeviceCommand::TurnOnOff(true))
        );
        assert_eq!(
            DeviceCommand::from_name("brightnessSet", 250.0),
            Some(DeviceCommand::BrightnessSet(Brightness::MAX))
        );
        assert_eq!(DeviceCommand::from_name("positionSet", 10.0), None);
    }

    #[test]
    fn display() {
        assert_eq!(DeviceCommand::TurnOnOff(true).to_string(), "turnOnOff(1)");
    }
}
