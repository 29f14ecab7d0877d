// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Typed projection of a node's attributes.

use serde::Serialize;

use crate::capabilities::Profile;
use crate::command::DeviceCommand;
use crate::types::{Attribute, AttributeKind};

/// Derived state of a supported node.
///
/// A `ParsedState` is always recomputed from the node's attribute records
/// with [`ParsedState::parse`]; it is never the source of truth.
///
/// # Examples
///
/// ```
/// use coviva_lib::Profile;
/// use coviva_lib::state::ParsedState;
///
/// let state = ParsedState::parse(Profile::ON_OFF_MODULE, &[]).unwrap();
/// assert!(state.online());
/// assert!(state.state());
/// assert!(state.brightness().abs() < f64::EPSILON);
///
/// assert!(ParsedState::parse(Profile::BASE_STATION, &[]).is_none());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParsedState {
    online: bool,
    state: bool,
    brightness: f64,
}

impl Default for ParsedState {
    fn default() -> Self {
        Self {
            online: true,
            state: true,
            brightness: 0.0,
        }
    }
}

impl ParsedState {
    /// Computes the parsed state of a node from its attributes.
    ///
    /// Returns `None` for unsupported profiles. For each interpreted kind the
    /// first attribute in listed order wins, which is also the attribute
    /// targeted by writes.
    #[must_use]
    pub fn parse(profile: Profile, attributes: &[Attribute]) -> Option<Self> {
        if !profile.is_supported() {
            return None;
        }

        let mut parsed = Self::default();

        if let Some(on_off) = attributes.iter().find(|a| a.kind == AttributeKind::ON_OFF) {
            parsed.state = on_off.current_value.abs() > 0.0;
        }

        if profile.supports_brightness()
            && let Some(level) = attributes
                .iter()
                .find(|a| a.kind == AttributeKind::DIMMING_LEVEL)
        {
            parsed.brightness = level.current_value;
        }

        Some(parsed)
    }

    /// Whether the device is reachable.
    #[must_use]
    pub const fn online(&self) -> bool {
        self.online
    }

    /// On/off state.
    #[must_use]
    pub const fn state(&self) -> bool {
        self.state
    }

    /// Dimming level as reported by the backend.
    #[must_use]
    pub const fn brightness(&self) -> f64 {
        self.brightness
    }

    /// Sets the on/off state.
    pub fn set_state(&mut self, on: bool) {
        self.state = on;
    }

    /// Sets the dimming level.
    pub fn set_brightness(&mut self, brightness: f64) {
        self.brightness = brightness;
    }

    /// Merges the value written by a command into this state.
    ///
    /// Returns `true` if the state changed.
    pub fn apply_command(&mut self, command: &DeviceCommand) -> bool {
        let before = *self;
        match command {
            DeviceCommand::TurnOnOff(on) => self.state = *on,
            DeviceCommand::BrightnessSet(level) => self.brightness = f64::from(*level),
        }
        *self != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Brightness;

    fn attr(id: u32, kind: u32, value: f64) -> Attribute {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "node_id": 1,
            "type": kind,
            "current_value": value
        }))
        .unwrap()
    }

    #[test]
    fn on_off_module_state() {
        let parsed = ParsedState::parse(Profile::ON_OFF_MODULE, &[attr(4, 1, 0.0)]).unwrap();
        assert!(parsed.online());
        assert!(!parsed.state());
        assert!(parsed.brightness().abs() < f64::EPSILON);
    }

    #[test]
    fn on_off_module_reads_dimming_level() {
        let attributes = [attr(4, 1, 1.0), attr(5, 2, 70.0)];
        let module = ParsedState::parse(Profile::ON_OFF_MODULE, &attributes).unwrap();
        let dimmer = ParsedState::parse(Profile::DIMMER, &attributes).unwrap();

        assert!(module.state());
        assert!((module.brightness() - 70.0).abs() < f64::EPSILON);
        assert_eq!(module, dimmer);
    }

    #[test]
    fn dimmer_reads_brightness() {
        let parsed =
            ParsedState::parse(Profile::DIMMER, &[attr(5, 2, 70.0), attr(4, 1, 1.0)]).unwrap();
        assert!(parsed.state());
        assert!((parsed.brightness() - 70.0).abs() < f64::EPSILON);
    }

    #[test]
    fn first_attribute_of_kind_wins() {
        let parsed =
            ParsedState::parse(Profile::ON_OFF_MODULE, &[attr(4, 1, 0.0), attr(9, 1, 1.0)])
                .unwrap();
        assert!(!parsed.state());
    }

    #[test]
    fn unsupported_profile_has_no_state() {
        assert!(ParsedState::parse(Profile::NETATMO_RAIN_GAUGE, &[attr(4, 1, 1.0)]).is_none());
    }

    #[test]
    fn apply_command_reports_change() {
        let mut state = ParsedState::default();
        assert!(!state.apply_command(&DeviceCommand::TurnOnOff(true)));
        assert!(state.apply_command(&DeviceCommand::TurnOnOff(false)));
        assert!(state.apply_command(&DeviceCommand::BrightnessSet(Brightness::new(40).unwrap())));
        assert!((state.brightness() - 40.0).abs() < f64::EPSILON);
    }
}
