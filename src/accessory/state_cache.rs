// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::time::Duration;

use tokio::time::Instant;

use crate::command::DeviceCommand;
use crate::state::ParsedState;

/// Last known state of one device with an expiry.
///
/// An expired value is kept: it is still served when the backend refuses to
/// answer because of rate limiting.
#[derive(Debug, Clone)]
pub struct TimedStateCache {
    validity: Duration,
    value: Option<ParsedState>,
    valid_until: Option<Instant>,
}

impl TimedStateCache {
    /// Creates an empty cache whose entries stay valid for `validity`.
    #[must_use]
    pub fn new(validity: Duration) -> Self {
        Self {
            validity,
            value: None,
            valid_until: None,
        }
    }

    /// Returns the cached value, valid or not.
    #[must_use]
    pub fn get(&self) -> Option<ParsedState> {
        self.value
    }

    /// Returns the cached value if it has not expired.
    #[must_use]
    pub fn valid(&self) -> Option<ParsedState> {
        self.value.filter(|_| self.is_valid())
    }

    /// Returns `true` if a value is cached and has not expired.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.value.is_some() && self.valid_until.is_some_and(|until| Instant::now() < until)
    }

    /// Stores a value and restarts the validity window.
    pub fn set(&mut self, value: ParsedState) {
        self.value = Some(value);
        self.renew();
    }

    /// Restarts the validity window of the current value.
    pub fn renew(&mut self) {
        if self.value.is_some() {
            self.valid_until = Some(Instant::now() + self.validity);
        }
    }

    /// Applies a written command to the cached value.
    ///
    /// Returns `true` if a value was cached and changed.
    pub fn merge(&mut self, command: &DeviceCommand) -> bool {
        let Some(mut value) = self.value else {
            return false;
        };
        let changed = value.apply_command(command);
        if changed {
            self.set(value);
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::Profile;

    const VALIDITY: Duration = Duration::from_secs(65);

    fn on_state() -> ParsedState {
        ParsedState::parse(Profile::DIMMER, &[]).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn value_expires_but_is_kept() {
        let mut cache = TimedStateCache::new(VALIDITY);
        assert!(cache.get().is_none());
        assert!(!cache.is_valid());

        cache.set(on_state());
        assert!(cache.valid().is_some());

        tokio::time::advance(Duration::from_secs(64)).await;
        assert!(cache.is_valid());
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!cache.is_valid());
        assert!(cache.valid().is_none());
        assert_eq!(cache.get(), Some(on_state()));

        cache.renew();
        assert!(cache.is_valid());
    }

    #[test]
    fn merge_requires_cached_value() {
        let mut cache = TimedStateCache::new(VALIDITY);
        assert!(!cache.merge(&DeviceCommand::TurnOnOff(false)));
        assert!(cache.get().is_none());
    }

    #[tokio::test]
    async fn merge_applies_command() {
        let mut cache = TimedStateCache::new(VALIDITY);
        cache.set(on_state());

        assert!(cache.merge(&DeviceCommand::TurnOnOff(false)));
        assert!(!cache.get().unwrap().state());
        assert!(!cache.merge(&DeviceCommand::TurnOnOff(false)));
    }
}
