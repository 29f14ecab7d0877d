// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Subscribable trait for types that forward session notifications.

use crate::subscription::SubscriptionId;
use crate::types::Node;

/// Trait for types that support event subscriptions.
///
/// # Examples
///
/// ```no_run
/// use coviva_lib::{Client, SessionConfig};
/// use coviva_lib::subscription::Subscribable;
///
/// # async fn example() -> coviva_lib::Result<()> {
/// let client = Client::new(SessionConfig::new("user", "secret", "abc123"))?;
///
/// let sub_id = client.on_devices_changed(|nodes| {
///     for node in nodes {
///         println!("{} is now {:?}", node.name, node.parsed);
///     }
/// });
///
/// client.login().await?;
///
/// // Later
/// client.unsubscribe(sub_id);
/// # Ok(())
/// # }
/// ```
pub trait Subscribable {
    /// Subscribes to genuine state changes pushed by the backend.
    ///
    /// The callback receives the updated node(s) with their recomputed
    /// parsed state. It is not called for snapshots or for updates that
    /// leave the parsed state unchanged.
    fn on_devices_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&[Node]) + Send + Sync + 'static;

    /// Subscribes to socket openings (initial login and reconnects).
    fn on_connected<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn() + Send + Sync + 'static;

    /// Subscribes to close frames sent by the backend.
    ///
    /// This is informational: the session reconnects lazily on the next
    /// failed send.
    fn on_disconnected<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn() + Send + Sync + 'static;

    /// Removes a subscription.
    ///
    /// Returns `true` if the subscription existed.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}
