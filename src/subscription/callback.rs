// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Callback management for session notifications.
//!
//! - [`SubscriptionId`] - Unique identifier for unsubscribing
//! - [`CallbackRegistry`] - Registry for storing and dispatching callbacks

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::types::Node;

/// Unique identifier for a subscription.
///
/// Returned when registering a callback; pass it to `unsubscribe` to remove
/// the callback again. IDs are unique within a registry's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    #[must_use]
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Sub({})", self.0)
    }
}

/// Callback receiving nodes whose parsed state changed.
type DevicesChangedCallback = Arc<dyn Fn(&[Node]) + Send + Sync>;

/// Callback for connection lifecycle events.
type LifecycleCallback = Arc<dyn Fn() + Send + Sync>;

/// Registry for session callbacks.
///
/// Callbacks are cloned out of the lock before they run, so a callback may
/// register or unsubscribe without deadlocking.
pub struct CallbackRegistry {
    next_id: AtomicU64,
    devices_changed: RwLock<HashMap<SubscriptionId, DevicesChangedCallback>>,
    connected: RwLock<HashMap<SubscriptionId, LifecycleCallback>>,
    disconnected: RwLock<HashMap<SubscriptionId, LifecycleCallback>>,
}

impl CallbackRegistry {
    /// Creates a new empty callback registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            devices_changed: RwLock::new(HashMap::new()),
            connected: RwLock::new(HashMap::new()),
            disconnected: RwLock::new(HashMap::new()),
        }
    }

    fn next_id(&self) -> SubscriptionId {
        SubscriptionId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    // =========================================================================
    // Registration methods
    // =========================================================================

    /// Registers a callback for genuine device state changes.
    pub fn on_devices_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&[Node]) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.devices_changed.write().insert(id, Arc::new(callback));
        id
    }

    /// Registers a callback for when a socket opens.
    pub fn on_connected<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.connected.write().insert(id, Arc::new(callback));
        id
    }

    /// Registers a callback for when the peer closes the socket.
    pub fn on_disconnected<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.disconnected.write().insert(id, Arc::new(callback));
        id
    }

    // =========================================================================
    // Unsubscription
    // =========================================================================

    /// Unregisters a callback by its subscription ID.
    ///
    /// Returns `true` if a callback was found and removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.devices_changed.write().remove(&id).is_some()
            || self.connected.write().remove(&id).is_some()
            || self.disconnected.write().remove(&id).is_some()
    }

    // =========================================================================
    // Dispatch methods
    // =========================================================================

    /// Dispatches changed nodes to every devices-changed callback.
    pub fn dispatch_devices_changed(&self, nodes: &[Node]) {
        let callbacks: Vec<_> = self.devices_changed.read().values().cloned().collect();
        for callback in callbacks {
            callback(nodes);
        }
    }

    /// Dispatches the connected event.
    pub fn dispatch_connected(&self) {
        let callbacks: Vec<_> = self.connected.read().values().cloned().collect();
        for callback in callbacks {
            callback();
        }
    }

    /// Dispatches the disconnected event.
    pub fn dispatch_disconnected(&self) {
        let callbacks: Vec<_> = self.disconnected.read().values().cloned().collect();
        for callback in callbacks {
            callback();
        }
    }

    // =========================================================================
    // Statistics
    // =========================================================================

    /// Returns the total number of registered callbacks.
    #[must_use]
    pub fn callback_count(&self) -> usize {
        self.devices_changed.read().len()
            + self.connected.read().len()
            + self.disconnected.read().len()
    }

    /// Returns `true` if there are no registered callbacks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.callback_count() == 0
    }
}

impl Default for CallbackRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("callback_count", &self.callback_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    fn node(id: u32) -> Node {
        serde_json::from_value(serde_json::json!({
            "id": id, "name": "n", "profile": 10, "attributes": []
        }))
        .unwrap()
    }

    #[test]
    fn subscription_id_display() {
        assert_eq!(SubscriptionId::new(42).to_string(), "Sub(42)");
    }

    #[test]
    fn registry_new_is_empty() {
        let registry = CallbackRegistry::new();
        assert!(registry.is_empty());
    }

    #[test]
    fn devices_changed_receives_nodes() {
        let registry = CallbackRegistry::new();
        let seen = Arc::new(AtomicU32::new(0));
        let seen_clone = Arc::clone(&seen);

        registry.on_devices_changed(move |nodes| {
            seen_clone.fetch_add(nodes[0].id, Ordering::SeqCst);
        });
        registry.dispatch_devices_changed(&[node(7)]);

        assert_eq!(seen.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn lifecycle_callbacks() {
        let registry = CallbackRegistry::new();
        let counter = Arc::new(AtomicU32::new(0));
        let up = Arc::clone(&counter);
        let down = Arc::clone(&counter);

        registry.on_connected(move || {
            up.fetch_add(1, Ordering::SeqCst);
        });
        registry.on_disconnected(move || {
            down.fetch_add(10, Ordering::SeqCst);
        });

        registry.dispatch_connected();
        registry.dispatch_disconnected();
        assert_eq!(counter.load(Ordering::SeqCst), 11);
    }

    #[test]
    fn unsubscribe_removes_callback() {
        let registry = CallbackRegistry::new();
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = Arc::clone(&counter);

        let id = registry.on_devices_changed(move |_| {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        });
        assert!(registry.unsubscribe(id));
        assert!(!registry.unsubscribe(id));

        registry.dispatch_devices_changed(&[node(1)]);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn callback_may_unsubscribe_itself() {
        let registry = Arc::new(CallbackRegistry::new());
        let weak = Arc::downgrade(&registry);
        let own_id = Arc::new(parking_lot::Mutex::new(None));
        let own_id_clone = Arc::clone(&own_id);

        let id = registry.on_connected(move || {
            if let (Some(registry), Some(id)) = (weak.upgrade(), *own_id_clone.lock()) {
                registry.unsubscribe(id);
            }
        });
        *own_id.lock() = Some(id);

        registry.dispatch_connected();
        assert!(registry.is_empty());
    }
}
