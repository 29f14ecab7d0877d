// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Change notification.
//!
//! The backend pushes attribute updates over the socket. When an update
//! changes a node's parsed state, the session calls every callback
//! registered with [`Subscribable::on_devices_changed`] so the host can
//! reflect the change without polling.
//!
//! - [`SubscriptionId`] - A unique identifier for a subscription, used to unsubscribe
//! - [`CallbackRegistry`] - Registry that stores callbacks and dispatches events
//! - [`Subscribable`] - Trait for types that support event subscriptions

mod callback;
mod subscribable;

pub use callback::{CallbackRegistry, SubscriptionId};
pub use subscribable::Subscribable;
