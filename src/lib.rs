// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `Coviva` Lib - A Rust client for the Coviva home-automation backend.
//!
//! The backend exposes every device of an account over one WebSocket. This
//! library handles the session layer: token exchange, the socket lifecycle,
//! correlation of full-state requests with their snapshots, and the
//! reconciliation of pushed attribute updates into a device cache.
//!
//! # Supported Devices
//!
//! - On/off modules (profile 10): switched lights and outlets, with a dimming
//!   level when the module reports one
//! - Dimmers (profile 15): on/off plus dimming level
//!
//! Other nodes (base station, weather station modules, cameras) are listed
//! with their raw attributes but get no parsed state.
//!
//! # Quick Start
//!
//! ```no_run
//! use coviva_lib::{Client, DeviceCommand, SessionConfig};
//! use coviva_lib::subscription::Subscribable;
//! use coviva_lib::types::Brightness;
//!
//! #[tokio::main]
//! async fn main() -> coviva_lib::Result<()> {
//!     let client = Client::new(SessionConfig::new("me@example.com", "secret", "abc123"))?;
//!
//!     // React to changes pushed by the backend
//!     client.on_devices_changed(|nodes| {
//!         for node in nodes {
//!             println!("{} changed: {:?}", node.name, node.parsed);
//!         }
//!     });
//!
//!     client.login().await?;
//!     let _keepalive = client.spawn_keepalive();
//!
//!     for node in client.discover_devices().await? {
//!         if node.profile.supports_brightness() {
//!             let level = Brightness::new(40)?;
//!             client.set_device_state(node.id, DeviceCommand::BrightnessSet(level)).await?;
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod accessory;
mod capabilities;
mod client;
pub mod command;
mod config;
pub mod error;
pub mod protocol;
mod session;
pub mod state;
pub mod subscription;
pub mod types;

pub use capabilities::{AccessoryCategory, Profile};
pub use client::Client;
pub use command::{DeviceCommand, OutboundFrame};
pub use config::SessionConfig;
pub use error::{Error, ParseError, ProtocolError, Result, ValueError};
pub use state::{DeviceCache, ParsedState};
pub use subscription::{CallbackRegistry, Subscribable, SubscriptionId};
pub use types::{Attribute, AttributeKind, Brightness, Node, NodeId};
