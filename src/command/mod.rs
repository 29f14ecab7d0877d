// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Outbound command construction.
//!
//! The backend accepts plain text frames over the socket. Three shapes exist:
//!
//! | Frame | Purpose |
//! |-------|---------|
//! | `GET:all` | Request a full snapshot |
//! | `ping` | Keep the connection alive (answered by `pong`) |
//! | `PUT:nodes/<node>/attributes/<attr>?target_value=<v>` | Write an attribute |
//!
//! Host-facing writes are expressed as a [`DeviceCommand`], which names the
//! attribute kind it targets. The client resolves the concrete attribute on
//! the node and renders an [`OutboundFrame::PutAttribute`].
//!
//! # Examples
//!
//! ```
//! use coviva_lib::command::{DeviceCommand, OutboundFrame};
//! use coviva_lib::types::AttributeKind;
//!
//! let cmd = DeviceCommand::TurnOnOff(true);
//! assert_eq!(cmd.attribute_kind(), AttributeKind::ON_OFF);
//!
//! let frame = OutboundFrame::put_attribute(1, 4, cmd.target_value());
//! assert_eq!(frame.to_string(), "PUT:nodes/1/attributes/4?target_value=1");
//! ```

mod device;
mod frame;

pub use device::DeviceCommand;
pub use frame::{OutboundFrame, SNAPSHOT_REQUEST};
