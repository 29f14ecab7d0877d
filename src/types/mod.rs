// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Data model of the Coviva backend.
//!
//! # Types
//!
//! - [`Node`] - A device with its ordered [`Attribute`] records
//! - [`AttributeKind`] - Integer tag of an attribute (on/off, dimming level, ...)
//! - [`Snapshot`] - Full description of all nodes, answer to `GET:all`
//! - [`Brightness`] - Validated brightness percentage (0-100)

mod brightness;
mod node;

pub use brightness::Brightness;
pub use node::{Attribute, AttributeId, AttributeKind, Node, NodeId, Snapshot};
