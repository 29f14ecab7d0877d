// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::fmt;

use crate::types::{AttributeId, NodeId};

/// Wire form of [`OutboundFrame::GetAll`].
pub const SNAPSHOT_REQUEST: &str = "GET:all";

/// A text frame sent to the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundFrame {
    /// Request a full snapshot (`GET:all`).
    GetAll,
    /// Heartbeat (`ping`).
    Ping,
    /// Set the target value of one attribute.
    PutAttribute {
        /// Target node.
        node: NodeId,
        /// Attribute on that node.
        attribute: AttributeId,
        /// Requested value.
        value: f64,
    },
}

impl OutboundFrame {
    /// Creates a [`OutboundFrame::PutAttribute`] frame.
    #[must_use]
    pub fn put_attribute(node: NodeId, attribute: AttributeId, value: f64) -> Self {
        Self::PutAttribute {
            node,
            attribute,
            value,
        }
    }
}

impl fmt::Display for OutboundFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GetAll => f.write_str(SNAPSHOT_REQUEST),
            Self::Ping => f.write_str("ping"),
            // f64 Display drops the fractional part of whole numbers: 1.0 -> "1"
            Self::PutAttribute {
                node,
                attribute,
                value,
            } => write!(
                f,
                "PUT:nodes/{node}/attributes/{attribute}?target_value={value}"
            ),
        }
    }
}

impl From<OutboundFrame> for String {
    fn from(frame: OutboundFrame) -> Self {
        frame.to_string()
    }
}
