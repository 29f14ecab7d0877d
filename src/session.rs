// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Routing of inbound frames to the device cache, the snapshot correlator
//! and the subscribers.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::ProtocolError;
use crate::protocol::{InboundFrame, SnapshotCorrelator, SocketObserver, parse_frame};
use crate::state::{AttributeUpdate, DeviceCache};
use crate::subscription::CallbackRegistry;
use crate::types::{Attribute, Node};

/// State shared between the socket reader and the client API.
#[derive(Debug)]
pub(crate) struct SessionState {
    pub(crate) cache: Mutex<DeviceCache>,
    pub(crate) correlator: SnapshotCorrelator,
    pub(crate) callbacks: CallbackRegistry,
}

impl SessionState {
    pub(crate) fn new(snapshot_timeout: Duration) -> Self {
        Self {
            cache: Mutex::new(DeviceCache::new()),
            correlator: SnapshotCorrelator::new(snapshot_timeout),
            callbacks: CallbackRegistry::new(),
        }
    }

    fn handle_frame(&self, frame: InboundFrame) {
        match frame {
            InboundFrame::Heartbeat => tracing::trace!("Received heartbeat"),
            InboundFrame::Snapshot(snapshot) => self.handle_snapshot(snapshot.nodes),
            InboundFrame::Attribute(attribute) => self.handle_attribute(attribute),
            InboundFrame::User(_) => tracing::trace!("Ignoring user activity"),
            InboundFrame::Unknown(value) => {
                tracing::debug!(payload = %value, "Ignoring unrecognized message");
            }
        }
    }

    fn handle_snapshot(&self, nodes: Vec<Node>) {
        let nodes = {
            let mut cache = self.cache.lock();
            Arc::new(cache.replace_all(nodes).to_vec())
        };
        tracing::debug!(nodes = nodes.len(), "Applied device snapshot");

        if !self.correlator.resolve(nodes) {
            tracing::trace!("Snapshot arrived with no pending request");
        }
    }

    fn handle_attribute(&self, attribute: Attribute) {
        let (node_id, attribute_id) = (attribute.node_id, attribute.id);

        let update = {
            let mut cache = self.cache.lock();
            let update = cache.apply_attribute(attribute);
            if update != AttributeUpdate::Unmatched {
                cache.log_supported();
            }
            update
        };

        match update {
            AttributeUpdate::Changed(node) => {
                tracing::debug!(node_id, attribute_id, parsed = ?node.parsed, "Device changed");
                self.callbacks.dispatch_devices_changed(std::slice::from_ref(&node));
            }
            AttributeUpdate::Unchanged => {
                tracing::trace!(node_id, attribute_id, "Attribute stored without state change");
            }
            AttributeUpdate::Unmatched => {
                tracing::trace!(node_id, attribute_id, "Attribute for unknown node");
            }
        }
    }
}

impl SocketObserver for SessionState {
    fn on_open(&self) {
        self.callbacks.dispatch_connected();
    }

    fn on_message(&self, text: &str) {
        match parse_frame(text) {
            Ok(frame) => self.handle_frame(frame),
            Err(e) => tracing::warn!(error = %e, message = %text, "Unable to parse message"),
        }
    }

    fn on_close(&self, code: Option<u16>, reason: &str) {
        tracing::debug!(code = ?code, reason = %reason, "Backend closed the socket");
        self.callbacks.dispatch_disconnected();
    }

    fn on_error(&self, error: &ProtocolError) {
        tracing::debug!(error = %error, "Socket error reported to session");
    }
}
