// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory view of every node known to the backend.

use std::collections::HashSet;

use super::ParsedState;
use crate::types::{Attribute, AttributeId, AttributeKind, Node, NodeId};

/// Outcome of applying an incremental attribute update.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeUpdate {
    /// No node owns an attribute with that identifier.
    Unmatched,
    /// The record was replaced but the parsed state did not change
    /// (or the node is not interpreted).
    Unchanged,
    /// The parsed state changed; carries the updated node.
    Changed(Node),
}

impl AttributeUpdate {
    /// Returns `true` for [`AttributeUpdate::Changed`].
    #[must_use]
    pub fn is_genuine(&self) -> bool {
        matches!(self, Self::Changed(_))
    }
}

/// Canonical device list, replaced by snapshots and patched by updates.
///
/// Nodes keep the order the backend lists them in. Node identifiers are
/// unique; attribute identifiers are unique within a node.
#[derive(Debug, Default)]
pub struct DeviceCache {
    nodes: Vec<Node>,
    started_up: bool,
}

impl DeviceCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole device list with a snapshot.
    ///
    /// Names are percent-decoded and supported nodes get a fresh
    /// [`ParsedState`]. Unsupported nodes are logged on the first snapshot
    /// only.
    pub fn replace_all(&mut self, nodes: Vec<Node>) -> &[Node] {
        let mut seen = HashSet::with_capacity(nodes.len());
        let mut accepted = Vec::with_capacity(nodes.len());

        for mut node in nodes {
            if !seen.insert(node.id) {
                tracing::warn!(node_id = node.id, "Dropping duplicate node in snapshot");
                continue;
            }

            dedupe_attributes(&mut node);
            node.name = decode_name(&node.name);
            node.parsed = ParsedState::parse(node.profile, &node.attributes);

            if node.parsed.is_some() {
                tracing::debug!(
                    node_id = node.id,
                    name = %node.name,
                    profile = %node.profile,
                    "Parsed state for supported device"
                );
            } else if !self.started_up {
                tracing::info!(
                    node_id = node.id,
                    name = %node.name,
                    profile = %node.profile,
                    "Ignoring device with unsupported profile"
                );
            }

            accepted.push(node);
        }

        self.nodes = accepted;
        self.started_up = true;
        &self.nodes
    }

    /// Applies one incremental attribute record.
    ///
    /// The owning node is located by `node_id` and the prior record by `id`.
    /// Unknown pairs are dropped silently.
    pub fn apply_attribute(&mut self, attribute: Attribute) -> AttributeUpdate {
        let Some(node) = self.nodes.iter_mut().find(|n| n.id == attribute.node_id) else {
            return AttributeUpdate::Unmatched;
        };
        let Some(slot) = node.attributes.iter_mut().find(|a| a.id == attribute.id) else {
            return AttributeUpdate::Unmatched;
        };

        *slot = attribute;

        let recomputed = ParsedState::parse(node.profile, &node.attributes);
        let genuine = recomputed.is_some() && recomputed != node.parsed;
        node.parsed = recomputed;

        if genuine {
            AttributeUpdate::Changed(node.clone())
        } else {
            AttributeUpdate::Unchanged
        }
    }

    /// Returns `true` once a snapshot has been applied.
    #[must_use]
    pub fn is_started_up(&self) -> bool {
        self.started_up
    }

    /// Returns all cached nodes in backend order.
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Returns the node with the given identifier.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Returns the parsed state of a supported node.
    #[must_use]
    pub fn parsed_state(&self, id: NodeId) -> Option<ParsedState> {
        self.get(id).and_then(|n| n.parsed)
    }

    /// Resolves the attribute a write of `kind` should target on a node.
    #[must_use]
    pub fn find_attribute(&self, id: NodeId, kind: AttributeKind) -> Option<AttributeId> {
        self.get(id)
            .and_then(|n| n.attribute_of_kind(kind))
            .map(|a| a.id)
    }

    /// Looks a node up by numeric identifier or by display name.
    #[must_use]
    pub fn find(&self, identifier: &str) -> Option<&Node> {
        let identifier = identifier.trim();
        if let Ok(id) = identifier.parse::<NodeId>()
            && let Some(node) = self.get(id)
        {
            return Some(node);
        }
        self.nodes.iter().find(|n| n.name == identifier)
    }

    /// Returns the number of cached nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if no snapshot has populated the cache.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Emits a debug line per supported node.
    pub fn log_supported(&self) {
        for node in self.nodes.iter().filter(|n| n.profile.is_supported()) {
            let on_off = node
                .attribute_of_kind(AttributeKind::ON_OFF)
                .map(|a| a.current_value);
            let level = node
                .attribute_of_kind(AttributeKind::DIMMING_LEVEL)
                .filter(|_| node.profile.supports_brightness())
                .map(|a| a.current_value);
            tracing::debug!(
                node_id = node.id,
                name = %node.name,
                on_off = ?on_off,
                brightness = ?level,
                parsed = ?node.parsed,
                "Device"
            );
        }
    }
}

fn decode_name(raw: &str) -> String {
    match urlencoding::decode(raw) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => raw.to_string(),
    }
}

fn dedupe_attributes(node: &mut Node) {
    let mut seen = HashSet::with_capacity(node.attributes.len());
    let before = node.attributes.len();
    node.attributes.retain(|a| seen.insert(a.id));
    if node.attributes.len() != before {
        tracing::warn!(node_id = node.id, "Dropped duplicate attribute ids");
    }
    // Records under a node always belong to it.
    for attribute in &mut node.attributes {
        attribute.node_id = node.id;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::Profile;
    use serde_json::json;

    fn node(id: u32, name: &str, profile: u32, attrs: serde_json::Value) -> Node {
        serde_json::from_value(json!({
            "id": id,
            "name": name,
            "profile": profile,
            "attributes": attrs
        }))
        .unwrap()
    }

    fn attribute(id: u32, node_id: u32, kind: u32, value: f64) -> Attribute {
        serde_json::from_value(json!({
            "id": id,
            "node_id": node_id,
            "type": kind,
            "current_value": value
        }))
        .unwrap()
    }

    fn loaded() -> DeviceCache {
        let mut cache = DeviceCache::new();
        cache.replace_all(vec![
            node(1, "Base%20Station", 1, json!([])),
            node(
                10,
                "Kitchen%20Light",
                10,
                json!([{"id": 4, "node_id": 10, "type": 1, "current_value": 0}]),
            ),
            node(
                15,
                "Hall",
                15,
                json!([
                    {"id": 7, "node_id": 15, "type": 1, "current_value": 1},
                    {"id": 8, "node_id": 15, "type": 2, "current_value": 30}
                ]),
            ),
        ]);
        cache
    }

    #[test]
    fn snapshot_decodes_names_and_parses_supported() {
        let cache = loaded();
        assert!(cache.is_started_up());
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get(1).unwrap().name, "Base Station");
        assert!(cache.get(1).unwrap().parsed.is_none());

        let kitchen = cache.parsed_state(10).unwrap();
        assert!(!kitchen.state());
        let hall = cache.parsed_state(15).unwrap();
        assert!((hall.brightness() - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn snapshot_drops_duplicate_nodes() {
        let mut cache = DeviceCache::new();
        cache.replace_all(vec![
            node(3, "A", 10, json!([])),
            node(3, "B", 10, json!([])),
        ]);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(3).unwrap().name, "A");
    }

    #[test]
    fn genuine_update_then_idempotent_repeat() {
        let mut cache = loaded();

        let update = cache.apply_attribute(attribute(4, 10, 1, 1.0));
        match update {
            AttributeUpdate::Changed(node) => {
                assert_eq!(node.id, 10);
                assert!(node.parsed.unwrap().state());
            }
            other => panic!("expected change, got {other:?}"),
        }

        let repeat = cache.apply_attribute(attribute(4, 10, 1, 1.0));
        assert_eq!(repeat, AttributeUpdate::Unchanged);
    }

    #[test]
    fn unknown_node_or_attribute_is_unmatched() {
        let mut cache = loaded();
        assert_eq!(
            cache.apply_attribute(attribute(4, 999, 1, 1.0)),
            AttributeUpdate::Unmatched
        );
        assert_eq!(
            cache.apply_attribute(attribute(99, 10, 1, 1.0)),
            AttributeUpdate::Unmatched
        );
        assert!(!cache.parsed_state(10).unwrap().state());
    }

    #[test]
    fn update_on_unsupported_node_is_stored_but_not_genuine() {
        let mut cache = DeviceCache::new();
        cache.replace_all(vec![node(
            50,
            "Camera",
            3026,
            json!([{"id": 1, "node_id": 50, "type": 1, "current_value": 0}]),
        )]);
        let update = cache.apply_attribute(attribute(1, 50, 1, 1.0));
        assert_eq!(update, AttributeUpdate::Unchanged);
        assert!(
            (cache.get(50).unwrap().attribute(1).unwrap().current_value - 1.0).abs()
                < f64::EPSILON
        );
    }

    #[test]
    fn parsed_state_never_drifts_from_attributes() {
        let mut cache = loaded();
        let updates = [
            attribute(8, 15, 2, 55.0),
            attribute(7, 15, 1, 0.0),
            attribute(8, 15, 2, 55.0),
            attribute(7, 15, 1, 1.0),
            attribute(8, 15, 2, 0.0),
        ];
        for update in updates {
            cache.apply_attribute(update);
            let node = cache.get(15).unwrap();
            assert_eq!(node.parsed, ParsedState::parse(node.profile, &node.attributes));
        }
    }

    #[test]
    fn find_by_id_or_name() {
        let cache = loaded();
        assert_eq!(cache.find("15").unwrap().id, 15);
        assert_eq!(cache.find("Kitchen Light").unwrap().id, 10);
        assert!(cache.find("Garage").is_none());
    }

    #[test]
    fn find_attribute_for_write() {
        let cache = loaded();
        assert_eq!(cache.find_attribute(15, AttributeKind::DIMMING_LEVEL), Some(8));
        assert_eq!(cache.find_attribute(10, AttributeKind::DIMMING_LEVEL), None);
        assert_eq!(cache.find_attribute(77, AttributeKind::ON_OFF), None);
        assert_eq!(
            cache.get(10).map(|n| n.profile),
            Some(Profile::ON_OFF_MODULE)
        );
    }
}
