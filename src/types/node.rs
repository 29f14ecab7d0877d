// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Nodes and attributes as reported by the backend.
//!
//! Only the fields the client interprets are typed. Everything else the
//! backend sends (images, ordering, firmware hints, ...) is kept verbatim in
//! an `extra` map so a node can be handed back to the host unmodified.
//!
//! Decoding is lenient: `null` or oddly typed values in fields the client
//! does not depend on fall back to defaults, and a node that cannot be
//! decoded at all is dropped from its snapshot instead of failing it.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::capabilities::Profile;
use crate::state::ParsedState;

/// Identifier of a node (device) on the backend.
pub type NodeId = u32;

/// Identifier of an attribute, unique within its node.
pub type AttributeId = u32;

/// Typed kind of an attribute.
///
/// Only a handful of kinds are interpreted by the client; all others are
/// carried through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeKind(pub u32);

impl AttributeKind {
    /// On/off switch state (0 = off).
    pub const ON_OFF: Self = Self(1);
    /// Dimming level in percent.
    pub const DIMMING_LEVEL: Self = Self(2);
}

/// One attribute record of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// Attribute identifier.
    pub id: AttributeId,
    /// Owning node.
    pub node_id: NodeId,
    /// Kind tag (`type` on the wire).
    #[serde(rename = "type")]
    pub kind: AttributeKind,
    /// Value currently reported by the device. `0` when absent or not numeric.
    #[serde(default, deserialize_with = "deserialize_lenient_f64")]
    pub current_value: f64,
    /// Value last requested. `0` when absent or not numeric.
    #[serde(default, deserialize_with = "deserialize_lenient_f64")]
    pub target_value: f64,
    /// Unix timestamp of the last change, as sent.
    #[serde(default)]
    pub last_changed: Value,
    /// Who changed it (user, homeegram, ...), as sent.
    #[serde(default)]
    pub changed_by: Value,
    /// Identifier of whoever changed it, as sent.
    #[serde(default)]
    pub changed_by_id: Value,
    /// Remaining backend fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A device registered on the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Node identifier.
    pub id: NodeId,
    /// Display name (percent-decoded once cached).
    #[serde(default, deserialize_with = "deserialize_null_as_default")]
    pub name: String,
    /// Capability descriptor.
    pub profile: Profile,
    /// Attributes in the order the backend lists them.
    #[serde(default, deserialize_with = "deserialize_null_as_default")]
    pub attributes: Vec<Attribute>,
    /// Remaining backend fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    /// Derived state, present only for supported profiles.
    #[serde(skip)]
    pub parsed: Option<ParsedState>,
}

impl Node {
    /// Returns the first attribute of the given kind, in listed order.
    #[must_use]
    pub fn attribute_of_kind(&self, kind: AttributeKind) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.kind == kind)
    }

    /// Returns the attribute with the given identifier.
    #[must_use]
    pub fn attribute(&self, id: AttributeId) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.id == id)
    }
}

/// Payload of an `{"all": {...}}` frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Every node known to the backend, base station included.
    #[serde(default, deserialize_with = "deserialize_nodes")]
    pub nodes: Vec<Node>,
    /// Groups, users, settings and other sections the client does not use.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Deserialize a value that may be null or missing (both become the default).
fn deserialize_null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    let opt: Option<T> = Option::deserialize(deserializer)?;
    Ok(opt.unwrap_or_default())
}

/// Deserialize a number that may be null, a string or a bool.
fn deserialize_lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(number)) => number.as_f64().unwrap_or_default(),
        Some(Value::String(text)) => text.trim().parse().unwrap_or_default(),
        Some(Value::Bool(flag)) => f64::from(u8::from(flag)),
        _ => 0.0,
    };
    Ok(value)
}

/// Deserialize the node list, skipping entries that are not valid nodes.
fn deserialize_nodes<'de, D>(deserializer: D) -> Result<Vec<Node>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Vec<Value> = deserialize_null_as_default(deserializer)?;
    let nodes = raw
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<Node>(value) {
            Ok(node) => Some(node),
            Err(error) => {
                tracing::warn!(%error, "Skipping malformed node in snapshot");
                None
            }
        })
        .collect();
    Ok(nodes)
}
