// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Classification of inbound socket frames.
//!
//! Text frames are either the bare heartbeat reply `pong` or a JSON object
//! whose single top-level key tells what it carries:
//!
//! - `{"all": {...}}` - full snapshot, the answer to `GET:all`
//! - `{"attribute": {...}}` - one changed attribute
//! - `{"user": {...}}` - login activity of another account member

use serde_json::Value;

use crate::error::ParseError;
use crate::types::{Attribute, Snapshot};

/// A classified inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// `pong` (or an echoed `ping`).
    Heartbeat,
    /// Full snapshot of every node.
    Snapshot(Snapshot),
    /// Incremental update of one attribute.
    Attribute(Attribute),
    /// Login activity; ignored by the client.
    User(Value),
    /// Valid JSON with no known top-level key.
    Unknown(Value),
}

/// Returns `true` for heartbeat frames, which never reach JSON parsing.
#[must_use]
pub fn is_heartbeat(text: &str) -> bool {
    matches!(text.trim(), "pong" | "ping")
}

/// Classifies a text frame.
///
/// # Errors
///
/// Returns [`ParseError::Json`] if the frame is not valid JSON or a known
/// payload does not match its schema, and [`ParseError::UnexpectedFormat`]
/// if the top level is not an object.
pub fn parse_frame(text: &str) -> Result<InboundFrame, ParseError> {
    if is_heartbeat(text) {
        return Ok(InboundFrame::Heartbeat);
    }

    let value: Value = serde_json::from_str(text)?;
    let Value::Object(mut object) = value else {
        return Err(ParseError::UnexpectedFormat(
            "top-level JSON value is not an object".to_string(),
        ));
    };

    if let Some(all) = object.remove("all") {
        return Ok(InboundFrame::Snapshot(serde_json::from_value(all)?));
    }
    if let Some(attribute) = object.remove("attribute") {
        return Ok(InboundFrame::Attribute(serde_json::from_value(attribute)?));
    }
    if let Some(user) = object.remove("user") {
        return Ok(InboundFrame::User(user));
    }

    Ok(InboundFrame::Unknown(Value::Object(object)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AttributeKind;

    #[test]
    fn heartbeat_frames() {
        assert_eq!(parse_frame("pong").unwrap(), InboundFrame::Heartbeat);
        assert_eq!(parse_frame("ping\n").unwrap(), InboundFrame::Heartbeat);
        assert!(is_heartbeat(" pong "));
        assert!(!is_heartbeat("{}"));
    }

    #[test]
    fn snapshot_frame() {
        let frame = parse_frame(
            r#"{"all":{"nodes":[{"id":1,"name":"Lamp","profile":10,"attributes":[]}],"groups":[]}}"#,
        )
        .unwrap();
        let InboundFrame::Snapshot(snapshot) = frame else {
            panic!("expected snapshot");
        };
        assert_eq!(snapshot.nodes.len(), 1);
        assert_eq!(snapshot.nodes[0].name, "Lamp");
    }

    #[test]
    fn attribute_frame() {
        let frame = parse_frame(
            r#"{"attribute":{"id":4,"node_id":1,"type":1,"current_value":1,"target_value":1}}"#,
        )
        .unwrap();
        let InboundFrame::Attribute(attribute) = frame else {
            panic!("expected attribute");
        };
        assert_eq!(attribute.id, 4);
        assert_eq!(attribute.kind, AttributeKind::ON_OFF);
    }

    #[test]
    fn user_frame() {
        let frame = parse_frame(r#"{"user":{"id":3,"username":"someone"}}"#).unwrap();
        assert!(matches!(frame, InboundFrame::User(_)));
    }

    #[test]
    fn unknown_object() {
        let frame = parse_frame(r#"{"warning":{"code":1}}"#).unwrap();
        assert!(matches!(frame, InboundFrame::Unknown(_)));
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(matches!(parse_frame("not json"), Err(ParseError::Json(_))));
    }

    #[test]
    fn non_object_is_an_error() {
        assert!(matches!(
            parse_frame("[1,2,3]"),
            Err(ParseError::UnexpectedFormat(_))
        ));
    }

    #[test]
    fn malformed_attribute_is_an_error() {
        assert!(matches!(
            parse_frame(r#"{"attribute":{"id":"x"}}"#),
            Err(ParseError::Json(_))
        ));
    }
}
