// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the Coviva client.
//!
//! The hierarchy mirrors the failure domains of a session: value validation,
//! transport (HTTP token exchange and WebSocket), frame parsing, and the
//! caller-facing conditions (authentication, timeout, rate limiting).
//!
//! Unknown devices and attributes are not errors: reads return `None` and
//! writes are logged and skipped.

use thiserror::Error;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// Error occurred during value validation.
    #[error("value error: {0}")]
    Value(#[from] ValueError),

    /// Error occurred during transport communication.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Error occurred while parsing a backend payload.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// The token exchange was rejected by the backend.
    #[error("authentication failed (HTTP {status}): {reason}")]
    Authentication {
        /// HTTP status returned by the token endpoint.
        status: u16,
        /// Reason phrase or response body.
        reason: String,
    },

    /// No full snapshot arrived within the wait window.
    #[error("can't get device list within allowed timeout: {0} ms")]
    Timeout(u64),

    /// The backend (or an intermediate layer) refused the request for now.
    ///
    /// This is never produced by the session itself; it travels unchanged
    /// through the client so accessory code can fall back to cached values.
    #[error("{}", rate_limit_message(.message, .reason))]
    RateLimited {
        /// Human-readable message.
        message: String,
        /// Optional reason supplied by the backend.
        reason: Option<String>,
    },
}

#[allow(clippy::ref_option)]
fn rate_limit_message(message: &str, reason: &Option<String>) -> String {
    match reason {
        Some(reason) => format!("{message} - {reason}"),
        None => message.to_string(),
    }
}

impl Error {
    /// Returns `true` if this is a [`Error::RateLimited`] error.
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Returns `true` if this is a [`Error::Timeout`] error.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// Errors related to value validation and constraints.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// A numeric value is outside the allowed range.
    #[error("value {actual} is out of range [{min}, {max}]")]
    OutOfRange {
        /// Minimum allowed value.
        min: u16,
        /// Maximum allowed value.
        max: u16,
        /// The actual value that was provided.
        actual: u16,
    },
}

/// Errors related to transport communication (HTTP/WebSocket).
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// WebSocket handshake or I/O failed.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Invalid URL or address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// No socket is currently open.
    #[error("socket is not connected")]
    NotConnected,

    /// Internal channel was closed.
    #[error("channel closed: {0}")]
    ChannelClosed(String),
}

/// Errors related to parsing backend payloads.
#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Unexpected payload format.
    #[error("unexpected response format: {0}")]
    UnexpectedFormat(String),
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_error_display() {
        let err = ValueError::OutOfRange {
            min: 0,
            max: 100,
            actual: 150,
        };
        assert_eq!(err.to_string(), "value 150 is out of range [0, 100]");
    }

    #[test]
    fn timeout_display_carries_window() {
        let err = Error::Timeout(120_000);
        assert_eq!(
            err.to_string(),
            "can't get device list within allowed timeout: 120000 ms"
        );
        assert!(err.is_timeout());
    }

    #[test]
    fn rate_limited_display_with_reason() {
        let err = Error::RateLimited {
            message: "Too many requests".to_string(),
            reason: Some("retry later".to_string()),
        };
        assert_eq!(err.to_string(), "Too many requests - retry later");
        assert!(err.is_rate_limited());
    }

    #[test]
    fn rate_limited_display_without_reason() {
        let err = Error::RateLimited {
            message: "Too many requests".to_string(),
            reason: None,
        };
        assert_eq!(err.to_string(), "Too many requests");
    }

    #[test]
    fn authentication_display() {
        let err = Error::Authentication {
            status: 401,
            reason: "Unauthorized".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "authentication failed (HTTP 401): Unauthorized"
        );
    }

    #[test]
    fn error_from_protocol_error() {
        let err: Error = ProtocolError::NotConnected.into();
        assert!(matches!(err, Error::Protocol(ProtocolError::NotConnected)));
        assert!(!err.is_rate_limited());
    }

    #[test]
    fn parse_error_display() {
        let err = ParseError::UnexpectedFormat("no top-level key".to_string());
        assert_eq!(
            err.to_string(),
            "unexpected response format: no top-level key"
        );
    }
}
