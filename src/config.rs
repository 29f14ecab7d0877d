// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Session configuration.

use std::time::Duration;

use crate::protocol::Credential;

// ============================================================================
// SessionConfig
// ============================================================================

/// Configuration of a Coviva session.
///
/// Endpoints default to the account's `koalabox.net` host and can be
/// overridden (for tests or proxies).
///
/// # Examples
///
/// ```
/// use coviva_lib::SessionConfig;
/// use std::time::Duration;
///
/// let config = SessionConfig::new("user@example.com", "secret", "abc123");
/// assert_eq!(config.credential().coviva_id(), "ABC123");
/// assert_eq!(config.token_url(), "https://ABC123.koalabox.net/access_token");
/// assert_eq!(config.socket_url(), "wss://ABC123.koalabox.net/connection");
///
/// let config = config
///     .with_snapshot_timeout(Duration::from_secs(30))
///     .with_ping_interval(Duration::ZERO);
/// assert_eq!(config.ping_interval(), None);
/// ```
#[derive(Debug, Clone)]
pub struct SessionConfig {
    credential: Credential,
    token_url: Option<String>,
    socket_url: Option<String>,
    sub_protocol: String,
    snapshot_timeout: Duration,
    request_timeout: Duration,
    hardware_seed: Option<String>,
    ping_interval: Duration,
    polling_interval: Duration,
    user_agent: String,
}

impl SessionConfig {
    /// Default time to wait for a full snapshot.
    pub const DEFAULT_SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(120);
    /// Default HTTP timeout for the token exchange.
    pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
    /// Default heartbeat interval.
    pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(60);
    /// Shortest accepted heartbeat interval.
    pub const MIN_PING_INTERVAL: Duration = Duration::from_secs(5);
    /// Default snapshot polling interval.
    pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_secs(180);
    /// Shortest accepted polling interval.
    pub const MIN_POLLING_INTERVAL: Duration = Duration::from_secs(60);
    /// WebSocket sub-protocol spoken by the backend.
    pub const DEFAULT_SUB_PROTOCOL: &'static str = "v2";
    /// User agent of the web app the backend expects.
    pub const DEFAULT_USER_AGENT: &'static str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.0.3 Safari/605.1.15";

    /// Creates a configuration for the given account.
    ///
    /// # Arguments
    ///
    /// * `username` - Account login
    /// * `password` - Account password (only its hash leaves the process)
    /// * `coviva_id` - Identifier of the base station, case-insensitive
    #[must_use]
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        coviva_id: impl AsRef<str>,
    ) -> Self {
        Self {
            credential: Credential::new(username, password, coviva_id),
            token_url: None,
            socket_url: None,
            sub_protocol: Self::DEFAULT_SUB_PROTOCOL.to_string(),
            snapshot_timeout: Self::DEFAULT_SNAPSHOT_TIMEOUT,
            request_timeout: Self::DEFAULT_REQUEST_TIMEOUT,
            hardware_seed: None,
            ping_interval: Self::DEFAULT_PING_INTERVAL,
            polling_interval: Self::DEFAULT_POLLING_INTERVAL,
            user_agent: Self::DEFAULT_USER_AGENT.to_string(),
        }
    }

    /// Overrides the token endpoint.
    #[must_use]
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = Some(url.into());
        self
    }

    /// Overrides the socket endpoint (without query string).
    #[must_use]
    pub fn with_socket_url(mut self, url: impl Into<String>) -> Self {
        self.socket_url = Some(url.into());
        self
    }

    /// Sets the WebSocket sub-protocol.
    #[must_use]
    pub fn with_sub_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.sub_protocol = protocol.into();
        self
    }

    /// Sets how long `GET:all` waits for a snapshot.
    #[must_use]
    pub fn with_snapshot_timeout(mut self, timeout: Duration) -> Self {
        self.snapshot_timeout = timeout;
        self
    }

    /// Sets the token request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the seed hashed into the per-install device identifier.
    ///
    /// Defaults to a local MAC address.
    #[must_use]
    pub fn with_hardware_seed(mut self, seed: impl Into<String>) -> Self {
        self.hardware_seed = Some(seed.into());
        self
    }

    /// Sets the heartbeat interval. Zero disables heartbeats.
    #[must_use]
    pub fn with_ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Sets the snapshot polling interval. Zero disables polling.
    #[must_use]
    pub fn with_polling_interval(mut self, interval: Duration) -> Self {
        self.polling_interval = interval;
        self
    }

    /// Sets the user agent sent with the token request.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Returns the account credential.
    #[must_use]
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Returns the token endpoint.
    #[must_use]
    pub fn token_url(&self) -> String {
        self.token_url.clone().unwrap_or_else(|| {
            format!("https://{}.koalabox.net/access_token", self.credential.coviva_id())
        })
    }

    /// Returns the socket endpoint without the token query.
    #[must_use]
    pub fn socket_url(&self) -> String {
        self.socket_url.clone().unwrap_or_else(|| {
            format!("wss://{}.koalabox.net/connection", self.credential.coviva_id())
        })
    }

    /// Returns the WebSocket sub-protocol.
    #[must_use]
    pub fn sub_protocol(&self) -> &str {
        &self.sub_protocol
    }

    /// Returns the snapshot wait window.
    #[must_use]
    pub fn snapshot_timeout(&self) -> Duration {
        self.snapshot_timeout
    }

    /// Returns the token request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Returns the explicit hardware seed, if any.
    #[must_use]
    pub fn hardware_seed(&self) -> Option<&str> {
        self.hardware_seed.as_deref()
    }

    /// Returns the user agent.
    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Effective heartbeat interval, `None` when disabled.
    #[must_use]
    pub fn ping_interval(&self) -> Option<Duration> {
        effective_interval("ping", self.ping_interval, Self::MIN_PING_INTERVAL)
    }

    /// Effective polling interval, `None` when disabled.
    #[must_use]
    pub fn polling_interval(&self) -> Option<Duration> {
        effective_interval("polling", self.polling_interval, Self::MIN_POLLING_INTERVAL)
    }
}

fn effective_interval(name: &str, interval: Duration, min: Duration) -> Option<Duration> {
    if interval.is_zero() {
        return None;
    }
    if interval < min {
        tracing::info!(
            interval = name,
            requested_secs = interval.as_secs(),
            min_secs = min.as_secs(),
            "Interval below minimum, disabling"
        );
        return None;
    }
    Some(interval)
}
