// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Host-facing client for one backend account.

use std::sync::Arc;

use crate::command::{DeviceCommand, OutboundFrame};
use crate::config::SessionConfig;
use crate::error::Result;
use crate::protocol::{
    KeepaliveHandle, SocketObserver, SocketSession, TokenManager, spawn_keepalive,
};
use crate::session::SessionState;
use crate::state::ParsedState;
use crate::subscription::{Subscribable, SubscriptionId};
use crate::types::{Node, NodeId};

/// Session with the backend of one account.
///
/// The client owns the token manager, the socket and the device cache. It is
/// cheap to clone; clones share the same session.
///
/// # Examples
///
/// ```no_run
/// use coviva_lib::{Client, DeviceCommand, SessionConfig};
///
/// #[tokio::main]
/// async fn main() -> coviva_lib::Result<()> {
///     let client = Client::new(SessionConfig::new("me@example.com", "secret", "abc123"))?;
///     client.login().await?;
///
///     for node in client.discover_devices().await? {
///         println!("{} ({}): {:?}", node.name, node.profile, node.parsed);
///     }
///
///     client.set_device_state(12, DeviceCommand::TurnOnOff(true)).await?;
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: SessionConfig,
    tokens: Arc<TokenManager>,
    socket: SocketSession,
    state: Arc<SessionState>,
}

impl Client {
    /// Creates a client. No network traffic happens until [`Client::login`].
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built.
    pub fn new(config: SessionConfig) -> Result<Self> {
        let tokens = Arc::new(TokenManager::new(&config)?);
        let state = Arc::new(SessionState::new(config.snapshot_timeout()));
        let socket = SocketSession::new(
            Arc::clone(&tokens),
            config.socket_url(),
            config.sub_protocol(),
            Arc::clone(&state) as Arc<dyn SocketObserver>,
        );

        tracing::debug!(
            coviva_id = %config.credential().coviva_id(),
            hardware_id = %tokens.hardware_id(),
            "Created client"
        );

        Ok(Self {
            inner: Arc::new(ClientInner {
                config,
                tokens,
                socket,
                state,
            }),
        })
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.inner.config
    }

    /// Ensures a valid token and an open socket.
    ///
    /// Idempotent: returns immediately when the socket is already open.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Authentication`] if the token exchange is
    /// rejected, or a protocol error if the socket cannot be opened.
    pub async fn login(&self) -> Result<()> {
        self.inner.socket.ensure_open().await
    }

    /// Returns `true` while the socket is believed to be usable.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.socket.is_open()
    }

    /// Logs in when no token was ever obtained, and renews a held token
    /// that entered its refresh margin. An open socket is left as is.
    async fn login_if_needed(&self) -> Result<()> {
        let tokens = &self.inner.tokens;
        if !tokens.has_token().await {
            tracing::warn!("No token, logging in");
            return self.login().await;
        }
        if tokens.valid_token().await.is_none() {
            tracing::debug!("Token expiring, renewing");
            tokens.ensure_token().await?;
        }
        Ok(())
    }

    /// Fetches the full device list from the backend.
    ///
    /// Sends `GET:all` and waits for the snapshot. Calls made while a request
    /// is pending share its result.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Timeout`] if no snapshot arrives within the
    /// configured window, or the login error if a login was needed and
    /// failed.
    pub async fn discover_devices(&self) -> Result<Vec<Node>> {
        self.login_if_needed().await?;
        self.get_device_list().await
    }

    /// Same as [`Client::discover_devices`].
    ///
    /// # Errors
    ///
    /// See [`Client::discover_devices`].
    pub async fn get_all_device_states(&self) -> Result<Vec<Node>> {
        self.discover_devices().await
    }

    async fn get_device_list(&self) -> Result<Vec<Node>> {
        let (waiter, is_new) = self.inner.state.correlator.begin();
        if is_new {
            self.inner.socket.send(OutboundFrame::GetAll).await;
        }
        let nodes = waiter.wait().await?;
        Ok(nodes.as_ref().clone())
    }

    /// Returns the parsed state of one cached device.
    ///
    /// Returns `Ok(None)` for unknown or unsupported devices.
    ///
    /// # Errors
    ///
    /// Returns the login error if a login was needed and failed.
    pub async fn get_device_state(&self, id: NodeId) -> Result<Option<ParsedState>> {
        self.login_if_needed().await?;

        let parsed = self.inner.state.cache.lock().parsed_state(id);
        if parsed.is_none() {
            tracing::error!(node_id = id, "Unable to find device state");
        }
        Ok(parsed)
    }

    /// Writes a command to a device.
    ///
    /// The first attribute of the command's kind, in the node's listed
    /// order, is targeted. If the node or attribute is unknown the call logs
    /// and returns without sending anything. The cache is not touched; the
    /// backend pushes the resulting change.
    ///
    /// # Errors
    ///
    /// Returns the login error if a login was needed and failed.
    pub async fn set_device_state(&self, id: NodeId, command: DeviceCommand) -> Result<()> {
        self.login_if_needed().await?;

        let attribute = self
            .inner
            .state
            .cache
            .lock()
            .find_attribute(id, command.attribute_kind());
        let Some(attribute) = attribute else {
            tracing::warn!(
                node_id = id,
                command = %command,
                "No matching attribute, command not sent"
            );
            return Ok(());
        };

        let frame = OutboundFrame::put_attribute(id, attribute, command.target_value());
        tracing::debug!(node_id = id, frame = %frame, "Sending command");
        self.inner.socket.send(frame).await;
        Ok(())
    }

    /// Sends a raw text frame through the session.
    ///
    /// Returns `true` if it was written immediately; otherwise it is queued
    /// for the next connection.
    pub async fn send_message(&self, message: impl Into<String>) -> bool {
        self.inner.socket.send(message).await
    }

    /// Returns a copy of the cached device list.
    #[must_use]
    pub fn cached_devices(&self) -> Vec<Node> {
        self.inner.state.cache.lock().nodes().to_vec()
    }

    /// Resolves a numeric id or a display name to a node id.
    #[must_use]
    pub fn find_device(&self, identifier: &str) -> Option<NodeId> {
        self.inner.state.cache.lock().find(identifier).map(|n| n.id)
    }

    /// Starts the periodic heartbeat and snapshot polling tasks.
    ///
    /// Dropping the returned handle stops them.
    #[must_use]
    pub fn spawn_keepalive(&self) -> KeepaliveHandle {
        spawn_keepalive(
            &self.inner.socket,
            self.inner.config.ping_interval(),
            self.inner.config.polling_interval(),
        )
    }

    /// Closes the socket. A later [`Client::login`] opens a new one.
    pub async fn close(&self) {
        self.inner.socket.close().await;
    }
}

impl Subscribable for Client {
    fn on_devices_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&[Node]) + Send + Sync + 'static,
    {
        self.inner.state.callbacks.on_devices_changed(callback)
    }

    fn on_connected<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.state.callbacks.on_connected(callback)
    }

    fn on_disconnected<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.state.callbacks.on_disconnected(callback)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.state.callbacks.unsubscribe(id)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("coviva_id", &self.inner.config.credential().coviva_id())
            .field("socket", &self.inner.socket)
            .field("devices", &self.inner.state.cache.lock().len())
            .finish_non_exhaustive()
    }
}
