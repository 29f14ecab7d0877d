// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-device state access for accessory integrations.
//!
//! Host accessories read device state far more often than it changes,
//! usually in bursts (one read per characteristic). [`AccessoryState`]
//! sits between an accessory and the backend:
//!
//! - reads are debounced, so a burst results in one backend query;
//! - answers are cached for [`STATE_VALIDITY`];
//! - when the backend reports rate limiting, a stale cached answer is
//!   served instead of the error.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use coviva_lib::accessory::AccessoryState;
//! use coviva_lib::subscription::Subscribable;
//! use coviva_lib::{Client, DeviceCommand, SessionConfig};
//!
//! # async fn example() -> coviva_lib::Result<()> {
//! let client = Arc::new(Client::new(SessionConfig::new("user", "secret", "abc123"))?);
//! client.login().await?;
//!
//! let lamp = Arc::new(AccessoryState::new(Arc::clone(&client), 12));
//! let watcher = Arc::clone(&lamp);
//! client.on_devices_changed(move |nodes| {
//!     for node in nodes {
//!         watcher.update(node);
//!     }
//! });
//!
//! if let Ok(Some(state)) = lamp.get().await {
//!     println!("on: {}", state.state());
//! }
//! lamp.set(DeviceCommand::TurnOnOff(false)).await?;
//! # Ok(())
//! # }
//! ```

mod debounce;
mod state_cache;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

pub use debounce::Debouncer;
pub use state_cache::TimedStateCache;

use crate::client::Client;
use crate::command::DeviceCommand;
use crate::error::{Error, ProtocolError, Result};
use crate::state::ParsedState;
use crate::types::{Node, NodeId};

/// Device timeout used by accessories.
pub const DEVICE_TIMEOUT: Duration = Duration::from_secs(60);

/// How long a read or written state stays fresh.
pub const STATE_VALIDITY: Duration = Duration::from_secs(65);

/// Quiet period after the last read before a batch is flushed.
pub const READ_DEBOUNCE: Duration = Duration::from_millis(500);

/// Longest a read can be held back by a continuous burst.
pub const READ_MAX_WAIT: Duration = Duration::from_millis(1500);

/// Result shared by every caller of one debounced read.
pub type SharedResult<T> = std::result::Result<T, Arc<Error>>;

/// Backend operations an accessory needs.
#[async_trait]
pub trait DeviceApi: Send + Sync + 'static {
    /// Returns the parsed state of a device, `None` if unknown.
    async fn device_state(&self, id: NodeId) -> Result<Option<ParsedState>>;

    /// Writes a command to a device.
    async fn set_device_state(&self, id: NodeId, command: DeviceCommand) -> Result<()>;
}

#[async_trait]
impl DeviceApi for Client {
    async fn device_state(&self, id: NodeId) -> Result<Option<ParsedState>> {
        self.get_device_state(id).await
    }

    async fn set_device_state(&self, id: NodeId, command: DeviceCommand) -> Result<()> {
        Client::set_device_state(self, id, command).await
    }
}

/// Cached, debounced state of one device.
pub struct AccessoryState<A> {
    api: Arc<A>,
    node_id: NodeId,
    cache: Arc<Mutex<TimedStateCache>>,
    reads: Debouncer<SharedResult<Option<ParsedState>>>,
}

impl<A: DeviceApi> AccessoryState<A> {
    /// Creates the state helper for one device.
    #[must_use]
    pub fn new(api: Arc<A>, node_id: NodeId) -> Self {
        Self {
            api,
            node_id,
            cache: Arc::new(Mutex::new(TimedStateCache::new(STATE_VALIDITY))),
            reads: Debouncer::new(READ_DEBOUNCE, READ_MAX_WAIT),
        }
    }

    /// Identifier of the device.
    #[must_use]
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// Returns the last known state without querying anything.
    #[must_use]
    pub fn cached(&self) -> Option<ParsedState> {
        self.cache.lock().get()
    }

    /// Reads the device state.
    ///
    /// Calls are debounced; a fresh cached value answers without a backend
    /// query.
    ///
    /// # Errors
    ///
    /// Returns the backend error, including [`Error::RateLimited`] when no
    /// cached value exists to fall back on.
    pub async fn get(&self) -> SharedResult<Option<ParsedState>> {
        let api = Arc::clone(&self.api);
        let cache = Arc::clone(&self.cache);
        let node_id = self.node_id;

        self.reads
            .call(move || read_through(api, cache, node_id))
            .await
            .unwrap_or_else(|| {
                Err(Arc::new(
                    ProtocolError::ChannelClosed("state read aborted".to_string()).into(),
                ))
            })
    }

    /// Writes a command and merges its value into the cache.
    ///
    /// # Errors
    ///
    /// Returns the backend error unchanged, [`Error::RateLimited`] included.
    pub async fn set(&self, command: DeviceCommand) -> Result<()> {
        self.cache.lock().merge(&command);
        self.api.set_device_state(self.node_id, command).await
    }

    /// Refreshes the cache from a pushed node.
    ///
    /// Nodes of other devices and unsupported nodes are ignored.
    pub fn update(&self, node: &Node) {
        if node.id != self.node_id {
            return;
        }
        if let Some(parsed) = node.parsed {
            tracing::debug!(node_id = node.id, parsed = ?parsed, "Accessory state updated");
            self.cache.lock().set(parsed);
        }
    }
}

impl<A> std::fmt::Debug for AccessoryState<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessoryState")
            .field("node_id", &self.node_id)
            .field("cache", &*self.cache.lock())
            .finish_non_exhaustive()
    }
}

async fn read_through<A: DeviceApi>(
    api: Arc<A>,
    cache: Arc<Mutex<TimedStateCache>>,
    node_id: NodeId,
) -> SharedResult<Option<ParsedState>> {
    let fresh = cache.lock().valid();
    if fresh.is_some() {
        tracing::trace!(node_id, "Serving state from cache");
        return Ok(fresh);
    }

    match api.device_state(node_id).await {
        Ok(Some(state)) => {
            cache.lock().set(state);
            Ok(Some(state))
        }
        Ok(None) => Ok(None),
        Err(e) if e.is_rate_limited() => {
            let stale = {
                let mut cache = cache.lock();
                let stale = cache.get();
                cache.renew();
                stale
            };
            match stale {
                Some(state) => {
                    tracing::warn!(node_id, error = %e, "Rate limited, serving cached state");
                    Ok(Some(state))
                }
                None => Err(Arc::new(e)),
            }
        }
        Err(e) => Err(Arc::new(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::Profile;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted backend: answers reads from a queue of outcomes.
    #[derive(Default)]
    struct ScriptedApi {
        reads: AtomicUsize,
        answers: Mutex<Vec<Result<Option<ParsedState>>>>,
        writes: Mutex<Vec<DeviceCommand>>,
        write_error: Mutex<Option<Error>>,
    }

    impl ScriptedApi {
        fn answering(answers: Vec<Result<Option<ParsedState>>>) -> Arc<Self> {
            let api = Self::default();
            // Popped from the back.
            *api.answers.lock() = answers.into_iter().rev().collect();
            Arc::new(api)
        }
    }

    #[async_trait]
    impl DeviceApi for ScriptedApi {
        async fn device_state(&self, _id: NodeId) -> Result<Option<ParsedState>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.answers.lock().pop().unwrap_or(Ok(None))
        }

        async fn set_device_state(&self, _id: NodeId, command: DeviceCommand) -> Result<()> {
            self.writes.lock().push(command);
            match self.write_error.lock().take() {
                Some(e) => Err(e),
                None => Ok(()),
            }
        }
    }

    fn rate_limited() -> Error {
        Error::RateLimited {
            message: "Too many requests".to_string(),
            reason: Some("try again later".to_string()),
        }
    }

    fn lit() -> ParsedState {
        ParsedState::parse(Profile::ON_OFF_MODULE, &[]).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_reads_queries_once() {
        let api = ScriptedApi::answering(vec![Ok(Some(lit()))]);
        let accessory = Arc::new(AccessoryState::new(Arc::clone(&api), 1));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let accessory = Arc::clone(&accessory);
                tokio::spawn(async move { accessory.get().await })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), Some(lit()));
        }
        assert_eq!(api.reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_cache_answers_without_query() {
        let api = ScriptedApi::answering(vec![Ok(Some(lit()))]);
        let accessory = AccessoryState::new(Arc::clone(&api), 1);

        accessory.get().await.unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;
        accessory.get().await.unwrap();
        assert_eq!(api.reads.load(Ordering::SeqCst), 1);

        tokio::time::advance(STATE_VALIDITY).await;
        accessory.get().await.unwrap();
        assert_eq!(api.reads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_falls_back_to_stale_cache() {
        let api = ScriptedApi::answering(vec![Ok(Some(lit())), Err(rate_limited())]);
        let accessory = AccessoryState::new(Arc::clone(&api), 1);

        accessory.get().await.unwrap();
        tokio::time::advance(STATE_VALIDITY).await;

        assert_eq!(accessory.get().await.unwrap(), Some(lit()));
        assert_eq!(api.reads.load(Ordering::SeqCst), 2);

        // The fallback renewed the cache.
        accessory.get().await.unwrap();
        assert_eq!(api.reads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_without_cache_propagates() {
        let api = ScriptedApi::answering(vec![Err(rate_limited())]);
        let accessory = AccessoryState::new(api, 1);

        let err = accessory.get().await.unwrap_err();
        assert!(err.is_rate_limited());
        assert_eq!(err.to_string(), "Too many requests - try again later");
    }

    #[tokio::test(start_paused = true)]
    async fn other_errors_propagate_even_with_cache() {
        let api = ScriptedApi::answering(vec![Ok(Some(lit())), Err(Error::Timeout(120_000))]);
        let accessory = AccessoryState::new(Arc::clone(&api), 1);

        accessory.get().await.unwrap();
        tokio::time::advance(STATE_VALIDITY).await;
        assert!(accessory.get().await.unwrap_err().is_timeout());
    }

    #[tokio::test(start_paused = true)]
    async fn write_merges_and_forwards() {
        let api = ScriptedApi::answering(vec![Ok(Some(lit()))]);
        let accessory = AccessoryState::new(Arc::clone(&api), 1);
        accessory.get().await.unwrap();

        accessory.set(DeviceCommand::TurnOnOff(false)).await.unwrap();
        assert!(!accessory.cached().unwrap().state());
        assert_eq!(*api.writes.lock(), vec![DeviceCommand::TurnOnOff(false)]);
    }

    #[tokio::test]
    async fn write_rate_limit_propagates() {
        let api = ScriptedApi::answering(Vec::new());
        *api.write_error.lock() = Some(rate_limited());
        let accessory = AccessoryState::new(Arc::clone(&api), 1);

        let err = accessory.set(DeviceCommand::TurnOnOff(true)).await.unwrap_err();
        assert!(err.is_rate_limited());
    }

    #[tokio::test]
    async fn update_ignores_other_nodes() {
        let accessory = AccessoryState::new(ScriptedApi::answering(Vec::new()), 1);

        let mut other: Node = serde_json::from_value(serde_json::json!({
            "id": 2, "name": "Other", "profile": 10, "attributes": []
        }))
        .unwrap();
        other.parsed = Some(lit());
        accessory.update(&other);
        assert!(accessory.cached().is_none());

        other.id = 1;
        accessory.update(&other);
        assert_eq!(accessory.cached(), Some(lit()));
    }
}
