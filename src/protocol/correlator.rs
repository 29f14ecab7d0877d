// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Correlation of `GET:all` requests with snapshot frames.
//!
//! The backend answers `GET:all` asynchronously on the same socket that
//! carries push updates, so the answer is not simply "the next message".
//! The correlator keeps at most one pending request. Every caller that asks
//! for the device list while a request is pending attaches to it and
//! receives the same snapshot.
//!
//! A pending request ends exactly once: either a snapshot frame resolves it
//! or its timer expires it. Resolving aborts the timer; an expiring timer
//! only clears the slot if it still holds its own request.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::{Error, ProtocolError, Result};
use crate::types::Node;

/// How a pending request ended.
#[derive(Debug, Clone)]
enum Outcome {
    Resolved(Arc<Vec<Node>>),
    TimedOut(u64),
}

struct Pending {
    id: Uuid,
    tx: watch::Sender<Option<Outcome>>,
    timer: JoinHandle<()>,
}

type Slot = Arc<Mutex<Option<Pending>>>;

/// Handle on the pending snapshot request.
#[derive(Debug)]
pub struct SnapshotWaiter {
    id: Uuid,
    rx: watch::Receiver<Option<Outcome>>,
}

impl SnapshotWaiter {
    /// Identifier of the request this waiter is attached to.
    #[must_use]
    pub fn request_id(&self) -> Uuid {
        self.id
    }

    /// Waits for the snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if no snapshot arrived within the window.
    pub async fn wait(mut self) -> Result<Arc<Vec<Node>>> {
        let outcome = self
            .rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| ProtocolError::ChannelClosed("snapshot request dropped".to_string()))?
            .clone();

        match outcome {
            Some(Outcome::Resolved(nodes)) => Ok(nodes),
            Some(Outcome::TimedOut(ms)) => Err(Error::Timeout(ms)),
            None => Err(ProtocolError::ChannelClosed("snapshot request dropped".to_string()).into()),
        }
    }
}

/// Single-slot correlator for full snapshot requests.
pub struct SnapshotCorrelator {
    timeout: Duration,
    slot: Slot,
}

impl SnapshotCorrelator {
    /// Creates a correlator whose requests expire after `timeout`.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            slot: Arc::new(Mutex::new(None)),
        }
    }

    /// Returns the wait window.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Attaches to the pending request, creating one if none exists.
    ///
    /// Returns the waiter and `true` if a new request was created, in which
    /// case the caller must send `GET:all`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn begin(&self) -> (SnapshotWaiter, bool) {
        let mut slot = self.slot.lock();

        if let Some(pending) = slot.as_ref() {
            tracing::debug!(request_id = %pending.id, "Joining pending snapshot request");
            return (
                SnapshotWaiter {
                    id: pending.id,
                    rx: pending.tx.subscribe(),
                },
                false,
            );
        }

        let id = Uuid::new_v4();
        let (tx, rx) = watch::channel(None);
        let timer = tokio::spawn(expire_after(Arc::clone(&self.slot), id, self.timeout));

        tracing::debug!(
            request_id = %id,
            timeout_ms = timeout_ms(self.timeout),
            "Created snapshot request"
        );

        *slot = Some(Pending { id, tx, timer });
        (SnapshotWaiter { id, rx }, true)
    }

    /// Resolves the pending request, if any, with a snapshot.
    ///
    /// Returns `true` if a request was pending.
    pub fn resolve(&self, nodes: Arc<Vec<Node>>) -> bool {
        let Some(pending) = self.slot.lock().take() else {
            return false;
        };

        pending.timer.abort();
        tracing::debug!(
            request_id = %pending.id,
            nodes = nodes.len(),
            "Resolved snapshot request"
        );
        // No receivers left is fine: every caller gave up.
        let _ = pending.tx.send(Some(Outcome::Resolved(nodes)));
        true
    }

    /// Returns `true` while a request is pending.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.slot.lock().is_some()
    }
}

impl std::fmt::Debug for SnapshotCorrelator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotCorrelator")
            .field("timeout", &self.timeout)
            .field("pending", &self.is_pending())
            .finish()
    }
}

impl Drop for SnapshotCorrelator {
    fn drop(&mut self) {
        if let Some(pending) = self.slot.lock().take() {
            pending.timer.abort();
        }
    }
}

async fn expire_after(slot: Slot, id: Uuid, timeout: Duration) {
    tokio::time::sleep(timeout).await;

    let expired = {
        let mut guard = slot.lock();
        if guard.as_ref().is_some_and(|p| p.id == id) {
            guard.take()
        } else {
            None
        }
    };

    if let Some(pending) = expired {
        let ms = timeout_ms(timeout);
        tracing::warn!(request_id = %id, timeout_ms = ms, "Snapshot request timed out");
        let _ = pending.tx.send(Some(Outcome::TimedOut(ms)));
    }
}

fn timeout_ms(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX)
}
