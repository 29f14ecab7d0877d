// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Coalescing of bursts of identical requests.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::Instant;

struct Batch<T> {
    started: Instant,
    last_call: Instant,
    rx: watch::Receiver<Option<T>>,
}

type Slot<T> = Arc<Mutex<Option<Batch<T>>>>;

/// Collapses rapid calls into one execution.
///
/// The first call opens a batch; calls arriving while it is open join it.
/// The batch flushes once no call arrived for `quiet`, or `max_wait` after
/// it opened, whichever comes first. The fetch of the first caller runs
/// once and every caller of the batch receives a clone of its result.
pub struct Debouncer<T> {
    quiet: Duration,
    max_wait: Duration,
    slot: Slot<T>,
}

impl<T> Debouncer<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Creates a debouncer.
    #[must_use]
    pub fn new(quiet: Duration, max_wait: Duration) -> Self {
        Self {
            quiet,
            max_wait,
            slot: Arc::new(Mutex::new(None)),
        }
    }

    /// Joins the open batch, or opens one that will run `fetch`.
    ///
    /// Returns `None` only if the flush task died before producing a value.
    pub async fn call<F, Fut>(&self, fetch: F) -> Option<T>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let mut rx = {
            let mut slot = self.slot.lock();
            let now = Instant::now();
            if let Some(batch) = slot.as_mut() {
                batch.last_call = now;
                batch.rx.clone()
            } else {
                let (tx, rx) = watch::channel(None);
                *slot = Some(Batch {
                    started: now,
                    last_call: now,
                    rx: rx.clone(),
                });
                tokio::spawn(flush(
                    Arc::clone(&self.slot),
                    self.quiet,
                    self.max_wait,
                    tx,
                    fetch,
                ));
                rx
            }
        };

        rx.wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|value| value.clone())
    }

    /// Returns `true` while a batch is collecting calls.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.slot.lock().is_some()
    }
}

impl<T> std::fmt::Debug for Debouncer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("quiet", &self.quiet)
            .field("max_wait", &self.max_wait)
            .field("pending", &self.slot.lock().is_some())
            .finish()
    }
}

async fn flush<T, F, Fut>(
    slot: Slot<T>,
    quiet: Duration,
    max_wait: Duration,
    tx: watch::Sender<Option<T>>,
    fetch: F,
) where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    loop {
        let deadline = {
            let guard = slot.lock();
            let Some(batch) = guard.as_ref() else {
                return;
            };
            (batch.last_call + quiet).min(batch.started + max_wait)
        };
        if Instant::now() >= deadline {
            break;
        }
        tokio::time::sleep_until(deadline).await;
    }

    // Calls from here on open a new batch.
    slot.lock().take();

    let value = fetch().await;
    let _ = tx.send(Some(value));
}
