// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Periodic heartbeat and snapshot polling.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::socket::SocketSession;
use crate::command::OutboundFrame;

/// Background heartbeat/poll tasks. Aborted on drop.
#[derive(Debug, Default)]
pub struct KeepaliveHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl KeepaliveHandle {
    /// Number of running tasks (0, 1 or 2).
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.tasks.iter().filter(|t| !t.is_finished()).count()
    }

    /// Stops all tasks.
    pub fn stop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for KeepaliveHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Starts the heartbeat and polling tasks.
///
/// `None` disables the corresponding task. The first frame of each task is
/// sent one full interval after start.
#[must_use]
pub fn spawn_keepalive(
    socket: &SocketSession,
    ping_interval: Option<Duration>,
    polling_interval: Option<Duration>,
) -> KeepaliveHandle {
    let mut tasks = Vec::with_capacity(2);

    if let Some(period) = ping_interval {
        tracing::debug!(period_secs = period.as_secs(), "Starting heartbeat");
        tasks.push(tokio::spawn(repeat(socket.clone(), OutboundFrame::Ping, period)));
    }
    if let Some(period) = polling_interval {
        tracing::debug!(period_secs = period.as_secs(), "Starting snapshot polling");
        tasks.push(tokio::spawn(repeat(socket.clone(), OutboundFrame::GetAll, period)));
    }

    KeepaliveHandle { tasks }
}

async fn repeat(socket: SocketSession, frame: OutboundFrame, period: Duration) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        tracing::trace!(frame = %frame, "Periodic send");
        socket.send(frame.to_string()).await;
    }
}
