// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! WebSocket session to the backend.
//!
//! The session owns at most one live socket. Outbound frames that cannot be
//! written are queued and trigger a reconnect in the background; the queue
//! is flushed in FIFO order once the next socket opens.
//!
//! Close frames from the peer are only logged. A dead socket is detected by
//! the next failed write, which is what triggers reconnection.
//!
//! # Architecture
//!
//! ```text
//! SocketSession ──► writer (SplitSink, behind a tokio Mutex)
//!       │
//!       └──────────► reader task (SplitStream) ──► SocketObserver
//!                          │
//!                          └── drops frames once a newer socket exists
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::http::Uri;
use tokio_tungstenite::tungstenite::{ClientRequestBuilder, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use super::frame::is_heartbeat;
use super::token::TokenManager;
use crate::command::SNAPSHOT_REQUEST;
use crate::error::{ProtocolError, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Receives events from the live socket.
///
/// Only the socket opened last delivers events; frames still in flight on a
/// replaced socket are dropped.
pub trait SocketObserver: Send + Sync + 'static {
    /// A socket was opened and the pending queue flushed.
    fn on_open(&self) {}

    /// A non-heartbeat text frame arrived.
    fn on_message(&self, text: &str);

    /// The peer sent a close frame.
    fn on_close(&self, code: Option<u16>, reason: &str) {
        let _ = (code, reason);
    }

    /// The socket reported an error.
    fn on_error(&self, error: &ProtocolError) {
        let _ = error;
    }
}

struct SocketInner {
    tokens: Arc<TokenManager>,
    socket_url: String,
    sub_protocol: String,
    observer: Arc<dyn SocketObserver>,
    writer: tokio::sync::Mutex<Option<WsSink>>,
    reader: Mutex<Option<JoinHandle<()>>>,
    pending: Mutex<VecDeque<String>>,
    is_open: AtomicBool,
    generation: AtomicU64,
    connect_lock: tokio::sync::Mutex<()>,
    reconnecting: AtomicBool,
}

/// Handle on the backend socket. Cheap to clone.
#[derive(Clone)]
pub struct SocketSession {
    inner: Arc<SocketInner>,
}

impl SocketSession {
    /// Creates a disconnected session.
    ///
    /// # Arguments
    ///
    /// * `tokens` - Token source used for every connection
    /// * `socket_url` - Endpoint without query string
    /// * `sub_protocol` - WebSocket sub-protocol to request
    /// * `observer` - Receiver of socket events
    #[must_use]
    pub fn new(
        tokens: Arc<TokenManager>,
        socket_url: impl Into<String>,
        sub_protocol: impl Into<String>,
        observer: Arc<dyn SocketObserver>,
    ) -> Self {
        Self {
            inner: Arc::new(SocketInner {
                tokens,
                socket_url: socket_url.into(),
                sub_protocol: sub_protocol.into(),
                observer,
                writer: tokio::sync::Mutex::new(None),
                reader: Mutex::new(None),
                pending: Mutex::new(VecDeque::new()),
                is_open: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                connect_lock: tokio::sync::Mutex::new(()),
                reconnecting: AtomicBool::new(false),
            }),
        }
    }

    /// Returns `true` while a socket is believed to be usable.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.inner.is_open.load(Ordering::Acquire)
    }

    /// Number of frames waiting for the next connection.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.inner.pending.lock().len()
    }

    /// Opens a socket unless one is already open.
    ///
    /// Concurrent callers are serialized; only the first one connects.
    ///
    /// # Errors
    ///
    /// Returns error if the token exchange or the handshake fails.
    pub async fn ensure_open(&self) -> Result<()> {
        let _guard = self.inner.connect_lock.lock().await;
        if self.is_open() {
            return Ok(());
        }
        self.connect_locked().await
    }

    /// Replaces the current socket (if any) with a new one.
    ///
    /// # Errors
    ///
    /// Returns error if the token exchange or the handshake fails.
    pub async fn connect(&self) -> Result<()> {
        let _guard = self.inner.connect_lock.lock().await;
        self.connect_locked().await
    }

    async fn connect_locked(&self) -> Result<()> {
        let token = self.inner.tokens.ensure_token().await?;

        self.shutdown_current().await;

        let url = format!(
            "{}?access_token={}",
            self.inner.socket_url,
            urlencoding::encode(token.access_token())
        );
        let uri: Uri = url
            .parse()
            .map_err(|e: tokio_tungstenite::tungstenite::http::uri::InvalidUri| {
                ProtocolError::InvalidAddress(e.to_string())
            })?;
        let request =
            ClientRequestBuilder::new(uri).with_sub_protocol(self.inner.sub_protocol.clone());

        tracing::debug!(url = %self.inner.socket_url, "Opening socket");

        let (stream, _response) = connect_async(request)
            .await
            .map_err(|e| ProtocolError::WebSocket(e.to_string()))?;
        let (sink, source) = stream.split();

        let generation = self.inner.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let reader = tokio::spawn(read_loop(
            Arc::downgrade(&self.inner),
            Arc::clone(&self.inner.observer),
            source,
            generation,
        ));
        if let Some(stale) = self.inner.reader.lock().replace(reader) {
            stale.abort();
        }

        {
            // Queue draining and sink installation happen under the writer
            // lock so no concurrent send can slip a frame between them.
            let mut writer = self.inner.writer.lock().await;
            let mut sink = sink;
            let delayed: Vec<String> = self.inner.pending.lock().drain(..).collect();
            if !delayed.is_empty() {
                tracing::info!(count = delayed.len(), "Resending delayed messages");
            }
            for message in delayed {
                if let Err(e) = sink.send(Message::text(message.clone())).await {
                    tracing::warn!(message = %message, error = %e, "Unable to resend message");
                }
            }
            *writer = Some(sink);
            self.inner.is_open.store(true, Ordering::Release);
        }

        tracing::info!(generation, "Socket open");
        self.inner.observer.on_open();
        Ok(())
    }

    /// Sends a text frame.
    ///
    /// If no socket is open or the write fails, the frame is queued and a
    /// reconnect starts in the background. Returns `true` if the frame was
    /// written immediately.
    pub async fn send(&self, message: impl Into<String>) -> bool {
        let message = message.into();

        let delivered = {
            let mut writer = self.inner.writer.lock().await;
            let outcome = match writer.as_mut() {
                Some(sink) => sink
                    .send(Message::text(message.clone()))
                    .await
                    .map_err(|e| ProtocolError::WebSocket(e.to_string())),
                None => Err(ProtocolError::NotConnected),
            };

            match outcome {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(message = %message, error = %e, "Unable to send message");
                    *writer = None;
                    self.inner.is_open.store(false, Ordering::Release);
                    enqueue(&mut self.inner.pending.lock(), message);
                    false
                }
            }
        };

        if delivered {
            tracing::debug!("Message sent");
        } else {
            self.spawn_reconnect();
        }
        delivered
    }

    /// Starts a background reconnect unless one is already running.
    fn spawn_reconnect(&self) {
        if self.inner.reconnecting.swap(true, Ordering::AcqRel) {
            tracing::debug!("Reconnect already in flight");
            return;
        }

        let session = self.clone();
        tokio::spawn(async move {
            if let Err(e) = session.ensure_open().await {
                tracing::warn!(error = %e, "Reconnect failed, messages stay queued");
            }
            session.inner.reconnecting.store(false, Ordering::Release);
        });
    }

    /// Closes the socket. Queued frames are kept for the next connection.
    pub async fn close(&self) {
        let _guard = self.inner.connect_lock.lock().await;
        self.shutdown_current().await;
        tracing::info!("Socket closed");
    }

    /// Tears down the current socket, swallowing close failures.
    async fn shutdown_current(&self) {
        self.inner.is_open.store(false, Ordering::Release);
        // Frames still in flight on the old reader are now stale.
        self.inner.generation.fetch_add(1, Ordering::AcqRel);

        let previous = self.inner.writer.lock().await.take();
        if let Some(mut sink) = previous
            && let Err(e) = sink.close().await
        {
            tracing::debug!(error = %e, "Failed to close previous socket");
        }
        if let Some(reader) = self.inner.reader.lock().take() {
            reader.abort();
        }
    }
}

impl std::fmt::Debug for SocketSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketSession")
            .field("socket_url", &self.inner.socket_url)
            .field("is_open", &self.is_open())
            .field("pending", &self.pending_len())
            .finish_non_exhaustive()
    }
}

impl Drop for SocketInner {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.get_mut().take() {
            reader.abort();
        }
    }
}

async fn read_loop(
    inner: Weak<SocketInner>,
    observer: Arc<dyn SocketObserver>,
    mut source: WsSource,
    generation: u64,
) {
    while let Some(frame) = source.next().await {
        let current = inner
            .upgrade()
            .is_some_and(|i| i.generation.load(Ordering::Acquire) == generation);
        if !current {
            tracing::debug!(generation, "Dropping frame from replaced socket");
            return;
        }

        match frame {
            Ok(Message::Text(text)) => dispatch_text(observer.as_ref(), text.as_str()),
            Ok(Message::Binary(bytes)) => match std::str::from_utf8(&bytes) {
                Ok(text) => dispatch_text(observer.as_ref(), text),
                Err(_) => tracing::debug!(len = bytes.len(), "Ignoring non-UTF-8 binary frame"),
            },
            Ok(Message::Close(frame)) => {
                let (code, reason) = frame
                    .as_ref()
                    .map_or((None, String::new()), |cf| {
                        (Some(u16::from(cf.code)), cf.reason.as_str().to_string())
                    });
                tracing::info!(code = ?code, reason = %reason, "Socket close received");
                observer.on_close(code, &reason);
            }
            Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => {
                tracing::trace!("Control frame");
            }
            Err(e) => {
                let error = ProtocolError::WebSocket(e.to_string());
                tracing::warn!(error = %error, "Socket error");
                observer.on_error(&error);
                break;
            }
        }
    }
    tracing::debug!(generation, "Socket stream ended");
}

/// Queues a frame for the next connection.
///
/// Heartbeats are never queued and a snapshot request is queued at most once.
/// Returns `true` if the frame was added.
fn enqueue(pending: &mut VecDeque<String>, message: String) -> bool {
    if is_heartbeat(&message) {
        tracing::debug!("Dropping heartbeat while offline");
        return false;
    }
    if message == SNAPSHOT_REQUEST && pending.iter().any(|m| m == SNAPSHOT_REQUEST) {
        tracing::debug!("Snapshot request already queued");
        return false;
    }
    pending.push_back(message);
    true
}

fn dispatch_text(observer: &dyn SocketObserver, text: &str) {
    if is_heartbeat(text) {
        tracing::trace!("Received heartbeat");
        return;
    }
    tracing::debug!(len = text.len(), "Received message");
    observer.on_message(text);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;

    struct Silent;

    impl SocketObserver for Silent {
        fn on_message(&self, _text: &str) {}
    }

    fn session() -> SocketSession {
        let config = SessionConfig::new("user", "pass", "hub")
            .with_token_url("http://127.0.0.1:9/access_token")
            .with_hardware_seed("seed");
        let tokens = Arc::new(TokenManager::new(&config).unwrap());
        SocketSession::new(tokens, "ws://127.0.0.1:9/connection", "v2", Arc::new(Silent))
    }

    #[tokio::test]
    async fn new_session_is_closed() {
        let session = session();
        assert!(!session.is_open());
        assert_eq!(session.pending_len(), 0);
    }

    #[tokio::test]
    async fn send_without_socket_queues_in_order() {
        let session = session();
        assert!(!session.send("GET:all").await);
        assert!(!session.send("PUT:nodes/1/attributes/4?target_value=1").await);
        // The background reconnect cannot reach the token endpoint, so the
        // frames stay queued.
        assert_eq!(session.pending_len(), 2);
        let queued: Vec<String> = session.inner.pending.lock().iter().cloned().collect();
        assert_eq!(
            queued,
            vec![
                "GET:all".to_string(),
                "PUT:nodes/1/attributes/4?target_value=1".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn offline_queue_skips_heartbeats_and_repeated_snapshot_requests() {
        let session = session();
        for _ in 0..3 {
            assert!(!session.send("ping").await);
            assert!(!session.send("GET:all").await);
        }
        assert!(!session.send("PUT:nodes/2/attributes/9?target_value=40").await);
        assert!(!session.send("PUT:nodes/2/attributes/9?target_value=40").await);

        let queued: Vec<String> = session.inner.pending.lock().iter().cloned().collect();
        assert_eq!(
            queued,
            vec![
                "GET:all".to_string(),
                "PUT:nodes/2/attributes/9?target_value=40".to_string(),
                "PUT:nodes/2/attributes/9?target_value=40".to_string()
            ]
        );
    }

    #[test]
    fn enqueue_reports_whether_frame_was_added() {
        let mut pending = VecDeque::new();
        assert!(!enqueue(&mut pending, "ping".to_string()));
        assert!(enqueue(&mut pending, "GET:all".to_string()));
        assert!(!enqueue(&mut pending, "GET:all".to_string()));
        assert!(enqueue(&mut pending, "PUT:nodes/1/attributes/4?target_value=0".to_string()));
        assert_eq!(pending.len(), 2);
    }

    #[test]
    fn heartbeats_are_not_dispatched() {
        struct Counting(std::sync::atomic::AtomicUsize);
        impl SocketObserver for Counting {
            fn on_message(&self, _text: &str) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let observer = Counting(std::sync::atomic::AtomicUsize::new(0));
        dispatch_text(&observer, "pong");
        dispatch_text(&observer, "{\"user\":{}}");
        assert_eq!(observer.0.load(Ordering::SeqCst), 1);
    }
}
