// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Transport layer of the Coviva backend.
//!
//! # Components
//!
//! - [`TokenManager`]: exchanges credentials for a bearer token over HTTPS
//! - [`SocketSession`]: owns the WebSocket, queues frames while disconnected
//! - [`SnapshotCorrelator`]: matches `GET:all` requests with snapshot frames
//! - [`parse_frame`]: classifies inbound text frames
//! - [`spawn_keepalive`]: periodic `ping` and `GET:all`

mod correlator;
mod frame;
mod keepalive;
mod socket;
mod token;

pub use correlator::{SnapshotCorrelator, SnapshotWaiter};
pub use frame::{InboundFrame, is_heartbeat, parse_frame};
pub use keepalive::{KeepaliveHandle, spawn_keepalive};
pub use socket::{SocketObserver, SocketSession};
pub use token::{
    Credential, EXPIRY_MARGIN_SECS, Token, TokenManager, TokenResponse, hardware_id,
    local_hardware_seed, parse_token_response, sha512_hex,
};
