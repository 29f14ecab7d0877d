// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device state cache and state parser.
//!
//! The [`DeviceCache`] holds the backend's node list. It is replaced
//! wholesale by snapshots and patched by incremental attribute updates.
//! Every supported node carries a [`ParsedState`], a projection recomputed
//! from its attributes after each change.
//!
//! # Examples
//!
//! ```
//! use coviva_lib::state::{AttributeUpdate, DeviceCache};
//! use coviva_lib::types::{Attribute, Node};
//!
//! let node: Node = serde_json::from_str(
//!     r#"{"id":1,"name":"Lamp","profile":10,
//!         "attributes":[{"id":4,"node_id":1,"type":1,"current_value":0}]}"#,
//! ).unwrap();
//!
//! let mut cache = DeviceCache::new();
//! cache.replace_all(vec![node]);
//! assert!(!cache.parsed_state(1).unwrap().state());
//!
//! let update: Attribute = serde_json::from_str(
//!     r#"{"id":4,"node_id":1,"type":1,"current_value":1}"#,
//! ).unwrap();
//! assert!(cache.apply_attribute(update.clone()).is_genuine());
//! assert_eq!(cache.apply_attribute(update), AttributeUpdate::Unchanged);
//! ```

mod device_cache;
mod parsed_state;

pub use device_cache::{AttributeUpdate, DeviceCache};
pub use parsed_state::ParsedState;
