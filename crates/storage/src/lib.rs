// SPDX-License-Identifier: MIT

//! Workspace snapshot/restore, the downloadable bundle format, and optional
//! cloud sync (§4.5).

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod bundle;
mod cloud;
mod error;
mod snapshot;

pub use bundle::{build_bundle, extract_bundle, MAX_BUNDLE_DECOMPRESSED_BYTES};
pub use cloud::{parse_snapshot_url, CloudStore, FileCloudStore, ObjectStoreCloud};
pub use error::StorageError;
pub use snapshot::{persist_session_state, restore_session_state, SnapshotMeta};
