// SPDX-License-Identifier: MIT

//! The sandbox runtime (§4.2): spawn a child process inside an isolation
//! wrapper, enforce env/resource policy, detect OOM, tear down cleanly; and
//! [`BridgeClient`] (§4.3), which owns the client end of a sandbox's local
//! socket.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod bridge_client;
mod env;
mod error;
mod isolation;
mod layout;
mod limits;
mod runtime;

pub use bridge_client::{BridgeClient, BridgeEvent};
pub use env::build_env;
pub use error::SandboxError;
pub use isolation::bwrap_available;
pub use layout::SandboxPaths;
pub use limits::{CgroupHandle, DiskMonitor};
pub use runtime::{ExitClassification, SandboxHandle, SandboxRuntime, SandboxRuntimeConfig};
