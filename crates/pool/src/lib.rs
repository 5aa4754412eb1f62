// SPDX-License-Identifier: MIT

//! The sandbox pool (§3, §4.4): owns every live sandbox on one host, admits
//! new sandboxes under a capacity ceiling, evicts by tier and age, and lazily
//! detects dead processes. `ash-backend`'s `LocalRunnerBackend` is a thin
//! wrapper around a [`SandboxPool`]; a remote host's pool is reached instead
//! through `RemoteRunnerBackend` over HTTP.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod config;
mod error;
mod hooks;
mod live;
mod pool;
mod stats;

pub use config::PoolConfig;
pub use error::PoolError;
pub use hooks::{noop_hook, BeforeEvictHook, EvictionContext};
pub use live::SandboxHandleInfo;
pub use pool::SandboxPool;
pub use stats::{Counters, PoolStats, StateHistogram};
