// SPDX-License-Identifier: MIT

//! The fleet-wide scheduler (§4.7): runner discovery, backend selection,
//! liveness sweeping, and dead-runner handling. Nothing here holds
//! authoritative state beyond the shared DB and a disposable local
//! connection cache.

mod coordinator;
mod error;
mod registration;

pub use coordinator::{RunnerCoordinator, Selected};
pub use error::CoordinatorError;
pub use registration::{deregister, register, spawn_heartbeat_loop, RunnerSelfInfo};
