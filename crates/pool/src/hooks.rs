// SPDX-License-Identifier: MIT

//! The pool's one callback seam (§4.4, §4.2): fired just before a live
//! sandbox is torn down, whether by capacity eviction, idle-sweep eviction,
//! or a detected crash/OOM, so a caller can react (persist state, transition
//! the bound session) while the sandbox id is still meaningful.

use ash_core::ids::{SandboxId, SessionId};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub struct EvictionContext {
    pub sandbox_id: SandboxId,
    /// `None` for an unbound, pre-warmed sandbox.
    pub session_id: Option<SessionId>,
}

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

pub type BeforeEvictHook = Arc<dyn Fn(EvictionContext) -> BoxFuture + Send + Sync>;

/// A hook that does nothing, for callers with no session-layer state to
/// react with (pre-warm-only pools, tests).
pub fn noop_hook() -> BeforeEvictHook {
    Arc::new(|_ctx| Box::pin(async {}))
}
