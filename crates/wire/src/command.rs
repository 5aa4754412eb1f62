// SPDX-License-Identifier: MIT

//! Outbound (router -> bridge) commands (§4.1).

use ash_core::SessionId;
use serde::{Deserialize, Serialize};

/// A command sent from the router/backend to a sandbox's bridge process.
///
/// `kind` is the serde-tag discriminator; unknown kinds on the decode side
/// are handled by [`crate::Event`]'s own `Unknown` catch-all, not here,
/// since commands are only ever encoded by us, never decoded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Command {
    /// A prompt turn. `include_partial_messages` is a bridge-internal flag
    /// the router passes through unchanged (§9, open question resolved in
    /// `DESIGN.md`).
    Query {
        session_id: SessionId,
        prompt: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        include_partial_messages: Option<bool>,
    },
    /// Fire-and-forget cancellation of the in-flight query.
    Interrupt { session_id: SessionId },
    /// Ask the bridge to exit cleanly.
    Shutdown,
}
