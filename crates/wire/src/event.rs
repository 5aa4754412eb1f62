// SPDX-License-Identifier: MIT

//! Inbound (bridge -> router) events (§4.1).

use ash_core::SessionId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An event emitted by a sandbox's bridge process.
///
/// The `kind` discriminator is forward-compatible: an event kind this build
/// doesn't recognize decodes into [`Event::Unknown`] instead of failing, so
/// a newer bridge talking to an older router doesn't kill the stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    /// The bridge finished its handshake and is ready to accept commands.
    Ready,
    /// An opaque, bridge-defined payload forwarded to the client unchanged
    /// (§9 "Dynamic JSON passthrough message payloads").
    Message {
        #[serde(flatten)]
        payload: Value,
    },
    Error {
        error: String,
    },
    Done {
        session_id: SessionId,
    },
    /// Forward-compatibility catch-all for event kinds this build does not
    /// know about.
    #[serde(other)]
    Unknown,
}

impl Event {
    /// Whether this event terminates the command's event stream (§4.3):
    /// `Done` (normal) or `Error` (error signal, stream still ends).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Event::Done { .. } | Event::Error { .. })
    }
}
