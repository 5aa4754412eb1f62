// SPDX-License-Identifier: MIT

//! The bridge IPC protocol (§4.1): newline-delimited JSON commands and
//! events exchanged between the router/backend and an in-sandbox bridge
//! process over a local socket.
//!
//! Wire format: one JSON object per line, terminated by a single `\n`. No
//! other framing. Implementations must survive arbitrary chunk boundaries
//! and multi-megabyte payloads; see [`Reassembler`].

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod command;
mod event;
mod reassemble;

pub use command::Command;
pub use event::Event;
pub use reassemble::{ReassembledLine, Reassembler};

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to decode message: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Encode a command or event as a single line, `\n`-terminated.
pub fn encode_line<T: Serialize>(value: &T) -> Result<Vec<u8>, WireError> {
    let mut bytes = serde_json::to_vec(value).map_err(WireError::Encode)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Decode a single line (without its trailing newline) into a command or
/// event.
pub fn decode_line<T: DeserializeOwned>(line: &[u8]) -> Result<T, WireError> {
    serde_json::from_slice(line).map_err(WireError::Decode)
}

#[cfg(test)]
mod property_tests;
