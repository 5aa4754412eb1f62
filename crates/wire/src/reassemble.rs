// SPDX-License-Identifier: MIT

//! Stream reassembly: turn arbitrary byte chunks into decoded lines,
//! surviving chunk boundaries anywhere inside the encoded bytes (§4.1, §8).

use crate::Event;

/// A line pulled out of the buffer, already decoded (or flagged as
/// malformed). Whitespace-only lines are skipped before this is produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ReassembledLine {
    Event(Event),
    /// A line that was not skippable-whitespace but failed to parse as
    /// JSON. Surfaced so the caller can emit a `decode_error` without
    /// killing the stream (§7, §8).
    DecodeError(String),
}

/// Buffers raw bytes and yields complete, newline-terminated lines.
///
/// Consumers feed it byte chunks in receipt order via [`Reassembler::push`];
/// the reassembler retains any trailing partial line across calls.
#[derive(Debug, Default)]
pub struct Reassembler {
    buf: Vec<u8>,
}

impl Reassembler {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Feed a chunk of bytes, draining and decoding every complete line it
    /// completes (including lines that started in a previous chunk).
    pub fn push(&mut self, chunk: &[u8]) -> Vec<ReassembledLine> {
        self.buf.extend_from_slice(chunk);
        let mut out = Vec::new();
        loop {
            let Some(newline_at) = self.buf.iter().position(|&b| b == b'\n') else {
                break;
            };
            let line: Vec<u8> = self.buf.drain(..=newline_at).collect();
            let line = &line[..line.len() - 1]; // drop the trailing \n
            if let Some(decoded) = decode_one(line) {
                out.push(decoded);
            }
        }
        out
    }

    /// Whether there is an unterminated partial line buffered.
    pub fn has_pending(&self) -> bool {
        !self.buf.is_empty()
    }
}

fn decode_one(line: &[u8]) -> Option<ReassembledLine> {
    if line.iter().all(|b| b.is_ascii_whitespace()) {
        return None;
    }
    match crate::decode_line::<Event>(line) {
        Ok(event) => Some(ReassembledLine::Event(event)),
        Err(_) => {
            Some(ReassembledLine::DecodeError(String::from_utf8_lossy(line).into_owned()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_chunk_with_two_lines_yields_two_events() {
        let mut r = Reassembler::new();
        let out = r.push(b"{\"kind\":\"ready\"}\n{\"kind\":\"done\",\"session_id\":\"ses-a\"}\n");
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], ReassembledLine::Event(Event::Ready));
    }

    #[test]
    fn line_split_across_two_chunks_still_decodes() {
        let mut r = Reassembler::new();
        assert!(r.push(b"{\"kind\":\"rea").is_empty());
        let out = r.push(b"dy\"}\n");
        assert_eq!(out, vec![ReassembledLine::Event(Event::Ready)]);
    }

    #[test]
    fn byte_at_a_time_reassembles_identically() {
        let line = b"{\"kind\":\"done\",\"session_id\":\"ses-a\"}\n";
        let mut r = Reassembler::new();
        let mut out = Vec::new();
        for b in line {
            out.extend(r.push(&[*b]));
        }
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn whitespace_only_lines_are_skipped() {
        let mut r = Reassembler::new();
        let out = r.push(b"   \n\t\n{\"kind\":\"ready\"}\n");
        assert_eq!(out, vec![ReassembledLine::Event(Event::Ready)]);
    }

    #[test]
    fn malformed_json_surfaces_as_decode_error_without_killing_stream() {
        let mut r = Reassembler::new();
        let out = r.push(b"not json\n{\"kind\":\"ready\"}\n");
        assert_eq!(out.len(), 2);
        assert!(matches!(out[0], ReassembledLine::DecodeError(_)));
        assert_eq!(out[1], ReassembledLine::Event(Event::Ready));
    }

    #[test]
    fn trailing_partial_line_is_retained_until_completed() {
        let mut r = Reassembler::new();
        r.push(b"{\"kind\":\"ready\"}\n{\"kind\":\"don");
        assert!(r.has_pending());
        let out = r.push(b"e\",\"session_id\":\"ses-a\"}\n");
        assert_eq!(out.len(), 1);
        assert!(!r.has_pending());
    }

    #[test]
    fn unicode_and_control_chars_survive_inside_payload() {
        let event = Event::Message { payload: serde_json::json!({"text": "héllo\tworld \u{1F600}"}) };
        let mut line = crate::encode_line(&event).unwrap();
        let mut r = Reassembler::new();
        let out = r.push(&line);
        assert_eq!(out, vec![ReassembledLine::Event(event.clone())]);

        // Split mid-multibyte-sequence across chunks; still reassembles.
        let mid = line.len() / 2;
        let tail = line.split_off(mid);
        let mut r2 = Reassembler::new();
        assert!(r2.push(&line).is_empty());
        let out2 = r2.push(&tail);
        assert_eq!(out2, vec![ReassembledLine::Event(event)]);
    }
}
