// SPDX-License-Identifier: MIT

//! Property-based invariants for the bridge codec (§8):
//! `decode(encode(x)) == x`, and reassembly is chunk-boundary independent.

use crate::{decode_line, encode_line, Event, Reassembler};
use ash_core::SessionId;
use proptest::prelude::*;

fn arb_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        Just(Event::Ready),
        ".*".prop_map(|error| Event::Error { error }),
        "[a-z0-9]{1,23}".prop_map(|s| Event::Done { session_id: SessionId::from_string(s) }),
        any::<String>().prop_map(|text| Event::Message {
            payload: serde_json::json!({ "text": text }),
        }),
    ]
}

proptest! {
    #[test]
    fn encode_decode_roundtrips(event in arb_event()) {
        let encoded = encode_line(&event).unwrap();
        // Strip the trailing newline before decode_line, which expects a
        // single line's bytes.
        let decoded: Event = decode_line(&encoded[..encoded.len() - 1]).unwrap();
        prop_assert_eq!(decoded, event);
    }

    #[test]
    fn reassembly_is_independent_of_chunk_boundaries(
        events in prop::collection::vec(arb_event(), 1..8),
        chunk_size in 1usize..64,
    ) {
        let mut whole = Vec::new();
        for event in &events {
            whole.extend(encode_line(event).unwrap());
        }

        let mut one_shot = Reassembler::new();
        let baseline = one_shot.push(&whole);

        let mut chunked = Reassembler::new();
        let mut actual = Vec::new();
        for chunk in whole.chunks(chunk_size.max(1)) {
            actual.extend(chunked.push(chunk));
        }

        prop_assert_eq!(actual, baseline);
    }
}
