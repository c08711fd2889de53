//! Fuzz target for the frame codec's `decode`, over arbitrary delimited
//! byte streams.
//!
//! # Invariants
//!
//! - `decode` never panics on arbitrary input.
//! - Every decoded frame's payload length matches its declared length and
//!   never exceeds `MAX_PAYLOAD`.
//! - A successful decode always reports `consumed <= input.len()`.

#![no_main]

use acp_proto::{decode, MAX_PAYLOAD, MAX_WIRE_LEN};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut scratch = [0u8; MAX_WIRE_LEN];

    if let Ok((frame, consumed)) = decode(data, &mut scratch) {
        assert!(consumed <= data.len());
        assert_eq!(frame.payload.len(), usize::from(frame.length));
        assert!(frame.payload.len() <= MAX_PAYLOAD);
        if frame.is_authenticated() {
            assert_ne!(frame.sequence, 0);
        } else {
            assert_eq!(frame.sequence, 0);
        }
    }
});
