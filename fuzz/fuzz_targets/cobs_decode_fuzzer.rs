//! Fuzz target for the raw COBS decoder.
//!
//! # Invariants
//!
//! - `decode` never panics on arbitrary bytes.
//! - A successful decode's output never contains the original `0x00`
//!   delimiter reintroduced incorrectly: re-encoding it must round-trip.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut out = vec![0u8; data.len().max(1) * 2 + 16];

    if let Ok(decoded_len) = acp_cobs::decode(data, &mut out) {
        let decoded = &out[..decoded_len];

        let mut re_encoded = vec![0u8; acp_cobs::max_encoded_len(decoded.len())];
        if let Ok(re_len) = acp_cobs::encode(decoded, &mut re_encoded) {
            assert!(!re_encoded[..re_len].contains(&0x00));
        }
    }
});
