//! Fuzz target for the streaming frame-boundary detector.
//!
//! # Invariants
//!
//! - Feeding arbitrary bytes one at a time never panics.
//! - `Error` is sticky until `reset`.
//! - `get_frame` only succeeds from `Complete`.

#![no_main]

use acp_cobs::{DetectorState, FrameBoundaryDetector};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut buf = [0u8; 4096];
    let mut detector = FrameBoundaryDetector::new(&mut buf);
    let mut out = [0u8; 4096];

    for &byte in data {
        let prev_state = detector.state();
        let state = detector.feed_byte(byte);

        if matches!(prev_state, DetectorState::Error(_)) {
            assert_eq!(state, prev_state, "error state must stay sticky until reset");
        }

        if state == DetectorState::Complete {
            let _ = detector.get_frame(&mut out);
            assert_eq!(detector.state(), DetectorState::Idle, "get_frame must reset to Idle");
        }
    }
});
