//! Fuzz target for the session's sliding-window replay check, over an
//! arbitrary sequence of presented sequence numbers.
//!
//! # Invariants
//!
//! - `check_rx_seq` never panics for any `u32`.
//! - Once accepted, immediately repeating the same sequence number is
//!   always rejected as a replay.
//! - `rx_anchor` is monotonically non-decreasing.

#![no_main]

use acp_session::Session;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|sequences: Vec<u32>| {
    let mut session = Session::init(1, &[0x7Eu8; 32], 0).unwrap();
    let mut last_anchor = 0u32;

    for n in sequences {
        let before = session.rx_anchor();
        let result = session.check_rx_seq(n);
        let after = session.rx_anchor();

        assert!(after >= before);
        assert!(after >= last_anchor);
        last_anchor = after;

        if result.is_ok() && n != 0 {
            assert_eq!(session.check_rx_seq(n), Err(acp_session::SessionError::Replay));
        }
    }
});
