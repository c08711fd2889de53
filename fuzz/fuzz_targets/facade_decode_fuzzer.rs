//! Fuzz target for the facade's `decode_frame`, exercising authentication
//! policy and HMAC/replay verification against arbitrary input bytes under
//! a fixed, known session key.
//!
//! # Invariants
//!
//! - Never panics, regardless of how `data` is shaped.
//! - An unauthenticated `Command` frame is always rejected with
//!   `AuthRequired`, never silently accepted.

#![no_main]

use acp::{decode_frame, AcpError, FrameType, Session};
use acp_proto::MAX_WIRE_LEN;
use libfuzzer_sys::fuzz_target;

const FIXED_KEY: [u8; 32] = [0x24; 32];

fuzz_target!(|data: &[u8]| {
    let mut session = Session::init(1, &FIXED_KEY, 0).unwrap();
    let mut scratch = [0u8; MAX_WIRE_LEN];

    match decode_frame(data, &mut scratch, Some(&mut session)) {
        Ok((frame, consumed)) => {
            assert!(consumed <= data.len());
            if frame.frame_type == FrameType::Command {
                assert!(frame.is_authenticated());
            }
        },
        Err(AcpError::AuthRequired | AcpError::AuthFailed | AcpError::Replay) => {},
        Err(_) => {},
    }
});
