//! Verifies the codec's no-heap configuration: `init`, `encode_frame`,
//! `decode_frame`, and session operations must not allocate.

use acp::{FrameType, Session};
use acp_harness::{allocated_bytes, CountingAllocator};

#[global_allocator]
static ALLOCATOR: CountingAllocator = CountingAllocator::new();

fn assert_no_allocation(label: &str, f: impl FnOnce()) {
    let before = allocated_bytes();
    f();
    let after = allocated_bytes();
    assert_eq!(after, before, "{label} allocated {} bytes", after.saturating_sub(before));
}

#[test]
fn init_does_not_allocate() {
    assert_no_allocation("init", || {
        acp::init().unwrap();
    });
}

#[test]
fn unauthenticated_encode_decode_does_not_allocate() {
    let mut out = [0u8; acp::MAX_TRANSMISSION_UNIT];
    let mut written = 0usize;

    assert_no_allocation("unauthenticated encode", || {
        written = acp::encode_frame(FrameType::Telemetry, false, b"no-heap-probe", None, &mut out).unwrap();
    });

    let mut scratch = [0u8; acp_proto::MAX_WIRE_LEN];
    assert_no_allocation("unauthenticated decode", || {
        acp::decode_frame(&out[..written], &mut scratch, None).unwrap();
    });
}

#[test]
fn authenticated_encode_decode_does_not_allocate() {
    let key = [0x42u8; 32];
    let mut tx_session = Session::init(1, &key, 0).unwrap();
    let mut rx_session = Session::init(1, &key, 0).unwrap();

    let mut out = [0u8; acp::MAX_TRANSMISSION_UNIT];
    let mut written = 0usize;

    assert_no_allocation("authenticated encode", || {
        written =
            acp::encode_frame(FrameType::Command, true, b"ARM", Some(&mut tx_session), &mut out).unwrap();
    });

    let mut scratch = [0u8; acp_proto::MAX_WIRE_LEN];
    assert_no_allocation("authenticated decode", || {
        acp::decode_frame(&out[..written], &mut scratch, Some(&mut rx_session)).unwrap();
    });
}

#[test]
fn session_sequence_operations_do_not_allocate() {
    let mut session = Session::init(1, &[0x11u8; 32], 0).unwrap();
    assert_no_allocation("tx_seq + check_rx_seq", || {
        let seq = session.tx_seq().unwrap();
        session.check_rx_seq(seq).unwrap();
    });
}
