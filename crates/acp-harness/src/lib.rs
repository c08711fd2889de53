//! In-memory capability implementations and property-test helpers for
//! exercising the ACP codec end to end.
//!
//! Nothing here is part of the protocol surface: it exists so tests (in
//! this workspace, and in downstream applications) can stand up a
//! `KeyStore`/`Entropy`/`Clock`/`Logger` quartet without reaching for a
//! real filesystem, RNG, or clock.

// Workspace lints deny `unsafe_code` by default. The allocator module
// needs `unsafe` to implement `GlobalAlloc` and locally overrides it with
// `#[allow(unsafe_code)]`; every other module in this crate stays
// unsafe-free.
#![warn(missing_docs)]

mod allocator;

use std::collections::HashMap;
use std::sync::Mutex;

use acp::{AcpError, Clock, Entropy, KeyStore, LogLevel, Logger};

pub use allocator::{allocated_bytes, CountingAllocator};

/// In-memory `KeyStore` backed by a `HashMap`, for tests that need
/// `load`/`store`/`erase` without real persistence.
#[derive(Default)]
pub struct MemoryKeyStore {
    keys: HashMap<u32, Vec<u8>>,
}

impl MemoryKeyStore {
    /// Create an empty key store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with `key_bytes` under `key_id`, for test setup.
    pub fn seed(&mut self, key_id: u32, key_bytes: &[u8]) {
        self.keys.insert(key_id, key_bytes.to_vec());
    }
}

impl KeyStore for MemoryKeyStore {
    fn load(&self, key_id: u32, out: &mut [u8]) -> Result<usize, AcpError> {
        let key = self.keys.get(&key_id).ok_or(AcpError::InvalidParam)?;
        if out.len() < key.len() {
            return Err(AcpError::BufferTooSmall);
        }
        out[..key.len()].copy_from_slice(key);
        Ok(key.len())
    }

    fn store(&mut self, key_id: u32, key_bytes: &[u8]) -> Result<(), AcpError> {
        self.keys.insert(key_id, key_bytes.to_vec());
        Ok(())
    }

    fn erase(&mut self, key_id: u32) -> Result<(), AcpError> {
        self.keys.remove(&key_id);
        Ok(())
    }
}

/// `Entropy` source that always yields the same repeating byte pattern,
/// for deterministic test fixtures.
pub struct FixedEntropy {
    pattern: Vec<u8>,
}

impl FixedEntropy {
    /// Build a source that cycles through `pattern` forever.
    #[must_use]
    pub fn new(pattern: Vec<u8>) -> Self {
        assert!(!pattern.is_empty(), "entropy pattern must not be empty");
        Self { pattern }
    }
}

impl Entropy for FixedEntropy {
    fn fill(&self, buf: &mut [u8]) -> Result<(), AcpError> {
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = self.pattern[i % self.pattern.len()];
        }
        Ok(())
    }
}

/// `Entropy` source that counts how many times `fill` was called and how
/// many bytes were produced, for tests that assert the codec touched
/// entropy a particular number of times (or not at all).
#[derive(Default)]
pub struct CountingEntropy {
    fill_calls: Mutex<usize>,
    bytes_produced: Mutex<usize>,
}

impl CountingEntropy {
    /// Create a counter at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of times `fill` has been called.
    #[must_use]
    pub fn fill_calls(&self) -> usize {
        *self.fill_calls.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Total bytes produced across all `fill` calls.
    #[must_use]
    pub fn bytes_produced(&self) -> usize {
        *self.bytes_produced.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Entropy for CountingEntropy {
    fn fill(&self, buf: &mut [u8]) -> Result<(), AcpError> {
        buf.fill(0xA5);
        *self.fill_calls.lock().unwrap_or_else(std::sync::PoisonError::into_inner) += 1;
        *self.bytes_produced.lock().unwrap_or_else(std::sync::PoisonError::into_inner) += buf.len();
        Ok(())
    }
}

/// `Clock` that returns a value the test controls directly, rather than
/// wall-clock time.
pub struct TestClock {
    now_ms: Mutex<u64>,
}

impl TestClock {
    /// Start the clock at `start_ms`.
    #[must_use]
    pub fn new(start_ms: u64) -> Self {
        Self { now_ms: Mutex::new(start_ms) }
    }

    /// Advance the clock by `delta_ms`.
    pub fn advance(&self, delta_ms: u64) {
        let mut now = self.now_ms.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *now += delta_ms;
    }
}

impl Clock for TestClock {
    fn monotonic_ms(&self) -> u64 {
        *self.now_ms.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// One log record captured by [`RecordingLogger`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Severity the message was logged at.
    pub level: LogLevel,
    /// Logged message text.
    pub message: String,
}

/// `Logger` that stores every record in memory, for asserting on what the
/// codec chose to log (and, just as importantly, what it did not).
#[derive(Default)]
pub struct RecordingLogger {
    records: Mutex<Vec<LogRecord>>,
}

impl RecordingLogger {
    /// Create a logger with no records yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record logged so far, in order.
    #[must_use]
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }

    /// `true` if any record's message contains `needle` — use this to
    /// assert that key material or HMAC tags never reached the log.
    #[must_use]
    pub fn any_message_contains(&self, needle: &str) -> bool {
        self.records().iter().any(|r| r.message.contains(needle))
    }
}

impl Logger for RecordingLogger {
    fn log(&self, level: LogLevel, message: &str) {
        let record = LogRecord { level, message: message.to_string() };
        self.records.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(record);
    }
}

/// Flip one bit in `buf[index]`, for corruption-injection tests.
pub fn corrupt_byte(buf: &mut [u8], index: usize, bit: u8) {
    buf[index] ^= 1 << (bit % 8);
}

/// Proptest strategies for building arbitrary ACP inputs.
pub mod strategies {
    use acp::FrameType;
    use proptest::prelude::*;

    /// Strategy over the three frame types.
    pub fn frame_type() -> impl Strategy<Value = FrameType> {
        prop_oneof![Just(FrameType::Telemetry), Just(FrameType::Command), Just(FrameType::System)]
    }

    /// Strategy over payload byte vectors up to [`acp::MAX_PAYLOAD`] bytes.
    pub fn payload() -> impl Strategy<Value = Vec<u8>> {
        proptest::collection::vec(any::<u8>(), 0..=acp::MAX_PAYLOAD)
    }

    /// Strategy over non-zero 32-bit sequence numbers, the only values a
    /// valid authenticated frame can carry.
    pub fn nonzero_sequence() -> impl Strategy<Value = u32> {
        1u32..=u32::MAX
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_key_store_round_trip() {
        let mut store = MemoryKeyStore::new();
        store.seed(7, b"k".repeat(32).as_slice());

        let mut out = [0u8; 32];
        let len = store.load(7, &mut out).unwrap();
        assert_eq!(len, 32);
        assert_eq!(&out[..], b"k".repeat(32).as_slice());

        store.erase(7).unwrap();
        assert_eq!(store.load(7, &mut out), Err(AcpError::InvalidParam));
    }

    #[test]
    fn fixed_entropy_cycles_pattern() {
        let entropy = FixedEntropy::new(vec![1, 2, 3]);
        let mut buf = [0u8; 7];
        entropy.fill(&mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, 1, 2, 3, 1]);
    }

    #[test]
    fn counting_entropy_tracks_calls() {
        let entropy = CountingEntropy::new();
        let mut buf = [0u8; 16];
        entropy.fill(&mut buf).unwrap();
        entropy.fill(&mut buf).unwrap();
        assert_eq!(entropy.fill_calls(), 2);
        assert_eq!(entropy.bytes_produced(), 32);
    }

    #[test]
    fn test_clock_advances() {
        let clock = TestClock::new(1000);
        assert_eq!(clock.monotonic_ms(), 1000);
        clock.advance(500);
        assert_eq!(clock.monotonic_ms(), 1500);
    }

    #[test]
    fn recording_logger_captures_messages() {
        let logger = RecordingLogger::new();
        logger.log(LogLevel::Warn, "replay detected for session 7");
        assert_eq!(logger.records().len(), 1);
        assert!(logger.any_message_contains("replay"));
        assert!(!logger.any_message_contains("0x01 0x02 0x03"));
    }

    #[test]
    fn corrupt_byte_flips_requested_bit() {
        let mut buf = [0b0000_0000u8];
        corrupt_byte(&mut buf, 0, 3);
        assert_eq!(buf[0], 0b0000_1000);
    }
}
