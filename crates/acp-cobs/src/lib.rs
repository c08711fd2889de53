//! Consistent Overhead Byte Stuffing (COBS) and the streaming frame-boundary
//! detector built on top of it.
//!
//! COBS removes a chosen delimiter byte (`0x00`, here) from an arbitrary
//! byte string with overhead bounded by `ceil(len / 254) + 1`. ACP uses it
//! to make `0x00` safe to use as a frame delimiter on a byte-oriented link:
//! once a buffer is COBS-stuffed, a receiver can scan for the next `0x00` and
//! know it has a complete frame, with no possibility of a stray zero byte
//! inside the payload confusing the boundary.

#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_code)]
#![deny(missing_docs)]

use thiserror::Error;

/// The byte COBS removes from the stuffed region and that frames use as a
/// delimiter.
pub const DELIMITER: u8 = 0x00;

/// Maximum number of non-zero bytes a single COBS code byte can cover.
pub const BLOCK_SIZE: usize = 254;

/// Errors produced by the COBS codec and boundary detector.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CobsError {
    /// The destination buffer was too small to hold the result.
    #[error("buffer too small: need {needed}, have {available}")]
    BufferTooSmall {
        /// Bytes required.
        needed: usize,
        /// Bytes actually available.
        available: usize,
    },
    /// A code byte was zero, or claimed a block longer than remains in the
    /// input.
    #[error("malformed COBS code byte at offset {offset}")]
    InvalidCode {
        /// Byte offset of the bad code byte within the encoded input.
        offset: usize,
    },
}

/// Upper bound on the encoded length of an `input_len`-byte payload.
#[must_use]
pub const fn max_encoded_len(input_len: usize) -> usize {
    if input_len == 0 {
        1
    } else {
        input_len + input_len.div_ceil(BLOCK_SIZE)
    }
}

/// Encode `input` into `output`, returning the number of bytes written.
///
/// The result contains no `0x00` bytes. `output` must be at least
/// [`max_encoded_len`]`(input.len())` bytes; encoding never allocates.
pub fn encode(input: &[u8], output: &mut [u8]) -> Result<usize, CobsError> {
    let needed = max_encoded_len(input.len());
    if output.len() < needed {
        return Err(CobsError::BufferTooSmall { needed, available: output.len() });
    }

    let mut src = input;
    let mut written = 0usize;

    loop {
        let block_len = src.iter().take(BLOCK_SIZE).take_while(|&&b| b != DELIMITER).count();

        output[written] = (block_len + 1) as u8;
        written += 1;
        output[written..written + block_len].copy_from_slice(&src[..block_len]);
        written += block_len;
        src = &src[block_len..];

        if src.is_empty() {
            break;
        }

        // A full block of BLOCK_SIZE non-zero bytes does not implicitly
        // consume a terminating zero — only a short block (ended by an
        // actual 0x00 byte, or by running out of input) does.
        if block_len < BLOCK_SIZE {
            // `src[0]` is DELIMITER here unless we ran out of input, which
            // is excluded by the `is_empty` check above.
            src = &src[1..];
        }
    }

    Ok(written)
}

/// Decode a COBS-stuffed `input` into `output`, returning the number of
/// bytes written.
pub fn decode(input: &[u8], output: &mut [u8]) -> Result<usize, CobsError> {
    let mut src = input;
    let mut written = 0usize;
    let mut offset = 0usize;

    while !src.is_empty() {
        let code = src[0];
        if code == 0 {
            return Err(CobsError::InvalidCode { offset });
        }
        let block_len = usize::from(code) - 1;

        if block_len > src.len() - 1 {
            return Err(CobsError::InvalidCode { offset });
        }

        let block = &src[1..1 + block_len];
        if block.contains(&DELIMITER) {
            return Err(CobsError::InvalidCode { offset });
        }

        let remaining_after_block = src.len() - 1 - block_len;
        let implicit_zero = usize::from(remaining_after_block > 0 && usize::from(code) != BLOCK_SIZE + 1);

        if written + block_len + implicit_zero > output.len() {
            return Err(CobsError::BufferTooSmall {
                needed: written + block_len + implicit_zero,
                available: output.len(),
            });
        }

        output[written..written + block_len].copy_from_slice(block);
        written += block_len;
        if implicit_zero == 1 {
            output[written] = DELIMITER;
            written += 1;
        }

        offset += 1 + block_len;
        src = &src[1 + block_len..];
    }

    Ok(written)
}

/// Check that `data` is well-formed COBS-stuffed output without decoding it
/// into a separate buffer.
#[must_use]
pub fn validate(data: &[u8]) -> bool {
    if data.is_empty() {
        return false;
    }

    let mut pos = 0usize;
    while pos < data.len() {
        let code = data[pos];
        if code == 0 {
            return false;
        }
        let block_len = usize::from(code) - 1;
        let block_start = pos + 1;
        let block_end = block_start + block_len;
        if block_end > data.len() {
            return false;
        }
        if data[block_start..block_end].contains(&DELIMITER) {
            return false;
        }
        pos = block_end;
    }

    true
}

/// State of the streaming frame-boundary detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    /// Waiting for the first non-delimiter byte; leading `0x00` bytes are
    /// silently ignored (resync after line noise).
    Idle,
    /// Accumulating bytes of the current frame.
    Receiving,
    /// A complete COBS-stuffed frame is buffered; call
    /// [`FrameBoundaryDetector::get_frame`] to decode it.
    Complete,
    /// The detector hit an unrecoverable condition (buffer exhausted).
    /// Sticky until [`FrameBoundaryDetector::reset`] is called.
    Error(CobsError),
}

/// Streaming detector that finds `0x00`-delimited frame boundaries in a
/// byte stream and hands back the COBS-stuffed bytes between them.
///
/// Callers feed bytes one at a time as they arrive from a transport. The
/// detector owns no heap storage — the accumulation buffer is borrowed from
/// the caller for the detector's lifetime.
pub struct FrameBoundaryDetector<'buf> {
    buffer: &'buf mut [u8],
    pos: usize,
    state: DetectorState,
}

impl<'buf> FrameBoundaryDetector<'buf> {
    /// Create a detector that accumulates into `buffer`.
    ///
    /// `buffer` should be at least as large as the largest COBS-stuffed
    /// frame body the caller expects to receive; exceeding it transitions
    /// to [`DetectorState::Error`].
    pub fn new(buffer: &'buf mut [u8]) -> Self {
        Self { buffer, pos: 0, state: DetectorState::Idle }
    }

    /// Current detector state.
    #[must_use]
    pub fn state(&self) -> DetectorState {
        self.state
    }

    /// Reset the detector to [`DetectorState::Idle`], discarding any
    /// partially accumulated frame. Clears the sticky error state.
    pub fn reset(&mut self) {
        self.pos = 0;
        self.state = DetectorState::Idle;
    }

    /// Feed one byte from the transport into the detector.
    ///
    /// Returns the resulting state. Once in [`DetectorState::Complete`] or
    /// [`DetectorState::Error`], further bytes are ignored until
    /// [`reset`](Self::reset) is called.
    pub fn feed_byte(&mut self, byte: u8) -> DetectorState {
        match self.state {
            DetectorState::Idle => {
                if byte == DELIMITER {
                    // Leading delimiter: stay idle.
                } else {
                    self.buffer[0] = byte;
                    self.pos = 1;
                    self.state = DetectorState::Receiving;
                }
            },
            DetectorState::Receiving => {
                if byte == DELIMITER {
                    self.state = DetectorState::Complete;
                } else if self.pos >= self.buffer.len() {
                    let err = CobsError::BufferTooSmall {
                        needed: self.pos + 1,
                        available: self.buffer.len(),
                    };
                    self.state = DetectorState::Error(err);
                } else {
                    self.buffer[self.pos] = byte;
                    self.pos += 1;
                }
            },
            DetectorState::Complete | DetectorState::Error(_) => {
                // Sticky until reset; caller must drain with get_frame or
                // reset explicitly.
            },
        }
        self.state
    }

    /// Decode the accumulated COBS-stuffed bytes into `output`.
    ///
    /// Only valid in [`DetectorState::Complete`]; resets the detector to
    /// `Idle` on return (success or failure) so the caller is always ready
    /// for the next frame.
    pub fn get_frame(&mut self, output: &mut [u8]) -> Result<usize, CobsError> {
        if self.state != DetectorState::Complete {
            return Err(CobsError::InvalidCode { offset: 0 });
        }
        let result = decode(&self.buffer[..self.pos], output);
        self.reset();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(input: &[u8]) {
        let mut encoded = [0u8; 2048];
        let enc_len = encode(input, &mut encoded).unwrap();
        assert!(!encoded[..enc_len].contains(&DELIMITER));

        let mut decoded = [0u8; 2048];
        let dec_len = decode(&encoded[..enc_len], &mut decoded).unwrap();
        assert_eq!(&decoded[..dec_len], input);
    }

    #[test]
    fn round_trip_empty() {
        round_trip(b"");
    }

    #[test]
    fn round_trip_no_zeros() {
        round_trip(b"HELLO WORLD");
    }

    #[test]
    fn round_trip_with_embedded_zeros() {
        round_trip(&[1, 2, 0, 3, 0, 0, 4, 5]);
    }

    #[test]
    fn round_trip_exact_block_boundary() {
        let data = [0x41u8; BLOCK_SIZE];
        round_trip(&data);
    }

    #[test]
    fn round_trip_over_block_boundary() {
        let data = [0x41u8; BLOCK_SIZE + 10];
        round_trip(&data);
    }

    #[test]
    fn round_trip_all_zeros() {
        let data = [0u8; 10];
        round_trip(&data);
    }

    #[test]
    fn encode_rejects_too_small_buffer() {
        let input = [1, 2, 3];
        let mut out = [0u8; 2];
        assert_eq!(
            encode(&input, &mut out),
            Err(CobsError::BufferTooSmall { needed: 4, available: 2 })
        );
    }

    #[test]
    fn decode_rejects_zero_code() {
        let mut out = [0u8; 16];
        assert!(decode(&[0x00, 0x01], &mut out).is_err());
    }

    #[test]
    fn decode_rejects_truncated_block() {
        let mut out = [0u8; 16];
        // Code claims 5 bytes follow, only 1 is present.
        assert!(decode(&[0x06, 0xAA], &mut out).is_err());
    }

    #[test]
    fn validate_accepts_encoded_output() {
        let input = [1, 2, 0, 3];
        let mut encoded = [0u8; 16];
        let len = encode(&input, &mut encoded).unwrap();
        assert!(validate(&encoded[..len]));
    }

    #[test]
    fn validate_rejects_empty() {
        assert!(!validate(&[]));
    }

    #[test]
    fn validate_rejects_malformed() {
        assert!(!validate(&[0x00]));
        assert!(!validate(&[0x05, 1, 2])); // claims 4 bytes, only 2 present
    }

    #[test]
    fn detector_resyncs_after_noise() {
        let mut buf = [0u8; 64];
        let mut detector = FrameBoundaryDetector::new(&mut buf);

        assert_eq!(detector.feed_byte(0x00), DetectorState::Idle);
        assert_eq!(detector.feed_byte(0x55), DetectorState::Receiving);
        assert_eq!(detector.feed_byte(0xAA), DetectorState::Receiving);
        assert_eq!(detector.feed_byte(0x00), DetectorState::Complete);

        let mut out = [0u8; 16];
        // 0x55 0xAA is not valid COBS (not a valid leading code covering the
        // rest) only if code value conflicts; use a real encoded payload
        // instead for the decode assertion below.
        let _ = detector.get_frame(&mut out);
        assert_eq!(detector.state(), DetectorState::Idle);
    }

    #[test]
    fn detector_completes_exactly_once_per_frame() {
        let input = b"ping";
        let mut encoded = [0u8; 16];
        let enc_len = encode(input, &mut encoded).unwrap();

        let mut buf = [0u8; 64];
        let mut detector = FrameBoundaryDetector::new(&mut buf);

        for &b in &encoded[..enc_len] {
            assert_eq!(detector.feed_byte(b), DetectorState::Receiving);
        }
        assert_eq!(detector.feed_byte(0x00), DetectorState::Complete);

        let mut out = [0u8; 16];
        let len = detector.get_frame(&mut out).unwrap();
        assert_eq!(&out[..len], input);
        assert_eq!(detector.state(), DetectorState::Idle);
    }

    #[test]
    fn detector_buffer_overflow_is_sticky_error() {
        let mut buf = [0u8; 2];
        let mut detector = FrameBoundaryDetector::new(&mut buf);

        detector.feed_byte(0x01);
        detector.feed_byte(0x02);
        let state = detector.feed_byte(0x03);
        assert!(matches!(state, DetectorState::Error(_)));

        // Sticky until reset.
        assert!(matches!(detector.feed_byte(0x04), DetectorState::Error(_)));
        detector.reset();
        assert_eq!(detector.state(), DetectorState::Idle);
    }

    #[test]
    fn detector_any_prefix_stays_receiving() {
        let input = b"telemetry-payload";
        let mut encoded = [0u8; 32];
        let enc_len = encode(input, &mut encoded).unwrap();

        let mut buf = [0u8; 64];
        let mut detector = FrameBoundaryDetector::new(&mut buf);
        for &b in &encoded[..enc_len - 1] {
            let state = detector.feed_byte(b);
            assert_eq!(state, DetectorState::Receiving);
        }
    }
}
