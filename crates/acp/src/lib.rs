//! Autonomous Command Protocol (ACP) reference codec.
//!
//! This crate is the facade the rest of this workspace exists to support:
//! [`encode_frame`] and [`decode_frame`] apply authentication policy by
//! frame type on top of the frame codec (`acp-proto`) and session layer
//! (`acp-session`). Transport I/O, key storage, entropy, clocks, and log
//! sinks are external collaborators the facade only ever borrows through
//! the [`KeyStore`], [`Entropy`], [`Clock`], and [`Logger`] traits — this
//! crate never instantiates them.
//!
//! # Lifecycle
//!
//! Call [`init`] once before using any other operation; it runs the
//! cryptographic self-tests and a CRC-16 known-answer check. A self-test
//! failure is fatal: no frame operation may proceed. [`cleanup`] is the
//! matching teardown hook.

#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_code)]
#![deny(missing_docs)]

use acp_crypto::SelfTestFailure;
pub use acp_proto::{frame_requires_auth, is_valid_frame_type, Frame, FrameType, MAX_PAYLOAD};
use acp_proto::{FrameCodecError, MAX_ENCODED_LEN as PROTO_MAX_ENCODED_LEN};
pub use acp_session::{Session, SessionError};
use thiserror::Error;

/// Length, in bytes, of the HMAC tag the facade appends to authenticated
/// frames.
pub const HMAC_TAG_LEN: usize = acp_crypto::HMAC_TAG_LEN;

/// Largest complete transmission unit the facade can produce, including the
/// optional trailing HMAC tag.
pub const MAX_TRANSMISSION_UNIT: usize = PROTO_MAX_ENCODED_LEN + HMAC_TAG_LEN;

/// Canonical ACP error taxonomy, grouped by decade for stable numbering.
///
/// Variant names match the protocol's error taxonomy directly; [`AcpError::code`]
/// exposes the numeric value for wire-level or log-level reporting.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcpError {
    /// A supplied parameter was invalid.
    #[error("invalid parameter")]
    InvalidParam,
    /// Destination buffer too small for the operation's output.
    #[error("buffer too small")]
    BufferTooSmall,
    /// No trailing frame delimiter yet; caller should resupply more bytes.
    #[error("need more data")]
    NeedMoreData,
    /// Operation invalid in the current state (e.g. double-init).
    #[error("invalid state")]
    InvalidState,
    /// `version` byte unsupported.
    #[error("invalid frame version")]
    InvalidVersion,
    /// `type` byte not a recognised frame type.
    #[error("invalid frame type")]
    InvalidType,
    /// Payload length exceeds [`MAX_PAYLOAD`].
    #[error("payload too large")]
    PayloadTooLarge,
    /// Frame failed structural validation.
    #[error("malformed frame")]
    MalformedFrame,
    /// Reserved flag bit set.
    #[error("invalid flags")]
    InvalidFlags,
    /// Decoded length inconsistent with the declared payload length.
    #[error("invalid length")]
    InvalidLength,
    /// Reserved header byte non-zero.
    #[error("reserved field non-zero")]
    ReservedField,
    /// Authenticated frame carried an invalid sequence number.
    #[error("sequence error")]
    SequenceError,
    /// COBS destuffing failed.
    #[error("COBS decode error")]
    CobsDecode,
    /// CRC-16 did not match.
    #[error("CRC mismatch")]
    CrcMismatch,
    /// A `Command` frame was presented without the `Authenticated` flag.
    #[error("authentication required")]
    AuthRequired,
    /// HMAC verification failed.
    #[error("authentication failed")]
    AuthFailed,
    /// Sequence number was a replay or outside the sliding window.
    #[error("replay detected")]
    Replay,
    /// No `Session` was supplied for an authenticated operation.
    #[error("session not initialised")]
    SessionNotInit,
    /// Session key material was shorter than required.
    #[error("key too short")]
    KeyTooShort,
    /// An internal invariant was violated.
    #[error("internal error")]
    Internal,
}

impl AcpError {
    /// Canonical numeric code for this error, grouped by decade as
    /// described in the protocol's external interface section.
    #[must_use]
    pub const fn code(self) -> u16 {
        match self {
            Self::InvalidParam => 1,
            Self::BufferTooSmall => 2,
            Self::NeedMoreData => 3,
            Self::InvalidState => 4,
            Self::InvalidVersion => 10,
            Self::InvalidType => 11,
            Self::PayloadTooLarge => 12,
            Self::MalformedFrame => 13,
            Self::InvalidFlags => 14,
            Self::InvalidLength => 15,
            Self::ReservedField => 16,
            Self::SequenceError => 17,
            Self::CobsDecode => 20,
            Self::CrcMismatch => 30,
            Self::AuthRequired => 40,
            Self::AuthFailed => 41,
            Self::Replay => 42,
            Self::SessionNotInit => 44,
            Self::KeyTooShort => 48,
            Self::Internal => 82,
        }
    }
}

impl From<FrameCodecError> for AcpError {
    fn from(err: FrameCodecError) -> Self {
        match err {
            FrameCodecError::BufferTooSmall => Self::BufferTooSmall,
            FrameCodecError::MalformedFrame => Self::MalformedFrame,
            FrameCodecError::NeedMoreData => Self::NeedMoreData,
            FrameCodecError::CobsDecode(_) => Self::CobsDecode,
            FrameCodecError::CrcMismatch => Self::CrcMismatch,
            FrameCodecError::InvalidVersion => Self::InvalidVersion,
            FrameCodecError::InvalidType => Self::InvalidType,
            FrameCodecError::InvalidFlags => Self::InvalidFlags,
            FrameCodecError::ReservedField => Self::ReservedField,
            FrameCodecError::PayloadTooLarge => Self::PayloadTooLarge,
            FrameCodecError::InvalidLength => Self::InvalidLength,
            FrameCodecError::InvalidSequence => Self::SequenceError,
        }
    }
}

impl From<SessionError> for AcpError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::InvalidParam => Self::InvalidParam,
            SessionError::KeyTooShort => Self::KeyTooShort,
            SessionError::Replay => Self::Replay,
            SessionError::SessionNotInit => Self::SessionNotInit,
        }
    }
}

impl From<SelfTestFailure> for AcpError {
    fn from(_: SelfTestFailure) -> Self {
        Self::Internal
    }
}

/// Log severity levels the [`Logger`] capability accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Diagnostic detail not normally surfaced.
    Debug,
    /// Routine operational information.
    Info,
    /// An unexpected but non-fatal condition.
    Warn,
    /// An operation failed.
    Error,
}

/// Log sink capability. Implementations MUST NOT let key material or HMAC
/// values reach storage or display at [`LogLevel::Info`] or below.
pub trait Logger {
    /// Record `message` at `level`.
    fn log(&self, level: LogLevel, message: &str);
}

/// Monotonic clock capability, used only by applications layering session
/// lifetime policy on top of this crate — the codec itself is clockless.
pub trait Clock {
    /// Milliseconds since an arbitrary, monotonically non-decreasing epoch.
    fn monotonic_ms(&self) -> u64;
}

/// Uniform random byte source, used by applications to generate session
/// nonces and keys — the codec itself never generates key material.
pub trait Entropy {
    /// Fill `buf` with uniformly random bytes.
    ///
    /// # Errors
    /// Returns [`AcpError::Internal`] if the underlying source is
    /// unavailable.
    fn fill(&self, buf: &mut [u8]) -> Result<(), AcpError>;
}

/// Key storage capability, bound by the application to a file-backed
/// store, a secure element, or an in-memory table.
pub trait KeyStore {
    /// Load the key bytes for `key_id` into `out`, returning the number of
    /// bytes written.
    ///
    /// # Errors
    /// Returns [`AcpError::InvalidParam`] if `key_id` is unknown.
    fn load(&self, key_id: u32, out: &mut [u8]) -> Result<usize, AcpError>;

    /// Persist `key_bytes` under `key_id`.
    ///
    /// # Errors
    /// Returns [`AcpError::Internal`] if the store rejects the write.
    fn store(&mut self, key_id: u32, key_bytes: &[u8]) -> Result<(), AcpError>;

    /// Remove the key stored under `key_id`, if any.
    ///
    /// # Errors
    /// Returns [`AcpError::Internal`] if the store cannot guarantee erasure.
    fn erase(&mut self, key_id: u32) -> Result<(), AcpError>;
}

/// Run the library's mandatory self-tests.
///
/// # Errors
/// Returns [`AcpError::Internal`] if any known-answer vector fails to
/// reproduce. No other operation in this crate is safe to call until this
/// succeeds.
pub fn init() -> Result<(), AcpError> {
    acp_crypto::self_test()?;
    if acp_crc16::crc16(b"123456789") != 0x29B1 {
        return Err(AcpError::Internal);
    }
    Ok(())
}

/// Library teardown. Currently a no-op: the codec holds no process-wide
/// state beyond the compile-time CRC table and the self-test outcome
/// checked by [`init`].
pub fn cleanup() -> Result<(), AcpError> {
    Ok(())
}

/// Encode one frame, applying ACP's authentication policy.
///
/// `Command` frames MUST be authenticated (`AuthRequired` otherwise). When
/// `authenticated` is `true`, `session` MUST be `Some` and its `tx_seq()` is
/// used for the frame's sequence number; the HMAC tag is computed over the
/// COBS-stuffed inner bytes (between, not including, the two `0x00`
/// delimiters) and appended after the trailing delimiter.
///
/// # Errors
/// See [`AcpError`]; in particular `AuthRequired` for an unauthenticated
/// `Command`, `SessionNotInit` if `authenticated` is set with no session,
/// and `BufferTooSmall`/`PayloadTooLarge` for capacity violations.
pub fn encode_frame(
    frame_type: FrameType,
    authenticated: bool,
    payload: &[u8],
    session: Option<&mut Session>,
    out: &mut [u8],
) -> Result<usize, AcpError> {
    if frame_requires_auth(frame_type) && !authenticated {
        return Err(AcpError::AuthRequired);
    }

    if !authenticated {
        let frame = Frame::new(frame_type, false, 0, payload)?;
        let written = acp_proto::encode_into(&frame, out)?;
        return Ok(written);
    }

    let session = session.ok_or(AcpError::SessionNotInit)?;
    let sequence = session.tx_seq()?;
    let frame = Frame::new(frame_type, true, sequence, payload)?;
    let written = acp_proto::encode_into(&frame, out)?;

    if out.len() < written + HMAC_TAG_LEN {
        return Err(AcpError::BufferTooSmall);
    }
    // HMAC covers the COBS-stuffed inner bytes only: out[0] and
    // out[written - 1] are the leading/trailing 0x00 delimiters.
    let tag = session.compute_hmac(&out[1..written - 1])?;
    out[written..written + HMAC_TAG_LEN].copy_from_slice(&tag);
    Ok(written + HMAC_TAG_LEN)
}

/// Decode one frame, verifying authentication and replay state when the
/// tentative frame has the `Authenticated` flag set.
///
/// Returns `(frame, consumed)` where `consumed` includes the trailing HMAC
/// tag when present. `frame`'s payload borrows from `scratch`.
///
/// # Errors
/// `AuthRequired` for an unauthenticated `Command` frame; `SessionNotInit`
/// if the tentative frame is authenticated but no session was supplied;
/// `NeedMoreData` if the tag has not fully arrived yet; `AuthFailed` on
/// HMAC mismatch; `Replay` on a rejected sequence number. See [`AcpError`]
/// for the rest of the structural failure modes.
pub fn decode_frame<'s>(
    input: &[u8],
    scratch: &'s mut [u8],
    session: Option<&mut Session>,
) -> Result<(Frame<'s>, usize), AcpError> {
    let (frame, consumed) = acp_proto::decode(input, scratch)?;

    if frame.is_authenticated() {
        let session = session.ok_or(AcpError::SessionNotInit)?;

        if input.len() < consumed + HMAC_TAG_LEN {
            return Err(AcpError::NeedMoreData);
        }

        let inner = &input[1..consumed - 1];
        let mut tag = [0u8; HMAC_TAG_LEN];
        tag.copy_from_slice(&input[consumed..consumed + HMAC_TAG_LEN]);

        if !session.verify_hmac(inner, &tag)? {
            return Err(AcpError::AuthFailed);
        }
        session.check_rx_seq(frame.sequence)?;

        return Ok((frame, consumed + HMAC_TAG_LEN));
    }

    if frame.frame_type == FrameType::Command {
        return Err(AcpError::AuthRequired);
    }

    Ok((frame, consumed))
}
