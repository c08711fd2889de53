//! ACP wire frame codec: header layout, byte-order discipline, and CRC-16
//! integrity over COBS-stuffed frames.
//!
//! This crate knows nothing about sessions or authentication policy — it
//! only serialises and parses the wire format described by the protocol's
//! data model. The session layer (`acp-session`) and the facade (`acp`)
//! layer HMAC verification and policy enforcement on top.

#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_code)]
#![deny(missing_docs)]

use acp_cobs::CobsError;
use acp_crc16::crc16;
use thiserror::Error;

/// Current wire format version.
pub const VERSION: u8 = 0x01;

/// Upper bound on payload length, in bytes.
pub const MAX_PAYLOAD: usize = 1024;

/// `Authenticated` bit within the `flags` byte.
pub const FLAG_AUTHENTICATED: u8 = 0x01;

/// Bits of `flags` reserved for future use; receivers reject frames that
/// set any of them.
const RESERVED_FLAG_MASK: u8 = !FLAG_AUTHENTICATED;

const BASE_HEADER_LEN: usize = 4; // version, type, flags, reserved
const LENGTH_FIELD_LEN: usize = 2;
const SEQ_FIELD_LEN: usize = 4;
const CRC_LEN: usize = 2;

const UNAUTH_PREFIX_LEN: usize = BASE_HEADER_LEN + LENGTH_FIELD_LEN;
const AUTH_PREFIX_LEN: usize = UNAUTH_PREFIX_LEN + SEQ_FIELD_LEN;

/// Largest inner (pre-COBS) wire buffer a frame can occupy.
pub const MAX_WIRE_LEN: usize = AUTH_PREFIX_LEN + MAX_PAYLOAD + CRC_LEN;

/// Largest COBS-stuffed, delimited transmission unit, excluding any
/// trailing HMAC tag (that's added by the facade layer on top of this).
pub const MAX_ENCODED_LEN: usize = 1 + acp_cobs::max_encoded_len(MAX_WIRE_LEN) + 1;

/// ACP frame type, carried in the wire header's `type` byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    /// Sensor/status data; authentication optional.
    Telemetry = 0x01,
    /// Actuation command; authentication mandatory (see [`frame_requires_auth`]).
    Command = 0x02,
    /// Housekeeping/control-plane message; authentication optional.
    System = 0x03,
}

impl FrameType {
    /// Raw wire value of this frame type.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for FrameType {
    type Error = FrameCodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(Self::Telemetry),
            0x02 => Ok(Self::Command),
            0x03 => Ok(Self::System),
            _ => Err(FrameCodecError::InvalidType),
        }
    }
}

/// `true` for any wire value ACP recognises as a frame type.
#[must_use]
pub fn is_valid_frame_type(value: u8) -> bool {
    FrameType::try_from(value).is_ok()
}

/// `true` if frames of this type must carry the `Authenticated` flag.
#[must_use]
pub const fn frame_requires_auth(frame_type: FrameType) -> bool {
    matches!(frame_type, FrameType::Command)
}

/// A decoded ACP frame. Borrows its payload from caller-provided storage —
/// the scratch buffer passed to [`decode`] for decoded frames, or whatever
/// buffer the application owns for frames it is about to encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame<'a> {
    /// Wire format version this frame was built/parsed against.
    pub version: u8,
    /// Frame type.
    pub frame_type: FrameType,
    /// Raw flags byte (bit 0 = Authenticated).
    pub flags: u8,
    /// Payload length in bytes.
    pub length: u16,
    /// Sequence number; meaningful only when [`Frame::is_authenticated`].
    pub sequence: u32,
    /// Payload bytes.
    pub payload: &'a [u8],
}

impl<'a> Frame<'a> {
    /// Build a frame ready to encode. `sequence` is ignored unless
    /// `authenticated` is `true`.
    ///
    /// # Errors
    /// Returns [`FrameCodecError::PayloadTooLarge`] if `payload` exceeds
    /// [`MAX_PAYLOAD`].
    pub fn new(
        frame_type: FrameType,
        authenticated: bool,
        sequence: u32,
        payload: &'a [u8],
    ) -> Result<Self, FrameCodecError> {
        if payload.len() > MAX_PAYLOAD {
            return Err(FrameCodecError::PayloadTooLarge);
        }
        let flags = if authenticated { FLAG_AUTHENTICATED } else { 0 };
        Ok(Self {
            version: VERSION,
            frame_type,
            flags,
            length: payload.len() as u16,
            sequence,
            payload,
        })
    }

    /// `true` if the `Authenticated` flag is set.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.flags & FLAG_AUTHENTICATED != 0
    }
}

/// Errors raised by the frame codec.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameCodecError {
    /// Output buffer cannot hold the worst-case encoded size.
    #[error("buffer too small for encoded frame")]
    BufferTooSmall,
    /// Input does not begin with the leading `0x00` delimiter.
    #[error("missing leading frame delimiter")]
    MalformedFrame,
    /// No trailing `0x00` delimiter found yet; caller should resupply more
    /// bytes.
    #[error("incomplete frame, awaiting more data")]
    NeedMoreData,
    /// The COBS-stuffed body failed to destuff.
    #[error("COBS decode failure: {0}")]
    CobsDecode(CobsError),
    /// Wire CRC-16 did not match the computed value.
    #[error("CRC mismatch")]
    CrcMismatch,
    /// `version` byte did not match [`VERSION`].
    #[error("unsupported frame version")]
    InvalidVersion,
    /// `type` byte is not a recognised [`FrameType`].
    #[error("invalid frame type")]
    InvalidType,
    /// `flags` byte set a reserved bit.
    #[error("reserved flag bit set")]
    InvalidFlags,
    /// `reserved` header byte was non-zero.
    #[error("reserved header byte non-zero")]
    ReservedField,
    /// Declared payload length exceeds [`MAX_PAYLOAD`].
    #[error("payload exceeds maximum size")]
    PayloadTooLarge,
    /// Decoded length did not match `header_size + length + 2`.
    #[error("frame length field inconsistent with decoded size")]
    InvalidLength,
    /// An authenticated frame declared sequence `0`, which is reserved.
    #[error("authenticated frame carried reserved sequence 0")]
    InvalidSequence,
}

impl From<CobsError> for FrameCodecError {
    fn from(err: CobsError) -> Self {
        Self::CobsDecode(err)
    }
}

/// Encode `frame` into `out`, returning the number of bytes written.
///
/// `out` must be at least [`MAX_ENCODED_LEN`] bytes to guarantee success for
/// any valid frame; smaller buffers succeed for smaller payloads.
pub fn encode_into(frame: &Frame<'_>, out: &mut [u8]) -> Result<usize, FrameCodecError> {
    let length = frame.payload.len();
    if length > MAX_PAYLOAD {
        return Err(FrameCodecError::PayloadTooLarge);
    }
    if frame.flags & RESERVED_FLAG_MASK != 0 {
        return Err(FrameCodecError::InvalidFlags);
    }
    if frame.is_authenticated() && frame.sequence == 0 {
        return Err(FrameCodecError::InvalidSequence);
    }

    let mut wire = [0u8; MAX_WIRE_LEN];
    wire[0] = frame.version;
    wire[1] = frame.frame_type.as_u8();
    wire[2] = frame.flags;
    wire[3] = 0;
    wire[4..6].copy_from_slice(&(length as u16).to_be_bytes());

    let prefix_len = if frame.is_authenticated() {
        wire[6..10].copy_from_slice(&frame.sequence.to_be_bytes());
        AUTH_PREFIX_LEN
    } else {
        UNAUTH_PREFIX_LEN
    };

    wire[prefix_len..prefix_len + length].copy_from_slice(frame.payload);
    let crc = crc16(&wire[..prefix_len + length]);
    wire[prefix_len + length..prefix_len + length + CRC_LEN].copy_from_slice(&crc.to_be_bytes());

    let wire_len = prefix_len + length + CRC_LEN;
    let cobs_max = acp_cobs::max_encoded_len(wire_len);

    if out.len() < 1 + cobs_max + 1 {
        return Err(FrameCodecError::BufferTooSmall);
    }

    out[0] = 0x00;
    let enc_len = acp_cobs::encode(&wire[..wire_len], &mut out[1..1 + cobs_max])?;
    out[1 + enc_len] = 0x00;

    Ok(1 + enc_len + 1)
}

/// Decode a single frame from `input`, using `scratch` to hold the
/// destuffed inner bytes. The returned [`Frame`]'s payload borrows from
/// `scratch`.
///
/// Returns `(frame, consumed)` where `consumed` is the number of bytes of
/// `input` the frame occupied, including both delimiters.
pub fn decode<'s>(input: &[u8], scratch: &'s mut [u8]) -> Result<(Frame<'s>, usize), FrameCodecError> {
    if input.is_empty() || input[0] != 0x00 {
        return Err(FrameCodecError::MalformedFrame);
    }

    let Some(trailing_offset) = input[1..].iter().position(|&b| b == 0x00) else {
        return Err(FrameCodecError::NeedMoreData);
    };
    let trailing_idx = 1 + trailing_offset;
    let body = &input[1..trailing_idx];
    if body.is_empty() {
        return Err(FrameCodecError::MalformedFrame);
    }

    let decoded_len = acp_cobs::decode(body, scratch)?;

    if decoded_len < UNAUTH_PREFIX_LEN + CRC_LEN {
        return Err(FrameCodecError::MalformedFrame);
    }

    let version = scratch[0];
    if version != VERSION {
        return Err(FrameCodecError::InvalidVersion);
    }

    let frame_type = FrameType::try_from(scratch[1])?;

    let flags = scratch[2];
    if flags & RESERVED_FLAG_MASK != 0 {
        return Err(FrameCodecError::InvalidFlags);
    }

    if scratch[3] != 0 {
        return Err(FrameCodecError::ReservedField);
    }

    let length = u16::from_be_bytes([scratch[4], scratch[5]]) as usize;
    if length > MAX_PAYLOAD {
        return Err(FrameCodecError::PayloadTooLarge);
    }

    let authenticated = flags & FLAG_AUTHENTICATED != 0;
    let prefix_len = if authenticated { AUTH_PREFIX_LEN } else { UNAUTH_PREFIX_LEN };

    if decoded_len != prefix_len + length + CRC_LEN {
        return Err(FrameCodecError::InvalidLength);
    }

    let sequence = if authenticated {
        let seq = u32::from_be_bytes([scratch[6], scratch[7], scratch[8], scratch[9]]);
        if seq == 0 {
            return Err(FrameCodecError::InvalidSequence);
        }
        seq
    } else {
        0
    };

    let crc_offset = decoded_len - CRC_LEN;
    let crc_received = u16::from_be_bytes([scratch[crc_offset], scratch[crc_offset + 1]]);
    let crc_computed = crc16(&scratch[..crc_offset]);
    if crc_received != crc_computed {
        return Err(FrameCodecError::CrcMismatch);
    }

    let frame = Frame {
        version,
        frame_type,
        flags,
        length: length as u16,
        sequence,
        payload: &scratch[prefix_len..prefix_len + length],
    };

    Ok((frame, trailing_idx + 1))
}
