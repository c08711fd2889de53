//! Cryptographic primitives backing the ACP session layer.
//!
//! SHA-256 (FIPS 180-4) and HMAC-SHA-256 (RFC 2104) are sourced from the
//! `sha2`/`hmac` crates rather than hand-rolled, matching how the rest of
//! this corpus reaches for RustCrypto primitives for keyed hashing. This
//! crate wraps them with the narrower contract ACP's session layer needs:
//! one-shot and incremental hashing, HMAC truncated to 16 bytes, a
//! constant-time comparison that never branches per byte, and zeroisation
//! of key material that the compiler cannot optimise away.
//!
//! # Self-tests
//!
//! [`self_test`] checks the known-answer vectors named in the protocol
//! specification (plain SHA-256 of `"abc"`, and RFC 4231 HMAC test vectors 1
//! and 2 truncated to 16 bytes). [`acp`](../acp/index.html)'s `init()` runs
//! this before the library is considered usable.

#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_code)]
#![deny(missing_docs)]

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

/// Length in bytes of a full SHA-256 digest.
pub const SHA256_LEN: usize = 32;

/// Length in bytes of the truncated HMAC tag ACP carries on the wire.
pub const HMAC_TAG_LEN: usize = 16;

type HmacSha256 = Hmac<Sha256>;

/// Compute the SHA-256 digest of `data` in one call.
#[must_use]
pub fn sha256(data: &[u8]) -> [u8; SHA256_LEN] {
    let mut state = Sha256State::new();
    state.update(data);
    state.finalize()
}

/// Incremental SHA-256 state for streaming input (e.g. bytes arriving off a
/// transport rather than held in one buffer).
pub struct Sha256State {
    inner: Sha256,
}

impl Sha256State {
    /// Start a new SHA-256 computation.
    #[must_use]
    pub fn new() -> Self {
        Self { inner: Sha256::new() }
    }

    /// Fold additional bytes into the running digest.
    pub fn update(&mut self, data: &[u8]) {
        Digest::update(&mut self.inner, data);
    }

    /// Finalize and return the 32-byte digest.
    #[must_use]
    pub fn finalize(self) -> [u8; SHA256_LEN] {
        self.inner.finalize().into()
    }
}

impl Default for Sha256State {
    fn default() -> Self {
        Self::new()
    }
}

/// Compute the full 32-byte HMAC-SHA-256 tag of `msg` under `key`.
///
/// Per RFC 2104: keys longer than the 64-byte block size are first hashed
/// with SHA-256; shorter keys are zero-padded. The `hmac` crate handles both
/// cases internally.
#[must_use]
pub fn hmac_sha256(key: &[u8], msg: &[u8]) -> [u8; SHA256_LEN] {
    // `Hmac::new_from_slice` only fails for key lengths the variable-key
    // `Mac` trait can't represent, which excludes no byte slice length for
    // a block-size-64 hash — RFC 2104 key handling is unconditional.
    let Ok(mut mac) = HmacSha256::new_from_slice(key) else {
        unreachable!("HMAC-SHA256 accepts keys of any length")
    };
    mac.update(msg);
    mac.finalize().into_bytes().into()
}

/// Compute HMAC-SHA-256 and truncate to the first 16 bytes — the tag length
/// ACP appends to authenticated frames.
#[must_use]
pub fn hmac_sha256_16(key: &[u8], msg: &[u8]) -> [u8; HMAC_TAG_LEN] {
    let full = hmac_sha256(key, msg);
    let mut tag = [0u8; HMAC_TAG_LEN];
    tag.copy_from_slice(&full[..HMAC_TAG_LEN]);
    tag
}

/// Constant-time byte-slice equality.
///
/// Unequal lengths are folded into the accumulator rather than
/// short-circuited, and every byte pair is compared regardless of earlier
/// mismatches — a naive early-exit loop would leak timing information about
/// where two HMAC tags first diverge, which is exactly what this is used to
/// prevent.
#[must_use]
pub fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    let len_diff = (a.len() != b.len()) as u8;

    let mut diff: u8 = len_diff;
    let n = core::cmp::min(a.len(), b.len());
    for i in 0..n {
        diff |= a[i] ^ b[i];
    }
    diff == 0
}

/// Overwrite `buf` with zeros in a way the compiler cannot optimise away.
///
/// Delegates to the `zeroize` crate, which performs the non-elidable
/// volatile write itself; this function exists so the rest of this
/// workspace has a single, auditable call site for "clear this secret now"
/// rather than scattering `Zeroize::zeroize()` calls and hoping none of them
/// got dropped (pun intended) during a refactor.
pub fn zeroise(buf: &mut [u8]) {
    buf.zeroize();
}

/// Known-answer self-tests for the primitives in this crate.
///
/// Returns `Err` with a short, non-secret description of which vector
/// failed. Never includes key material, digests, or tags in the error —
/// only which named vector mismatched, per the protocol's logging
/// restriction (key/HMAC material must never appear at or below `Info`
/// level, and a self-test failure message is exactly the kind of string
/// that could end up in a log).
pub fn self_test() -> Result<(), SelfTestFailure> {
    if sha256(b"abc") != SHA256_ABC_VECTOR {
        return Err(SelfTestFailure::Sha256Abc);
    }

    let case1 = hmac_sha256(&[0x0b; 20], b"Hi There");
    if !ct_eq(&case1[..HMAC_TAG_LEN], &RFC4231_CASE1_TRUNCATED) {
        return Err(SelfTestFailure::HmacRfc4231Case1);
    }

    let case2 = hmac_sha256(b"Jefe", b"what do ya want for nothing?");
    if !ct_eq(&case2[..HMAC_TAG_LEN], &RFC4231_CASE2_TRUNCATED) {
        return Err(SelfTestFailure::HmacRfc4231Case2);
    }

    Ok(())
}

/// Identifies which known-answer vector failed during [`self_test`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelfTestFailure {
    /// `sha256(b"abc")` did not match the FIPS 180-4 example digest.
    Sha256Abc,
    /// HMAC-SHA-256 did not match RFC 4231 test case 1 (truncated).
    HmacRfc4231Case1,
    /// HMAC-SHA-256 did not match RFC 4231 test case 2 (truncated).
    HmacRfc4231Case2,
}

impl core::fmt::Display for SelfTestFailure {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Sha256Abc => "sha256(\"abc\") known-answer vector",
            Self::HmacRfc4231Case1 => "HMAC-SHA-256 RFC 4231 case 1",
            Self::HmacRfc4231Case2 => "HMAC-SHA-256 RFC 4231 case 2",
        };
        write!(f, "crypto self-test failed: {name}")
    }
}

impl core::error::Error for SelfTestFailure {}

const SHA256_ABC_VECTOR: [u8; SHA256_LEN] = [
    0xba, 0x78, 0x16, 0xbf, 0x8f, 0x01, 0xcf, 0xea, 0x41, 0x41, 0x40, 0xde, 0x5d, 0xae, 0x22, 0x23,
    0xb0, 0x03, 0x61, 0xa3, 0x96, 0x17, 0x7a, 0x9c, 0xb4, 0x10, 0xff, 0x61, 0xf2, 0x00, 0x15, 0xad,
];

const RFC4231_CASE1_TRUNCATED: [u8; HMAC_TAG_LEN] = [
    0xb0, 0x34, 0x4c, 0x61, 0xd8, 0xdb, 0x38, 0x53, 0x5c, 0xa8, 0xaf, 0xce, 0xaf, 0x0b, 0xf1, 0x2b,
];

const RFC4231_CASE2_TRUNCATED: [u8; HMAC_TAG_LEN] = [
    0x5b, 0xdc, 0xc1, 0x46, 0xbf, 0x60, 0x75, 0x4e, 0x6a, 0x04, 0x24, 0x26, 0x08, 0x95, 0x75, 0xc7,
];
