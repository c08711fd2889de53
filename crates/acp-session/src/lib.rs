//! Session state: key/nonce lifecycle, transmit sequence issuance, receive
//! sequence validation via a sliding replay window, and HMAC
//! computation/verification on encoded bytes.
//!
//! A [`Session`] authenticates one logical peer association. It holds no
//! reference to a transport or to the frame codec — callers pass it the
//! COBS-stuffed inner bytes of a frame (see the facade crate for where that
//! region is carved out) and get back a tag, or feed it a received sequence
//! number and get back accept/reject.

#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_code)]
#![deny(missing_docs)]

use acp_crypto::{ct_eq, hmac_sha256_16, zeroise, HMAC_TAG_LEN};
use thiserror::Error;
use zeroize::Zeroize;

/// Fixed key length a [`Session`] stores internally; shorter keys are
/// right-zero-padded on [`Session::init`]/[`Session::rotate`].
pub const KEY_LEN: usize = 32;

/// Width of the sliding replay window, in sequence numbers.
pub const REPLAY_WINDOW_BITS: u32 = 64;

/// Errors raised by session operations.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    /// A supplied parameter was out of range (e.g. zero-length key, sequence
    /// `0` presented to [`Session::check_rx_seq`]).
    #[error("invalid parameter")]
    InvalidParam,
    /// The presented key was empty; [`Session::init`]/[`rotate`](Session::rotate)
    /// require at least one byte.
    #[error("key too short")]
    KeyTooShort,
    /// A sequence number was rejected as a replay or as too far outside the
    /// sliding window.
    #[error("replayed or out-of-window sequence number")]
    Replay,
    /// The session has not been initialised (or was terminated).
    #[error("session not initialised")]
    SessionNotInit,
}

/// Per-peer key, nonce, and sequence-counter state.
///
/// `key` is zeroised on [`rotate`](Session::rotate), [`terminate`](Session::terminate),
/// and on `Drop`.
pub struct Session {
    key_id: u32,
    key: [u8; KEY_LEN],
    nonce: u64,
    next_tx_seq: u32,
    rx_anchor: u32,
    rx_window: u64,
    policy_flags: u8,
    initialised: bool,
}

impl Session {
    /// Initialise a session with `key_id`, `key_bytes` (copied into a
    /// 32-byte buffer, right-zero-padded if shorter), and a `nonce`.
    ///
    /// # Errors
    /// Returns [`SessionError::KeyTooShort`] if `key_bytes` is empty.
    pub fn init(key_id: u32, key_bytes: &[u8], nonce: u64) -> Result<Self, SessionError> {
        if key_bytes.is_empty() {
            return Err(SessionError::KeyTooShort);
        }

        let mut key = [0u8; KEY_LEN];
        let copy_len = core::cmp::min(key_bytes.len(), KEY_LEN);
        key[..copy_len].copy_from_slice(&key_bytes[..copy_len]);

        Ok(Self {
            key_id,
            key,
            nonce,
            next_tx_seq: 1,
            rx_anchor: 0,
            rx_window: 0,
            policy_flags: 0,
            initialised: true,
        })
    }

    /// Identifier of the currently installed key, as provisioned by the
    /// application's `KeyStore`.
    #[must_use]
    pub const fn key_id(&self) -> u32 {
        self.key_id
    }

    /// Session nonce. Serves only as a peer/session identifier; it is not
    /// mixed into the HMAC input.
    #[must_use]
    pub const fn nonce(&self) -> u64 {
        self.nonce
    }

    /// `true` once [`init`](Self::init) has run and before [`terminate`](Self::terminate).
    #[must_use]
    pub const fn is_initialised(&self) -> bool {
        self.initialised
    }

    /// Replace the key and/or nonce, zeroising the previous key and
    /// resetting both sequence counters and the replay window.
    ///
    /// # Errors
    /// Returns [`SessionError::SessionNotInit`] if the session has not been
    /// [`init`](Self::init)ialised (or was [`terminate`](Self::terminate)d),
    /// or [`SessionError::KeyTooShort`] if `new_key` is `Some(&[])`.
    pub fn rotate(&mut self, new_key: Option<&[u8]>, new_nonce: u64) -> Result<(), SessionError> {
        if !self.initialised {
            return Err(SessionError::SessionNotInit);
        }

        if let Some(bytes) = new_key {
            if bytes.is_empty() {
                return Err(SessionError::KeyTooShort);
            }
            zeroise(&mut self.key);
            let copy_len = core::cmp::min(bytes.len(), KEY_LEN);
            self.key[..copy_len].copy_from_slice(&bytes[..copy_len]);
            if copy_len < KEY_LEN {
                self.key[copy_len..].fill(0);
            }
        }

        self.nonce = new_nonce;
        self.next_tx_seq = 1;
        self.rx_anchor = 0;
        self.rx_window = 0;
        self.initialised = true;
        Ok(())
    }

    /// Reset the transmit counter and the receive replay window without
    /// touching the key or nonce.
    ///
    /// # Errors
    /// Returns [`SessionError::SessionNotInit`] if the session has not been
    /// [`init`](Self::init)ialised (or was [`terminate`](Self::terminate)d).
    pub fn reset_sequence(&mut self) -> Result<(), SessionError> {
        if !self.initialised {
            return Err(SessionError::SessionNotInit);
        }

        self.next_tx_seq = 1;
        self.rx_anchor = 0;
        self.rx_window = 0;
        Ok(())
    }

    /// Zeroise the key and clear all counters. The session must be
    /// re-[`init`](Self::init)ialised before further use.
    pub fn terminate(&mut self) {
        zeroise(&mut self.key);
        self.key_id = 0;
        self.nonce = 0;
        self.next_tx_seq = 0;
        self.rx_anchor = 0;
        self.rx_window = 0;
        self.initialised = false;
    }

    /// Issue the next transmit sequence number, advancing the internal
    /// counter. Skips `0` on 32-bit wraparound since `0` is reserved for
    /// unauthenticated frames.
    ///
    /// # Errors
    /// Returns [`SessionError::SessionNotInit`] if the session has not been
    /// [`init`](Self::init)ialised (or was [`terminate`](Self::terminate)d).
    pub fn tx_seq(&mut self) -> Result<u32, SessionError> {
        if !self.initialised {
            return Err(SessionError::SessionNotInit);
        }

        let issued = self.next_tx_seq;
        self.next_tx_seq = self.next_tx_seq.wrapping_add(1);
        if self.next_tx_seq == 0 {
            self.next_tx_seq = 1;
        }
        Ok(issued)
    }

    /// Validate a received sequence number against the 64-bit sliding
    /// replay window anchored at the highest previously accepted sequence.
    ///
    /// # Errors
    /// Returns [`SessionError::SessionNotInit`] if the session has not been
    /// [`init`](Self::init)ialised (or was [`terminate`](Self::terminate)d),
    /// [`SessionError::InvalidParam`] for `n == 0`, or
    /// [`SessionError::Replay`] for a duplicate or out-of-window sequence.
    pub fn check_rx_seq(&mut self, n: u32) -> Result<(), SessionError> {
        if !self.initialised {
            return Err(SessionError::SessionNotInit);
        }

        if n == 0 {
            return Err(SessionError::InvalidParam);
        }

        if n > self.rx_anchor {
            let shift = u64::from(n - self.rx_anchor).min(u64::from(REPLAY_WINDOW_BITS));
            self.rx_window = if shift >= REPLAY_WINDOW_BITS as u64 { 0 } else { self.rx_window << shift };
            self.rx_window |= 1;
            self.rx_anchor = n;
            return Ok(());
        }

        if n == self.rx_anchor || u64::from(self.rx_anchor - n) >= u64::from(REPLAY_WINDOW_BITS) {
            return Err(SessionError::Replay);
        }

        let p = self.rx_anchor - n;
        let bit = 1u64 << p;
        if self.rx_window & bit != 0 {
            return Err(SessionError::Replay);
        }
        self.rx_window |= bit;
        Ok(())
    }

    /// Highest sequence number accepted so far (`0` if none yet).
    #[must_use]
    pub const fn rx_anchor(&self) -> u32 {
        self.rx_anchor
    }

    /// Compute the 16-byte truncated HMAC-SHA-256 tag over `bytes` under
    /// this session's key.
    ///
    /// # Errors
    /// Returns [`SessionError::SessionNotInit`] if the session has not been
    /// [`init`](Self::init)ialised (or was [`terminate`](Self::terminate)d).
    pub fn compute_hmac(&self, bytes: &[u8]) -> Result<[u8; HMAC_TAG_LEN], SessionError> {
        if !self.initialised {
            return Err(SessionError::SessionNotInit);
        }

        Ok(hmac_sha256_16(&self.key, bytes))
    }

    /// Recompute the tag over `bytes` and compare it to `tag` in constant
    /// time.
    ///
    /// # Errors
    /// Returns [`SessionError::SessionNotInit`] if the session has not been
    /// [`init`](Self::init)ialised (or was [`terminate`](Self::terminate)d).
    pub fn verify_hmac(&self, bytes: &[u8], tag: &[u8; HMAC_TAG_LEN]) -> Result<bool, SessionError> {
        let computed = self.compute_hmac(bytes)?;
        Ok(ct_eq(&computed, tag))
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_rejects_empty_key() {
        assert_eq!(Session::init(1, &[], 0), Err(SessionError::KeyTooShort));
    }

    #[test]
    fn init_pads_short_key() {
        let session = Session::init(1, &[0xAB; 4], 0).unwrap();
        assert_eq!(session.key, {
            let mut k = [0u8; KEY_LEN];
            k[..4].copy_from_slice(&[0xAB; 4]);
            k
        });
    }

    #[test]
    fn tx_seq_starts_at_one_and_increments() {
        let mut session = Session::init(1, b"key", 0).unwrap();
        assert_eq!(session.tx_seq(), Ok(1));
        assert_eq!(session.tx_seq(), Ok(2));
        assert_eq!(session.tx_seq(), Ok(3));
    }

    #[test]
    fn tx_seq_skips_zero_on_wraparound() {
        let mut session = Session::init(1, b"key", 0).unwrap();
        session.next_tx_seq = u32::MAX;
        assert_eq!(session.tx_seq(), Ok(u32::MAX));
        assert_eq!(session.tx_seq(), Ok(1));
    }

    #[test]
    fn check_rx_seq_rejects_zero() {
        let mut session = Session::init(1, b"key", 0).unwrap();
        assert_eq!(session.check_rx_seq(0), Err(SessionError::InvalidParam));
    }

    #[test]
    fn check_rx_seq_accepts_monotonic_sequence() {
        let mut session = Session::init(1, b"key", 0).unwrap();
        assert!(session.check_rx_seq(1).is_ok());
        assert!(session.check_rx_seq(2).is_ok());
        assert!(session.check_rx_seq(3).is_ok());
        assert_eq!(session.rx_anchor(), 3);
    }

    #[test]
    fn check_rx_seq_rejects_exact_replay() {
        let mut session = Session::init(1, b"key", 0).unwrap();
        session.check_rx_seq(5).unwrap();
        assert_eq!(session.check_rx_seq(5), Err(SessionError::Replay));
    }

    #[test]
    fn check_rx_seq_accepts_in_window_reorder() {
        let mut session = Session::init(1, b"key", 0).unwrap();
        session.check_rx_seq(10).unwrap();
        assert!(session.check_rx_seq(9).is_ok());
        assert!(session.check_rx_seq(8).is_ok());
        assert_eq!(session.check_rx_seq(9), Err(SessionError::Replay));
    }

    #[test]
    fn check_rx_seq_rejects_too_far_behind_anchor() {
        let mut session = Session::init(1, b"key", 0).unwrap();
        session.check_rx_seq(100).unwrap();
        assert_eq!(session.check_rx_seq(100 - 64), Err(SessionError::Replay));
    }

    #[test]
    fn check_rx_seq_handles_large_forward_jump() {
        let mut session = Session::init(1, b"key", 0).unwrap();
        session.check_rx_seq(1).unwrap();
        session.check_rx_seq(1_000_000).unwrap();
        assert_eq!(session.rx_anchor(), 1_000_000);
        // Anything near the old anchor is now far outside the window.
        assert_eq!(session.check_rx_seq(1), Err(SessionError::Replay));
    }

    #[test]
    fn hmac_round_trip() {
        let session = Session::init(1, b"super-secret-key", 0).unwrap();
        let msg = b"authenticated payload bytes";
        let tag = session.compute_hmac(msg).unwrap();
        assert!(session.verify_hmac(msg, &tag).unwrap());
    }

    #[test]
    fn hmac_rejects_tampered_message() {
        let session = Session::init(1, b"super-secret-key", 0).unwrap();
        let tag = session.compute_hmac(b"original").unwrap();
        assert!(!session.verify_hmac(b"tampered!", &tag).unwrap());
    }

    #[test]
    fn hmac_rejects_tampered_tag() {
        let session = Session::init(1, b"super-secret-key", 0).unwrap();
        let mut tag = session.compute_hmac(b"message").unwrap();
        tag[0] ^= 0xFF;
        assert!(!session.verify_hmac(b"message", &tag).unwrap());
    }

    #[test]
    fn rotate_resets_counters_and_changes_key() {
        let mut session = Session::init(1, b"old-key", 10).unwrap();
        session.tx_seq().unwrap();
        session.check_rx_seq(5).unwrap();

        let old_tag = session.compute_hmac(b"probe").unwrap();
        session.rotate(Some(b"new-key"), 20).unwrap();

        assert_eq!(session.nonce(), 20);
        assert_eq!(session.tx_seq(), Ok(1));
        assert_eq!(session.rx_anchor(), 0);
        assert_ne!(session.compute_hmac(b"probe").unwrap(), old_tag);
    }

    #[test]
    fn rotate_rejects_empty_key() {
        let mut session = Session::init(1, b"old-key", 0).unwrap();
        assert_eq!(session.rotate(Some(&[]), 0), Err(SessionError::KeyTooShort));
    }

    #[test]
    fn reset_sequence_clears_counters_but_keeps_key() {
        let mut session = Session::init(1, b"old-key", 10).unwrap();
        session.tx_seq().unwrap();
        session.check_rx_seq(5).unwrap();

        let tag_before = session.compute_hmac(b"probe").unwrap();
        session.reset_sequence().unwrap();

        assert_eq!(session.nonce(), 10);
        assert_eq!(session.tx_seq(), Ok(1));
        assert_eq!(session.rx_anchor(), 0);
        assert_eq!(session.compute_hmac(b"probe").unwrap(), tag_before);
    }

    #[test]
    fn terminate_clears_state() {
        let mut session = Session::init(1, b"key", 0).unwrap();
        session.terminate();
        assert!(!session.is_initialised());
        assert_eq!(session.key, [0u8; KEY_LEN]);
    }

    #[test]
    fn operations_on_terminated_session_return_session_not_init() {
        let mut session = Session::init(1, b"key", 0).unwrap();
        session.check_rx_seq(1).unwrap();
        session.terminate();

        assert_eq!(session.tx_seq(), Err(SessionError::SessionNotInit));
        assert_eq!(session.check_rx_seq(1), Err(SessionError::SessionNotInit));
        assert_eq!(session.compute_hmac(b"x"), Err(SessionError::SessionNotInit));
        assert_eq!(
            session.verify_hmac(b"x", &[0u8; HMAC_TAG_LEN]),
            Err(SessionError::SessionNotInit)
        );
        assert_eq!(
            session.rotate(Some(b"new-key"), 1),
            Err(SessionError::SessionNotInit)
        );
        assert_eq!(session.reset_sequence(), Err(SessionError::SessionNotInit));
    }
}
