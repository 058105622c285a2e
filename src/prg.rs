//! Per-branch randomness tapes (AES-128-CTR)
//!
//! Each (round, branch) owns a 128-bit key. The tape is the CTR-mode
//! encryption of a fixed ASCII plaintext under that key, long enough for one
//! 32-bit word per gate. Prover and verifier derive the tape from the key
//! alone, so an opened key reproduces the exact bytes the prover consumed.
//!
//! Layout compatibility with existing proof files depends on three constants
//! below: the IV, the plaintext byte, and little-endian word reads.

#![forbid(unsafe_code)]

use aes::Aes128;
use ctr::cipher::{KeyIvInit, StreamCipher};

use crate::circuit::GATE_COUNT;

/// Length of a PRG key in bytes.
pub const KEY_LEN: usize = 16;

/// Bytes per tape: one 32-bit word for every AND/ADD gate.
pub const TAPE_LEN: usize = GATE_COUNT * 4;

/// CTR initial counter block (ASCII, big-endian 128-bit counter).
const TAPE_IV: [u8; 16] = *b"0123456789012345";

/// Every plaintext byte is ASCII `'0'`.
const TAPE_PLAINTEXT: u8 = b'0';

type Aes128Ctr = ctr::Ctr128BE<Aes128>;

/// A PRG key for one branch of one round.
pub type TapeKey = [u8; KEY_LEN];

/// Deterministic randomness for one branch of one round.
#[derive(Clone)]
pub struct RandomTape {
    bytes: Box<[u8]>,
}

impl RandomTape {
    /// Expand `key` into the full tape.
    pub fn from_key(key: &TapeKey) -> Self {
        let mut bytes = vec![TAPE_PLAINTEXT; TAPE_LEN].into_boxed_slice();
        let mut cipher = Aes128Ctr::new(&(*key).into(), &TAPE_IV.into());
        cipher.apply_keystream(&mut bytes);
        Self { bytes }
    }

    /// Read the 32-bit word starting at byte `offset` (little-endian).
    ///
    /// Offsets come from [`crate::gadgets::GateCursor`], which never exceeds
    /// `TAPE_LEN - 4` for a well-formed circuit; a read past the end yields
    /// `None` rather than panicking.
    #[inline]
    pub fn word(&self, offset: usize) -> Option<u32> {
        let chunk = self.bytes.get(offset..offset + 4)?;
        Some(u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
    }

    #[cfg(test)]
    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl std::fmt::Debug for RandomTape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RandomTape").field("len", &self.bytes.len()).finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
