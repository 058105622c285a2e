//! Crate root: public surface, proof types, and protocol-wide invariants
//!
//! `mpcsha` proves knowledge of a message `m` (at most 447 bits) with
//! `SHA-256(m) = y` for a public `y`, without revealing `m`. Each round
//! simulates a three-party computation of SHA-256 over XOR shares of `m`,
//! commits to every party's view, and opens two of the three under a
//! Fiat–Shamir challenge ("MPC in the head", ZKBoo-style).
//!
//! ## Invariants
//!
//! - **Sharing.** Three branches hold 32-bit XOR shares of every wire. Branch
//!   arithmetic is modulo 3; opening `e` reveals branches `e` and `e + 1`.
//! - **Circuit.** One generic [`circuit::sha256_circuit`] drives both the
//!   three-branch prover and the two-branch replay, so gate order and tape
//!   offsets agree by construction. Every evaluation consumes exactly
//!   [`circuit::GATE_COUNT`] gates.
//! - **Randomness.** Per-branch tapes are AES-128-CTR keystreams; round
//!   secrets come from a caller-supplied `CryptoRng`.
//! - **Soundness.** Each round catches a cheating prover with probability at
//!   least 1/3, so `R` rounds give soundness error `(2/3)^R`. The default
//!   [`DEFAULT_ROUNDS`] = 136 is the smallest `R` with `(2/3)^R < 2^-79`.
//!
//! Proof files carry no header: `R` commitments followed by `R` openings
//! (see [`api::io`]). The reader must be told `R`.

#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms)]

use std::fmt;

use serde::{Serialize, Serializer};

/// Branch indices and XOR-shared words.
pub mod shares;
/// Per-branch AES-CTR randomness tapes.
pub mod prg;
/// AND/ADD gadgets for the prover (3 branches) and the replay (2 branches).
pub mod gadgets;
/// SHA-256 compression over shares, padding and input limits.
pub mod circuit;
/// Views, commitments, openings and round construction.
pub mod commitment;
/// Fiat–Shamir challenge derivation.
pub mod transcript;
/// Single-round verification by partial replay.
pub mod verifier;
/// Round scheduling for prove/verify (parallel per round).
pub mod scheduler;
/// Happy-path API and proof file I/O.
pub mod api;
/// Runtime configuration for the binaries.
pub mod config;

pub use commitment::{Commitment, Opening, View};
pub use scheduler::{ProveError, Prover, VerificationReport, Verifier, VerifyError};
pub use transcript::Challenge;
pub use verifier::RoundFailure;

/// Default number of rounds.
pub const DEFAULT_ROUNDS: usize = 136;

/// Bytes per round in a proof file.
pub const ROUND_BYTES: usize = commitment::COMMITMENT_BYTES + commitment::OPENING_BYTES;

/// A SHA-256 digest as eight 32-bit words.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Digest(pub [u32; 8]);

impl Digest {
    /// Hash `msg` directly (reference, not in MPC).
    pub fn of_message(msg: &[u8]) -> Self {
        use sha2::Digest as _;
        let bytes: [u8; 32] = sha2::Sha256::digest(msg).into();
        Self::from_bytes(&bytes)
    }

    /// Standard big-endian byte form.
    pub fn to_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        for (chunk, w) in out.chunks_exact_mut(4).zip(self.0) {
            chunk.copy_from_slice(&w.to_be_bytes());
        }
        out
    }

    /// Inverse of [`Digest::to_bytes`].
    pub fn from_bytes(bytes: &[u8; 32]) -> Self {
        let mut words = [0u32; 8];
        for (w, c) in words.iter_mut().zip(bytes.chunks_exact(4)) {
            *w = u32::from_be_bytes([c[0], c[1], c[2], c[3]]);
        }
        Digest(words)
    }

    /// Lowercase hex of the big-endian bytes.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Parse 64 hex digits.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s.trim(), &mut bytes)?;
        Ok(Self::from_bytes(&bytes))
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

/// A complete proof: one commitment and one opening per round.
///
/// Both vectors have the same length `R`; the challenges are not stored
/// since the verifier re-derives them from the commitments.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Proof {
    /// Per-round commitments, absorbed in order into the challenge seed.
    pub commitments: Vec<Commitment>,
    /// Per-round openings of branches `e` and `e + 1`.
    pub openings: Vec<Opening>,
}

impl Proof {
    /// Number of rounds.
    pub fn rounds(&self) -> usize {
        self.commitments.len()
    }
}
