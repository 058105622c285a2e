//! Views, commitments and openings
//!
//! A round's prover work is:
//!
//! 1. [`RoundSecrets::generate`]: three PRG keys, three 4-byte auxiliary
//!    randoms, and three XOR shares of the message.
//! 2. [`commit_round`]: run the shared circuit, append the output words to
//!    each trace, and bind `key ‖ view ‖ aux` per branch with SHA-256.
//! 3. [`open_round`]: once the challenge `e` is known, reveal branches `e`
//!    and `e + 1`.
//!
//! All records have fixed byte sizes; the `*_BYTES` constants are the proof
//! file layout and must not change.

#![forbid(unsafe_code)]
#![allow(missing_docs)]

use rand::{CryptoRng, RngCore};
use sha2::{Digest as _, Sha256};

use crate::circuit::{
    block_words, pad_share, sha256_circuit, InputError, BLOCK_LEN, GATE_COUNT, OUTPUT_WORDS,
    TRACE_LEN,
};
use crate::gadgets::{GadgetError, ProverGadgets};
use crate::prg::{RandomTape, TapeKey, KEY_LEN};
use crate::shares::{Branch, NUM_BRANCHES, OPENED_BRANCHES};
use crate::transcript::Challenge;
use crate::Digest;

/// Length of a branch's auxiliary random.
pub const AUX_LEN: usize = 4;

/// Auxiliary random bound into a branch commitment.
pub type AuxRandom = [u8; AUX_LEN];

/// Branch commitment digest.
pub type BranchHash = [u8; 32];

/// Encoded view: input block, then the trace as little-endian words.
pub const VIEW_BYTES: usize = BLOCK_LEN + TRACE_LEN * 4;

/// Encoded commitment: `yp[3][8]` words, then `h[3]`.
pub const COMMITMENT_BYTES: usize = NUM_BRANCHES * OUTPUT_WORDS * 4 + NUM_BRANCHES * 32;

/// Encoded opening: two keys, two views, two auxiliary randoms.
pub const OPENING_BYTES: usize = OPENED_BRANCHES * (KEY_LEN + VIEW_BYTES + AUX_LEN);

/// Structural errors: a record does not have the shape both sides agree on.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    /// A view's trace is not exactly [`TRACE_LEN`] words.
    #[error("view trace has {got} words, expected {expected}")]
    TraceLength {
        /// Required length.
        expected: usize,
        /// Actual length.
        got: usize,
    },
    /// A fixed-size record was given the wrong number of bytes.
    #[error("{what} record is {got} bytes, expected {expected}")]
    RecordSize {
        /// Record kind.
        what: &'static str,
        /// Required size.
        expected: usize,
        /// Actual size.
        got: usize,
    },
    /// A proof file's size does not match the configured round count.
    #[error("proof is {got} bytes, but {rounds} rounds need exactly {expected}")]
    ProofSize {
        /// Configured rounds.
        rounds: usize,
        /// Required size.
        expected: usize,
        /// Actual size.
        got: usize,
    },
}

/// Errors while building one round's commitment.
#[derive(Debug, thiserror::Error)]
pub enum CommitError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error("circuit evaluation failed: {0}")]
    Circuit(#[from] GadgetError),
    #[error(transparent)]
    Format(#[from] FormatError),
}

// ============================================================================
// View
// ============================================================================

/// Everything one branch saw during one round: its padded input share and
/// one trace word per gate, followed by its output share.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct View {
    input: [u8; BLOCK_LEN],
    trace: Vec<u32>,
}

impl View {
    /// Build a view, enforcing the fixed trace length.
    pub fn new(input: [u8; BLOCK_LEN], trace: Vec<u32>) -> Result<Self, FormatError> {
        if trace.len() != TRACE_LEN {
            return Err(FormatError::TraceLength { expected: TRACE_LEN, got: trace.len() });
        }
        Ok(Self { input, trace })
    }

    /// Padded input block share.
    pub fn input(&self) -> &[u8; BLOCK_LEN] {
        &self.input
    }

    /// All [`TRACE_LEN`] trace words.
    pub fn trace(&self) -> &[u32] {
        &self.trace
    }

    /// The [`GATE_COUNT`] gate words, without the output words.
    pub fn gate_trace(&self) -> &[u32] {
        &self.trace[..GATE_COUNT]
    }

    /// The final [`OUTPUT_WORDS`] trace words: this branch's output share.
    pub fn output(&self) -> [u32; OUTPUT_WORDS] {
        let mut out = [0u32; OUTPUT_WORDS];
        out.copy_from_slice(&self.trace[GATE_COUNT..]);
        out
    }

    #[cfg(test)]
    pub(crate) fn trace_mut(&mut self) -> &mut [u32] {
        &mut self.trace
    }

    /// Append the [`VIEW_BYTES`] encoding.
    pub fn write_bytes(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.input);
        for w in &self.trace {
            out.extend_from_slice(&w.to_le_bytes());
        }
    }

    /// Decode exactly [`VIEW_BYTES`] bytes.
    pub fn read_bytes(bytes: &[u8]) -> Result<Self, FormatError> {
        expect_len("view", bytes, VIEW_BYTES)?;
        let (input, trace) = bytes.split_at(BLOCK_LEN);
        let mut block = [0u8; BLOCK_LEN];
        block.copy_from_slice(input);
        Self::new(block, read_words(trace))
    }
}

/// Per-branch commitment `SHA-256(key ‖ view ‖ aux)`.
pub fn branch_hash(key: &TapeKey, view: &View, aux: &AuxRandom) -> BranchHash {
    let mut view_bytes = Vec::with_capacity(VIEW_BYTES);
    view.write_bytes(&mut view_bytes);

    let mut h = Sha256::new();
    h.update(key);
    h.update(&view_bytes);
    h.update(aux);
    h.finalize().into()
}

// ============================================================================
// Commitment
// ============================================================================

/// Per-round commitment: output shares and branch hashes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Commitment {
    /// Output share of each branch; their XOR is the digest.
    pub yp: [[u32; OUTPUT_WORDS]; NUM_BRANCHES],
    /// Branch hashes binding key, view and auxiliary random.
    pub h: [BranchHash; NUM_BRANCHES],
}

impl Commitment {
    /// XOR of the three output shares.
    pub fn reconstruct(&self) -> Digest {
        let mut words = [0u32; OUTPUT_WORDS];
        for (i, w) in words.iter_mut().enumerate() {
            *w = self.yp[0][i] ^ self.yp[1][i] ^ self.yp[2][i];
        }
        Digest(words)
    }

    /// Append the [`COMMITMENT_BYTES`] encoding.
    pub fn write_bytes(&self, out: &mut Vec<u8>) {
        for share in &self.yp {
            for w in share {
                out.extend_from_slice(&w.to_le_bytes());
            }
        }
        for h in &self.h {
            out.extend_from_slice(h);
        }
    }

    /// Decode exactly [`COMMITMENT_BYTES`] bytes.
    pub fn read_bytes(bytes: &[u8]) -> Result<Self, FormatError> {
        expect_len("commitment", bytes, COMMITMENT_BYTES)?;
        let (yp_bytes, h_bytes) = bytes.split_at(NUM_BRANCHES * OUTPUT_WORDS * 4);
        let mut c = Commitment::default();
        for (share, chunk) in c.yp.iter_mut().zip(yp_bytes.chunks_exact(OUTPUT_WORDS * 4)) {
            share.copy_from_slice(&read_words(chunk));
        }
        for (h, chunk) in c.h.iter_mut().zip(h_bytes.chunks_exact(32)) {
            h.copy_from_slice(chunk);
        }
        Ok(c)
    }
}

// ============================================================================
// Opening
// ============================================================================

/// What the verifier sees of one round: branches `e` and `e + 1`, in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Opening {
    pub keys: [TapeKey; OPENED_BRANCHES],
    pub views: [View; OPENED_BRANCHES],
    pub aux: [AuxRandom; OPENED_BRANCHES],
}

impl Opening {
    /// Append the [`OPENING_BYTES`] encoding.
    pub fn write_bytes(&self, out: &mut Vec<u8>) {
        for k in &self.keys {
            out.extend_from_slice(k);
        }
        for v in &self.views {
            v.write_bytes(out);
        }
        for r in &self.aux {
            out.extend_from_slice(r);
        }
    }

    /// Decode exactly [`OPENING_BYTES`] bytes.
    pub fn read_bytes(bytes: &[u8]) -> Result<Self, FormatError> {
        expect_len("opening", bytes, OPENING_BYTES)?;
        let (keys, rest) = bytes.split_at(OPENED_BRANCHES * KEY_LEN);
        let (views, aux) = rest.split_at(OPENED_BRANCHES * VIEW_BYTES);

        let mut key_arr = [[0u8; KEY_LEN]; OPENED_BRANCHES];
        for (k, chunk) in key_arr.iter_mut().zip(keys.chunks_exact(KEY_LEN)) {
            k.copy_from_slice(chunk);
        }
        let mut aux_arr = [[0u8; AUX_LEN]; OPENED_BRANCHES];
        for (r, chunk) in aux_arr.iter_mut().zip(aux.chunks_exact(AUX_LEN)) {
            r.copy_from_slice(chunk);
        }
        let (v0, v1) = views.split_at(VIEW_BYTES);
        Ok(Opening {
            keys: key_arr,
            views: [View::read_bytes(v0)?, View::read_bytes(v1)?],
            aux: aux_arr,
        })
    }
}

// ============================================================================
// Round construction
// ============================================================================

/// Secret material for one round. Never leaves the prover.
#[derive(Clone)]
pub struct RoundSecrets {
    pub keys: [TapeKey; NUM_BRANCHES],
    pub aux: [AuxRandom; NUM_BRANCHES],
    /// XOR shares of the unpadded message.
    pub shares: [Vec<u8>; NUM_BRANCHES],
}

impl RoundSecrets {
    /// Draw keys, auxiliary randoms and the two free shares from `rng`; the
    /// third share is fixed by the message.
    ///
    /// Any failure of the randomness source is returned as-is; there is no
    /// fallback.
    pub fn generate<R: RngCore + CryptoRng>(input: &[u8], rng: &mut R) -> Result<Self, rand::Error> {
        let mut keys = [[0u8; KEY_LEN]; NUM_BRANCHES];
        for k in keys.iter_mut() {
            rng.try_fill_bytes(k)?;
        }
        let mut aux = [[0u8; AUX_LEN]; NUM_BRANCHES];
        for r in aux.iter_mut() {
            rng.try_fill_bytes(r)?;
        }
        let mut s0 = vec![0u8; input.len()];
        let mut s1 = vec![0u8; input.len()];
        rng.try_fill_bytes(&mut s0)?;
        rng.try_fill_bytes(&mut s1)?;
        let s2 = input.iter().zip(&s0).zip(&s1).map(|((m, a), b)| m ^ a ^ b).collect();
        Ok(Self { keys, aux, shares: [s0, s1, s2] })
    }
}

impl std::fmt::Debug for RoundSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoundSecrets").finish_non_exhaustive()
    }
}

/// Evaluate the circuit on a round's shares and commit to every branch.
///
/// Returns the commitment and all three views; the caller keeps the views
/// until the challenge decides which two to open.
pub fn commit_round(secrets: &RoundSecrets) -> Result<(Commitment, [View; NUM_BRANCHES]), CommitError> {
    let tapes = [
        RandomTape::from_key(&secrets.keys[0]),
        RandomTape::from_key(&secrets.keys[1]),
        RandomTape::from_key(&secrets.keys[2]),
    ];
    let blocks = [
        pad_share(&secrets.shares[0])?,
        pad_share(&secrets.shares[1])?,
        pad_share(&secrets.shares[2])?,
    ];

    let mut mpc = ProverGadgets::new([&tapes[0], &tapes[1], &tapes[2]]);
    let out = sha256_circuit(&mut mpc, block_words([&blocks[0], &blocks[1], &blocks[2]]))?;
    let mut traces = mpc.into_traces();

    let mut commitment = Commitment::default();
    for b in Branch::ALL {
        let i = b.as_usize();
        let output = out.map(|w| w[b]);
        traces[i].extend_from_slice(&output);
        commitment.yp[i] = output;
    }

    let [t0, t1, t2] = traces;
    let views = [View::new(blocks[0], t0)?, View::new(blocks[1], t1)?, View::new(blocks[2], t2)?];
    for b in Branch::ALL {
        let i = b.as_usize();
        commitment.h[i] = branch_hash(&secrets.keys[i], &views[i], &secrets.aux[i]);
    }
    Ok((commitment, views))
}

/// Reveal branches `e` and `e + 1` of a committed round.
pub fn open_round(challenge: Challenge, secrets: &RoundSecrets, views: &[View; NUM_BRANCHES]) -> Opening {
    let [first, second] = challenge.opened().map(Branch::as_usize);
    Opening {
        keys: [secrets.keys[first], secrets.keys[second]],
        views: [views[first].clone(), views[second].clone()],
        aux: [secrets.aux[first], secrets.aux[second]],
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn expect_len(what: &'static str, bytes: &[u8], expected: usize) -> Result<(), FormatError> {
    if bytes.len() != expected {
        return Err(FormatError::RecordSize { what, expected, got: bytes.len() });
    }
    Ok(())
}

fn read_words(bytes: &[u8]) -> Vec<u32> {
    bytes
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
