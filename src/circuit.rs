//! SHA-256 over XOR shares (single 512-bit block)
//!
//! The circuit is generic over the gadget context, so the prover's
//! three-branch evaluation and the verifier's two-branch replay walk the exact
//! same gate sequence. Gate budget per evaluation:
//!
//! | phase            | gates                    |
//! |------------------|--------------------------|
//! | message schedule | 48 words × 3 ADD  = 144  |
//! | compression      | 64 rounds × 9     = 576  |
//! | feed-forward     | 8 ADD             =   8  |
//!
//! for [`GATE_COUNT`] = 728 trace words, followed by the 8 output words that
//! the commitment layer appends ([`TRACE_LEN`] = 736).
//!
//! Per compression round: `h+Σ1`, `CH` (1 AND), `+ch`, `+k[i]`, `+w[i]`,
//! `MAJ` (1 AND), `Σ0+maj`, `d+temp1`, `temp1+temp2`.

#![forbid(unsafe_code)]

use crate::gadgets::Gadgets;
use crate::shares::Shares;

/// SHA-256 initial hash values.
pub const H0: [u32; 8] = [
    0x6a09e667, 0xbb67ae85, 0x3c6ef372, 0xa54ff53a, 0x510e527f, 0x9b05688c, 0x1f83d9ab, 0x5be0cd19,
];

/// SHA-256 round constants.
pub const K: [u32; 64] = [
    0x428a2f98, 0x71374491, 0xb5c0fbcf, 0xe9b5dba5, 0x3956c25b, 0x59f111f1, 0x923f82a4, 0xab1c5ed5,
    0xd807aa98, 0x12835b01, 0x243185be, 0x550c7dc3, 0x72be5d74, 0x80deb1fe, 0x9bdc06a7, 0xc19bf174,
    0xe49b69c1, 0xefbe4786, 0x0fc19dc6, 0x240ca1cc, 0x2de92c6f, 0x4a7484aa, 0x5cb0a9dc, 0x76f988da,
    0x983e5152, 0xa831c66d, 0xb00327c8, 0xbf597fc7, 0xc6e00bf3, 0xd5a79147, 0x06ca6351, 0x14292967,
    0x27b70a85, 0x2e1b2138, 0x4d2c6dfc, 0x53380d13, 0x650a7354, 0x766a0abb, 0x81c2c92e, 0x92722c85,
    0xa2bfe8a1, 0xa81a664b, 0xc24b8b70, 0xc76c51a3, 0xd192e819, 0xd6990624, 0xf40e3585, 0x106aa070,
    0x19a4c116, 0x1e376c08, 0x2748774c, 0x34b0bcb5, 0x391c0cb3, 0x4ed8aa4a, 0x5b9cca4f, 0x682e6ff3,
    0x748f82ee, 0x78a5636f, 0x84c87814, 0x8cc70208, 0x90befffa, 0xa4506ceb, 0xbef9a3f7, 0xc67178f2,
];

/// ADD gates in the message schedule.
pub const SCHEDULE_GATES: usize = 48 * 3;
/// Randomness-consuming gates per compression round.
pub const ROUND_GATES: usize = 9;
/// ADD gates in the final feed-forward.
pub const FEED_FORWARD_GATES: usize = 8;
/// Randomness-consuming gates per circuit evaluation.
pub const GATE_COUNT: usize = SCHEDULE_GATES + 64 * ROUND_GATES + FEED_FORWARD_GATES;

/// Digest words appended to every trace after the gates.
pub const OUTPUT_WORDS: usize = 8;
/// Trace words per view.
pub const TRACE_LEN: usize = GATE_COUNT + OUTPUT_WORDS;

/// One SHA-256 block in bytes.
pub const BLOCK_LEN: usize = 64;
/// Longest message that fits one block: 512 − 64 (length) − 1 (`0x80` bit).
pub const MAX_INPUT_BITS: usize = 447;
/// [`MAX_INPUT_BITS`] rounded down to whole bytes.
pub const MAX_INPUT_BYTES: usize = MAX_INPUT_BITS / 8;

/// Input validation errors, raised before any sharing work.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    /// Message does not fit a single padded block.
    #[error("input is {got} bytes; a single SHA-256 block holds at most {max} bytes")]
    TooLong {
        /// Offending length in bytes.
        got: usize,
        /// [`MAX_INPUT_BYTES`].
        max: usize,
    },
}

/// Reject messages longer than one block can carry.
pub fn check_input_len(len: usize) -> Result<(), InputError> {
    if len * 8 > MAX_INPUT_BITS {
        return Err(InputError::TooLong { got: len, max: MAX_INPUT_BYTES });
    }
    Ok(())
}

/// Pad one branch's share of the message into a block.
///
/// Each branch pads identically: `0x80` right after the data and the bit
/// length in bytes 62–63 (big-endian). The length field is 16 bits wide,
/// which covers every admissible input. Since three copies of the padding
/// XOR to one copy, the padded shares reconstruct the padded message.
pub fn pad_share(share: &[u8]) -> Result<[u8; BLOCK_LEN], InputError> {
    check_input_len(share.len())?;
    let bits = share.len() * 8;
    let mut block = [0u8; BLOCK_LEN];
    block[..share.len()].copy_from_slice(share);
    block[share.len()] = 0x80;
    block[62] = (bits >> 8) as u8;
    block[63] = bits as u8;
    Ok(block)
}

/// Read the 16 big-endian schedule words of each branch's block.
pub fn block_words<const N: usize>(blocks: [&[u8; BLOCK_LEN]; N]) -> [Shares<N>; 16] {
    let mut w = [Shares([0u32; N]); 16];
    for (j, word) in w.iter_mut().enumerate() {
        for (share, block) in word.0.iter_mut().zip(blocks.iter()) {
            let b = &block[j * 4..j * 4 + 4];
            *share = u32::from_be_bytes([b[0], b[1], b[2], b[3]]);
        }
    }
    w
}

/// Evaluate the SHA-256 compression of one block over shares.
///
/// Returns the eight output words (shared). Exactly [`GATE_COUNT`] gadget
/// gates are consumed.
pub fn sha256_circuit<const N: usize, G: Gadgets<N>>(
    mpc: &mut G,
    block: [Shares<N>; 16],
) -> Result<[Shares<N>; 8], G::Error> {
    // Message schedule.
    let mut w = [Shares([0u32; N]); 64];
    w[..16].copy_from_slice(&block);
    for j in 16..64 {
        let s0 = w[j - 15].rotr(7).xor(w[j - 15].rotr(18)).xor(w[j - 15].shr(3));
        let s1 = w[j - 2].rotr(17).xor(w[j - 2].rotr(19)).xor(w[j - 2].shr(10));
        let t = mpc.add(w[j - 16], s0)?;
        let t = mpc.add(w[j - 7], t)?;
        w[j] = mpc.add(t, s1)?;
    }

    // Compression.
    let [mut a, mut b, mut c, mut d, mut e, mut f, mut g, mut h] = H0.map(Shares::<N>::broadcast);
    for i in 0..64 {
        let s1 = e.rotr(6).xor(e.rotr(11)).xor(e.rotr(25));
        let t0 = mpc.add(h, s1)?;
        let ch = mpc.ch(e, f, g)?;
        let t1 = mpc.add(t0, ch)?;
        let t1 = mpc.add_const(t1, K[i])?;
        let temp1 = mpc.add(t1, w[i])?;

        let s0 = a.rotr(2).xor(a.rotr(13)).xor(a.rotr(22));
        let maj = mpc.maj(a, b, c)?;
        let temp2 = mpc.add(s0, maj)?;

        h = g;
        g = f;
        f = e;
        e = mpc.add(d, temp1)?;
        d = c;
        c = b;
        b = a;
        a = mpc.add(temp1, temp2)?;
    }

    // Feed-forward.
    let state = [a, b, c, d, e, f, g, h];
    let mut out = [Shares([0u32; N]); 8];
    for (k, o) in out.iter_mut().enumerate() {
        *o = mpc.add(Shares::broadcast(H0[k]), state[k])?;
    }
    Ok(out)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gadgets::ProverGadgets;
    use crate::prg::RandomTape;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use sha2::{Digest, Sha256};
    use std::convert::Infallible;

    /// Single-party engine: shares are the values themselves.
    #[derive(Default)]
    struct Cleartext {
        gates: usize,
    }

    impl Gadgets<1> for Cleartext {
        type Error = Infallible;

        fn and(&mut self, x: Shares<1>, y: Shares<1>) -> Result<Shares<1>, Infallible> {
            self.gates += 1;
            Ok(Shares([x.0[0] & y.0[0]]))
        }

        fn add(&mut self, x: Shares<1>, y: Shares<1>) -> Result<Shares<1>, Infallible> {
            self.gates += 1;
            Ok(Shares([x.0[0].wrapping_add(y.0[0])]))
        }

        fn gates(&self) -> usize {
            self.gates
        }
    }

    fn digest_bytes(words: &[u32; 8]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_be_bytes()).collect()
    }

    #[test]
    fn constants_add_up() {
        assert_eq!(GATE_COUNT, 728);
        assert_eq!(TRACE_LEN, 736);
        assert_eq!(MAX_INPUT_BYTES, 55);
    }

    #[test]
    fn cleartext_circuit_matches_sha256() {
        let msgs: [&[u8]; 4] =
            [b"", b"abc", b"The quick brown fox jumps over the lazy dog", &[0x5a; 55]];
        for msg in msgs {
            let block = pad_share(msg).unwrap();
            let mut engine = Cleartext::default();
            let out = sha256_circuit(&mut engine, block_words([&block])).unwrap();
            let words = out.map(|s| s.0[0]);
            assert_eq!(digest_bytes(&words), Sha256::digest(msg).to_vec());
            assert_eq!(engine.gates(), GATE_COUNT);
        }
    }

    #[test]
    fn shared_circuit_reconstructs_sha256_and_uses_every_tape_word() {
        let mut rng = StdRng::seed_from_u64(2024);
        let msg = b"abc";
        let s0: Vec<u8> = (0..msg.len()).map(|_| rng.gen()).collect();
        let s1: Vec<u8> = (0..msg.len()).map(|_| rng.gen()).collect();
        let s2: Vec<u8> = msg.iter().zip(&s0).zip(&s1).map(|((m, a), b)| m ^ a ^ b).collect();
        let blocks = [pad_share(&s0).unwrap(), pad_share(&s1).unwrap(), pad_share(&s2).unwrap()];

        let tapes = [
            RandomTape::from_key(&rng.gen()),
            RandomTape::from_key(&rng.gen()),
            RandomTape::from_key(&rng.gen()),
        ];
        let mut mpc = ProverGadgets::new([&tapes[0], &tapes[1], &tapes[2]]);
        let out = sha256_circuit(&mut mpc, block_words([&blocks[0], &blocks[1], &blocks[2]])).unwrap();

        let words = out.map(|s| s.reconstruct());
        assert_eq!(digest_bytes(&words), Sha256::digest(msg).to_vec());
        assert_eq!(mpc.gates(), GATE_COUNT);
        for trace in mpc.into_traces() {
            assert_eq!(trace.len(), GATE_COUNT);
        }
    }

    #[test]
    fn padding_layout_and_length_limit() {
        let block = pad_share(b"abc").unwrap();
        assert_eq!(&block[..3], b"abc");
        assert_eq!(block[3], 0x80);
        assert!(block[4..62].iter().all(|&b| b == 0));
        assert_eq!((block[62], block[63]), (0, 24));

        let full = pad_share(&[1u8; 55]).unwrap();
        assert_eq!(full[55], 0x80);
        assert_eq!((full[62], full[63]), (0x01, 0xb8));

        assert_eq!(pad_share(&[0u8; 56]).unwrap_err(), InputError::TooLong { got: 56, max: 55 });
    }
}
