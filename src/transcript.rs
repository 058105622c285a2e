//! Fiat–Shamir challenges (SHA-256 bit stream)
//!
//! The transcript binds the claimed digest and every round's commitment, in
//! round order, into a single SHA-256 seed. Challenges are read from the
//! seed two bits at a time, least-significant bit of each byte first:
//!
//! | window `b1 b2` | challenge |
//! |----------------|-----------|
//! | `0 0`          | 0         |
//! | `0 1`          | 1         |
//! | `1 0`          | 2         |
//! | `1 1`          | rejected  |
//!
//! Rejected windows still advance the position, which keeps the output
//! uniform over `{0, 1, 2}`. Once all 256 bits are spent the stream
//! continues with `SHA-256(previous hash)`.
//!
//! The prover and the verifier run the same code on the same bytes, so both
//! sides see identical challenges.

#![forbid(unsafe_code)]

use sha2::{Digest as _, Sha256};

use crate::commitment::{Commitment, COMMITMENT_BYTES};
use crate::shares::Branch;
use crate::Digest;

/// Bits in one SHA-256 output.
const HASH_BITS: usize = 256;

/// Per-round challenge `e`: branches `e` and `e + 1` are opened.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Challenge(Branch);

impl Challenge {
    /// Wrap a branch index.
    #[inline]
    pub fn new(e: Branch) -> Self {
        Challenge(e)
    }

    /// The challenged branch `e` itself.
    #[inline]
    pub fn branch(self) -> Branch {
        self.0
    }

    /// Opened branches in opening order: `[e, e + 1]`.
    #[inline]
    pub fn opened(self) -> [Branch; 2] {
        [self.0, self.0.next()]
    }

    /// The branch that stays hidden: `e + 2`.
    #[cfg(test)]
    pub(crate) fn hidden(self) -> Branch {
        self.0.prev()
    }
}

impl std::fmt::Display for Challenge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Running absorb state for the challenge seed.
#[derive(Clone, Default)]
pub struct Transcript {
    hasher: Sha256,
}

impl Transcript {
    /// Fresh transcript with nothing absorbed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the claimed digest (eight words, little-endian).
    pub fn absorb_digest(&mut self, digest: &Digest) {
        for w in digest.0 {
            self.hasher.update(w.to_le_bytes());
        }
    }

    /// Bind every round's commitment in round order.
    pub fn absorb_commitments(&mut self, commitments: &[Commitment]) {
        let mut buf = Vec::with_capacity(COMMITMENT_BYTES);
        for c in commitments {
            buf.clear();
            c.write_bytes(&mut buf);
            self.hasher.update(&buf);
        }
    }

    /// Finish absorbing and hand out the challenge stream.
    pub fn into_challenges(self) -> ChallengeStream {
        ChallengeStream::from_seed(self.hasher.finalize().into())
    }
}

/// Infinite stream of challenges drawn from a seed hash.
#[derive(Clone, Debug)]
pub struct ChallengeStream {
    hash: [u8; 32],
    pos: usize,
}

impl ChallengeStream {
    /// Start reading at bit 0 of `seed`.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self { hash: seed, pos: 0 }
    }

    #[inline]
    fn bit(&self, p: usize) -> u8 {
        (self.hash[p / 8] >> (p % 8)) & 1
    }
}

impl Iterator for ChallengeStream {
    type Item = Challenge;

    fn next(&mut self) -> Option<Challenge> {
        loop {
            if self.pos >= HASH_BITS {
                self.hash = Sha256::digest(self.hash).into();
                self.pos = 0;
            }
            let window = (self.bit(self.pos), self.bit(self.pos + 1));
            self.pos += 2;
            let e = match window {
                (0, 0) => 0,
                (0, 1) => 1,
                (1, 0) => 2,
                _ => continue,
            };
            return Some(Challenge(Branch::wrapping(e)));
        }
    }
}

/// One challenge per commitment, derived from the digest and all commitments.
pub fn derive_challenges(digest: &Digest, commitments: &[Commitment]) -> Vec<Challenge> {
    let mut t = Transcript::new();
    t.absorb_digest(digest);
    t.absorb_commitments(commitments);
    t.into_challenges().take(commitments.len()).collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn ids(stream: ChallengeStream, n: usize) -> Vec<usize> {
        stream.take(n).map(|c| c.branch().as_usize()).collect()
    }

    #[test]
    fn windows_are_lsb_first_and_skip_ones() {
        // 0xE4 = 0b1110_0100: windows (b0,b1)=00, (b2,b3)=10, (b4,b5)=01, (b6,b7)=11.
        let mut seed = [0u8; 32];
        seed[0] = 0xE4;
        assert_eq!(ids(ChallengeStream::from_seed(seed), 4), vec![0, 2, 1, 0]);
    }

    #[test]
    fn exhausted_seed_rehashes() {
        let seed = [0xFF; 32];
        let next: [u8; 32] = Sha256::digest(seed).into();
        assert_eq!(
            ids(ChallengeStream::from_seed(seed), 16),
            ids(ChallengeStream::from_seed(next), 16)
        );
    }

    #[test]
    fn opened_and_hidden_partition_branches() {
        for e in Branch::ALL {
            let c = Challenge::new(e);
            let [a, b] = c.opened();
            assert_eq!(a, e);
            assert_eq!(b, e.next());
            assert!(c.hidden() != a && c.hidden() != b);
        }
    }

    #[test]
    fn derivation_binds_every_commitment() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut cs: Vec<Commitment> = (0..64)
            .map(|_| {
                let mut c = Commitment::default();
                c.h = [rng.gen(), rng.gen(), rng.gen()];
                c
            })
            .collect();
        let digest = Digest([1, 2, 3, 4, 5, 6, 7, 8]);
        let before = derive_challenges(&digest, &cs);
        assert_eq!(before.len(), 64);
        assert_eq!(before, derive_challenges(&digest, &cs));

        cs[63].h[2][31] ^= 1;
        assert_ne!(before, derive_challenges(&digest, &cs));
        assert_ne!(before, derive_challenges(&Digest([0; 8]), &cs[..]));
    }

    #[test]
    fn challenges_are_roughly_uniform() {
        let mut rng = StdRng::seed_from_u64(5);
        let cs = vec![Commitment::default(); 300];
        let mut counts = [0usize; 3];
        for _ in 0..20 {
            let digest = Digest(rng.gen());
            for c in derive_challenges(&digest, &cs) {
                counts[c.branch().as_usize()] += 1;
            }
        }
        let mean = 6000 / 3;
        for (e, n) in counts.iter().enumerate() {
            assert!(n.abs_diff(mean) < mean / 10, "challenge {e}: {n} of 6000");
        }
    }
}
