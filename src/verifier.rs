//! Per-round verification (partial replay)
//!
//! Every round must reconstruct the claimed digest ([`check_digest`]); a
//! round built for another message is rejected before any replay.
//!
//! For one round the verifier holds the commitment, its challenge `e`, and
//! the opening of branches `e` and `e + 1`. The checks run in order and stop
//! at the first failure:
//!
//! 1. both opened views hash to the committed `h[b]`;
//! 2. each view's last eight trace words equal the committed `yp[b]`;
//! 3. both tapes are regenerated from the opened keys;
//! 4. the circuit is replayed over two branches, checking every recorded
//!    gate word of branch `e` against what the gadgets recompute;
//! 5. the replayed output shares equal the recorded output words.
//!
//! Branch `e + 1`'s trace words are trusted inputs to the replay (they feed
//! the AND and ADD formulas for branch `e`); they are bound by the
//! commitment hash in step 1.

#![forbid(unsafe_code)]

use crate::circuit::{block_words, sha256_circuit, OUTPUT_WORDS};
use crate::commitment::{branch_hash, Commitment, Opening};
use crate::gadgets::{GadgetError, ReplayGadgets};
use crate::prg::RandomTape;
use crate::shares::Branch;
use crate::transcript::Challenge;
use crate::Digest;

/// Why a round was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoundFailure {
    /// The round's output shares reconstruct a different digest.
    #[error("round reconstructs digest {got}, proof claims {claimed}")]
    Digest {
        /// Digest the proof is about.
        claimed: Digest,
        /// XOR of this round's output shares.
        got: Digest,
    },
    /// `SHA-256(key ‖ view ‖ aux)` differs from the committed hash.
    #[error("commitment hash mismatch on branch {branch}")]
    Commitment {
        /// Offending branch (absolute index).
        branch: Branch,
    },
    /// The view's output words differ from the committed output share.
    #[error("output share mismatch on branch {branch}")]
    Output {
        /// Offending branch (absolute index).
        branch: Branch,
    },
    /// A gate's recorded word does not match its recomputation.
    #[error("replay failed: {0}")]
    Replay(#[from] GadgetError),
    /// The replayed output differs from the view's output words.
    #[error("replayed output differs from recorded output on branch {branch}")]
    ReplayOutput {
        /// Offending branch (absolute index).
        branch: Branch,
    },
}

impl RoundFailure {
    /// Gate index for replay failures, if any.
    pub fn gate(&self) -> Option<usize> {
        match self {
            RoundFailure::Replay(GadgetError::Mismatch { gate, .. })
            | RoundFailure::Replay(GadgetError::Exhausted { gate }) => Some(*gate),
            _ => None,
        }
    }
}

/// Reject a round whose output shares do not reconstruct `claimed`.
pub fn check_digest(commitment: &Commitment, claimed: &Digest) -> Result<(), RoundFailure> {
    let got = commitment.reconstruct();
    if got != *claimed {
        return Err(RoundFailure::Digest { claimed: *claimed, got });
    }
    Ok(())
}

/// Check one round's opening against its commitment. `Ok(())` means the
/// opening is consistent; digest agreement is [`check_digest`]'s job.
pub fn verify_round(
    commitment: &Commitment,
    challenge: Challenge,
    opening: &Opening,
) -> Result<(), RoundFailure> {
    let opened = challenge.opened();

    for (slot, &b) in opened.iter().enumerate() {
        let h = branch_hash(&opening.keys[slot], &opening.views[slot], &opening.aux[slot]);
        if h != commitment.h[b.as_usize()] {
            return Err(RoundFailure::Commitment { branch: b });
        }
    }

    for (slot, &b) in opened.iter().enumerate() {
        if opening.views[slot].output() != commitment.yp[b.as_usize()] {
            return Err(RoundFailure::Output { branch: b });
        }
    }

    let tapes = [RandomTape::from_key(&opening.keys[0]), RandomTape::from_key(&opening.keys[1])];
    let [v0, v1] = &opening.views;
    let mut mpc = ReplayGadgets::new([&tapes[0], &tapes[1]], [v0.gate_trace(), v1.gate_trace()]);
    let out = sha256_circuit(&mut mpc, block_words([v0.input(), v1.input()]))?;

    for (slot, &b) in opened.iter().enumerate() {
        let replayed: [u32; OUTPUT_WORDS] = out.map(|w| w.0[slot]);
        if replayed != opening.views[slot].output() {
            return Err(RoundFailure::ReplayOutput { branch: b });
        }
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commitment::{commit_round, open_round, RoundSecrets, View};
    use crate::gadgets::GateKind;
    use rand::{rngs::StdRng, SeedableRng};

    fn round(msg: &[u8], seed: u64) -> (RoundSecrets, Commitment, [View; 3]) {
        let mut rng = StdRng::seed_from_u64(seed);
        let secrets = RoundSecrets::generate(msg, &mut rng).unwrap();
        let (c, views) = commit_round(&secrets).unwrap();
        (secrets, c, views)
    }

    #[test]
    fn honest_round_passes_every_challenge() {
        let (secrets, c, views) = round(b"hello", 1);
        for e in Branch::ALL {
            let ch = Challenge::new(e);
            assert_eq!(verify_round(&c, ch, &open_round(ch, &secrets, &views)), Ok(()));
        }
    }

    #[test]
    fn tampered_opening_fields_fail_commitment_check() {
        let (secrets, c, views) = round(b"abc", 2);
        let ch = Challenge::new(Branch::ALL[0]);
        let honest = open_round(ch, &secrets, &views);

        let mut o = honest.clone();
        o.keys[1][0] ^= 0x80;
        assert_eq!(verify_round(&c, ch, &o), Err(RoundFailure::Commitment { branch: Branch::ALL[1] }));

        let mut o = honest.clone();
        o.aux[0][3] ^= 1;
        assert_eq!(verify_round(&c, ch, &o), Err(RoundFailure::Commitment { branch: Branch::ALL[0] }));

        let mut o = honest;
        o.views[0].trace_mut()[400] ^= 1 << 17;
        assert_eq!(verify_round(&c, ch, &o), Err(RoundFailure::Commitment { branch: Branch::ALL[0] }));
    }

    #[test]
    fn recommitted_carry_flip_fails_at_that_gate() {
        let (secrets, mut c, mut views) = round(b"abc", 3);
        let e = Branch::ALL[2];
        // Gate 0 is the first message-schedule ADD.
        views[e.as_usize()].trace_mut()[0] ^= 1 << 5;
        c.h[e.as_usize()] =
            branch_hash(&secrets.keys[e.as_usize()], &views[e.as_usize()], &secrets.aux[e.as_usize()]);

        let ch = Challenge::new(e);
        let failure = verify_round(&c, ch, &open_round(ch, &secrets, &views)).unwrap_err();
        assert_eq!(
            failure,
            RoundFailure::Replay(GadgetError::Mismatch { gate: 0, kind: GateKind::Add, carry_bit: Some(5) })
        );
        assert_eq!(failure.gate(), Some(0));
    }

    #[test]
    fn digest_check_compares_reconstruction() {
        let (_, c, _) = round(b"abc", 5);
        let right = Digest::of_message(b"abc");
        assert_eq!(check_digest(&c, &right), Ok(()));

        let wrong = Digest::of_message(b"abd");
        assert_eq!(check_digest(&c, &wrong), Err(RoundFailure::Digest { claimed: wrong, got: right }));
    }

    #[test]
    fn recommitted_output_words_fail_output_or_replay() {
        let (secrets, mut c, mut views) = round(b"xyz", 4);
        let e = Branch::ALL[0];
        let i = e.as_usize();
        views[i].trace_mut()[730] ^= 0xff;
        c.h[i] = branch_hash(&secrets.keys[i], &views[i], &secrets.aux[i]);
        let ch = Challenge::new(e);

        // Output words no longer match the committed share.
        assert_eq!(
            verify_round(&c, ch, &open_round(ch, &secrets, &views)),
            Err(RoundFailure::Output { branch: e })
        );

        // Patching the share too still fails: the replay disagrees.
        c.yp[i] = views[i].output();
        assert_eq!(
            verify_round(&c, ch, &open_round(ch, &secrets, &views)),
            Err(RoundFailure::ReplayOutput { branch: e })
        );
    }
}
