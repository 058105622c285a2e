//! Round scheduler (prove / verify)
//!
//! ## Overview
//! Rounds are independent, so each phase is a `rayon` parallel iterator over
//! rounds, with one sequential barrier in the middle:
//!
//! | phase        | work                                   | parallel |
//! |--------------|----------------------------------------|----------|
//! | secrets      | keys, aux randoms, shares from the RNG | no       |
//! | commit       | circuit evaluation, views, hashes      | yes      |
//! | challenge    | Fiat–Shamir over all commitments       | no       |
//! | open         | select branches `e`, `e + 1`           | yes      |
//! | verify       | digest, hash, output and replay checks | yes      |
//!
//! Secrets are drawn sequentially so a seeded RNG yields the same proof
//! regardless of the thread count.
//!
//! The verifier examines every round and collects all failures into a
//! [`VerificationReport`]; [`Verifier::verify`] is the strict form that turns
//! the first failure into an error.

#![forbid(unsafe_code)]
#![allow(missing_docs)]

use rand::{CryptoRng, RngCore};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, debug_span, info, warn};

use crate::circuit::{check_input_len, InputError};
use crate::commitment::{commit_round, open_round, CommitError, Commitment, Opening, RoundSecrets, View};
use crate::shares::NUM_BRANCHES;
use crate::transcript::derive_challenges;
use crate::verifier::{check_digest, verify_round, RoundFailure};
use crate::{Digest, Proof};

/// Prover-side orchestration over `rounds` independent rounds.
#[derive(Clone, Copy, Debug)]
pub struct Prover {
    pub rounds: usize,
}

/// Verifier-side orchestration. The round count comes from the proof.
#[derive(Clone, Copy, Debug, Default)]
pub struct Verifier;

#[derive(Debug, thiserror::Error)]
pub enum ProveError {
    #[error("invalid parameters: {0}")]
    Params(&'static str),
    #[error(transparent)]
    Input(#[from] InputError),
    #[error("randomness source failed: {0}")]
    Entropy(#[from] rand::Error),
    #[error(transparent)]
    Commit(#[from] CommitError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    #[error("proof has no rounds")]
    Empty,
    #[error("proof has {commitments} commitments but {openings} openings")]
    Shape { commitments: usize, openings: usize },
    #[error("round {round} failed: {failure}")]
    Round { round: usize, failure: RoundFailure },
}

/// One rejected round, as reported by the verifier.
#[derive(Debug, Clone, Serialize)]
pub struct RoundReport {
    pub round: usize,
    pub reason: String,
    pub gate: Option<usize>,
    #[serde(skip)]
    pub failure: RoundFailure,
}

impl RoundReport {
    fn new(round: usize, failure: RoundFailure) -> Self {
        Self { round, reason: failure.to_string(), gate: failure.gate(), failure }
    }
}

/// Outcome of checking every round of a proof.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    /// Digest reconstructed from round 0's output shares.
    pub digest: Digest,
    pub rounds: usize,
    pub accepted: bool,
    pub failures: Vec<RoundReport>,
}

// ============================================================================
// Prover
// ============================================================================

impl Prover {
    pub fn new(rounds: usize) -> Self {
        Self { rounds }
    }

    /// Prove knowledge of `input`, drawing all secrets from `rng`.
    pub fn prove<R: RngCore + CryptoRng>(&self, input: &[u8], rng: &mut R) -> Result<Proof, ProveError> {
        let span = debug_span!("prove", rounds = self.rounds, input_len = input.len());
        let _enter = span.enter();

        check_input_len(input.len())?;
        if self.rounds == 0 {
            return Err(ProveError::Params("at least one round is required"));
        }

        let secrets = (0..self.rounds)
            .map(|_| RoundSecrets::generate(input, rng))
            .collect::<Result<Vec<_>, _>>()?;
        debug!("round secrets drawn");

        let committed: Vec<(Commitment, [View; NUM_BRANCHES])> =
            secrets.par_iter().map(commit_round).collect::<Result<_, _>>()?;
        let (commitments, views): (Vec<_>, Vec<_>) = committed.into_iter().unzip();
        debug!("commitments built");

        // All rounds reconstruct the same digest; round 0 speaks for them.
        let digest = commitments[0].reconstruct();
        let challenges = derive_challenges(&digest, &commitments);
        debug!(%digest, "challenges derived");

        let openings: Vec<Opening> = challenges
            .par_iter()
            .zip(&secrets)
            .zip(&views)
            .map(|((e, s), v)| open_round(*e, s, v))
            .collect();

        info!(%digest, rounds = self.rounds, "proof generated");
        Ok(Proof { commitments, openings })
    }
}

// ============================================================================
// Verifier
// ============================================================================

impl Verifier {
    pub fn new() -> Self {
        Self
    }

    /// Check every round and report all failures.
    ///
    /// Only a malformed proof (empty, or mismatched record counts) is an
    /// error here; failing rounds are part of the report.
    pub fn report(&self, proof: &Proof) -> Result<VerificationReport, VerifyError> {
        let rounds = proof.commitments.len();
        let span = debug_span!("verify", rounds);
        let _enter = span.enter();

        if rounds != proof.openings.len() {
            return Err(VerifyError::Shape { commitments: rounds, openings: proof.openings.len() });
        }
        if rounds == 0 {
            return Err(VerifyError::Empty);
        }

        let digest = proof.commitments[0].reconstruct();
        let challenges = derive_challenges(&digest, &proof.commitments);
        debug!(%digest, "challenges derived");

        let outcomes: Vec<Result<(), RoundFailure>> = proof
            .commitments
            .par_iter()
            .zip(&challenges)
            .zip(&proof.openings)
            .map(|((c, e), o)| {
                check_digest(c, &digest)?;
                verify_round(c, *e, o)
            })
            .collect();

        let failures: Vec<RoundReport> = outcomes
            .into_iter()
            .enumerate()
            .filter_map(|(round, r)| r.err().map(|f| RoundReport::new(round, f)))
            .collect();
        for f in &failures {
            debug!(round = f.round, reason = %f.reason, "round rejected");
        }

        let accepted = failures.is_empty();
        if accepted {
            info!(%digest, rounds, "proof accepted");
        } else {
            warn!(%digest, rounds, failed = failures.len(), "proof rejected");
        }
        Ok(VerificationReport { digest, rounds, accepted, failures })
    }

    /// Strict verification: the digest on success, the first failing round
    /// otherwise.
    pub fn verify(&self, proof: &Proof) -> Result<Digest, VerifyError> {
        let report = self.report(proof)?;
        match report.failures.into_iter().next() {
            None => Ok(report.digest),
            Some(f) => Err(VerifyError::Round { round: f.round, failure: f.failure }),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
