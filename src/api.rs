// src/api.rs
//! "Happy-path" crate API
//!
//! Thin wrappers over [`scheduler::Prover`] / [`scheduler::Verifier`] that
//! return `anyhow::Result` with context, plus proof file I/O. Everything
//! delegates to the scheduler; nothing here changes the protocol.

#![forbid(unsafe_code)]

use anyhow::Context;
use rand::rngs::OsRng;

use crate::{scheduler, Digest, Proof, VerificationReport};

/// Prove with the operating system's CSPRNG.
pub fn prove(prover: &scheduler::Prover, input: &[u8]) -> anyhow::Result<Proof> {
    prover.prove(input, &mut OsRng).map_err(|e| anyhow::anyhow!("prover failed: {e}"))
}

/// Verify every round; `Err` only for malformed proofs.
pub fn report(verifier: &scheduler::Verifier, proof: &Proof) -> anyhow::Result<VerificationReport> {
    verifier.report(proof).map_err(|e| anyhow::anyhow!("verification failed: {e}"))
}

/// Strict verification returning the proven digest.
pub fn verify(verifier: &scheduler::Verifier, proof: &Proof) -> anyhow::Result<Digest> {
    verifier.verify(proof).map_err(|e| anyhow::anyhow!("verification failed: {e}"))
}

// ===============================================================================================
/* Proof I/O (headerless: R commitments, then R openings) */
// ===============================================================================================

/// Proof file encoding.
pub mod io {
    use std::{fs, path::Path, path::PathBuf};

    use super::*;
    use crate::commitment::{Commitment, FormatError, Opening, COMMITMENT_BYTES, OPENING_BYTES};
    use crate::ROUND_BYTES;

    /// Conventional file name for an `R`-round proof.
    pub fn proof_file_name(rounds: usize) -> PathBuf {
        PathBuf::from(format!("out{rounds}.bin"))
    }

    /// Exact file size of an `R`-round proof.
    pub fn proof_len(rounds: usize) -> usize {
        rounds * ROUND_BYTES
    }

    /// Serialize in file order.
    pub fn encode_proof(proof: &Proof) -> Vec<u8> {
        let mut out = Vec::with_capacity(proof_len(proof.rounds()));
        for c in &proof.commitments {
            c.write_bytes(&mut out);
        }
        for o in &proof.openings {
            o.write_bytes(&mut out);
        }
        out
    }

    /// Decode an `R`-round proof. The size must match exactly.
    pub fn decode_proof(bytes: &[u8], rounds: usize) -> Result<Proof, FormatError> {
        let expected = proof_len(rounds);
        if bytes.len() != expected {
            return Err(FormatError::ProofSize { rounds, expected, got: bytes.len() });
        }
        let (cs, os) = bytes.split_at(rounds * COMMITMENT_BYTES);
        let commitments = cs
            .chunks_exact(COMMITMENT_BYTES)
            .map(Commitment::read_bytes)
            .collect::<Result<Vec<_>, _>>()?;
        let openings = os
            .chunks_exact(OPENING_BYTES)
            .map(Opening::read_bytes)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Proof { commitments, openings })
    }

    /// Write a proof file at `path`.
    pub fn write_proof(path: &Path, proof: &Proof) -> anyhow::Result<()> {
        let bytes = encode_proof(proof);
        fs::write(path, &bytes).with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }

    /// Read an `R`-round proof file from `path`.
    pub fn read_proof(path: &Path, rounds: usize) -> anyhow::Result<Proof> {
        let bytes = fs::read(path).with_context(|| format!("open {}", path.display()))?;
        decode_proof(&bytes, rounds).with_context(|| format!("decode {}", path.display()))
    }
}
