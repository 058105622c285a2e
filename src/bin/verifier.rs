//! CLI verifier
//!
//! Reads an `R`-round proof file, checks every round, and prints the digest
//! the proof is about. Exits non-zero if any round fails, if the file is
//! malformed, or if `--expect <hex>` names a different digest.
//!
//! With `--json` the full report is printed on stdout instead of the
//! digest line.

#![forbid(unsafe_code)]

use std::env;

use mpcsha::{api, config::Config, scheduler::Verifier, Digest};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "mpcsha=info".into()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let args: Vec<String> = env::args().collect();
    let cfg = Config::from_env_args(&args)?;
    cfg.install_thread_pool()?;

    let expected = cfg
        .expect
        .as_deref()
        .map(Digest::from_hex)
        .transpose()
        .map_err(|e| anyhow::anyhow!("--expect must be 64 hex digits: {e}"))?;

    eprintln!("Iterations of SHA: {}", cfg.rounds);
    let proof = api::io::read_proof(&cfg.proof_path, cfg.rounds)?;
    let report = api::report(&Verifier::new(), &proof)?;

    eprintln!("Proof for hash: {}", report.digest);
    for f in &report.failures {
        eprintln!("Not verified {}: {}", f.round, f.reason);
    }

    if cfg.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.digest);
    }

    if !report.accepted {
        anyhow::bail!("proof rejected: {} of {} rounds failed", report.failures.len(), report.rounds);
    }
    if let Some(want) = expected {
        if want != report.digest {
            anyhow::bail!("digest mismatch: proof is for {}, expected {}", report.digest, want);
        }
    }
    eprintln!("✓ All {} rounds verified", report.rounds);
    Ok(())
}
