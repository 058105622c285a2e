//! CLI prover
//!
//! Reads one line (from `--input` or stdin), proves knowledge of it as a
//! SHA-256 preimage, and writes the headerless proof file (`out{R}.bin` by
//! default). The digest hex goes to stdout; everything else to stderr.

#![forbid(unsafe_code)]

use std::{env, io::BufRead};

use anyhow::Context;
use mpcsha::{
    api,
    circuit::{check_input_len, MAX_INPUT_BYTES},
    config::Config,
    scheduler::Prover,
};

fn read_message(cfg: &Config) -> anyhow::Result<String> {
    if let Some(s) = &cfg.input {
        return Ok(s.clone());
    }
    eprint!("Enter the string to be hashed (max {MAX_INPUT_BYTES} characters): ");
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line).context("read stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

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

    let message = read_message(&cfg)?;
    check_input_len(message.len())?;

    eprintln!("String length: {}", message.len());
    eprintln!("Iterations of SHA: {}", cfg.rounds);

    let proof = api::prove(&Prover::new(cfg.rounds), message.as_bytes())?;
    let digest = proof.commitments[0].reconstruct();
    eprintln!("Proof for hash: {digest}");

    api::io::write_proof(&cfg.proof_path, &proof)?;
    eprintln!(
        "✓ Wrote {} ({} bytes)",
        cfg.proof_path.display(),
        api::io::proof_len(proof.rounds())
    );
    eprintln!();
    eprintln!("To verify this proof, run:");
    eprintln!("  cargo run --bin verifier -- --rounds {} --proof {}", cfg.rounds, cfg.proof_path.display());

    println!("{digest}");
    Ok(())
}
