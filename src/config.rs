//! Binary configuration: CLI flags with environment fallbacks
//!
//! | flag                 | env              | default            |
//! |----------------------|------------------|--------------------|
//! | `--rounds`           | `MPCSHA_ROUNDS`  | 136                |
//! | `--threads`          | `MPCSHA_THREADS` | hardware threads   |
//! | `--out` / `--proof`  | `MPCSHA_PROOF`   | `out{R}.bin`       |
//! | `--input`            |                  | read stdin         |
//! | `--expect`           |                  | none               |
//! | `--json`             |                  | off                |
//!
//! Flags win over the environment.

#![forbid(unsafe_code)]

use std::path::PathBuf;

use anyhow::Context;

use crate::{api::io::proof_file_name, DEFAULT_ROUNDS};

/// Resolved settings shared by the `prover` and `verifier` binaries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// Round count `R`.
    pub rounds: usize,
    /// Worker threads for the round pool; `None` lets rayon decide.
    pub threads: Option<usize>,
    /// Proof file to write or read.
    pub proof_path: PathBuf,
    /// Message given on the command line instead of stdin.
    pub input: Option<String>,
    /// Digest (hex) the verifier must reproduce.
    pub expect: Option<String>,
    /// Emit the verification report as JSON on stdout.
    pub json: bool,
}

/// Value following `key` in `args`, if any.
pub fn parse_flag(args: &[String], key: &str) -> Option<String> {
    let mut it = args.iter();
    while let Some(a) = it.next() {
        if a == key {
            return it.next().cloned();
        }
    }
    None
}

/// Whether the bare switch `key` is present.
pub fn has_flag(args: &[String], key: &str) -> bool {
    args.iter().any(|a| a == key)
}

impl Config {
    /// Resolve from process arguments and the process environment.
    pub fn from_env_args(args: &[String]) -> anyhow::Result<Self> {
        Self::resolve(args, |k| std::env::var(k).ok())
    }

    /// Resolve from `args`, falling back to `env` for unset flags.
    pub fn resolve(args: &[String], env: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let rounds = match parse_flag(args, "--rounds").or_else(|| env("MPCSHA_ROUNDS")) {
            Some(s) => s.parse::<usize>().with_context(|| format!("rounds must be an integer (got `{s}`)"))?,
            None => DEFAULT_ROUNDS,
        };
        if rounds == 0 {
            anyhow::bail!("rounds must be at least 1");
        }

        let threads = match parse_flag(args, "--threads").or_else(|| env("MPCSHA_THREADS")) {
            Some(s) => {
                let n = s.parse::<usize>().with_context(|| format!("threads must be an integer (got `{s}`)"))?;
                if n == 0 {
                    anyhow::bail!("threads must be at least 1");
                }
                Some(n)
            }
            None => None,
        };

        let proof_path = parse_flag(args, "--out")
            .or_else(|| parse_flag(args, "--proof"))
            .or_else(|| env("MPCSHA_PROOF"))
            .map(PathBuf::from)
            .unwrap_or_else(|| proof_file_name(rounds));

        Ok(Self {
            rounds,
            threads,
            proof_path,
            input: parse_flag(args, "--input"),
            expect: parse_flag(args, "--expect"),
            json: has_flag(args, "--json"),
        })
    }

    /// Size the global rayon pool. Call once, before any proving.
    pub fn install_thread_pool(&self) -> anyhow::Result<()> {
        if let Some(n) = self.threads {
            rayon::ThreadPoolBuilder::new()
                .num_threads(n)
                .build_global()
                .context("configure worker pool")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn args(s: &[&str]) -> Vec<String> {
        std::iter::once("bin").chain(s.iter().copied()).map(String::from).collect()
    }

    fn resolve(a: &[&str], env: &[(&str, &str)]) -> anyhow::Result<Config> {
        let env: HashMap<String, String> =
            env.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::resolve(&args(a), |k| env.get(k).cloned())
    }

    #[test]
    fn defaults() {
        let c = resolve(&[], &[]).unwrap();
        assert_eq!(c.rounds, 136);
        assert_eq!(c.threads, None);
        assert_eq!(c.proof_path, PathBuf::from("out136.bin"));
        assert!(!c.json);
    }

    #[test]
    fn flags_override_environment() {
        let env = [("MPCSHA_ROUNDS", "20"), ("MPCSHA_THREADS", "2"), ("MPCSHA_PROOF", "env.bin")];
        let c = resolve(&[], &env).unwrap();
        assert_eq!((c.rounds, c.threads), (20, Some(2)));
        assert_eq!(c.proof_path, PathBuf::from("env.bin"));

        let c = resolve(&["--rounds", "8", "--out", "p.bin", "--json", "--input", "abc"], &env).unwrap();
        assert_eq!(c.rounds, 8);
        assert_eq!(c.proof_path, PathBuf::from("p.bin"));
        assert_eq!(c.input.as_deref(), Some("abc"));
        assert!(c.json);
    }

    #[test]
    fn default_path_follows_rounds() {
        let c = resolve(&["--rounds", "4"], &[]).unwrap();
        assert_eq!(c.proof_path, PathBuf::from("out4.bin"));
    }

    #[test]
    fn rejects_bad_numbers() {
        assert!(resolve(&["--rounds", "many"], &[]).is_err());
        assert!(resolve(&["--rounds", "0"], &[]).is_err());
        assert!(resolve(&[], &[("MPCSHA_THREADS", "-1")]).is_err());
        assert!(resolve(&["--threads", "0"], &[]).is_err());
    }
}
