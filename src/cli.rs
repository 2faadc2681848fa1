//! CLI command definitions using clap.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use workshop_core::DEFAULT_INGRESS_DOMAIN;
use workshop_reconciler::DEFAULT_MAX_ATTEMPTS;

/// Workshop request operator
#[derive(Parser, Debug)]
#[command(name = "workshop-operator")]
#[command(version)]
#[command(about = "Turns workshop requests into credentialed workshop sessions")]
#[command(
    long_about = "Reconciles WorkshopRequest create and delete events into WorkshopSession records. \
                  The run command replays a scenario of events against an in-memory store."
)]
pub struct Cli {
    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Replay a scenario of request events and print one JSON report per event
    Run {
        /// Scenario file (.yaml, .yml or .json)
        #[arg(short, long)]
        scenario: PathBuf,

        /// Domain for session hostnames when an environment sets none
        #[arg(long, env = "INGRESS_DOMAIN", default_value = DEFAULT_INGRESS_DOMAIN)]
        ingress_domain: String,

        /// Seed for session ids and passwords (random when omitted)
        #[arg(long)]
        seed: Option<u64>,

        /// Session create attempts before allocation gives up
        #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
        max_attempts: u32,

        /// Retries of a retryable failure before it is reported
        #[arg(long, default_value_t = 3)]
        max_retries: u32,

        /// Base delay of the exponential retry backoff, in milliseconds
        #[arg(long, default_value_t = 100)]
        retry_base_ms: u64,
    },

    /// Decode and validate a scenario without running it
    Check {
        /// Scenario file (.yaml, .yml or .json)
        #[arg(short, long)]
        scenario: PathBuf,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_defaults() {
        let cli = Cli::try_parse_from(["workshop-operator", "run", "--scenario", "s.yaml"]);
        let parsed = match cli {
            Ok(Cli {
                command:
                    Commands::Run {
                        max_attempts,
                        max_retries,
                        seed,
                        ..
                    },
                ..
            }) => Some((max_attempts, max_retries, seed)),
            _ => None,
        };
        assert_eq!(parsed, Some((20, 3, None)));
    }

    #[test]
    fn test_explicit_ingress_domain() {
        let cli = Cli::try_parse_from([
            "workshop-operator",
            "run",
            "-s",
            "s.yaml",
            "--ingress-domain",
            "labs.example.com",
            "--seed",
            "7",
        ]);
        let domain = match cli {
            Ok(Cli {
                command: Commands::Run { ingress_domain, .. },
                ..
            }) => Some(ingress_domain),
            _ => None,
        };
        assert_eq!(domain.as_deref(), Some("labs.example.com"));
    }

    #[test]
    fn test_check_requires_scenario() {
        assert!(Cli::try_parse_from(["workshop-operator", "check"]).is_err());
    }
}
