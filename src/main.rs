//! # workshop-operator
//!
//! Entry point: parse the command line, set up tracing and run the command.
//!
//! Logs go to stderr so that `run` can print JSON reports on stdout.

#![forbid(unsafe_code)]
#![forbid(clippy::unwrap_used)]
#![forbid(clippy::panic)]
#![deny(clippy::expect_used)]

use anyhow::Result;
use clap::Parser;
use tracing::error;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use workshop_operator::cli::Cli;
use workshop_operator::commands::execute_command;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(&cli.log_level);

    execute_command(cli.command).await.inspect_err(|e| {
        error!(error = ?e, "Command failed");
    })
}

/// Initialize tracing subscriber.
///
/// `RUST_LOG` wins over `--log-level`.
fn init_tracing(level: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
