//! CLI command handlers.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;
use workshop_reconciler::{Entropy, ReconcilerConfig};

use crate::cli::Commands;
use crate::retry::RetryPolicy;
use crate::runner::{EventReport, Runner};
use crate::scenario::Scenario;

/// Execute a CLI command.
///
/// # Errors
///
/// Returns an error when the scenario cannot be loaded or a fatal failure
/// stops the run.
pub async fn execute_command(command: Commands) -> Result<()> {
    match command {
        Commands::Run {
            scenario,
            ingress_domain,
            seed,
            max_attempts,
            max_retries,
            retry_base_ms,
        } => {
            let config = ReconcilerConfig {
                ingress_domain,
                max_attempts,
                ..ReconcilerConfig::default()
            };
            let retry = RetryPolicy {
                max_retries,
                base_delay_ms: retry_base_ms,
                ..RetryPolicy::default()
            };
            cmd_run(&scenario, config, seed, retry, print_report).await?;
            Ok(())
        }
        Commands::Check { scenario } => cmd_check(&scenario),
    }
}

/// Replay a scenario file and return one report per event.
///
/// `on_report` sees each report as soon as its event finishes, so reports
/// of events before a fatal failure are not lost.
///
/// # Errors
///
/// Returns an error when loading fails, seeding fails, an event fails
/// fatally, or `on_report` fails.
pub async fn cmd_run(
    path: &Path,
    config: ReconcilerConfig,
    seed: Option<u64>,
    retry: RetryPolicy,
    on_report: impl FnMut(&EventReport) -> Result<()>,
) -> Result<Vec<EventReport>> {
    let scenario = Scenario::load(path)
        .with_context(|| format!("Failed to load scenario {}", path.display()))?;

    let entropy = seed.map_or_else(Entropy::from_os, Entropy::seeded);
    let runner = Runner::new(config, entropy, retry)?;
    runner.seed(&scenario.environments).await?;

    info!(
        events = scenario.events.len(),
        seeded = seed.is_some(),
        "Replaying scenario"
    );
    let reports = runner.run(&scenario.events, on_report).await?;

    let failed = reports.iter().filter(|r| !r.succeeded()).count();
    info!(total = reports.len(), failed, "Scenario complete");
    Ok(reports)
}

/// Validate a scenario file without running it.
///
/// # Errors
///
/// Returns an error when the file cannot be read or a resource is invalid.
pub fn cmd_check(path: &Path) -> Result<()> {
    let scenario = Scenario::load(path)
        .with_context(|| format!("Failed to load scenario {}", path.display()))?;
    println!(
        "ok: {} environment(s), {} event(s)",
        scenario.environments.len(),
        scenario.events.len()
    );
    Ok(())
}

/// Print one report as a JSON line on stdout.
fn print_report(report: &EventReport) -> Result<()> {
    let line = serde_json::to_string(report).context("Failed to encode report")?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{line}").context("Failed to write report")?;
    stdout.flush().context("Failed to write report")
}
