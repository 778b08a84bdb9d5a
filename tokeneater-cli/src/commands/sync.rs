//! Sync command - run one refresh cycle as the sync owner.

use anyhow::Result;
use chrono::Utc;
use tokeneater_core::PacingCalculator;
use tracing::info;

use super::open_engine;
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

/// Runs the sync command.
///
/// The error is returned as a `SyncError` so the exit code reflects its class.
pub async fn run(cli: &Cli) -> Result<()> {
    let engine = open_engine().await?;
    let state = engine.refresh().await?;
    info!(fetched_at = %state.fetched_at, "Sync complete");

    if cli.quiet {
        return Ok(());
    }

    let now = Utc::now();
    let thresholds = engine.settings().thresholds().await;
    let pacing = PacingCalculator::calculate(&state.snapshot, now);

    match cli.format {
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);
            println!(
                "{}",
                formatter.format_usage(&state.snapshot, pacing.as_ref(), thresholds, now)
            );
        }
        OutputFormat::Json => {
            let formatter = JsonFormatter::new(cli.pretty);
            println!(
                "{}",
                formatter.format_sync(&state, pacing.as_ref(), thresholds, &engine.error_state())?
            );
        }
    }

    Ok(())
}
