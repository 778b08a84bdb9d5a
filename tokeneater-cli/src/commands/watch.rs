//! Watch command - poll loop with live output.

use std::io::{Write, stdout};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use clap::Args;
use tokeneater_store::MIN_POLL_INTERVAL_SECS;
use tokeneater_sync::{PollerConfig, SyncEngine, spawn_poller};
use tracing::info;

use super::open_engine;
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

/// Arguments for watch command.
#[derive(Args)]
pub struct WatchArgs {
    /// Refresh interval in seconds. Defaults to the configured interval.
    #[arg(long, short)]
    pub interval: Option<u64>,
}

/// Runs the watch command until Ctrl-C.
pub async fn run(args: &WatchArgs, cli: &Cli) -> Result<()> {
    let engine = Arc::new(open_engine().await?);
    let config = PollerConfig {
        interval: args
            .interval
            .map(|secs| Duration::from_secs(secs.max(MIN_POLL_INTERVAL_SECS))),
        ..PollerConfig::default()
    };

    let mut changes = engine.subscribe();
    let handle = spawn_poller(Arc::clone(&engine), config);
    info!("Starting watch mode");

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                break;
            }
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                render(&engine, cli).await?;
            }
        }
    }

    info!("Stopping watch mode");
    handle.shutdown().await;
    Ok(())
}

async fn render(engine: &SyncEngine, cli: &Cli) -> Result<()> {
    let now = Utc::now();
    let thresholds = engine.settings().thresholds().await;
    let error = engine.error_state();

    let Some(cached) = engine.cached(now).await else {
        if let Some(message) = error.message() {
            eprintln!("{message}");
        }
        return Ok(());
    };

    match cli.format {
        OutputFormat::Json => {
            // One document per line so the stream can be piped.
            let formatter = JsonFormatter::new(false);
            println!(
                "{}",
                formatter.format_sync(&cached.state, cached.pacing.as_ref(), thresholds, &error)?
            );
        }
        OutputFormat::Text => {
            let formatter = TextFormatter::new(!cli.no_color);

            print!("\x1b[2J\x1b[H");
            stdout().flush()?;

            println!(
                "TokenEater Watch Mode - {}",
                now.with_timezone(&chrono::Local).format("%H:%M:%S")
            );
            println!("{}", "─".repeat(50));
            println!();
            println!(
                "{}",
                formatter.format_usage(&cached.state.snapshot, cached.pacing.as_ref(), thresholds, now)
            );
            if let Some(message) = formatter.format_error_state(&error) {
                println!();
                println!("{message}");
            }
            println!();
            println!("Press Ctrl+C to exit");
        }
    }

    Ok(())
}
