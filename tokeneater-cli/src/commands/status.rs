//! Status command - show the last synced usage without fetching.

use anyhow::Result;
use chrono::Utc;
use tokeneater_store::SettingsStore;
use tokeneater_sync::EntryProvider;
use tracing::debug;

use super::open_shared;
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

/// Runs the status command.
pub async fn run(cli: &Cli) -> Result<()> {
    let shared = open_shared().await?;
    let settings = SettingsStore::load_default().await.get().await;
    let provider = EntryProvider::from_settings(shared, &settings);

    let entry = provider.latest(Utc::now()).await;
    debug!(stale = entry.is_stale, error = ?entry.error, "Display entry loaded");

    match cli.format {
        OutputFormat::Text => {
            println!("{}", TextFormatter::new(!cli.no_color).format_entry(&entry));
        }
        OutputFormat::Json => {
            println!("{}", JsonFormatter::new(cli.pretty).format_entry(&entry)?);
        }
    }

    Ok(())
}
