//! Config command - manage configuration.

use anyhow::{Context, Result};
use clap::{Args, Subcommand, ValueEnum};
use tokeneater_store::{
    SettingsStore, default_app_support_dir, default_config_dir, default_levels_path,
    default_settings_path,
};
use tracing::info;

use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// On/off switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Toggle {
    /// Enable.
    On,
    /// Disable.
    Off,
}

impl Toggle {
    fn enabled(self) -> bool {
        self == Toggle::On
    }
}

/// Config subcommands.
#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration.
    Show,

    /// Show configuration paths.
    Path,

    /// Set the warning and critical thresholds, in percent.
    Thresholds {
        /// Warning threshold.
        warning: u8,
        /// Critical threshold, above the warning threshold.
        critical: u8,
    },

    /// Enable or disable the SOCKS5 proxy.
    Proxy {
        /// on or off.
        state: Toggle,
        /// Proxy host.
        #[arg(long)]
        host: Option<String>,
        /// Proxy port.
        #[arg(long)]
        port: Option<u16>,
    },

    /// Set the polling interval, in seconds.
    Interval {
        /// Seconds between refreshes.
        secs: u64,
    },

    /// Enable or disable threshold alerts.
    Notifications {
        /// on or off.
        state: Toggle,
    },

    /// Reset to defaults.
    Reset,
}

/// Runs the config command.
pub async fn run(args: &ConfigArgs, cli: &Cli) -> Result<()> {
    if matches!(args.action, ConfigAction::Path) {
        return show_paths(cli);
    }

    let store = SettingsStore::load_default().await;
    apply(&args.action, &store).await?;

    match &args.action {
        ConfigAction::Show => show_config(&store, cli).await,
        _ if cli.quiet => Ok(()),
        ConfigAction::Reset => {
            println!("Configuration reset to defaults");
            Ok(())
        }
        _ => {
            println!("Saved to {}", store.path().display());
            Ok(())
        }
    }
}

/// Applies a mutating action to the store. `Show` and `Path` change nothing.
pub async fn apply(action: &ConfigAction, store: &SettingsStore) -> Result<()> {
    match action {
        ConfigAction::Show | ConfigAction::Path => {}
        ConfigAction::Thresholds { warning, critical } => {
            store
                .set_thresholds(*warning, *critical)
                .await
                .context("Invalid thresholds")?;
            info!(warning, critical, "Thresholds updated");
        }
        ConfigAction::Proxy { state, host, port } => {
            let mut proxy = store.proxy().await;
            proxy.enabled = state.enabled();
            if let Some(host) = host {
                proxy.host.clone_from(host);
            }
            if let Some(port) = port {
                proxy.port = *port;
            }
            store.set_proxy(proxy).await.context("Invalid proxy")?;
            info!(enabled = state.enabled(), "Proxy updated");
        }
        ConfigAction::Interval { secs } => {
            store
                .set_poll_interval(*secs)
                .await
                .context("Invalid polling interval")?;
            info!(secs, "Polling interval updated");
        }
        ConfigAction::Notifications { state } => {
            store.set_notifications_enabled(state.enabled()).await?;
            info!(enabled = state.enabled(), "Notifications updated");
        }
        ConfigAction::Reset => {
            store.reset().await?;
            info!(path = %store.path().display(), "Settings reset");
        }
    }
    Ok(())
}

async fn show_config(store: &SettingsStore, cli: &Cli) -> Result<()> {
    let settings = store.get().await;

    match cli.format {
        OutputFormat::Text => {
            println!("{}", TextFormatter::new(!cli.no_color).format_settings(&settings));
        }
        OutputFormat::Json => {
            println!("{}", JsonFormatter::new(cli.pretty).format(&settings)?);
        }
    }

    Ok(())
}

fn show_paths(cli: &Cli) -> Result<()> {
    let config_dir = default_config_dir();
    let settings_path = default_settings_path();
    let levels_path = default_levels_path();
    let shared_dir = default_app_support_dir();

    match cli.format {
        OutputFormat::Text => {
            println!("Configuration Paths");
            println!("{}", "─".repeat(40));
            println!();
            println!("Config dir:    {}", config_dir.display());
            println!("Settings file: {}", settings_path.display());
            println!("Alert levels:  {}", levels_path.display());
            println!("Shared state:  {}", shared_dir.display());
        }
        OutputFormat::Json => {
            let paths = serde_json::json!({
                "config_dir": config_dir.display().to_string(),
                "settings_file": settings_path.display().to_string(),
                "levels_file": levels_path.display().to_string(),
                "shared_dir": shared_dir.display().to_string(),
            });
            let formatter = JsonFormatter::new(cli.pretty);
            println!("{}", formatter.format(&paths)?);
        }
    }

    Ok(())
}
