// Lint configuration for this crate
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! TokenEater CLI - usage quota monitoring from the command line.
//!
//! # Examples
//!
//! ```bash
//! # Show the last synced usage (read-only)
//! tokeneater
//!
//! # Run one sync cycle
//! tokeneater sync
//!
//! # Poll until Ctrl-C
//! tokeneater watch --interval 120
//!
//! # JSON output
//! tokeneater status --format json --pretty
//!
//! # Route requests through a SOCKS5 proxy
//! tokeneater config proxy on --host 127.0.0.1 --port 1080
//! ```

mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tokeneater_sync::SyncError;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use commands::{check, config, signout, status, sync, watch};

// ============================================================================
// CLI Definition
// ============================================================================

/// TokenEater CLI - usage quota monitoring.
#[derive(Parser)]
#[command(name = "tokeneater")]
#[command(about = "Usage quota monitoring CLI")]
#[command(long_about = r#"
TokenEater keeps a local cache of your usage quotas so that every surface
can show them without hitting the network.

Only `sync` and `watch` talk to the server. Everything else reads the
shared state written by the last sync.

Examples:
  tokeneater                     # Last synced usage
  tokeneater sync                # One refresh cycle
  tokeneater watch               # Poll until Ctrl-C
  tokeneater --format json       # JSON output
  tokeneater config thresholds 50 80
"#)]
#[command(version)]
#[command(author = "TokenEater Contributors")]
pub struct Cli {
    /// Subcommand to run. If none, runs 'status' by default.
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Output format (text or json).
    #[arg(long, short = 'f', default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Pretty-print JSON output.
    #[arg(long, global = true)]
    pub pretty: bool,

    /// Verbose output (show debug info).
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Quiet mode (minimal output).
    #[arg(long, short, global = true)]
    pub quiet: bool,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Show the last synced usage (default if no command specified).
    #[command(visible_alias = "s")]
    Status,

    /// Run one refresh cycle.
    Sync,

    /// Poll on an interval until interrupted.
    #[command(visible_alias = "w")]
    Watch(watch::WatchArgs),

    /// Test the stored credential against the server.
    Check(check::CheckArgs),

    /// Manage configuration.
    Config(config::ConfigArgs),

    /// Forget the stored credential, cached usage and alert levels.
    Signout,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable text with colors.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// CLI exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Success.
    Success = 0,
    /// General error.
    Error = 1,
    /// No credential is configured.
    NotConfigured = 2,
    /// The credential was rejected.
    AuthFailure = 3,
    /// Transient failure; retrying later may succeed.
    Transient = 4,
}

impl ExitCode {
    /// Picks the exit code for a failed command.
    pub fn for_error(err: &anyhow::Error) -> Self {
        match err.downcast_ref::<SyncError>() {
            Some(SyncError::NoCredential) => ExitCode::NotConfigured,
            Some(e) if e.is_sticky() => ExitCode::AuthFailure,
            Some(e) if e.is_transient() => ExitCode::Transient,
            _ => ExitCode::Error,
        }
    }
}

// ============================================================================
// Logging Setup
// ============================================================================

fn setup_logging(verbose: bool, quiet: bool) {
    if quiet {
        return; // No logging in quiet mode
    }

    let filter = if verbose {
        EnvFilter::new("tokeneater=debug,tokeneater_sync=debug,tokeneater_fetch=debug,tokeneater_store=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("tokeneater=warn,tokeneater_sync=warn,tokeneater_fetch=warn,tokeneater_store=warn")
        })
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let result = match &cli.command {
        Some(Commands::Status) | None => status::run(&cli).await,
        Some(Commands::Sync) => sync::run(&cli).await,
        Some(Commands::Watch(args)) => watch::run(args, &cli).await,
        Some(Commands::Check(args)) => check::run(args, &cli).await,
        Some(Commands::Config(args)) => config::run(args, &cli).await,
        Some(Commands::Signout) => signout::run(&cli).await,
    };

    if let Err(e) = result {
        if !cli.quiet {
            eprintln!("Error: {e}");
        }
        std::process::exit(ExitCode::for_error(&e) as i32);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_by_error_class() {
        let code = |e: SyncError| ExitCode::for_error(&anyhow::Error::from(e));

        assert_eq!(code(SyncError::NoCredential), ExitCode::NotConfigured);
        assert_eq!(code(SyncError::AuthFailure), ExitCode::AuthFailure);
        assert_eq!(code(SyncError::VaultLocked), ExitCode::Transient);
        assert_eq!(code(SyncError::Http(503)), ExitCode::Transient);
        assert_eq!(
            ExitCode::for_error(&anyhow::anyhow!("bad flag")),
            ExitCode::Error
        );
    }

    #[test]
    fn test_parse_defaults_to_status() {
        let cli = Cli::try_parse_from(["tokeneater"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.format, OutputFormat::Text);
    }

    #[test]
    fn test_parse_watch_interval() {
        let cli = Cli::try_parse_from(["tokeneater", "watch", "--interval", "30"]).unwrap();
        match cli.command {
            Some(Commands::Watch(args)) => assert_eq!(args.interval, Some(30)),
            _ => panic!("expected watch"),
        }
    }

    #[test]
    fn test_parse_global_format_after_subcommand() {
        let cli = Cli::try_parse_from(["tokeneater", "status", "--format", "json"]).unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
    }
}
