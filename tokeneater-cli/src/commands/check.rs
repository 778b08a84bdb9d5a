//! Check command - test the credential against the server.

use anyhow::Result;
use clap::Args;

use super::open_engine;
use crate::output::{JsonFormatter, TextFormatter};
use crate::{Cli, OutputFormat};

/// Arguments for check command.
#[derive(Args)]
pub struct CheckArgs {
    /// Read the credential interactively, which may show an unlock prompt.
    #[arg(long)]
    pub interactive: bool,

    /// Also send a test notification.
    #[arg(long)]
    pub notify: bool,
}

/// Runs the check command.
pub async fn run(args: &CheckArgs, cli: &Cli) -> Result<()> {
    let engine = open_engine().await?;

    let result = if args.interactive {
        engine.connect_interactive().await?
    } else {
        engine.test_connection().await?
    };

    if args.notify {
        engine.send_test_notification().await;
    }

    match cli.format {
        OutputFormat::Text => {
            println!("{}", TextFormatter::new(!cli.no_color).format_connection(&result));
        }
        OutputFormat::Json => {
            println!("{}", JsonFormatter::new(cli.pretty).format(&result)?);
        }
    }

    if !result.success {
        anyhow::bail!("Connection test failed");
    }
    Ok(())
}
