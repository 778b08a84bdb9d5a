//! Signout command - forget the credential, cache and alert levels.

use anyhow::Result;

use super::open_engine;
use crate::Cli;

/// Runs the signout command.
pub async fn run(cli: &Cli) -> Result<()> {
    let engine = open_engine().await?;
    engine.sign_out().await?;

    if !cli.quiet {
        println!("Signed out. Cached usage and alert levels cleared.");
    }
    Ok(())
}
