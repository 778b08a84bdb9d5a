//! One-shot move of the shared document from its legacy directory.
//!
//! Runs on every store construction. Once the legacy directory is gone it is
//! a no-op, so readers that upgrade late can keep calling it.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::persistence::{ensure_dir, write_atomic};

/// What a migration run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// No legacy file was present.
    NothingToMigrate,
    /// The legacy file was copied forward and the legacy directory removed.
    Migrated,
    /// The current file already existed; the legacy directory was removed.
    LegacyDiscarded,
}

/// Moves `legacy_dir/file_name` to `current_dir/file_name`.
///
/// An existing current file is never overwritten. The legacy directory is
/// removed afterwards.
///
/// # Errors
///
/// Returns `StoreError::Migration` if the legacy file cannot be read or the
/// new copy cannot be written. Failure to remove the legacy directory is
/// logged and ignored.
pub async fn migrate_legacy(
    legacy_dir: &Path,
    current_dir: &Path,
    file_name: &str,
) -> Result<MigrationOutcome, StoreError> {
    let legacy_file = legacy_dir.join(file_name);
    if !tokio::fs::try_exists(&legacy_file).await.unwrap_or(false) {
        return Ok(MigrationOutcome::NothingToMigrate);
    }

    let current_file = current_dir.join(file_name);
    ensure_dir(current_dir).await?;

    let outcome = if tokio::fs::try_exists(&current_file).await.unwrap_or(false) {
        debug!(path = %current_file.display(), "Current shared file exists, skipping copy");
        MigrationOutcome::LegacyDiscarded
    } else {
        let bytes = tokio::fs::read(&legacy_file)
            .await
            .map_err(|e| StoreError::Migration(format!("{}: {e}", legacy_file.display())))?;
        write_atomic(&current_file, &bytes)
            .await
            .map_err(|e| StoreError::Migration(e.to_string()))?;
        info!(
            from = %legacy_file.display(),
            to = %current_file.display(),
            "Migrated shared state from legacy location"
        );
        MigrationOutcome::Migrated
    };

    if let Err(e) = tokio::fs::remove_dir_all(legacy_dir).await {
        warn!(path = %legacy_dir.display(), error = %e, "Failed to remove legacy directory");
    }

    Ok(outcome)
}
