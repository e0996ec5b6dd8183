//! Environment/runtime helpers
//!
//! Sanity checks to ensure expected directories exist at startup.

use std::path::Path;

use tracing::warn;

/// Ensure the parent directory of the session file exists.
///
/// Creation failures are logged, not returned; the session store then runs
/// from memory.
pub async fn ensure_parent_dir(file: &Path) -> anyhow::Result<()> {
    let Some(parent) = file.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    if tokio::fs::metadata(parent).await.is_ok() {
        return Ok(());
    }
    if let Err(e) = tokio::fs::create_dir_all(parent).await {
        warn!(
            dir = %parent.display(),
            error = %e,
            "cannot create session directory; persistence disabled"
        );
    }
    Ok(())
}
