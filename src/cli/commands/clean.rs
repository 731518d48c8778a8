//! CLI implementation for `appforge clean`
//!
//! The explicit recovery action after a failed run: empty the stage and
//! output roots so the next run starts from a clean workspace.

use std::path::Path;

use anyhow::{Context, Result};

use crate::cli::output::status;
use crate::core::workspace::Workspace;

/// Execute the clean command
pub async fn execute(workspace_root: &Path) -> Result<()> {
    let workspace = Workspace::new(workspace_root);

    if workspace.is_clean() {
        println!("{} Nothing to clean", status::SUCCESS);
        return Ok(());
    }

    let result = workspace
        .clean()
        .with_context(|| format!("Failed to clean workspace at {}", workspace_root.display()))?;

    println!("{} Cleaned workspace:", status::SUCCESS);
    for dir in &result.cleared {
        println!("  Cleared {dir}/");
    }

    Ok(())
}
