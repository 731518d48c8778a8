//! CLI implementation for `appforge doctor`
//!
//! Verifies the host tools the pipeline shells out to are on PATH.

use anyhow::Result;

use crate::cli::output::status;
use crate::config::defaults;

/// Execute the doctor command
pub async fn execute() -> Result<()> {
    let mut missing = Vec::new();

    for tool in defaults::REQUIRED_TOOLS {
        match which::which(tool) {
            Ok(path) => println!("{} {tool} ({})", status::SUCCESS, path.display()),
            Err(_) => {
                println!("{} {tool} not found", status::ERROR);
                missing.push(*tool);
            }
        }
    }

    if missing.is_empty() {
        println!("{} All required tools are available", status::SUCCESS);
        Ok(())
    } else {
        anyhow::bail!("Missing required tools: {}", missing.join(", "))
    }
}
