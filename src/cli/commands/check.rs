//! CLI implementation for `appforge check`
//!
//! Validates a recipe without building: structural rules plus a report of
//! variant names the pipeline would reject.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::cli::output::status;
use crate::core::recipe::Recipe;

/// Machine-readable check report
#[derive(Debug, Serialize)]
struct CheckReport {
    recipe: String,
    project: String,
    dependencies: usize,
    frameworks_enabled: bool,
    unknown_variants: Vec<String>,
    ok: bool,
}

/// Execute the check command
pub async fn execute(recipe_path: &Path, json: bool) -> Result<()> {
    let recipe = Recipe::load(recipe_path)
        .with_context(|| format!("Recipe validation failed for {}", recipe_path.display()))?;

    let unknown = recipe.unknown_variants();
    let report = CheckReport {
        recipe: recipe_path.display().to_string(),
        project: recipe.project.name.clone(),
        dependencies: recipe.dependencies.len(),
        frameworks_enabled: recipe.frameworks.enabled,
        ok: unknown.is_empty(),
        unknown_variants: unknown,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "{} Recipe for '{}': {} dependencies, frameworks {}",
            status::INFO,
            report.project,
            report.dependencies,
            if report.frameworks_enabled {
                "enabled"
            } else {
                "disabled"
            }
        );
        for finding in &report.unknown_variants {
            println!("{} {finding}", status::WARNING);
        }
        if report.ok {
            println!("{} Recipe is valid", status::SUCCESS);
        }
    }

    if report.ok {
        Ok(())
    } else {
        anyhow::bail!(
            "{} variant name(s) are not supported",
            report.unknown_variants.len()
        )
    }
}
