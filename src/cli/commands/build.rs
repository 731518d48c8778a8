//! CLI implementation for `appforge build`
//!
//! Loads the recipe, wires the production runner and helper scripts into the
//! pipeline, and runs it. A failing stage's exit status becomes this
//! process's exit status, unchanged.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use indicatif::ProgressBar;

use crate::cli::output::{create_spinner, status};
use crate::core::build::IntermediateFailures;
use crate::core::pipeline::Pipeline;
use crate::core::recipe::Recipe;
use crate::core::workspace::Workspace;
use crate::infra::process::SystemRunner;
use crate::infra::scripts::HelperScripts;

/// Options for the build command
#[derive(Debug)]
pub struct BuildOptions {
    pub recipe: PathBuf,
    pub workspace: PathBuf,
    pub scripts: PathBuf,
    pub strict_chains: bool,
}

type StageSpinner = Arc<Mutex<Option<(ProgressBar, String)>>>;

fn finish_spinner(slot: &StageSpinner, prefix: &str) {
    if let Some((bar, label)) = slot.lock().unwrap().take() {
        bar.finish_with_message(format!("{prefix} {label}"));
    }
}

/// Execute the build command
pub async fn execute(options: BuildOptions) -> Result<()> {
    let recipe = Recipe::load(&options.recipe)
        .with_context(|| format!("Failed to load recipe from {}", options.recipe.display()))?;

    let workspace = Workspace::new(&options.workspace);
    let runner = Arc::new(SystemRunner::new());
    let steps = HelperScripts::new(
        options.scripts.clone(),
        &workspace,
        &recipe.project.name,
        runner.clone(),
    );

    let chain_policy = if options.strict_chains {
        IntermediateFailures::Abort
    } else {
        IntermediateFailures::Mask
    };

    let spinner: StageSpinner = Arc::new(Mutex::new(None));
    let spinner_handle = spinner.clone();

    let name = recipe.project.name.clone();
    let pipeline = Pipeline::new(recipe, workspace, runner, Box::new(steps))
        .with_intermediate_failures(chain_policy)
        .with_observer(Box::new(move |stage| {
            finish_spinner(&spinner_handle, status::SUCCESS);
            let label = stage.to_string();
            let bar = create_spinner(&label);
            *spinner_handle.lock().unwrap() = Some((bar, label));
        }));

    match pipeline.run().await {
        Ok(report) => {
            finish_spinner(&spinner, status::SUCCESS);
            println!(
                "{} Built {name} {} -> {}",
                status::SUCCESS,
                report.version,
                report.artifact.display()
            );
            Ok(())
        }
        Err(failure) => {
            finish_spinner(&spinner, status::ERROR);
            eprintln!("{} {failure}", status::ERROR);
            // Propagate the failing stage's status verbatim.
            std::process::exit(failure.status.unwrap_or(1));
        }
    }
}
