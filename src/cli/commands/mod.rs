//! CLI command implementations
//!
//! Each command is implemented in its own submodule.

pub mod build;
pub mod check;
pub mod clean;
pub mod doctor;

use std::path::PathBuf;

use anyhow::Result;
use clap::Subcommand;

use crate::config::defaults;

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the full bundle pipeline
    Build {
        /// Path to the recipe file
        #[arg(short, long, default_value = defaults::RECIPE_FILE)]
        recipe: PathBuf,

        /// Workspace root all stages operate under
        #[arg(short, long, default_value = "work")]
        workspace: PathBuf,

        /// Directory holding the helper scripts and the artifact template
        #[arg(short, long, default_value = "helpers")]
        scripts: PathBuf,

        /// Fail a build at the first broken chain step instead of masking
        /// everything but the install step
        #[arg(long)]
        strict_chains: bool,
    },

    /// Empty the stage and output roots of a workspace
    Clean {
        /// Workspace root to clean
        #[arg(short, long, default_value = "work")]
        workspace: PathBuf,
    },

    /// Validate a recipe without building
    Check {
        /// Path to the recipe file
        #[arg(short, long, default_value = defaults::RECIPE_FILE)]
        recipe: PathBuf,
    },

    /// Check host tools the pipeline shells out to
    Doctor,
}

impl Commands {
    /// Execute the command
    pub async fn run(self, json: bool) -> Result<()> {
        match self {
            Self::Build {
                recipe,
                workspace,
                scripts,
                strict_chains,
            } => {
                let options = build::BuildOptions {
                    recipe,
                    workspace,
                    scripts,
                    strict_chains,
                };
                build::execute(options).await
            }
            Self::Clean { workspace } => clean::execute(&workspace).await,
            Self::Check { recipe } => check::execute(&recipe, json).await,
            Self::Doctor => doctor::execute().await,
        }
    }
}
