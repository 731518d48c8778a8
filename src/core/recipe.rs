//! Recipe (appforge.toml) parsing and validation
//!
//! The recipe is the declarative build plan for one bundle: the main
//! project, its ordered dependency list, the optional framework set, OS
//! packages, and the bundle metadata the integration stages need. It is
//! loaded once and never mutated.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::defaults;
use crate::core::build::BuildSystem;
use crate::core::source::SourceKind;

/// Recipe loading and validation errors
#[derive(Error, Debug)]
pub enum RecipeError {
    /// Recipe file missing
    #[error("No {file} found at '{path}'", file = defaults::RECIPE_FILE)]
    NotFound { path: PathBuf },

    /// Recipe file unreadable
    #[error("Failed to read recipe '{path}': {error}")]
    Io { path: PathBuf, error: String },

    /// Recipe parse error
    #[error("Failed to parse recipe: {source}")]
    Parse {
        #[from]
        source: toml::de::Error,
    },

    /// Dependency list empty
    #[error("Recipe declares no dependencies; the packaging tool must be listed first")]
    NoDependencies,

    /// First dependency is not the packaging tool
    #[error("The first dependency must be the packaging tool, found '{first}'")]
    PackagingToolMissing { first: String },
}

/// The declarative build plan driving one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recipe {
    /// Main project configuration
    pub project: ProjectConfig,

    /// Ordered dependency list; build order is list order
    #[serde(default)]
    pub dependencies: Vec<Dependency>,

    /// Framework set built from the fixed upstream host
    #[serde(default)]
    pub frameworks: FrameworkSet,

    /// OS-level packages
    #[serde(default)]
    pub packages: PackagesConfig,

    /// Bundle metadata for the integration stages
    pub bundle: BundleConfig,
}

/// Main project: name plus how to fetch and build it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectConfig {
    /// Project name; also the component name of its source tree
    pub name: String,

    /// Where the main project's source comes from
    pub source: SourceSpec,

    /// How the main project is built
    pub build: BuildSpec,
}

/// One dependency: fetched and built before everything after it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Dependency {
    /// Component name; keys the source tree directory
    pub name: String,

    /// Where the source comes from
    pub source: SourceSpec,

    /// How it is built
    pub build: BuildSpec,
}

/// Source declaration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceSpec {
    /// Source variant name; unrecognized values surface as an
    /// unsupported-variant outcome at resolve time, not as a parse error
    #[serde(rename = "type")]
    pub kind: String,

    /// Clone or download URL; ignored by the `none` variant
    #[serde(default)]
    pub url: String,

    /// Branch to check out after cloning; `master` when omitted
    #[serde(default)]
    pub branch: Option<String>,

    /// Expected SHA256 of a downloaded archive
    #[serde(default)]
    pub sha256: Option<String>,
}

/// Build declaration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BuildSpec {
    /// Build system variant name; unrecognized values surface at build time
    pub system: String,

    /// Opaque option string appended to the build invocation
    #[serde(default)]
    pub options: String,
}

/// Framework set: a second dependency class with fixed source URLs
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FrameworkSet {
    /// Whether the framework stage runs at all
    #[serde(default)]
    pub enabled: bool,

    /// Ordered member names, resolved against the fixed upstream host
    #[serde(default)]
    pub members: Vec<String>,
}

/// OS packages installed before any build
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PackagesConfig {
    #[serde(default)]
    pub system: Vec<String>,
}

/// Bundle metadata consumed by the integration stages
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BundleConfig {
    /// Desktop entry base name (without `.desktop`)
    pub desktop: String,

    /// Icon file name
    pub icon: String,

    /// Directory the icon is copied from
    #[serde(default)]
    pub icon_path: String,

    /// Extra absolute paths copied into the bundle, layout preserved
    #[serde(default)]
    pub extra_paths: Vec<String>,
}

impl Recipe {
    /// Parse a recipe from TOML content and validate it
    pub fn from_toml(content: &str) -> Result<Self, RecipeError> {
        let recipe: Self = toml::from_str(content)?;
        recipe.validate()?;
        Ok(recipe)
    }

    /// Load and validate the recipe at `path`
    pub fn load(path: &Path) -> Result<Self, RecipeError> {
        if !path.exists() {
            return Err(RecipeError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path).map_err(|e| RecipeError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        Self::from_toml(&content)
    }

    /// Structural validation beyond what serde enforces
    fn validate(&self) -> Result<(), RecipeError> {
        let first = self.dependencies.first().ok_or(RecipeError::NoDependencies)?;
        if !first.name.contains(defaults::PACKAGING_TOOL_MARKER) {
            return Err(RecipeError::PackagingToolMissing {
                first: first.name.clone(),
            });
        }
        Ok(())
    }

    /// Variant names the pipeline will reject at stage time.
    ///
    /// `check` reports these up front; the pipeline itself surfaces them as
    /// unsupported-variant failures when the component is reached.
    pub fn unknown_variants(&self) -> Vec<String> {
        let mut findings = Vec::new();

        let components = self
            .dependencies
            .iter()
            .map(|d| (&d.name, &d.source, &d.build))
            .chain(std::iter::once((
                &self.project.name,
                &self.project.source,
                &self.project.build,
            )));

        for (name, source, build) in components {
            if SourceKind::parse(&source.kind).is_none() {
                findings.push(format!(
                    "'{name}' has unsupported source type '{}'",
                    source.kind
                ));
            }
            if BuildSystem::parse(&build.system).is_none() {
                findings.push(format!(
                    "'{name}' has unsupported build system '{}'",
                    build.system
                ));
            }
        }

        findings
    }
}
