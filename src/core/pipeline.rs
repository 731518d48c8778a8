//! The build pipeline
//!
//! A fixed, ordered stage sequence: clean the workspace, install OS
//! packages, resolve and build every dependency in list order, the optional
//! framework set, and the main project, then derive the version and drive
//! the integration and packaging stages. Any failing stage aborts the run;
//! the first failure is the run's result. There is no retry and no recovery
//! logic here on purpose: the orchestrator is a fail-fast sequencer and
//! nothing else.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{defaults, urls};
use crate::core::build::{BuildError, BuildExecutor, IntermediateFailures};
use crate::core::recipe::{Recipe, SourceSpec};
use crate::core::source::{Resolution, ResolveError, SourceResolver};
use crate::core::version::{derive_version, VersionError};
use crate::core::workspace::Workspace;
use crate::infra::filesystem::{copy_tree, copy_with_parents, dir_is_empty};
use crate::infra::process::CommandRunner;
use crate::infra::scripts::{ArtifactContext, ExternalSteps, StepError};

/// The pipeline's stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    CleanWorkspace,
    InstallSystemPackages,
    BuildDependencies,
    BuildFrameworks,
    BuildMainProject,
    DeriveVersion,
    IntegrateDesktop,
    IntegrateIcon,
    RuntimeIntegration,
    CopyDependencies,
    CopyLibraries,
    RelocateLibraries,
    RemoveBlacklisted,
    GenerateArtifact,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CleanWorkspace => "clean-workspace",
            Self::InstallSystemPackages => "install-system-packages",
            Self::BuildDependencies => "build-dependencies",
            Self::BuildFrameworks => "build-frameworks",
            Self::BuildMainProject => "build-main-project",
            Self::DeriveVersion => "derive-version",
            Self::IntegrateDesktop => "integrate-desktop",
            Self::IntegrateIcon => "integrate-icon",
            Self::RuntimeIntegration => "runtime-integration",
            Self::CopyDependencies => "copy-dependencies",
            Self::CopyLibraries => "copy-libraries",
            Self::RelocateLibraries => "relocate-libraries",
            Self::RemoveBlacklisted => "remove-blacklisted",
            Self::GenerateArtifact => "generate-artifact",
        };
        write!(f, "{name}")
    }
}

/// What class of failure aborted a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Unrecognized source type or build system name
    UnsupportedVariant,
    /// Non-zero exit from clone, download, or extract
    Fetch,
    /// Non-zero exit from the final command of a build chain
    Build,
    /// An external helper step failed
    Collaborator,
    /// A post-stage existence or content check failed
    Assertion,
    /// Workspace filesystem bookkeeping failed
    Workspace,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::UnsupportedVariant => "unsupported-variant",
            Self::Fetch => "fetch",
            Self::Build => "build",
            Self::Collaborator => "collaborator",
            Self::Assertion => "assertion",
            Self::Workspace => "workspace",
        };
        write!(f, "{name}")
    }
}

/// A stage that aborted the run
#[derive(Error, Debug)]
#[error("stage {stage} failed ({kind}): {message}")]
pub struct StageFailure {
    pub stage: Stage,
    pub kind: FailureKind,
    /// Exit status observed from the underlying process, when there was one;
    /// propagated verbatim as the run's result
    pub status: Option<i32>,
    pub message: String,
}

/// Result of a completed run
#[derive(Debug)]
pub struct PipelineReport {
    /// Normalized bundle version
    pub version: String,
    /// Path of the generated artifact
    pub artifact: std::path::PathBuf,
    /// Stages that ran, in order
    pub completed: Vec<Stage>,
}

/// Callback invoked as each stage begins
pub type StageObserver = Box<dyn Fn(Stage) + Send + Sync>;

/// Runs the stage sequence for one recipe
pub struct Pipeline {
    recipe: Recipe,
    workspace: Workspace,
    resolver: SourceResolver,
    executor: BuildExecutor,
    steps: Box<dyn ExternalSteps>,
    runner: Arc<dyn CommandRunner>,
    arch: String,
    observer: Option<StageObserver>,
}

impl Pipeline {
    pub fn new(
        recipe: Recipe,
        workspace: Workspace,
        runner: Arc<dyn CommandRunner>,
        steps: Box<dyn ExternalSteps>,
    ) -> Self {
        let resolver = SourceResolver::new(workspace.source_dir(), runner.clone());
        let executor = BuildExecutor::new(&workspace, runner.clone());
        Self {
            recipe,
            workspace,
            resolver,
            executor,
            steps,
            runner,
            arch: std::env::consts::ARCH.to_string(),
            observer: None,
        }
    }

    /// Select the build-chain policy for intermediate step failures
    #[must_use]
    pub fn with_intermediate_failures(mut self, policy: IntermediateFailures) -> Self {
        self.executor = self.executor.with_intermediate_failures(policy);
        self
    }

    /// Override the artifact architecture label
    #[must_use]
    pub fn with_arch(mut self, arch: impl Into<String>) -> Self {
        self.arch = arch.into();
        self
    }

    /// Install a stage observer
    #[must_use]
    pub fn with_observer(mut self, observer: StageObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Run the full stage sequence
    pub async fn run(&self) -> Result<PipelineReport, StageFailure> {
        let mut completed = Vec::new();

        self.clean_workspace(&mut completed)?;
        self.install_system_packages(&mut completed)?;
        self.build_dependencies(&mut completed).await?;
        self.build_frameworks(&mut completed).await?;
        self.build_main_project(&mut completed).await?;
        let version = self.derive_version(&mut completed)?;
        self.integrate_desktop(&mut completed)?;
        self.integrate_icon(&mut completed)?;
        self.runtime_integration(&mut completed)?;
        self.copy_dependencies(&mut completed)?;
        self.library_stages(&mut completed)?;
        let artifact = self.generate_artifact(&version, &mut completed)?;

        Ok(PipelineReport {
            version,
            artifact,
            completed,
        })
    }

    fn begin(&self, stage: Stage) {
        tracing::info!(stage = %stage, "starting stage");
        if let Some(observer) = &self.observer {
            observer(stage);
        }
    }

    fn clean_workspace(&self, completed: &mut Vec<Stage>) -> Result<(), StageFailure> {
        self.begin(Stage::CleanWorkspace);
        if !self.workspace.is_clean() {
            tracing::warn!("workspace holds output from a previous run, clearing it");
            self.workspace
                .clean()
                .map_err(|e| fail(Stage::CleanWorkspace, FailureKind::Workspace, None, e))?;
        }
        self.workspace
            .prepare()
            .map_err(|e| fail(Stage::CleanWorkspace, FailureKind::Workspace, None, e))?;
        completed.push(Stage::CleanWorkspace);
        Ok(())
    }

    fn install_system_packages(&self, completed: &mut Vec<Stage>) -> Result<(), StageFailure> {
        self.begin(Stage::InstallSystemPackages);
        self.steps
            .install_packages(&self.recipe.packages.system)
            .map_err(|e| step_fail(Stage::InstallSystemPackages, e))?;
        completed.push(Stage::InstallSystemPackages);
        Ok(())
    }

    async fn build_dependencies(&self, completed: &mut Vec<Stage>) -> Result<(), StageFailure> {
        self.begin(Stage::BuildDependencies);
        for dep in &self.recipe.dependencies {
            self.resolve_and_build(
                Stage::BuildDependencies,
                &dep.name,
                &dep.source,
                &dep.build.system,
                &dep.build.options,
            )
            .await?;
        }
        completed.push(Stage::BuildDependencies);
        Ok(())
    }

    async fn build_frameworks(&self, completed: &mut Vec<Stage>) -> Result<(), StageFailure> {
        if !self.recipe.frameworks.enabled {
            return Ok(());
        }
        self.begin(Stage::BuildFrameworks);

        let prefix = self.workspace.install_prefix();
        for member in &self.recipe.frameworks.members {
            let source = SourceSpec {
                kind: "git".to_string(),
                url: urls::framework_url(member),
                branch: None,
                sha256: None,
            };
            let options = if member == defaults::MULTIMEDIA_FRAMEWORK {
                defaults::multimedia_framework_options(&prefix)
            } else {
                defaults::framework_options(&prefix)
            };
            self.resolve_and_build(Stage::BuildFrameworks, member, &source, "cmake", &options)
                .await?;
        }
        completed.push(Stage::BuildFrameworks);
        Ok(())
    }

    async fn build_main_project(&self, completed: &mut Vec<Stage>) -> Result<(), StageFailure> {
        self.begin(Stage::BuildMainProject);
        let project = &self.recipe.project;
        self.resolve_and_build(
            Stage::BuildMainProject,
            &project.name,
            &project.source,
            &project.build.system,
            &project.build.options,
        )
        .await?;
        completed.push(Stage::BuildMainProject);
        Ok(())
    }

    /// Resolve one component, assert its tree exists, and build it.
    ///
    /// The existence assertion is skipped for components that declare no
    /// source and for the reserved workspace-rooted names, which have no
    /// per-component tree by design.
    async fn resolve_and_build(
        &self,
        stage: Stage,
        name: &str,
        source: &SourceSpec,
        system: &str,
        options: &str,
    ) -> Result<(), StageFailure> {
        let resolution = self
            .resolver
            .resolve(name, source)
            .await
            .map_err(|e| resolve_fail(stage, &e))?;

        let tree_expected = resolution != Resolution::NothingToFetch
            && !defaults::WORKSPACE_ROOTED_COMPONENTS.contains(&name);
        if tree_expected && !self.workspace.source_dir().join(name).exists() {
            return Err(fail(
                stage,
                FailureKind::Assertion,
                None,
                format!("source tree for '{name}' missing after resolution"),
            ));
        }

        self.executor
            .build(name, system, options)
            .map_err(|e| build_fail(stage, &e))?;
        Ok(())
    }

    fn derive_version(&self, completed: &mut Vec<Stage>) -> Result<String, StageFailure> {
        self.begin(Stage::DeriveVersion);
        let tree = self.workspace.source_dir().join(&self.recipe.project.name);
        let version = derive_version(self.runner.as_ref(), &tree).map_err(|e| {
            let status = match &e {
                VersionError::DescribeFailed { status, .. } => Some(*status),
                _ => None,
            };
            fail(Stage::DeriveVersion, FailureKind::Fetch, status, e)
        })?;
        completed.push(Stage::DeriveVersion);
        Ok(version)
    }

    fn desktop_file(&self) -> std::path::PathBuf {
        self.workspace
            .stage_dir()
            .join(format!("{}.desktop", self.recipe.bundle.desktop))
    }

    fn integrate_desktop(&self, completed: &mut Vec<Stage>) -> Result<(), StageFailure> {
        self.begin(Stage::IntegrateDesktop);
        self.steps
            .integrate_desktop(&self.recipe.project.name, &self.recipe.bundle.desktop)
            .map_err(|e| step_fail(Stage::IntegrateDesktop, e))?;

        let desktop = self.desktop_file();
        if !desktop.exists() {
            return Err(fail(
                Stage::IntegrateDesktop,
                FailureKind::Assertion,
                None,
                format!("desktop entry '{}' missing after integration", desktop.display()),
            ));
        }
        let content = std::fs::read_to_string(&desktop).map_err(|e| {
            fail(Stage::IntegrateDesktop, FailureKind::Assertion, None, e)
        })?;
        if !content.contains("Icon") {
            return Err(fail(
                Stage::IntegrateDesktop,
                FailureKind::Assertion,
                None,
                format!("desktop entry '{}' has no Icon reference", desktop.display()),
            ));
        }
        completed.push(Stage::IntegrateDesktop);
        Ok(())
    }

    fn integrate_icon(&self, completed: &mut Vec<Stage>) -> Result<(), StageFailure> {
        self.begin(Stage::IntegrateIcon);
        let bundle = &self.recipe.bundle;
        self.steps
            .copy_icon(&bundle.icon, Path::new(&bundle.icon_path))
            .map_err(|e| step_fail(Stage::IntegrateIcon, e))?;

        let icon = self.workspace.stage_dir().join(&bundle.icon);
        if !icon.exists() {
            return Err(fail(
                Stage::IntegrateIcon,
                FailureKind::Assertion,
                None,
                format!("icon '{}' missing after integration", icon.display()),
            ));
        }
        completed.push(Stage::IntegrateIcon);
        Ok(())
    }

    fn runtime_integration(&self, completed: &mut Vec<Stage>) -> Result<(), StageFailure> {
        self.begin(Stage::RuntimeIntegration);
        self.steps
            .runtime_integration(&self.recipe.project.name)
            .map_err(|e| step_fail(Stage::RuntimeIntegration, e))?;
        completed.push(Stage::RuntimeIntegration);
        Ok(())
    }

    fn copy_dependencies(&self, completed: &mut Vec<Stage>) -> Result<(), StageFailure> {
        self.begin(Stage::CopyDependencies);
        let bundle_dir = self.workspace.bundle_dir(&self.recipe.project.name);

        copy_tree(&self.workspace.stage_dir(), &bundle_dir)
            .map_err(|e| fail(Stage::CopyDependencies, FailureKind::Workspace, None, e))?;

        for extra in &self.recipe.bundle.extra_paths {
            copy_with_parents(Path::new(extra), &bundle_dir)
                .map_err(|e| fail(Stage::CopyDependencies, FailureKind::Workspace, None, e))?;
        }
        completed.push(Stage::CopyDependencies);
        Ok(())
    }

    fn library_stages(&self, completed: &mut Vec<Stage>) -> Result<(), StageFailure> {
        self.begin(Stage::CopyLibraries);
        self.steps
            .copy_libraries()
            .map_err(|e| step_fail(Stage::CopyLibraries, e))?;
        completed.push(Stage::CopyLibraries);

        self.begin(Stage::RelocateLibraries);
        self.steps
            .relocate_libraries()
            .map_err(|e| step_fail(Stage::RelocateLibraries, e))?;
        let lib_dir = self
            .workspace
            .bundle_dir(&self.recipe.project.name)
            .join("lib");
        if !dir_is_empty(&lib_dir) {
            return Err(fail(
                Stage::RelocateLibraries,
                FailureKind::Assertion,
                None,
                format!("'{}' still holds libraries after relocation", lib_dir.display()),
            ));
        }
        completed.push(Stage::RelocateLibraries);

        self.begin(Stage::RemoveBlacklisted);
        self.steps
            .remove_blacklisted()
            .map_err(|e| step_fail(Stage::RemoveBlacklisted, e))?;
        completed.push(Stage::RemoveBlacklisted);
        Ok(())
    }

    fn generate_artifact(
        &self,
        version: &str,
        completed: &mut Vec<Stage>,
    ) -> Result<std::path::PathBuf, StageFailure> {
        self.begin(Stage::GenerateArtifact);
        let name = &self.recipe.project.name;
        let ctx = ArtifactContext {
            name: name.clone(),
            version: version.to_string(),
            arch: self.arch.clone(),
            bundle_dir: self.workspace.bundle_dir(name),
            output_dir: self.workspace.output_dir(),
        };

        let description = self
            .steps
            .render_artifact_description(&ctx)
            .map_err(|e| step_fail(Stage::GenerateArtifact, e))?;

        let line = format!("/bin/bash -xe {}", description.display());
        let status = self
            .runner
            .run(&line, self.workspace.root())
            .map_err(|e| fail(Stage::GenerateArtifact, FailureKind::Collaborator, None, e))?;
        if status != 0 {
            return Err(fail(
                Stage::GenerateArtifact,
                FailureKind::Collaborator,
                Some(status),
                format!("artifact description exited with {status}"),
            ));
        }

        let artifact = self
            .workspace
            .output_dir()
            .join(artifact_file_name(name, version, &self.arch));
        if !artifact.exists() {
            return Err(fail(
                Stage::GenerateArtifact,
                FailureKind::Assertion,
                None,
                format!("expected artifact '{}' was not produced", artifact.display()),
            ));
        }
        completed.push(Stage::GenerateArtifact);
        Ok(artifact)
    }
}

/// Deterministic artifact file name for a build
pub fn artifact_file_name(name: &str, version: &str, arch: &str) -> String {
    format!("{name}-{version}-{arch}.{}", defaults::ARTIFACT_EXTENSION)
}

fn fail(
    stage: Stage,
    kind: FailureKind,
    status: Option<i32>,
    message: impl ToString,
) -> StageFailure {
    StageFailure {
        stage,
        kind,
        status,
        message: message.to_string(),
    }
}

fn resolve_fail(stage: Stage, err: &ResolveError) -> StageFailure {
    let kind = match err {
        ResolveError::UnsupportedSourceKind { .. } => FailureKind::UnsupportedVariant,
        _ => FailureKind::Fetch,
    };
    fail(stage, kind, err.status(), err)
}

fn build_fail(stage: Stage, err: &BuildError) -> StageFailure {
    let kind = match err {
        BuildError::UnsupportedBuildSystem { .. } => FailureKind::UnsupportedVariant,
        _ => FailureKind::Build,
    };
    fail(stage, kind, err.status(), err)
}

fn step_fail(stage: Stage, err: StepError) -> StageFailure {
    fail(stage, FailureKind::Collaborator, err.status, err)
}
