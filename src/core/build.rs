//! Build execution
//!
//! Compiles and installs one component's already-resolved source tree. Each
//! build system is a fixed chain of shell lines run in the component's
//! source directory; every build installs into the shared prefix so later
//! builds see earlier builds' headers and libraries.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::config::defaults;
use crate::core::workspace::Workspace;
use crate::error::ProcessError;
use crate::infra::process::CommandRunner;

/// Errors that can occur during a build
#[derive(Error, Debug)]
pub enum BuildError {
    /// Build system not in the supported set
    #[error("Component '{component}' declares unsupported build system '{system}'")]
    UnsupportedBuildSystem { component: String, system: String },

    /// A chain step exited non-zero and the chain policy aborts on it
    #[error("'{command}' for component '{component}' exited with {status}")]
    StepFailed {
        component: String,
        command: String,
        status: i32,
    },

    /// Command could not be run at all
    #[error(transparent)]
    Process(#[from] ProcessError),
}

impl BuildError {
    /// Exit status carried by the failure, when one was observed
    pub fn status(&self) -> Option<i32> {
        match self {
            Self::StepFailed { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// The closed set of supported build systems
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildSystem {
    /// configure / make / make install
    Autotools,
    /// cmake / make / make install
    CMake,
    /// The option string is the build command
    Custom,
    /// qmake / make / make install
    Qmake,
    /// ./bootstrap / make / make install
    Bootstrap,
}

impl BuildSystem {
    /// Map a recipe variant name to a build system; `None` for unsupported
    /// values. `make` is accepted as the historical name for autotools.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "autotools" | "make" => Some(Self::Autotools),
            "cmake" => Some(Self::CMake),
            "custom" => Some(Self::Custom),
            "qmake" => Some(Self::Qmake),
            "bootstrap" => Some(Self::Bootstrap),
            _ => None,
        }
    }
}

/// What to do when a non-final chain step exits non-zero.
///
/// The observed behavior of this pipeline is `Mask`: only the final step's
/// status decides the build result, so a broken configure or compile step is
/// invisible unless it also breaks the install step. Some recipes rely on
/// the second `make install` attempt succeeding, so `Mask` stays the
/// default; `Abort` is the strict opt-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntermediateFailures {
    /// Record and log the failure, keep running the chain
    #[default]
    Mask,
    /// Fail the build at the first non-zero step
    Abort,
}

/// A non-final chain step that failed under the `Mask` policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskedStep {
    pub command: String,
    pub status: i32,
}

/// Result of a successful build
#[derive(Debug, Default)]
pub struct BuildOutcome {
    /// Intermediate failures that were masked by the chain policy
    pub masked: Vec<MaskedStep>,
}

/// Runs build chains for resolved components
pub struct BuildExecutor {
    workspace_root: PathBuf,
    source_dir: PathBuf,
    install_prefix: PathBuf,
    jobs: usize,
    on_intermediate_failure: IntermediateFailures,
    runner: Arc<dyn CommandRunner>,
}

impl BuildExecutor {
    pub fn new(workspace: &Workspace, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            workspace_root: workspace.root().to_path_buf(),
            source_dir: workspace.source_dir(),
            install_prefix: workspace.install_prefix(),
            jobs: defaults::BUILD_JOBS,
            on_intermediate_failure: IntermediateFailures::default(),
            runner,
        }
    }

    /// Select the chain policy for non-final step failures
    #[must_use]
    pub fn with_intermediate_failures(mut self, policy: IntermediateFailures) -> Self {
        self.on_intermediate_failure = policy;
        self
    }

    /// Build one component with the named build system and option string
    pub fn build(
        &self,
        name: &str,
        system: &str,
        options: &str,
    ) -> Result<BuildOutcome, BuildError> {
        let system = BuildSystem::parse(system).ok_or_else(|| {
            BuildError::UnsupportedBuildSystem {
                component: name.to_string(),
                system: system.to_string(),
            }
        })?;

        let (cwd, chain) = self.chain(name, system, options);
        self.run_chain(name, &cwd, &chain)
    }

    /// Working directory and shell-line chain for one build
    fn chain(&self, name: &str, system: BuildSystem, options: &str) -> (PathBuf, Vec<String>) {
        let prefix = self.install_prefix.display();
        let jobs = self.jobs;
        let component_dir = self.source_dir.join(name);

        match system {
            BuildSystem::Autotools => (
                component_dir,
                vec![
                    format!("./configure --prefix={prefix} {options}"),
                    format!("make -j{jobs} && sudo make install prefix={prefix}"),
                ],
            ),
            BuildSystem::CMake => (
                component_dir,
                vec![
                    format!("{prefix}/bin/cmake {options}"),
                    format!("make -j{jobs} && sudo make install"),
                ],
            ),
            BuildSystem::Custom => {
                // The module manager has no source tree under src/; its
                // command runs from the workspace root.
                let cwd = if defaults::WORKSPACE_ROOTED_COMPONENTS.contains(&name) {
                    self.workspace_root.clone()
                } else {
                    component_dir
                };
                (cwd, vec![options.to_string()])
            }
            BuildSystem::Qmake => (
                component_dir,
                vec![
                    format!("{prefix}/bin/qmake {}", defaults::QMAKE_PROJECT_FILE),
                    format!("make -j{jobs} && sudo make install"),
                ],
            ),
            BuildSystem::Bootstrap => (
                component_dir,
                vec![
                    format!("./bootstrap {options}"),
                    format!("make -j{jobs} && sudo make install"),
                ],
            ),
        }
    }

    /// Run a chain; only the final line's status decides the outcome under
    /// the `Mask` policy.
    fn run_chain(
        &self,
        name: &str,
        cwd: &Path,
        chain: &[String],
    ) -> Result<BuildOutcome, BuildError> {
        let mut outcome = BuildOutcome::default();
        let last = chain.len().saturating_sub(1);

        for (index, line) in chain.iter().enumerate() {
            tracing::info!(component = name, command = line.as_str(), "running build step");
            let status = self.runner.run(line, cwd)?;

            if status == 0 {
                continue;
            }

            if index == last {
                return Err(BuildError::StepFailed {
                    component: name.to_string(),
                    command: line.clone(),
                    status,
                });
            }

            match self.on_intermediate_failure {
                IntermediateFailures::Mask => {
                    tracing::warn!(
                        component = name,
                        command = line.as_str(),
                        status,
                        "intermediate build step failed; continuing to the install step"
                    );
                    outcome.masked.push(MaskedStep {
                        command: line.clone(),
                        status,
                    });
                }
                IntermediateFailures::Abort => {
                    return Err(BuildError::StepFailed {
                        component: name.to_string(),
                        command: line.clone(),
                        status,
                    });
                }
            }
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FakeRunner;
    use tempfile::TempDir;

    fn executor(temp: &TempDir, runner: Arc<FakeRunner>) -> BuildExecutor {
        BuildExecutor::new(&Workspace::new(temp.path()), runner)
    }

    #[test]
    fn test_build_system_parse_closed_set() {
        assert_eq!(BuildSystem::parse("autotools"), Some(BuildSystem::Autotools));
        assert_eq!(BuildSystem::parse("make"), Some(BuildSystem::Autotools));
        assert_eq!(BuildSystem::parse("cmake"), Some(BuildSystem::CMake));
        assert_eq!(BuildSystem::parse("custom"), Some(BuildSystem::Custom));
        assert_eq!(BuildSystem::parse("qmake"), Some(BuildSystem::Qmake));
        assert_eq!(BuildSystem::parse("bootstrap"), Some(BuildSystem::Bootstrap));
        assert_eq!(BuildSystem::parse("scons"), None);
    }

    #[test]
    fn test_autotools_chain_composition() {
        let temp = TempDir::new().unwrap();
        let runner = Arc::new(FakeRunner::new());
        let executor = executor(&temp, runner.clone());

        executor
            .build("zlib", "autotools", "--enable-shared")
            .unwrap();

        let calls = runner.calls();
        let prefix = temp.path().join("stage/usr");
        assert_eq!(calls.len(), 2);
        assert_eq!(
            calls[0].0,
            format!("./configure --prefix={} --enable-shared", prefix.display())
        );
        assert_eq!(
            calls[1].0,
            format!("make -j8 && sudo make install prefix={}", prefix.display())
        );
        assert_eq!(calls[0].1, temp.path().join("src/zlib"));
        assert_eq!(calls[1].1, temp.path().join("src/zlib"));
    }

    #[test]
    fn test_cmake_uses_prefix_toolchain_binary() {
        let temp = TempDir::new().unwrap();
        let runner = Arc::new(FakeRunner::new());
        let executor = executor(&temp, runner.clone());

        executor.build("editor", "cmake", "-DX=1").unwrap();

        let calls = runner.calls();
        let prefix = temp.path().join("stage/usr");
        assert_eq!(calls[0].0, format!("{}/bin/cmake -DX=1", prefix.display()));
        assert_eq!(calls[1].0, "make -j8 && sudo make install");
    }

    #[test]
    fn test_qmake_uses_fixed_project_file() {
        let temp = TempDir::new().unwrap();
        let runner = Arc::new(FakeRunner::new());
        let executor = executor(&temp, runner.clone());

        executor.build("linuxdeployqt", "qmake", "").unwrap();

        let calls = runner.calls();
        assert!(calls[0].0.ends_with("/bin/qmake linuxdeployqt.pro"));
    }

    #[test]
    fn test_bootstrap_chain() {
        let temp = TempDir::new().unwrap();
        let runner = Arc::new(FakeRunner::new());
        let executor = executor(&temp, runner.clone());

        executor.build("toolchain", "bootstrap", "--without-docs").unwrap();

        let calls = runner.calls();
        assert_eq!(calls[0].0, "./bootstrap --without-docs");
        assert_eq!(calls[1].0, "make -j8 && sudo make install");
    }

    #[test]
    fn test_custom_runs_options_verbatim_in_component_dir() {
        let temp = TempDir::new().unwrap();
        let runner = Arc::new(FakeRunner::new());
        let executor = executor(&temp, runner.clone());

        executor
            .build("helper", "custom", "python setup.py install")
            .unwrap();

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "python setup.py install");
        assert_eq!(calls[0].1, temp.path().join("src/helper"));
    }

    #[test]
    fn test_reserved_name_routes_to_workspace_root() {
        let temp = TempDir::new().unwrap();
        let runner = Arc::new(FakeRunner::new());
        let executor = executor(&temp, runner.clone());

        executor
            .build("cpan", "custom", "cpan install Module::Build")
            .unwrap();

        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "cpan install Module::Build");
        // Not src/cpan: the module manager has no per-component source tree.
        assert_eq!(calls[0].1, temp.path());
    }

    #[test]
    fn test_unsupported_build_system_is_distinct_from_success() {
        let temp = TempDir::new().unwrap();
        let runner = Arc::new(FakeRunner::new());
        let executor = executor(&temp, runner.clone());

        let err = executor.build("x", "scons", "opts").unwrap_err();
        match err {
            BuildError::UnsupportedBuildSystem { component, system } => {
                assert_eq!(component, "x");
                assert_eq!(system, "scons");
            }
            e => panic!("Expected UnsupportedBuildSystem, got: {e:?}"),
        }
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_intermediate_failure_is_masked_by_default() {
        let temp = TempDir::new().unwrap();
        // configure fails, the install line still succeeds
        let runner = Arc::new(FakeRunner::new().failing_on("./configure", 1));
        let executor = executor(&temp, runner.clone());

        let outcome = executor.build("zlib", "autotools", "").unwrap();

        assert_eq!(outcome.masked.len(), 1);
        assert_eq!(outcome.masked[0].status, 1);
        assert!(outcome.masked[0].command.starts_with("./configure"));
        // Both chain steps ran despite the failure.
        assert_eq!(runner.calls().len(), 2);
    }

    #[test]
    fn test_final_step_failure_is_never_masked() {
        let temp = TempDir::new().unwrap();
        let runner = Arc::new(FakeRunner::new().failing_on("make install", 2));
        let executor = executor(&temp, runner.clone());

        let err = executor.build("zlib", "autotools", "").unwrap_err();
        assert_eq!(err.status(), Some(2));
    }

    #[test]
    fn test_abort_policy_fails_on_first_step() {
        let temp = TempDir::new().unwrap();
        let runner = Arc::new(FakeRunner::new().failing_on("./configure", 1));
        let executor = executor(&temp, runner.clone())
            .with_intermediate_failures(IntermediateFailures::Abort);

        let err = executor.build("zlib", "autotools", "").unwrap_err();

        assert_eq!(err.status(), Some(1));
        // The chain stopped at the failing configure step.
        assert_eq!(runner.calls().len(), 1);
    }
}
