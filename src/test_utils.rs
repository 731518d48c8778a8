//! Shared test doubles
//!
//! A scripted command runner and a recording helper-step fake so the
//! resolver, executor, and pipeline can be exercised without spawning real
//! processes.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::core::recipe::Recipe;
use crate::core::workspace::Workspace;
use crate::error::ProcessError;
use crate::infra::process::{CommandOutput, CommandRunner};
use crate::infra::scripts::{ArtifactContext, ExternalSteps, StepError};

/// Recipe used across tests: git main project, git packaging tool, one
/// source-less dependency, frameworks disabled.
pub const SAMPLE_RECIPE: &str = r#"
[project]
name = "editor"

[project.source]
type = "git"
url = "https://example.org/editor"

[project.build]
system = "cmake"
options = "-DX=1"

[[dependencies]]
name = "appimage-kit"

[dependencies.source]
type = "git"
url = "https://example.org/appimage-kit"

[dependencies.build]
system = "cmake"
options = "-DTOOLS=ON"

[[dependencies]]
name = "helper"

[dependencies.source]
type = "none"

[dependencies.build]
system = "custom"
options = "./install.sh"

[packages]
system = ["libfoo-dev"]

[bundle]
desktop = "editor"
icon = "editor.png"
icon_path = "/usr/share/icons"
"#;

/// Command runner that records every invocation and returns scripted
/// statuses instead of spawning processes.
///
/// `git clone` lines materialize their destination directory so the
/// resolver's idempotency contract can be observed; registered `touching`
/// patterns create files, standing in for commands that produce artifacts.
#[derive(Default)]
pub struct FakeRunner {
    calls: Mutex<Vec<(String, PathBuf)>>,
    failures: Mutex<Vec<(String, i32)>>,
    captures: Mutex<Vec<(String, String)>>,
    touches: Mutex<Vec<(String, PathBuf)>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands containing `pattern` exit with `status`
    #[must_use]
    pub fn failing_on(self, pattern: &str, status: i32) -> Self {
        self.fail_on(pattern, status);
        self
    }

    /// Register a failure after construction
    pub fn fail_on(&self, pattern: &str, status: i32) {
        self.failures
            .lock()
            .unwrap()
            .push((pattern.to_string(), status));
    }

    /// Captured commands containing `pattern` produce `stdout`
    #[must_use]
    pub fn with_capture(self, pattern: &str, stdout: &str) -> Self {
        self.captures
            .lock()
            .unwrap()
            .push((pattern.to_string(), stdout.to_string()));
        self
    }

    /// Commands containing `pattern` create `path` as a side effect
    #[must_use]
    pub fn touching(self, pattern: &str, path: PathBuf) -> Self {
        self.touches
            .lock()
            .unwrap()
            .push((pattern.to_string(), path));
        self
    }

    /// Every recorded invocation as (command line, working directory)
    pub fn calls(&self) -> Vec<(String, PathBuf)> {
        self.calls.lock().unwrap().clone()
    }

    fn scripted_status(&self, line: &str) -> i32 {
        self.failures
            .lock()
            .unwrap()
            .iter()
            .find(|(pattern, _)| line.contains(pattern))
            .map_or(0, |(_, status)| *status)
    }

    fn apply_side_effects(&self, line: &str, cwd: &Path) {
        if let Some(dest) = line
            .strip_prefix("git clone ")
            .and_then(|rest| rest.split_whitespace().nth(1))
        {
            let _ = std::fs::create_dir_all(cwd.join(dest));
        }

        for (pattern, path) in self.touches.lock().unwrap().iter() {
            if line.contains(pattern) {
                if let Some(parent) = path.parent() {
                    let _ = std::fs::create_dir_all(parent);
                }
                let _ = std::fs::write(path, b"");
            }
        }
    }
}

impl CommandRunner for FakeRunner {
    fn run(&self, line: &str, cwd: &Path) -> Result<i32, ProcessError> {
        self.calls
            .lock()
            .unwrap()
            .push((line.to_string(), cwd.to_path_buf()));

        let status = self.scripted_status(line);
        if status == 0 {
            self.apply_side_effects(line, cwd);
        }
        Ok(status)
    }

    fn capture(&self, line: &str, cwd: &Path) -> Result<CommandOutput, ProcessError> {
        self.calls
            .lock()
            .unwrap()
            .push((line.to_string(), cwd.to_path_buf()));

        let stdout = self
            .captures
            .lock()
            .unwrap()
            .iter()
            .find(|(pattern, _)| line.contains(pattern))
            .map(|(_, out)| out.clone())
            .unwrap_or_default();

        Ok(CommandOutput {
            status: self.scripted_status(line),
            stdout,
        })
    }
}

/// Recording [`ExternalSteps`] fake.
///
/// Leaves behind the filesystem state the pipeline asserts on: a desktop
/// entry with an `Icon` line, the icon file, and a rendered description
/// script.
pub struct FakeSteps {
    stage_dir: PathBuf,
    bundle_dir: PathBuf,
    workspace_root: PathBuf,
    log: Arc<Mutex<Vec<&'static str>>>,
    desktop_icon_line: bool,
    stubborn_library: bool,
    fail_at: Option<(&'static str, i32)>,
}

impl FakeSteps {
    pub fn new(workspace: &Workspace, recipe: &Recipe) -> Self {
        Self {
            stage_dir: workspace.stage_dir(),
            bundle_dir: workspace.bundle_dir(&recipe.project.name),
            workspace_root: workspace.root().to_path_buf(),
            log: Arc::new(Mutex::new(Vec::new())),
            desktop_icon_line: true,
            stubborn_library: false,
            fail_at: None,
        }
    }

    /// The ordered list of steps the pipeline invoked
    pub fn log(&self) -> Arc<Mutex<Vec<&'static str>>> {
        self.log.clone()
    }

    /// Produce a desktop entry with no Icon reference
    #[must_use]
    pub fn without_desktop_icon_line(mut self) -> Self {
        self.desktop_icon_line = false;
        self
    }

    /// Leave a library behind in the bundle's top-level lib directory
    #[must_use]
    pub fn with_stubborn_library(mut self) -> Self {
        self.stubborn_library = true;
        self
    }

    /// Fail the named step with the given exit status
    #[must_use]
    pub fn failing_at(mut self, step: &'static str, status: i32) -> Self {
        self.fail_at = Some((step, status));
        self
    }

    fn record(&self, step: &'static str) -> Result<(), StepError> {
        self.log.lock().unwrap().push(step);
        if let Some((failing, status)) = self.fail_at {
            if failing == step {
                return Err(StepError::exited(status, format!("{step} exited with {status}")));
            }
        }
        Ok(())
    }
}

impl ExternalSteps for FakeSteps {
    fn install_packages(&self, _packages: &[String]) -> Result<(), StepError> {
        self.record("install_packages")
    }

    fn integrate_desktop(&self, app: &str, desktop: &str) -> Result<(), StepError> {
        self.record("integrate_desktop")?;
        let content = if self.desktop_icon_line {
            format!("[Desktop Entry]\nExec={app}\nIcon=\n")
        } else {
            format!("[Desktop Entry]\nExec={app}\n")
        };
        std::fs::create_dir_all(&self.stage_dir).map_err(|e| StepError::other(e.to_string()))?;
        std::fs::write(self.stage_dir.join(format!("{desktop}.desktop")), content)
            .map_err(|e| StepError::other(e.to_string()))?;
        Ok(())
    }

    fn copy_icon(&self, icon: &str, _icon_path: &Path) -> Result<(), StepError> {
        self.record("copy_icon")?;
        std::fs::write(self.stage_dir.join(icon), b"png")
            .map_err(|e| StepError::other(e.to_string()))?;
        Ok(())
    }

    fn runtime_integration(&self, _app: &str) -> Result<(), StepError> {
        self.record("runtime_integration")
    }

    fn copy_libraries(&self) -> Result<(), StepError> {
        self.record("copy_libraries")?;
        if self.stubborn_library {
            let lib_dir = self.bundle_dir.join("lib");
            std::fs::create_dir_all(&lib_dir).map_err(|e| StepError::other(e.to_string()))?;
            std::fs::write(lib_dir.join("libstubborn.so"), b"so")
                .map_err(|e| StepError::other(e.to_string()))?;
        }
        Ok(())
    }

    fn relocate_libraries(&self) -> Result<(), StepError> {
        // Deliberately does not move the stubborn library.
        self.record("relocate_libraries")
    }

    fn remove_blacklisted(&self) -> Result<(), StepError> {
        self.record("remove_blacklisted")
    }

    fn render_artifact_description(&self, ctx: &ArtifactContext) -> Result<PathBuf, StepError> {
        self.record("render_artifact_description")?;
        let path = self.workspace_root.join("appimage.desc");
        let content = format!(
            "#!/bin/bash\n# pack {} {} {}\n",
            ctx.name, ctx.version, ctx.arch
        );
        std::fs::write(&path, content).map_err(|e| StepError::other(e.to_string()))?;
        Ok(path)
    }
}
