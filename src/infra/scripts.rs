//! External helper steps
//!
//! The pipeline delegates OS package installation, desktop/icon integration,
//! shared-library handling, and artifact description rendering to external
//! helpers. [`ExternalSteps`] is the seam; [`HelperScripts`] is the
//! production implementation that shells out to a directory of scripts, the
//! way the packaging environment ships them.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::config::defaults;
use crate::core::workspace::Workspace;
use crate::infra::process::CommandRunner;

/// A helper step that did not complete
#[derive(Error, Debug)]
#[error("{message}")]
pub struct StepError {
    /// Exit status of the failing helper, when one was observed
    pub status: Option<i32>,
    pub message: String,
}

impl StepError {
    pub fn exited(status: i32, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }
}

/// Values substituted into the artifact description template
#[derive(Debug, Clone)]
pub struct ArtifactContext {
    pub name: String,
    pub version: String,
    pub arch: String,
    pub bundle_dir: PathBuf,
    pub output_dir: PathBuf,
}

/// External collaborator operations invoked by the pipeline.
///
/// Each operation is an opaque pass/fail step; the pipeline only asserts on
/// the filesystem state the helpers leave behind.
pub trait ExternalSteps: Send + Sync {
    /// Install OS-level packages required before any build
    fn install_packages(&self, packages: &[String]) -> Result<(), StepError>;

    /// Copy the application's desktop entry into the stage root and point its
    /// Exec line at the application
    fn integrate_desktop(&self, app: &str, desktop: &str) -> Result<(), StepError>;

    /// Copy the icon into the stage root and rewrite the desktop entry's Icon
    /// reference
    fn copy_icon(&self, icon: &str, icon_path: &Path) -> Result<(), StepError>;

    /// Build and wire in the runtime wrapper toolkit
    fn runtime_integration(&self, app: &str) -> Result<(), StepError>;

    /// Collect shared libraries into the bundle
    fn copy_libraries(&self) -> Result<(), StepError>;

    /// Move libraries to the location the bundle format expects
    fn relocate_libraries(&self) -> Result<(), StepError>;

    /// Delete libraries the target systems always provide
    fn remove_blacklisted(&self) -> Result<(), StepError>;

    /// Render the artifact description template and return the path of the
    /// executable result
    fn render_artifact_description(&self, ctx: &ArtifactContext) -> Result<PathBuf, StepError>;
}

/// Production implementation backed by a directory of helper scripts
pub struct HelperScripts {
    scripts_dir: PathBuf,
    stage_dir: PathBuf,
    bundle_dir: PathBuf,
    workspace_root: PathBuf,
    runner: Arc<dyn CommandRunner>,
}

impl HelperScripts {
    pub fn new(scripts_dir: PathBuf, workspace: &Workspace, app: &str, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            scripts_dir,
            stage_dir: workspace.stage_dir(),
            bundle_dir: workspace.bundle_dir(app),
            workspace_root: workspace.root().to_path_buf(),
            runner,
        }
    }

    /// Run one of the library helper scripts with the bundle directory as
    /// working directory, which is the convention the scripts assume.
    fn run_script(&self, script: &str, cwd: &Path) -> Result<(), StepError> {
        let path = self.scripts_dir.join(script);
        let line = format!("/bin/bash -xe {}", path.display());
        let status = self
            .runner
            .run(&line, cwd)
            .map_err(|e| StepError::other(e.to_string()))?;
        if status != 0 {
            return Err(StepError::exited(status, format!("{script} exited with {status}")));
        }
        Ok(())
    }
}

impl ExternalSteps for HelperScripts {
    fn install_packages(&self, packages: &[String]) -> Result<(), StepError> {
        let update_status = self
            .runner
            .run("sudo apt-get update", &self.workspace_root)
            .map_err(|e| StepError::other(e.to_string()))?;
        if update_status != 0 {
            tracing::warn!(status = update_status, "package index update failed, installing anyway");
        }

        let line = format!("sudo apt-get -y install git wget {}", packages.join(" "));
        let status = self
            .runner
            .run(line.trim_end(), &self.workspace_root)
            .map_err(|e| StepError::other(e.to_string()))?;
        if status != 0 {
            return Err(StepError::exited(status, format!("package installation exited with {status}")));
        }
        Ok(())
    }

    fn integrate_desktop(&self, app: &str, desktop: &str) -> Result<(), StepError> {
        let line = format!(
            "cp ./usr/share/applications/{desktop}.desktop . \
             && (grep -q Icon {desktop}.desktop || echo 'Icon=' >> {desktop}.desktop) \
             && sed -i -e 's|Exec=.*|Exec={app}|g' {desktop}.desktop"
        );
        let status = self
            .runner
            .run(&line, &self.stage_dir)
            .map_err(|e| StepError::other(e.to_string()))?;
        if status != 0 {
            return Err(StepError::exited(status, format!("desktop integration exited with {status}")));
        }
        Ok(())
    }

    fn copy_icon(&self, icon: &str, icon_path: &Path) -> Result<(), StepError> {
        let line = format!(
            "cp {}/{icon} . && sed -i -e 's|Icon=.*|Icon={icon}|g' *.desktop",
            icon_path.display()
        );
        let status = self
            .runner
            .run(&line, &self.stage_dir)
            .map_err(|e| StepError::other(e.to_string()))?;
        if status != 0 {
            return Err(StepError::exited(status, format!("icon integration exited with {status}")));
        }
        Ok(())
    }

    fn runtime_integration(&self, app: &str) -> Result<(), StepError> {
        let path = self.scripts_dir.join("runtime_integration.sh");
        let line = format!("/bin/bash -xe {} {app}", path.display());
        let status = self
            .runner
            .run(&line, &self.stage_dir)
            .map_err(|e| StepError::other(e.to_string()))?;
        if status != 0 {
            return Err(StepError::exited(status, format!("runtime integration exited with {status}")));
        }
        Ok(())
    }

    fn copy_libraries(&self) -> Result<(), StepError> {
        self.run_script("copy_libs.sh", &self.bundle_dir)
    }

    fn relocate_libraries(&self) -> Result<(), StepError> {
        self.run_script("move_libs.sh", &self.bundle_dir)
    }

    fn remove_blacklisted(&self) -> Result<(), StepError> {
        self.run_script("delete_blacklisted.sh", &self.bundle_dir)
    }

    fn render_artifact_description(&self, ctx: &ArtifactContext) -> Result<PathBuf, StepError> {
        let template_path = self.scripts_dir.join(defaults::ARTIFACT_TEMPLATE);
        let template = std::fs::read_to_string(&template_path).map_err(|e| {
            StepError::other(format!(
                "failed to read template '{}': {e}",
                template_path.display()
            ))
        })?;

        let rendered = render_template(&template, ctx);

        let out_path = self.workspace_root.join("appimage.desc");
        std::fs::write(&out_path, rendered).map_err(|e| {
            StepError::other(format!(
                "failed to write rendered description '{}': {e}",
                out_path.display()
            ))
        })?;
        Ok(out_path)
    }
}

/// Substitute the context values into a description template
fn render_template(template: &str, ctx: &ArtifactContext) -> String {
    template
        .replace("@NAME@", &ctx.name)
        .replace("@VERSION@", &ctx.version)
        .replace("@ARCH@", &ctx.arch)
        .replace("@BUNDLE_DIR@", &ctx.bundle_dir.display().to_string())
        .replace("@OUT_DIR@", &ctx.output_dir.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> ArtifactContext {
        ArtifactContext {
            name: "editor".to_string(),
            version: "5.2.1".to_string(),
            arch: "x86_64".to_string(),
            bundle_dir: PathBuf::from("/work/bundle/editor.AppDir"),
            output_dir: PathBuf::from("/work/out"),
        }
    }

    #[test]
    fn test_render_template_substitutes_all_tokens() {
        let template = "pack @BUNDLE_DIR@ into @OUT_DIR@/@NAME@-@VERSION@-@ARCH@.AppImage";
        let rendered = render_template(template, &context());
        assert_eq!(
            rendered,
            "pack /work/bundle/editor.AppDir into /work/out/editor-5.2.1-x86_64.AppImage"
        );
    }

    #[test]
    fn test_render_template_leaves_plain_text_alone() {
        let template = "#!/bin/bash\nset -e\n";
        assert_eq!(render_template(template, &context()), template);
    }

    #[test]
    fn test_step_error_carries_status() {
        let err = StepError::exited(7, "helper exited with 7");
        assert_eq!(err.status, Some(7));

        let err = StepError::other("spawn failed");
        assert_eq!(err.status, None);
    }
}
