//! Workspace layout and lifecycle
//!
//! One root directory holds everything a pipeline run touches. The paths are
//! derived, never ambient: every component receives the [`Workspace`] value
//! instead of assuming fixed locations.
//!
//! Layout under the root:
//!
//! ```text
//! src/                    source trees, one directory per component name
//! stage/                  assembly root (desktop entry, AppRun, ...)
//! stage/usr/              shared install prefix, append-only across builds
//! bundle/<name>.AppDir/   bundle populated by the post-build stages
//! out/                    final artifact
//! ```

use std::path::{Path, PathBuf};

use crate::error::FilesystemError;
use crate::infra::filesystem::{clear_dir, dir_is_empty};

/// Root paths for one pipeline run
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

/// Result of cleaning the workspace
#[derive(Debug, Default)]
pub struct CleanResult {
    /// Directories that were cleared
    pub cleared: Vec<String>,
    /// Directories that were already empty
    pub skipped: Vec<String>,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory all source trees are materialized under
    pub fn source_dir(&self) -> PathBuf {
        self.root.join("src")
    }

    /// Assembly root the integration stages populate
    pub fn stage_dir(&self) -> PathBuf {
        self.root.join("stage")
    }

    /// Install prefix shared by every build
    pub fn install_prefix(&self) -> PathBuf {
        self.stage_dir().join("usr")
    }

    /// Bundle directory for the named application
    pub fn bundle_dir(&self, app: &str) -> PathBuf {
        self.root.join("bundle").join(format!("{app}.AppDir"))
    }

    /// Artifact output directory
    pub fn output_dir(&self) -> PathBuf {
        self.root.join("out")
    }

    /// True when the stage and output roots hold nothing from a previous run
    pub fn is_clean(&self) -> bool {
        dir_is_empty(&self.stage_dir()) && dir_is_empty(&self.output_dir())
    }

    /// Empty the stage and output roots.
    ///
    /// This is the only operation that removes another stage's output; it
    /// runs before a pipeline, never during one.
    pub fn clean(&self) -> Result<CleanResult, FilesystemError> {
        let mut result = CleanResult::default();

        for (name, dir) in [("stage", self.stage_dir()), ("out", self.output_dir())] {
            if dir_is_empty(&dir) {
                result.skipped.push(name.to_string());
            } else {
                clear_dir(&dir)?;
                result.cleared.push(name.to_string());
            }
        }

        Ok(result)
    }

    /// Create the directories every stage relies on
    pub fn prepare(&self) -> Result<(), FilesystemError> {
        for dir in [
            self.source_dir(),
            self.install_prefix(),
            self.output_dir(),
        ] {
            std::fs::create_dir_all(&dir).map_err(|e| FilesystemError::CreateDir {
                path: dir.clone(),
                error: e.to_string(),
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_layout_is_derived_from_root() {
        let ws = Workspace::new("/work");
        assert_eq!(ws.source_dir(), PathBuf::from("/work/src"));
        assert_eq!(ws.stage_dir(), PathBuf::from("/work/stage"));
        assert_eq!(ws.install_prefix(), PathBuf::from("/work/stage/usr"));
        assert_eq!(
            ws.bundle_dir("editor"),
            PathBuf::from("/work/bundle/editor.AppDir")
        );
        assert_eq!(ws.output_dir(), PathBuf::from("/work/out"));
    }

    #[test]
    fn test_fresh_workspace_is_clean() {
        let temp = TempDir::new().unwrap();
        let ws = Workspace::new(temp.path());
        assert!(ws.is_clean());
    }

    #[test]
    fn test_clean_clears_stage_and_out() {
        let temp = TempDir::new().unwrap();
        let ws = Workspace::new(temp.path());

        std::fs::create_dir_all(ws.stage_dir().join("usr/bin")).unwrap();
        std::fs::write(ws.stage_dir().join("usr/bin/app"), "x").unwrap();
        std::fs::create_dir_all(ws.output_dir()).unwrap();
        std::fs::write(ws.output_dir().join("old.AppImage"), "x").unwrap();

        assert!(!ws.is_clean());

        let result = ws.clean().unwrap();
        assert_eq!(result.cleared, vec!["stage".to_string(), "out".to_string()]);
        assert!(ws.is_clean());
    }

    #[test]
    fn test_clean_skips_empty_directories() {
        let temp = TempDir::new().unwrap();
        let ws = Workspace::new(temp.path());

        let result = ws.clean().unwrap();
        assert!(result.cleared.is_empty());
        assert_eq!(result.skipped, vec!["stage".to_string(), "out".to_string()]);
    }

    #[test]
    fn test_clean_leaves_source_trees_alone() {
        let temp = TempDir::new().unwrap();
        let ws = Workspace::new(temp.path());

        std::fs::create_dir_all(ws.source_dir().join("zlib")).unwrap();
        std::fs::create_dir_all(ws.stage_dir()).unwrap();
        std::fs::write(ws.stage_dir().join("leftover"), "x").unwrap();

        ws.clean().unwrap();

        assert!(ws.source_dir().join("zlib").exists());
    }

    #[test]
    fn test_prepare_creates_layout() {
        let temp = TempDir::new().unwrap();
        let ws = Workspace::new(temp.path());

        ws.prepare().unwrap();

        assert!(ws.source_dir().is_dir());
        assert!(ws.install_prefix().is_dir());
        assert!(ws.output_dir().is_dir());
    }
}
