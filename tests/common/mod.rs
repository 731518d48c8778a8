//! Common test utilities and helpers
//!
//! Shared utilities for the binary integration tests.

use std::path::PathBuf;
use tempfile::TempDir;

/// Test project context
///
/// Creates a temporary directory for test projects and provides utilities
/// for setting up test scenarios.
pub struct TestProject {
    /// Temporary directory for the test project
    pub dir: TempDir,
}

impl TestProject {
    /// Create a new test project in a temporary directory
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Get the path to the test project directory
    pub fn path(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    /// Create a file in the test project
    pub fn create_file(&self, name: &str, content: &str) {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        std::fs::write(path, content).expect("Failed to write file");
    }

    /// Check if a file exists in the test project
    #[allow(dead_code)]
    pub fn file_exists(&self, name: &str) -> bool {
        self.dir.path().join(name).exists()
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

/// Sample recipe TOML for testing
#[allow(dead_code)]
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

[packages]
system = ["libfoo-dev"]

[bundle]
desktop = "editor"
icon = "editor.png"
"#;
