//! Subprocess execution
//!
//! Every external command the pipeline runs goes through [`CommandRunner`],
//! so tests can script exit statuses instead of spawning real processes.
//! Commands are shell lines because recipe build options are opaque strings
//! appended verbatim to the invocations they configure.

use std::path::Path;
use std::process::Command;

use crate::error::ProcessError;

/// Captured result of a command run with collected output
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit status (0 = success)
    pub status: i32,
    /// Collected stdout, trailing whitespace trimmed
    pub stdout: String,
}

/// Seam for running external commands.
///
/// Implementations report the observed exit status as data; `Err` is reserved
/// for commands that never produced a status at all.
pub trait CommandRunner: Send + Sync {
    /// Run a shell line in `cwd`, streaming output through, and return its
    /// exit status.
    fn run(&self, line: &str, cwd: &Path) -> Result<i32, ProcessError>;

    /// Run a shell line in `cwd` and capture its stdout.
    fn capture(&self, line: &str, cwd: &Path) -> Result<CommandOutput, ProcessError>;
}

/// Production runner: `sh -c` with inherited stdio
#[derive(Debug, Default, Clone)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, line: &str, cwd: &Path) -> Result<i32, ProcessError> {
        tracing::debug!(command = line, cwd = %cwd.display(), "running command");
        let status = Command::new("sh")
            .arg("-c")
            .arg(line)
            .current_dir(cwd)
            .status()
            .map_err(|e| ProcessError::Spawn {
                command: line.to_string(),
                error: e.to_string(),
            })?;
        // A signal-terminated child carries no code; report it as failure
        Ok(status.code().unwrap_or(-1))
    }

    fn capture(&self, line: &str, cwd: &Path) -> Result<CommandOutput, ProcessError> {
        tracing::debug!(command = line, cwd = %cwd.display(), "capturing command");
        let output = Command::new("sh")
            .arg("-c")
            .arg(line)
            .current_dir(cwd)
            .output()
            .map_err(|e| ProcessError::Spawn {
                command: line.to_string(),
                error: e.to_string(),
            })?;
        let stdout =
            String::from_utf8(output.stdout).map_err(|_| ProcessError::InvalidOutput {
                command: line.to_string(),
            })?;
        Ok(CommandOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: stdout.trim_end().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_run_reports_exit_status() {
        let temp = TempDir::new().unwrap();
        let runner = SystemRunner::new();

        assert_eq!(runner.run("true", temp.path()).unwrap(), 0);
        assert_eq!(runner.run("exit 3", temp.path()).unwrap(), 3);
    }

    #[test]
    fn test_run_uses_working_directory() {
        let temp = TempDir::new().unwrap();
        let runner = SystemRunner::new();

        let status = runner.run("touch marker.txt", temp.path()).unwrap();
        assert_eq!(status, 0);
        assert!(temp.path().join("marker.txt").exists());
    }

    #[test]
    fn test_capture_collects_stdout() {
        let temp = TempDir::new().unwrap();
        let runner = SystemRunner::new();

        let out = runner.capture("echo captured-line", temp.path()).unwrap();
        assert_eq!(out.status, 0);
        assert_eq!(out.stdout, "captured-line");
    }

    #[test]
    fn test_capture_reports_failure_status() {
        let temp = TempDir::new().unwrap();
        let runner = SystemRunner::new();

        let out = runner.capture("echo partial && exit 2", temp.path()).unwrap();
        assert_eq!(out.status, 2);
        assert_eq!(out.stdout, "partial");
    }
}
