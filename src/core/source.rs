//! Source resolution
//!
//! Makes a component's source tree available under the workspace source
//! directory, exactly once. The presence of `src/<name>` is the completion
//! marker: a directory that exists is never touched again, whatever its
//! contents.

use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use crate::config::defaults;
use crate::core::recipe::SourceSpec;
use crate::error::{DownloadError, ProcessError};
use crate::infra::download::DownloadManager;
use crate::infra::process::CommandRunner;

/// Errors that can occur during source resolution
#[derive(Error, Debug)]
pub enum ResolveError {
    /// Source variant not in the supported set
    #[error("Component '{component}' declares unsupported source type '{kind}'")]
    UnsupportedSourceKind { component: String, kind: String },

    /// A fetch or extract command exited non-zero
    #[error("'{command}' for component '{component}' exited with {status}")]
    CommandFailed {
        component: String,
        command: String,
        status: i32,
    },

    /// Archive download failed
    #[error("Download for component '{component}' failed: {source}")]
    Download {
        component: String,
        #[source]
        source: DownloadError,
    },

    /// Command could not be run at all
    #[error(transparent)]
    Process(#[from] ProcessError),
}

impl ResolveError {
    /// Exit status carried by the failure, when one was observed
    pub fn status(&self) -> Option<i32> {
        match self {
            Self::CommandFailed { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// The closed set of supported source variants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Clone a git repository
    Git,
    /// Download and extract an xz-compressed tarball
    TarXz,
    /// Download and extract a bzip2-compressed tarball
    TarBz2,
    /// Nothing to fetch, by declaration
    None,
}

impl SourceKind {
    /// Map a recipe variant name to a kind; `None` for unsupported values
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "git" => Some(Self::Git),
            "tar.xz" | "xz" => Some(Self::TarXz),
            "tar.bz2" | "bz2" => Some(Self::TarBz2),
            "none" => Some(Self::None),
            _ => None,
        }
    }

    /// Archive file suffix for tarball kinds
    fn archive_suffix(self) -> Option<&'static str> {
        match self {
            Self::TarXz => Some("tar.xz"),
            Self::TarBz2 => Some("tar.bz2"),
            Self::Git | Self::None => None,
        }
    }

    /// tar invocation for tarball kinds
    fn tar_flags(self) -> Option<&'static str> {
        match self {
            Self::TarXz => Some("-xJf"),
            Self::TarBz2 => Some("-xjf"),
            Self::Git | Self::None => None,
        }
    }
}

/// How a resolve call completed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Source tree was fetched during this call
    Fetched,
    /// Source tree already existed; nothing was done
    AlreadyPresent,
    /// The component declares no source to fetch
    NothingToFetch,
}

/// Obtains component source trees into the workspace source directory
pub struct SourceResolver {
    source_dir: PathBuf,
    runner: Arc<dyn CommandRunner>,
    downloads: DownloadManager,
}

impl SourceResolver {
    pub fn new(source_dir: PathBuf, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            source_dir,
            runner,
            downloads: DownloadManager::new(),
        }
    }

    /// Resolve one component's source tree.
    ///
    /// Idempotent on the directory level: if `src/<name>` exists the call
    /// succeeds immediately without network or subprocess activity.
    pub async fn resolve(&self, name: &str, spec: &SourceSpec) -> Result<Resolution, ResolveError> {
        let kind = SourceKind::parse(&spec.kind).ok_or_else(|| {
            ResolveError::UnsupportedSourceKind {
                component: name.to_string(),
                kind: spec.kind.clone(),
            }
        })?;

        if kind == SourceKind::None {
            tracing::info!(component = name, "no sources configured");
            return Ok(Resolution::NothingToFetch);
        }

        if self.source_dir.join(name).exists() {
            tracing::info!(component = name, "source tree already present");
            return Ok(Resolution::AlreadyPresent);
        }

        match kind {
            SourceKind::Git => self.resolve_git(name, spec).await,
            SourceKind::TarXz | SourceKind::TarBz2 => self.resolve_archive(name, spec, kind).await,
            SourceKind::None => unreachable!("handled above"),
        }
    }

    async fn resolve_git(&self, name: &str, spec: &SourceSpec) -> Result<Resolution, ResolveError> {
        let clone = format!("git clone {} {name}", spec.url);
        self.run_checked(name, &clone, &self.source_dir)?;

        if let Some(branch) = spec.branch.as_deref() {
            if branch != defaults::DEFAULT_BRANCH {
                let checkout = format!("git checkout {branch}");
                self.run_checked(name, &checkout, &self.source_dir.join(name))?;
            }
        }

        Ok(Resolution::Fetched)
    }

    async fn resolve_archive(
        &self,
        name: &str,
        spec: &SourceSpec,
        kind: SourceKind,
    ) -> Result<Resolution, ResolveError> {
        let suffix = kind.archive_suffix().unwrap_or("tar");
        let archive = self.source_dir.join(format!("{name}.{suffix}"));

        let download = match spec.sha256.as_deref() {
            Some(checksum) => {
                self.downloads
                    .download_verified(&spec.url, &archive, checksum, None)
                    .await
            }
            None => self.downloads.download(&spec.url, &archive, None).await,
        };
        download.map_err(|e| ResolveError::Download {
            component: name.to_string(),
            source: e,
        })?;

        let flags = kind.tar_flags().unwrap_or("-xf");
        let extract = format!("tar {flags} {}", archive.display());
        self.run_checked(name, &extract, &self.source_dir)?;

        Ok(Resolution::Fetched)
    }

    fn run_checked(
        &self,
        name: &str,
        line: &str,
        cwd: &std::path::Path,
    ) -> Result<(), ResolveError> {
        let status = self.runner.run(line, cwd)?;
        if status != 0 {
            return Err(ResolveError::CommandFailed {
                component: name.to_string(),
                command: line.to_string(),
                status,
            });
        }
        Ok(())
    }
}
