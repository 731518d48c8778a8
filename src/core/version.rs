//! Version derivation
//!
//! The bundle version comes from the main project's source-control metadata:
//! `git describe` output normalized by stripping the release tag prefix and
//! any commit-distance suffix.

use std::path::Path;
use std::sync::OnceLock;
use thiserror::Error;

use regex::Regex;

use crate::config::defaults;
use crate::error::ProcessError;
use crate::infra::process::CommandRunner;

/// Errors raised while deriving the version
#[derive(Error, Debug)]
pub enum VersionError {
    /// git describe exited non-zero
    #[error("'git describe' in '{path}' exited with {status}")]
    DescribeFailed { path: String, status: i32 },

    /// git describe produced no usable output
    #[error("'git describe' in '{path}' produced no output")]
    EmptyDescription { path: String },

    /// Command could not be run at all
    #[error(transparent)]
    Process(#[from] ProcessError),
}

/// Matches the `-<distance>-g<sha>` suffix `git describe` appends when the
/// checkout is past the described tag
fn distance_suffix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"-\d+-g[0-9a-f]+$").unwrap_or_else(|_| unreachable!()))
}

/// Normalize raw `git describe` output into a bundle version.
///
/// `release-5.2.1-3-gabc1234` becomes `5.2.1`.
pub fn normalize_describe(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_prefix = trimmed
        .strip_prefix(defaults::RELEASE_TAG_PREFIX)
        .unwrap_or(trimmed);
    distance_suffix().replace(without_prefix, "").into_owned()
}

/// Read and normalize the version of the source tree at `source_tree`
pub fn derive_version(
    runner: &dyn CommandRunner,
    source_tree: &Path,
) -> Result<String, VersionError> {
    let output = runner.capture("git describe", source_tree)?;
    if output.status != 0 {
        return Err(VersionError::DescribeFailed {
            path: source_tree.display().to_string(),
            status: output.status,
        });
    }

    let version = normalize_describe(&output.stdout);
    if version.is_empty() {
        return Err(VersionError::EmptyDescription {
            path: source_tree.display().to_string(),
        });
    }

    tracing::info!(version = version.as_str(), "derived bundle version");
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FakeRunner;
    use proptest::prelude::*;

    #[test]
    fn test_normalize_strips_prefix_and_distance() {
        assert_eq!(normalize_describe("release-5.2.1-3-gabc1234"), "5.2.1");
    }

    #[test]
    fn test_normalize_exact_tag() {
        assert_eq!(normalize_describe("release-5.2.1"), "5.2.1");
    }

    #[test]
    fn test_normalize_tag_without_prefix() {
        assert_eq!(normalize_describe("1.0.1"), "1.0.1");
        assert_eq!(normalize_describe("v2.4.0"), "v2.4.0");
    }

    #[test]
    fn test_normalize_trims_trailing_newline() {
        assert_eq!(normalize_describe("release-0.9.0\n"), "0.9.0");
    }

    #[test]
    fn test_derive_version_from_describe_output() {
        let runner = FakeRunner::new().with_capture("git describe", "release-5.2.1-3-gabc1234");
        let version = derive_version(&runner, Path::new("/work/src/editor")).unwrap();
        assert_eq!(version, "5.2.1");
    }

    #[test]
    fn test_derive_version_surfaces_describe_failure() {
        let runner = FakeRunner::new().failing_on("git describe", 128);
        let err = derive_version(&runner, Path::new("/work/src/editor")).unwrap_err();
        assert!(matches!(err, VersionError::DescribeFailed { status: 128, .. }));
    }

    #[test]
    fn test_derive_version_rejects_empty_output() {
        let runner = FakeRunner::new().with_capture("git describe", "");
        let err = derive_version(&runner, Path::new("/work/src/editor")).unwrap_err();
        assert!(matches!(err, VersionError::EmptyDescription { .. }));
    }

    proptest! {
        /// Normalizing a `release-<version>-<n>-g<sha>` description always
        /// recovers the bare version.
        #[test]
        fn prop_distance_suffix_always_stripped(
            major in 0u32..100,
            minor in 0u32..100,
            patch in 0u32..100,
            distance in 1u32..1000,
            sha in "[0-9a-f]{7,12}",
        ) {
            let version = format!("{major}.{minor}.{patch}");
            let raw = format!("release-{version}-{distance}-g{sha}");
            prop_assert_eq!(normalize_describe(&raw), version);
        }

        /// Already-normalized versions pass through unchanged.
        #[test]
        fn prop_plain_version_unchanged(
            major in 0u32..100,
            minor in 0u32..100,
            patch in 0u32..100,
        ) {
            let version = format!("{major}.{minor}.{patch}");
            prop_assert_eq!(normalize_describe(&version), version);
        }
    }
}
