//! Upstream hosts

/// Host every framework member is cloned from; the repository name is the
/// framework name itself.
pub const FRAMEWORK_UPSTREAM: &str = "https://anongit.kde.org";

/// Build a framework's clone URL from its name
pub fn framework_url(name: &str) -> String {
    format!("{FRAMEWORK_UPSTREAM}/{name}")
}
