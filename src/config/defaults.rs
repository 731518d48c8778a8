//! Default configuration values

use std::path::Path;

/// Recipe file name looked up in the project directory
pub const RECIPE_FILE: &str = "appforge.toml";

/// Parallelism for every build invocation.
///
/// A pipeline-wide policy, deliberately a constant rather than a value
/// derived from the host's core count.
pub const BUILD_JOBS: usize = 8;

/// Branch assumed when a source declares none
pub const DEFAULT_BRANCH: &str = "master";

/// Maximum number of download retry attempts
pub const MAX_DOWNLOAD_RETRIES: u32 = 3;

/// Marker the first dependency's name must carry: the recipe is required to
/// declare the packaging tool before anything else.
pub const PACKAGING_TOOL_MARKER: &str = "appimage";

/// Components whose `custom` build command runs from the workspace root.
///
/// The module manager installs straight from its own index and has no
/// per-component source directory under `src/`.
pub const WORKSPACE_ROOTED_COMPONENTS: &[&str] = &["cpan"];

/// Project file handed to qmake; the only qmake-built component is the
/// deployment helper and its project file name is fixed upstream.
pub const QMAKE_PROJECT_FILE: &str = "linuxdeployqt.pro";

/// Release tag prefix stripped during version normalization
pub const RELEASE_TAG_PREFIX: &str = "release-";

/// File extension of the generated artifact
pub const ARTIFACT_EXTENSION: &str = "AppImage";

/// Framework member that needs the multimedia backend flags
pub const MULTIMEDIA_FRAMEWORK: &str = "phonon";

/// Host tools the pipeline shells out to
pub const REQUIRED_TOOLS: &[&str] = &["git", "tar", "make", "cmake", "sudo", "bash"];

/// Artifact description template file name, resolved against the helper
/// script directory
pub const ARTIFACT_TEMPLATE: &str = "appimage.desc.in";

/// cmake options applied to every framework build
pub fn framework_options(prefix: &Path) -> String {
    format!(
        "-DCMAKE_INSTALL_PREFIX:PATH={} -DBUILD_TESTING=OFF",
        prefix.display()
    )
}

/// cmake options for the multimedia framework, which additionally needs its
/// Qt5 backend enabled
pub fn multimedia_framework_options(prefix: &Path) -> String {
    format!("{} -DPHONON_BUILD_PHONON4QT5=ON", framework_options(prefix))
}
