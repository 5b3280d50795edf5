//! The product's packageable targets.

/// Identifier of the generated byte-array fragment each target compiles in.
pub const BUNDLE_ID: &str = "VirtualFileSystem";

/// One packageable executable target of the repository.
#[derive(Debug, Clone, Copy)]
pub struct TargetSpec {
    /// Executable and package name.
    pub name: &'static str,
    /// Library directory under `Code/` the target is built from.
    pub dir: &'static str,
    /// Whether the built executable can fetch prebuilt runtime content.
    pub prebuild: bool,
    /// Whether the finished package is staged for embedding in other builds.
    pub copy_to_included_builds: bool,
    /// Repository-relative paths bundled besides resource libraries.
    pub non_resource_dependencies: &'static [&'static str],
    /// Resource libraries under `Resources/`, in load order.
    pub resource_libraries: &'static [&'static str],
    /// Subset that must be readable before the bundled filesystem mounts.
    pub vfs_only: &'static [&'static str],
}

pub const TARGETS: &[TargetSpec] = &[TargetSpec {
    name: "HelioEditor",
    dir: "Editor",
    prebuild: true,
    copy_to_included_builds: true,
    non_resource_dependencies: &["Data", "Templates", ".helio"],
    resource_libraries: &[
        "FragmentCore",
        "Loading",
        "Core",
        "UiWidget",
        "EditorUi",
        "Editor",
        "Fallback",
    ],
    vfs_only: &["Templates"],
}];
