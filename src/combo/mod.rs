//! Build combos: the layered configuration addressing a build directory.
//!
//! A combo is resolved once per run from three layers, later layers winning:
//! the host template, the requested alias's template, and explicit per-field
//! overrides. Every field is validated against an enumerated legal set; the
//! sets contain neither spaces nor separator characters, so the directory
//! name derived from a combo is collision-free across distinct combos.

pub mod context;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

pub use context::{activate, load_active, BuildContext};

macro_rules! combo_field {
    ($name:ident, $field:literal, $legal:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $($variant,)+
        }

        impl $name {
            pub const LEGAL: &'static str = $legal;

            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = PipelineError;

            fn from_str(value: &str) -> Result<Self> {
                $(
                    if value.eq_ignore_ascii_case($text) {
                        return Ok(Self::$variant);
                    }
                )+
                Err(PipelineError::InvalidComboField {
                    field: $field,
                    value: value.to_string(),
                    expected: Self::LEGAL,
                })
            }
        }
    };
}

combo_field!(Toolchain, "toolchain", "msvc|clang|gcc|emscripten", {
    Msvc => "msvc",
    Clang => "clang",
    Gcc => "gcc",
    Emscripten => "emscripten",
});

combo_field!(Platform, "platform", "windows|linux|macos|browser", {
    Windows => "windows",
    Linux => "linux",
    Macos => "macos",
    Browser => "browser",
});

combo_field!(Architecture, "architecture", "x64|arm64|wasm32", {
    X64 => "x64",
    Arm64 => "arm64",
    Wasm32 => "wasm32",
});

combo_field!(Configuration, "configuration", "Debug|RelWithDebInfo|Release|MinSizeRel", {
    Debug => "Debug",
    RelWithDebInfo => "RelWithDebInfo",
    Release => "Release",
    MinSizeRel => "MinSizeRel",
});

/// Unresolved combo input as supplied on the command line.
#[derive(Debug, Clone, Default)]
pub struct ComboRequest {
    pub alias: Option<String>,
    pub toolchain: Option<String>,
    pub platform: Option<String>,
    pub architecture: Option<String>,
    pub configuration: Option<String>,
    pub vfs: bool,
    pub extra_defines: Vec<(String, String)>,
}

impl ComboRequest {
    pub fn new() -> Self {
        Self {
            vfs: true,
            ..Self::default()
        }
    }

    /// True when no field was supplied, meaning a previously activated
    /// context may be reused instead of re-deriving the combo.
    pub fn is_unspecified(&self) -> bool {
        self.alias.is_none()
            && self.toolchain.is_none()
            && self.platform.is_none()
            && self.architecture.is_none()
            && self.configuration.is_none()
            && self.vfs
            && self.extra_defines.is_empty()
    }
}

/// A fully resolved build configuration, immutable for the rest of the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildCombo {
    pub alias: String,
    pub toolchain: Toolchain,
    pub platform: Platform,
    pub architecture: Architecture,
    pub configuration: Configuration,
    pub vfs: bool,
    pub extra_defines: Vec<(String, String)>,
}

struct AliasTemplate {
    toolchain: Toolchain,
    platform: Platform,
    architecture: Architecture,
    configuration: Configuration,
}

fn host_alias() -> &'static str {
    if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "macos") {
        "macos"
    } else {
        "linux"
    }
}

fn alias_template(alias: &str) -> Result<AliasTemplate> {
    let template = match alias {
        "windows" => AliasTemplate {
            toolchain: Toolchain::Msvc,
            platform: Platform::Windows,
            architecture: Architecture::X64,
            configuration: Configuration::Release,
        },
        "linux" => AliasTemplate {
            toolchain: Toolchain::Clang,
            platform: Platform::Linux,
            architecture: Architecture::X64,
            configuration: Configuration::Release,
        },
        "macos" => AliasTemplate {
            toolchain: Toolchain::Clang,
            platform: Platform::Macos,
            architecture: Architecture::Arm64,
            configuration: Configuration::Release,
        },
        "web" => AliasTemplate {
            toolchain: Toolchain::Emscripten,
            platform: Platform::Browser,
            architecture: Architecture::Wasm32,
            configuration: Configuration::Release,
        },
        // Convenience alias: the host template with the Release build type.
        "release" => {
            let mut host = alias_template(host_alias())?;
            host.configuration = Configuration::Release;
            host
        }
        _ => {
            return Err(PipelineError::UnknownAlias {
                alias: alias.to_string(),
            })
        }
    };
    Ok(template)
}

impl BuildCombo {
    /// Resolve a request against the alias templates. Explicit field
    /// overrides are applied last and win unconditionally.
    pub fn resolve(request: &ComboRequest) -> Result<Self> {
        let alias = request
            .alias
            .clone()
            .unwrap_or_else(|| host_alias().to_string());
        let template = alias_template(&alias)?;

        Ok(Self {
            toolchain: parse_field(&request.toolchain, template.toolchain)?,
            platform: parse_field(&request.platform, template.platform)?,
            architecture: parse_field(&request.architecture, template.architecture)?,
            configuration: parse_field(&request.configuration, template.configuration)?,
            vfs: request.vfs,
            extra_defines: request.extra_defines.clone(),
            alias,
        })
    }

    /// Canonical build directory name: the validated fields joined with `-`.
    pub fn dir_name(&self) -> String {
        format!(
            "{}-{}-{}-{}",
            self.toolchain, self.platform, self.architecture, self.configuration
        )
        .replace(' ', "")
    }
}

fn parse_field<T>(explicit: &Option<String>, fallback: T) -> Result<T>
where
    T: FromStr<Err = PipelineError>,
{
    match explicit {
        Some(value) => value.parse(),
        None => Ok(fallback),
    }
}
