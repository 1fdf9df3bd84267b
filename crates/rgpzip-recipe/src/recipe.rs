//! The rgpzip recipe: package metadata and lifecycle hooks.
//!
//! A [`Recipe`] binds one set of [`Settings`] to its pruned [`Options`] and
//! answers the questions a package manager asks of a build:
//!
//! - which CMake definitions to pass ([`Recipe::definitions`])
//! - which build requirements to fetch ([`Recipe::build_requirements`])
//! - which options to push down to them ([`Recipe::configure`])
//! - which cache bucket the binary belongs to ([`Recipe::package_id`])
//! - what the installed package exposes ([`Recipe::package_info`])

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use crate::definitions::Definitions;
use crate::options::{AndroidOptions, OptionValues, Options, config_options};
use crate::settings::{Os, Settings};
use crate::toolchain::TargetToolchain;
use crate::types::{BuildEnv, Namespace, RecipeError};

pub const NAME: &str = "rgpzip";
pub const AUTHOR: &str = "Ralph-Gordon Paul (gordon@rgpaul.com)";
pub const DESCRIPTION: &str = "A lightweight C++ Wrapper for Minizip.";
pub const URL: &str = "https://github.com/RGPaul/RGPZip";
pub const LICENSE: &str = "MIT";

/// Source patterns shipped with the recipe, relative to the source root.
pub const EXPORT_SOURCES: &[&str] = &[
    "CMakeLists.txt",
    "src/*",
    "include/*",
    "deps/zlib/*",
    "cmake-modules/*",
    "test/*",
];

/// Identity bucket shared by all iOS ARM builds (they produce one fat binary).
pub const ANY_ARM: &str = "AnyARM";

/// Build requirements as `(name, pinned version)`.
pub const BUILD_REQUIREMENTS: [(&str, &str); 2] = [("boost", "1.70.0"), ("zlib", "1.2.11")];

/// A package reference, `name/version[@user/channel]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub name: String,
    pub version: String,
    pub user: Option<String>,
    pub channel: Option<String>,
}

impl Reference {
    pub fn new(name: &str, version: &str, namespace: Option<&Namespace>) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            user: namespace.map(|ns| ns.user.clone()),
            channel: namespace.map(|ns| ns.channel.clone()),
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.version)?;
        if let (Some(user), Some(channel)) = (&self.user, &self.channel) {
            write!(f, "@{}/{}", user, channel)?;
        }
        Ok(())
    }
}

/// Normalised build identity used for binary caching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageId {
    pub settings: BTreeMap<String, String>,
    pub options: BTreeMap<String, String>,
}

impl PackageId {
    /// Renders the identity as an INI-style info text, keys sorted.
    pub fn info_text(&self) -> String {
        let mut text = String::from("[settings]\n");
        for (key, value) in &self.settings {
            text.push_str(&format!("    {}={}\n", key, value));
        }
        text.push_str("[options]\n");
        for (key, value) in &self.options {
            text.push_str(&format!("    {}={}\n", key, value));
        }
        text
    }

    /// SHA-1 of [`PackageId::info_text`], hex encoded.
    pub fn hash(&self) -> String {
        hex::encode(Sha1::digest(self.info_text().as_bytes()))
    }
}

/// What an installed package exposes to consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CppInfo {
    pub libs: Vec<String>,
    pub include_dirs: Vec<String>,
    pub lib_dirs: Vec<String>,
}

/// The recipe for one build configuration.
#[derive(Debug, Clone)]
pub struct Recipe {
    settings: Settings,
    options: Options,
    version: String,
    namespace: Option<Namespace>,
}

impl Recipe {
    /// Creates a recipe, pruning `requested` options for the target OS.
    pub fn new(settings: Settings, requested: &OptionValues) -> Self {
        let options = config_options(&settings, requested);
        Self {
            settings,
            options,
            version: crate::VERSION.to_string(),
            namespace: None,
        }
    }

    /// Sets the package version recorded in the reference.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Sets the `user/channel` the package and its requirements live under.
    pub fn namespace(mut self, namespace: Option<Namespace>) -> Self {
        self.namespace = namespace;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn reference(&self) -> Reference {
        Reference::new(NAME, &self.version, self.namespace.as_ref())
    }

    /// Resolves the target toolchain.
    pub fn toolchain(&self, env: &BuildEnv) -> Result<TargetToolchain, RecipeError> {
        TargetToolchain::resolve(&self.settings, &self.options, env)
    }

    /// Full CMake definitions for this configuration.
    ///
    /// Common entries (`CMAKE_BUILD_TYPE`, `BUILD_SHARED_LIBS`) come first,
    /// followed by the per-OS toolchain entries.
    pub fn definitions(&self, env: &BuildEnv) -> Result<Definitions, RecipeError> {
        let toolchain = self.toolchain(env)?;
        Ok(self.definitions_for(&toolchain))
    }

    pub(crate) fn definitions_for(&self, toolchain: &TargetToolchain) -> Definitions {
        let mut defs = Definitions::new();
        defs.set("CMAKE_BUILD_TYPE", self.settings.build_type.as_str());
        defs.set(
            "BUILD_SHARED_LIBS",
            if self.options.shared { "ON" } else { "OFF" },
        );
        defs.extend(toolchain.definitions());
        defs
    }

    /// Build-time requirements, pinned and in this package's namespace.
    pub fn build_requirements(&self) -> Vec<Reference> {
        BUILD_REQUIREMENTS
            .iter()
            .map(|(name, version)| Reference::new(name, version, self.namespace.as_ref()))
            .collect()
    }

    /// Options pushed down to the build requirements.
    ///
    /// For Android every requirement receives this package's NDK path and
    /// STL type so all three link against the same C++ runtime. Empty for
    /// other targets.
    pub fn configure(&self) -> BTreeMap<String, AndroidOptions> {
        let Some(android) = self.options.android() else {
            return BTreeMap::new();
        };
        BUILD_REQUIREMENTS
            .iter()
            .map(|(name, _)| (name.to_string(), android.clone()))
            .collect()
    }

    /// Normalised identity of the binary this configuration produces.
    ///
    /// iOS ARM builds are all recorded as [`ANY_ARM`].
    pub fn package_id(&self) -> PackageId {
        let mut settings: BTreeMap<String, String> = self.settings.values().into_iter().collect();
        if self.settings.arch.is_arm() && self.settings.os == Os::Ios {
            settings.insert("arch".to_string(), ANY_ARM.to_string());
        }
        let options = self
            .options
            .values()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        PackageId { settings, options }
    }

    /// Describes an installed package rooted at `package_dir`.
    pub fn package_info(&self, package_dir: &Path) -> Result<CppInfo, RecipeError> {
        let lib_dirs = vec!["lib".to_string()];
        let libs = collect_libs(package_dir, &lib_dirs)?;
        Ok(CppInfo {
            libs,
            include_dirs: vec!["include".to_string()],
            lib_dirs,
        })
    }
}

/// Lists library names found in `lib_dirs` under `package_dir`.
///
/// Recognises `.so`, `.lib`, `.a`, `.dylib` and `.bc` files. The `lib` prefix
/// is stripped except for `.lib` files. Missing directories are skipped.
/// The result is deduplicated and sorted.
pub fn collect_libs(package_dir: &Path, lib_dirs: &[String]) -> Result<Vec<String>, RecipeError> {
    let mut libs = Vec::new();
    for dir in lib_dirs {
        let lib_dir = package_dir.join(dir);
        if !lib_dir.is_dir() {
            log::warn!("Library directory {} does not exist", lib_dir.display());
            continue;
        }
        for entry in std::fs::read_dir(&lib_dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let (Some(stem), Some(ext)) = (
                path.file_stem().and_then(|s| s.to_str()),
                path.extension().and_then(|s| s.to_str()),
            ) else {
                continue;
            };
            if !matches!(ext, "so" | "lib" | "a" | "dylib" | "bc") {
                continue;
            }
            let name = match stem.strip_prefix("lib") {
                Some(stripped) if ext != "lib" => stripped,
                _ => stem,
            };
            if !libs.iter().any(|l| l == name) {
                libs.push(name.to_string());
            }
        }
    }
    libs.sort();
    Ok(libs)
}
