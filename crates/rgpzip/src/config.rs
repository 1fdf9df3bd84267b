//! Configuration file support for rgpzip.
//!
//! An `rgpzip.toml` file holds a build profile (settings, options, folders
//! and dependency roots) so they don't have to be passed as flags on every
//! invocation.
//!
//! ## Configuration File Location
//!
//! The configuration file is searched for in the following order:
//! 1. Current working directory (`./rgpzip.toml`)
//! 2. Parent directories (up to the repository root or filesystem root)
//!
//! ## Example Configuration
//!
//! ```toml
//! [package]
//! version = "1.0.0"
//! user = "rgpaul"
//! channel = "stable"
//!
//! [settings]
//! os = "Android"
//! os_api_level = 21
//! arch = "armv8"
//! compiler = "clang"
//! compiler_version = "8"
//! build_type = "Release"
//!
//! [options]
//! shared = false
//! android_stl_type = "c++_static"
//!
//! [dependencies]
//! boost = "/opt/deps/boost"
//! zlib = "/opt/deps/zlib"
//! ```

use anyhow::{Context, Result, bail};
use clap::Args;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rgpzip_recipe::builders::Layout;
use rgpzip_recipe::{
    AndroidStl, Arch, BuildType, Compiler, MsvcRuntime, Namespace, OptionValues, Os, Settings,
};

/// The default configuration file name.
pub const CONFIG_FILE_NAME: &str = "rgpzip.toml";

/// Root configuration structure for `rgpzip.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RecipeConfig {
    /// Package identity.
    pub package: PackageConfig,

    /// Target settings. Unset values are detected from the host.
    pub settings: SettingsConfig,

    /// Option values before pruning.
    pub options: OptionValues,

    /// Source, build and package folders.
    pub layout: LayoutConfig,

    /// Install roots of the build requirements, keyed by name.
    pub dependencies: BTreeMap<String, PathBuf>,
}

/// Package identity configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageConfig {
    /// Package version. Defaults to the tool version.
    pub version: Option<String>,

    /// User part of the reference namespace.
    pub user: Option<String>,

    /// Channel part of the reference namespace.
    pub channel: Option<String>,
}

/// Target settings as written in the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    pub os: Option<String>,
    pub os_api_level: Option<u32>,
    pub arch: Option<String>,
    pub compiler: Option<String>,
    pub compiler_version: Option<String>,
    /// Visual Studio runtime (`MD`, `MT`, `MDd`, `MTd`).
    pub compiler_runtime: Option<String>,
    pub build_type: Option<String>,
}

/// Folder layout configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Folder containing the top-level `CMakeLists.txt`. Defaults to `.`.
    pub source_dir: PathBuf,

    /// CMake build folder. Defaults to `build`.
    pub build_dir: PathBuf,

    /// Install prefix of the package. Defaults to `package`.
    pub package_dir: PathBuf,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("."),
            build_dir: PathBuf::from("build"),
            package_dir: PathBuf::from("package"),
        }
    }
}

/// Setting flags, shared by all subcommands.
#[derive(Args, Debug, Clone, Default)]
pub struct SettingsArgs {
    /// Target OS (Android, iOS, Macos, Windows, Linux, ...)
    #[arg(long, global = true)]
    pub os: Option<String>,

    /// Android native API level
    #[arg(long, global = true)]
    pub api_level: Option<u32>,

    /// Target architecture (x86, x86_64, armv7, armv7s, armv8, arm64, arm64e, ...)
    #[arg(long, global = true)]
    pub arch: Option<String>,

    /// Compiler (Visual Studio, gcc, clang, apple-clang)
    #[arg(long, global = true)]
    pub compiler: Option<String>,

    #[arg(long, global = true)]
    pub compiler_version: Option<String>,

    /// Visual Studio runtime (MD, MT, MDd, MTd)
    #[arg(long, global = true)]
    pub runtime: Option<String>,

    /// Debug, Release, RelWithDebInfo or MinSizeRel
    #[arg(long, global = true)]
    pub build_type: Option<String>,
}

/// Option flags, shared by all subcommands.
#[derive(Args, Debug, Clone, Default)]
pub struct OptionArgs {
    /// Build shared libraries (`--shared` or `--shared=false`)
    #[arg(
        long,
        global = true,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    pub shared: Option<bool>,

    /// Android NDK path recorded as a package option (Android only)
    #[arg(long, global = true)]
    pub android_ndk: Option<String>,

    /// Android C++ runtime: c++_static or c++_shared (Android only)
    #[arg(long, global = true)]
    pub android_stl: Option<String>,
}

impl RecipeConfig {
    /// Loads configuration from the specified file path.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: RecipeConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        Ok(config)
    }

    /// Attempts to find and load configuration starting from the current directory.
    pub fn discover() -> Result<Option<(Self, PathBuf)>> {
        let cwd = std::env::current_dir().context("Failed to get current directory")?;
        Self::discover_from(&cwd)
    }

    /// Attempts to find and load configuration starting from the specified directory.
    ///
    /// # Returns
    ///
    /// * `Ok(Some((config, path)))` - Found and loaded configuration with its path
    /// * `Ok(None)` - No configuration file found
    /// * `Err` - If a config file was found but couldn't be parsed
    pub fn discover_from(start_dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(CONFIG_FILE_NAME);

            if config_path.is_file() {
                let config = Self::load_from_file(&config_path)?;
                return Ok(Some((config, config_path)));
            }

            // Stop at repository root or filesystem root
            if current.join(".git").exists() || !current.pop() {
                break;
            }
        }

        Ok(None)
    }

    /// Generates a starter configuration file as a formatted TOML string.
    ///
    /// This includes comments explaining each configuration option.
    pub fn generate_starter_toml(os: &str) -> String {
        format!(
            r#"# rgpzip configuration file
# Build profile for configuring, building and packaging RGPZip.
# CLI flags override these settings when provided.

[package]
# Package version (default: the rgpzip tool version)
# version = "1.0.0"

# Namespace of this package and its build requirements (boost, zlib)
# user = "rgpaul"
# channel = "stable"

[settings]
# Target OS: Android, iOS, Macos, Windows or any other name (default: host OS)
os = "{os}"

# Android native API level (Android only, default: 21)
# os_api_level = 21

# Target architecture (default: host architecture)
# arch = "armv8"

# Compiler: Visual Studio, gcc, clang or apple-clang (default depends on the host)
# compiler = "clang"
# compiler_version = "8"

# Visual Studio runtime: MD, MT, MDd or MTd. Debug builds need a 'd' runtime.
# compiler_runtime = "MDd"

# Debug, Release, RelWithDebInfo or MinSizeRel (default: Release)
build_type = "Release"

[options]
# Build shared libraries instead of static ones
shared = false

# Android only: NDK path propagated to dependencies, and the C++ runtime.
# The toolchain itself is located through the ANDROID_NDK_PATH environment variable.
# android_ndk = "/opt/android-ndk"
# android_stl_type = "c++_static"

[layout]
source_dir = "."
build_dir = "build"
package_dir = "package"

[dependencies]
# Install roots of the build requirements
# boost = "/opt/deps/boost"
# zlib = "/opt/deps/zlib"
"#,
            os = os,
        )
    }
}

/// Configuration resolver that merges config file values with CLI arguments.
///
/// CLI arguments take precedence over config file values, which take
/// precedence over host-detected defaults.
#[derive(Debug, Default)]
pub struct ConfigResolver {
    /// Loaded configuration, if any.
    pub config: Option<RecipeConfig>,

    /// Path to the loaded config file, if any.
    pub config_path: Option<PathBuf>,
}

impl ConfigResolver {
    /// Loads `path` when given, otherwise discovers a config file.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            let config = RecipeConfig::load_from_file(path)?;
            return Ok(Self {
                config: Some(config),
                config_path: Some(path.to_path_buf()),
            });
        }
        match RecipeConfig::discover()? {
            Some((config, path)) => Ok(Self {
                config: Some(config),
                config_path: Some(path),
            }),
            None => Ok(Self::default()),
        }
    }

    fn file_settings(&self) -> SettingsConfig {
        self.config
            .as_ref()
            .map(|c| c.settings.clone())
            .unwrap_or_default()
    }

    /// Resolves the target settings.
    pub fn settings(&self, args: &SettingsArgs) -> Result<Settings> {
        let file = self.file_settings();

        let build_type = match args.build_type.clone().or(file.build_type) {
            Some(value) => value.parse::<BuildType>()?,
            None => BuildType::Release,
        };

        let api_level = args.api_level.or(file.os_api_level);
        let os = match args.os.clone().or(file.os) {
            Some(name) => Os::parse(&name, api_level),
            None => Os::host(),
        };

        let arch = match args.arch.clone().or(file.arch) {
            Some(value) => value.parse::<Arch>()?,
            None => Arch::host(),
        };

        let runtime = args
            .runtime
            .clone()
            .or(file.compiler_runtime)
            .map(|value| value.parse::<MsvcRuntime>())
            .transpose()?;
        let compiler_name = args
            .compiler
            .clone()
            .or(file.compiler)
            .unwrap_or_else(|| Compiler::default_for(&os, build_type).name().to_string());
        let version = args
            .compiler_version
            .clone()
            .or(file.compiler_version)
            .unwrap_or_else(|| default_compiler_version(&compiler_name).to_string());
        let compiler = Compiler::from_parts(&compiler_name, version, runtime, build_type)?;
        if runtime.is_none() && compiler.runtime().is_some() {
            log::debug!(
                "No compiler runtime configured, using {}",
                compiler.runtime().map(|r| r.as_str()).unwrap_or_default()
            );
        }

        Ok(Settings {
            os,
            arch,
            compiler,
            build_type,
        })
    }

    /// Resolves the requested option values.
    pub fn options(&self, args: &OptionArgs) -> Result<OptionValues> {
        let file = self
            .config
            .as_ref()
            .map(|c| c.options.clone())
            .unwrap_or_default();
        let android_stl_type = match &args.android_stl {
            Some(value) => Some(value.parse::<AndroidStl>()?),
            None => file.android_stl_type,
        };
        Ok(OptionValues {
            shared: args.shared.or(file.shared),
            android_ndk: args.android_ndk.clone().or(file.android_ndk),
            android_stl_type,
        })
    }

    /// Resolves the package namespace; both user and channel are required.
    pub fn namespace(&self, user: Option<String>, channel: Option<String>) -> Option<Namespace> {
        let package = self
            .config
            .as_ref()
            .map(|c| c.package.clone())
            .unwrap_or_default();
        match (user.or(package.user), channel.or(package.channel)) {
            (Some(user), Some(channel)) => Some(Namespace::new(user, channel)),
            (None, None) => None,
            _ => {
                log::warn!("Both user and channel are needed for a namespace; ignoring the one given");
                None
            }
        }
    }

    /// Returns the package version from config, if any.
    pub fn version(&self) -> Option<String> {
        self.config.as_ref().and_then(|c| c.package.version.clone())
    }

    /// Resolves the folder layout.
    pub fn layout(
        &self,
        source_dir: Option<PathBuf>,
        build_dir: Option<PathBuf>,
        package_dir: Option<PathBuf>,
    ) -> Layout {
        let file = self
            .config
            .as_ref()
            .map(|c| c.layout.clone())
            .unwrap_or_default();
        Layout::new(
            source_dir.unwrap_or(file.source_dir),
            build_dir.unwrap_or(file.build_dir),
            package_dir.unwrap_or(file.package_dir),
        )
    }

    /// Merges dependency roots from config with `NAME=PATH` CLI entries.
    pub fn dependency_roots(&self, cli: &[String]) -> Result<BTreeMap<String, PathBuf>> {
        let mut roots = self
            .config
            .as_ref()
            .map(|c| c.dependencies.clone())
            .unwrap_or_default();
        for entry in cli {
            let Some((name, path)) = entry.split_once('=') else {
                bail!("Invalid --dep value '{}'. Expected NAME=PATH", entry);
            };
            if name.is_empty() || path.is_empty() {
                bail!("Invalid --dep value '{}'. Expected NAME=PATH", entry);
            }
            roots.insert(name.to_string(), PathBuf::from(path));
        }
        Ok(roots)
    }
}

fn default_compiler_version(compiler: &str) -> &'static str {
    match compiler.to_ascii_lowercase().as_str() {
        "visual studio" | "visual-studio" | "msvc" | "vs" => "16",
        "apple-clang" | "appleclang" => "11.0",
        "clang" => "8",
        _ => "9",
    }
}
