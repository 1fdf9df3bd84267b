//! Build settings: the target platform tuple a build is configured for.
//!
//! Settings are supplied from outside (config file, CLI flags or host
//! detection) and are never modified by the recipe.

use std::fmt;
use std::str::FromStr;

use crate::types::RecipeError;

/// Android API level used when none is configured.
pub const DEFAULT_ANDROID_API_LEVEL: u32 = 21;

/// Target operating system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Os {
    /// Android, with the native API level to build against.
    Android { api_level: u32 },
    Ios,
    Macos,
    Windows,
    /// Any other system (Linux, FreeBSD, ...), kept by name.
    Other(String),
}

impl Os {
    /// Returns the canonical setting name (`"Android"`, `"iOS"`, ...).
    pub fn name(&self) -> &str {
        match self {
            Os::Android { .. } => "Android",
            Os::Ios => "iOS",
            Os::Macos => "Macos",
            Os::Windows => "Windows",
            Os::Other(name) => name,
        }
    }

    pub fn is_android(&self) -> bool {
        matches!(self, Os::Android { .. })
    }

    /// Parses an OS name, attaching `api_level` when it names Android.
    ///
    /// Matching is case-insensitive; unknown names become [`Os::Other`].
    pub fn parse(name: &str, api_level: Option<u32>) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "android" => Os::Android {
                api_level: api_level.unwrap_or(DEFAULT_ANDROID_API_LEVEL),
            },
            "ios" => Os::Ios,
            "macos" | "darwin" | "osx" => Os::Macos,
            "windows" => Os::Windows,
            "linux" => Os::Other("Linux".to_string()),
            _ => Os::Other(name.to_string()),
        }
    }

    /// Detects the OS of the machine running the build.
    pub fn host() -> Self {
        Self::parse(std::env::consts::OS, None)
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Target CPU architecture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arch {
    X86,
    X86_64,
    Armv7,
    Armv7hf,
    Armv7s,
    Armv7k,
    Armv8,
    Armv8_32,
    Armv8_3,
    Arm64,
    Arm64e,
    Other(String),
}

impl Arch {
    pub fn as_str(&self) -> &str {
        match self {
            Arch::X86 => "x86",
            Arch::X86_64 => "x86_64",
            Arch::Armv7 => "armv7",
            Arch::Armv7hf => "armv7hf",
            Arch::Armv7s => "armv7s",
            Arch::Armv7k => "armv7k",
            Arch::Armv8 => "armv8",
            Arch::Armv8_32 => "armv8_32",
            Arch::Armv8_3 => "armv8.3",
            Arch::Arm64 => "arm64",
            Arch::Arm64e => "arm64e",
            Arch::Other(name) => name,
        }
    }

    /// True when the architecture name contains `arm`.
    pub fn is_arm(&self) -> bool {
        self.as_str().contains("arm")
    }

    /// Android ABI name for this architecture.
    ///
    /// Architectures without a known ABI are passed through unchanged.
    pub fn android_abi(&self) -> &str {
        match self.as_str() {
            "armv5el" | "armv5hf" | "armv5" => "armeabi",
            "armv6" => "armeabi-v6",
            "armv7" | "armv7hf" => "armeabi-v7a",
            "armv8" | "arm64" => "arm64-v8a",
            other => other,
        }
    }

    /// Apple (`lipo`/Xcode) name for this architecture, if it has one.
    pub fn apple_arch(&self) -> Option<&'static str> {
        match self.as_str() {
            "x86" => Some("i386"),
            "x86_64" => Some("x86_64"),
            "armv7" => Some("armv7"),
            "armv7s" => Some("armv7s"),
            "armv7k" => Some("armv7k"),
            "armv8" | "arm64" => Some("arm64"),
            "armv8_32" => Some("arm64_32"),
            "armv8.3" | "arm64e" => Some("arm64e"),
            _ => None,
        }
    }

    /// Detects the architecture of the machine running the build.
    pub fn host() -> Self {
        match std::env::consts::ARCH {
            "x86" => Arch::X86,
            "x86_64" => Arch::X86_64,
            "aarch64" => Arch::Armv8,
            "arm" => Arch::Armv7,
            other => Arch::Other(other.to_string()),
        }
    }
}

impl FromStr for Arch {
    type Err = RecipeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let arch = match s {
            "x86" | "i386" | "i686" => Arch::X86,
            "x86_64" | "amd64" => Arch::X86_64,
            "armv7" => Arch::Armv7,
            "armv7hf" => Arch::Armv7hf,
            "armv7s" => Arch::Armv7s,
            "armv7k" => Arch::Armv7k,
            "armv8" | "aarch64" => Arch::Armv8,
            "armv8_32" => Arch::Armv8_32,
            "armv8.3" => Arch::Armv8_3,
            "arm64" => Arch::Arm64,
            "arm64e" => Arch::Arm64e,
            "" => return Err(RecipeError::Config("arch must not be empty".to_string())),
            other => Arch::Other(other.to_string()),
        };
        Ok(arch)
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// CMake build type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildType {
    Debug,
    Release,
    RelWithDebInfo,
    MinSizeRel,
}

impl BuildType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildType::Debug => "Debug",
            BuildType::Release => "Release",
            BuildType::RelWithDebInfo => "RelWithDebInfo",
            BuildType::MinSizeRel => "MinSizeRel",
        }
    }
}

impl FromStr for BuildType {
    type Err = RecipeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(BuildType::Debug),
            "release" => Ok(BuildType::Release),
            "relwithdebinfo" => Ok(BuildType::RelWithDebInfo),
            "minsizerel" => Ok(BuildType::MinSizeRel),
            _ => Err(RecipeError::Config(format!(
                "unknown build type '{}'. Expected Debug, Release, RelWithDebInfo or MinSizeRel",
                s
            ))),
        }
    }
}

impl fmt::Display for BuildType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Visual Studio C runtime flavour (`/MD`, `/MT`, `/MDd`, `/MTd`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsvcRuntime {
    Md,
    Mt,
    MdD,
    MtD,
}

impl MsvcRuntime {
    pub fn as_str(&self) -> &'static str {
        match self {
            MsvcRuntime::Md => "MD",
            MsvcRuntime::Mt => "MT",
            MsvcRuntime::MdD => "MDd",
            MsvcRuntime::MtD => "MTd",
        }
    }

    /// True when the runtime name carries the lowercase `d` debug marker.
    pub fn is_debug(&self) -> bool {
        self.as_str().contains('d')
    }

    /// The runtime a Visual Studio build uses when none is configured.
    pub fn default_for(build_type: BuildType) -> Self {
        match build_type {
            BuildType::Debug => MsvcRuntime::MdD,
            _ => MsvcRuntime::Md,
        }
    }
}

impl FromStr for MsvcRuntime {
    type Err = RecipeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim_start_matches('/') {
            "MD" => Ok(MsvcRuntime::Md),
            "MT" => Ok(MsvcRuntime::Mt),
            "MDd" => Ok(MsvcRuntime::MdD),
            "MTd" => Ok(MsvcRuntime::MtD),
            _ => Err(RecipeError::Config(format!(
                "unknown compiler runtime '{}'. Expected MD, MT, MDd or MTd",
                s
            ))),
        }
    }
}

impl fmt::Display for MsvcRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compiler identity, with the Visual Studio runtime where it applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compiler {
    VisualStudio { version: String, runtime: MsvcRuntime },
    Gcc { version: String },
    Clang { version: String },
    AppleClang { version: String },
}

impl Compiler {
    /// Builds a compiler from its setting name, version and optional runtime.
    ///
    /// A Visual Studio compiler without a runtime gets
    /// [`MsvcRuntime::default_for`] the build type.
    pub fn from_parts(
        name: &str,
        version: impl Into<String>,
        runtime: Option<MsvcRuntime>,
        build_type: BuildType,
    ) -> Result<Self, RecipeError> {
        let version = version.into();
        let compiler = match name.to_ascii_lowercase().as_str() {
            "visual studio" | "visual-studio" | "msvc" | "vs" => Compiler::VisualStudio {
                version,
                runtime: runtime.unwrap_or_else(|| MsvcRuntime::default_for(build_type)),
            },
            "gcc" => Compiler::Gcc { version },
            "clang" => Compiler::Clang { version },
            "apple-clang" | "appleclang" => Compiler::AppleClang { version },
            _ => {
                return Err(RecipeError::Config(format!(
                    "unknown compiler '{}'. Expected Visual Studio, gcc, clang or apple-clang",
                    name
                )));
            }
        };
        Ok(compiler)
    }

    /// Returns the setting name (`"Visual Studio"`, `"gcc"`, ...).
    pub fn name(&self) -> &'static str {
        match self {
            Compiler::VisualStudio { .. } => "Visual Studio",
            Compiler::Gcc { .. } => "gcc",
            Compiler::Clang { .. } => "clang",
            Compiler::AppleClang { .. } => "apple-clang",
        }
    }

    pub fn version(&self) -> &str {
        match self {
            Compiler::VisualStudio { version, .. }
            | Compiler::Gcc { version }
            | Compiler::Clang { version }
            | Compiler::AppleClang { version } => version,
        }
    }

    /// The MSVC runtime, present only for Visual Studio.
    pub fn runtime(&self) -> Option<MsvcRuntime> {
        match self {
            Compiler::VisualStudio { runtime, .. } => Some(*runtime),
            _ => None,
        }
    }

    /// The compiler a host uses when none is configured.
    pub fn default_for(os: &Os, build_type: BuildType) -> Self {
        match os {
            Os::Windows => Compiler::VisualStudio {
                version: "16".to_string(),
                runtime: MsvcRuntime::default_for(build_type),
            },
            Os::Macos | Os::Ios => Compiler::AppleClang {
                version: "11.0".to_string(),
            },
            Os::Android { .. } => Compiler::Clang {
                version: "8".to_string(),
            },
            Os::Other(_) => Compiler::Gcc {
                version: "9".to_string(),
            },
        }
    }
}

/// The immutable settings tuple a build is configured for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub os: Os,
    pub arch: Arch,
    pub compiler: Compiler,
    pub build_type: BuildType,
}

impl Settings {
    /// Settings describing a native Release build on the current machine.
    pub fn host_default() -> Self {
        let os = Os::host();
        let compiler = Compiler::default_for(&os, BuildType::Release);
        Self {
            os,
            arch: Arch::host(),
            compiler,
            build_type: BuildType::Release,
        }
    }

    /// Flattened `key=value` view of the settings, sorted by key.
    ///
    /// Sub-settings use dotted keys (`compiler.runtime`, `os.api_level`).
    pub fn values(&self) -> Vec<(String, String)> {
        let mut values = vec![
            ("arch".to_string(), self.arch.to_string()),
            ("build_type".to_string(), self.build_type.to_string()),
            ("compiler".to_string(), self.compiler.name().to_string()),
            ("compiler.version".to_string(), self.compiler.version().to_string()),
            ("os".to_string(), self.os.name().to_string()),
        ];
        if let Some(runtime) = self.compiler.runtime() {
            values.push(("compiler.runtime".to_string(), runtime.to_string()));
        }
        if let Os::Android { api_level } = self.os {
            values.push(("os.api_level".to_string(), api_level.to_string()));
        }
        values.sort();
        values
    }
}

/// The machine running the build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPlatform {
    pub os: Os,
    pub arch: Arch,
}

impl HostPlatform {
    pub fn detect() -> Self {
        Self {
            os: Os::host(),
            arch: Arch::host(),
        }
    }

    /// True when binaries built for `settings` cannot run on this host.
    ///
    /// OS is compared by name, ignoring case, so the Android API level does
    /// not matter.
    pub fn is_cross_building(&self, settings: &Settings) -> bool {
        !self.os.name().eq_ignore_ascii_case(settings.os.name())
            || !self.arch.as_str().eq_ignore_ascii_case(settings.arch.as_str())
    }
}
