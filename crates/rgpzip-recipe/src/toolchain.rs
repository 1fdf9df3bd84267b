//! Per-platform toolchain configuration.
//!
//! [`TargetToolchain::resolve`] turns settings, options and the environment
//! snapshot into one typed record per target OS. Exactly one variant applies
//! to a build. [`TargetToolchain::definitions`] renders that record as CMake
//! definitions.
//!
//! | OS | Toolchain | Tests |
//! |----|-----------|-------|
//! | Android | NDK `android.toolchain.cmake` | disabled |
//! | iOS | bundled `ios.toolchain.cmake` | disabled |
//! | Macos | host toolchain, explicit `CMAKE_OSX_ARCHITECTURES` | default |
//! | Windows | host toolchain, MSVC runtime flags | default |

use crate::definitions::Definitions;
use crate::options::{AndroidStl, Options};
use crate::settings::{Arch, BuildType, Compiler, MsvcRuntime, Os, Settings};
use crate::types::{ANDROID_NDK_PATH_VAR, BuildEnv, RecipeError};

/// iOS toolchain file, relative to the source folder.
pub const IOS_TOOLCHAIN_FILE: &str = "cmake-modules/Toolchains/ios.toolchain.cmake";

/// Minimum iOS version targeted by device and simulator builds.
pub const IOS_DEPLOYMENT_TARGET: &str = "10.0";

/// Architectures packed into the iOS fat library for device builds.
pub const IOS_FAT_ARCHS: [&str; 4] = ["armv7", "armv7s", "arm64", "arm64e"];

/// Android toolchain file, relative to the NDK root.
const ANDROID_TOOLCHAIN_SUFFIX: &str = "build/cmake/android.toolchain.cmake";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AndroidToolchain {
    pub ndk_path: String,
    pub abi: String,
    pub stl: AndroidStl,
    pub api_level: u32,
}

impl AndroidToolchain {
    pub fn toolchain_file(&self) -> String {
        format!(
            "{}/{}",
            self.ndk_path.trim_end_matches('/'),
            ANDROID_TOOLCHAIN_SUFFIX
        )
    }
}

/// `PLATFORM` selector understood by the iOS toolchain file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IosPlatform {
    Simulator,
    Simulator64,
    Os,
}

impl IosPlatform {
    pub fn as_str(&self) -> &'static str {
        match self {
            IosPlatform::Simulator => "SIMULATOR",
            IosPlatform::Simulator64 => "SIMULATOR64",
            IosPlatform::Os => "OS",
        }
    }

    fn for_arch(arch: &Arch) -> Self {
        match arch {
            Arch::X86 => IosPlatform::Simulator,
            Arch::X86_64 => IosPlatform::Simulator64,
            // Anything that is not a simulator arch is a device build, known or not.
            _ => IosPlatform::Os,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IosToolchain {
    pub platform: IosPlatform,
    pub archs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacosToolchain {
    pub osx_architectures: String,
}

/// Per-configuration MSVC runtime flag, e.g. `CMAKE_CXX_FLAGS_DEBUG=/MTd`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuntimeFlag {
    pub build_type: BuildType,
    pub runtime: MsvcRuntime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowsToolchain {
    pub build_type: BuildType,
    /// Set only for Visual Studio Debug and Release builds.
    pub runtime_flag: Option<RuntimeFlag>,
}

/// Toolchain configuration for the target OS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetToolchain {
    Android(AndroidToolchain),
    Ios(IosToolchain),
    Macos(MacosToolchain),
    Windows(WindowsToolchain),
    Other,
}

impl TargetToolchain {
    /// Resolves the toolchain for `settings`.
    ///
    /// # Errors
    ///
    /// * [`RecipeError::MissingEnvironment`] for Android when `ANDROID_NDK_PATH`
    ///   is not in `env`
    /// * [`RecipeError::RuntimeMismatch`] for Visual Studio Debug builds whose
    ///   runtime lacks the `d` marker
    pub fn resolve(
        settings: &Settings,
        options: &Options,
        env: &BuildEnv,
    ) -> Result<Self, RecipeError> {
        let toolchain = match &settings.os {
            Os::Android { api_level } => {
                let ndk_path = env
                    .android_ndk_path
                    .clone()
                    .ok_or(RecipeError::MissingEnvironment(ANDROID_NDK_PATH_VAR))?;
                let stl = options.android().map(|a| a.stl).unwrap_or_default();
                TargetToolchain::Android(AndroidToolchain {
                    ndk_path,
                    abi: settings.arch.android_abi().to_string(),
                    stl,
                    api_level: *api_level,
                })
            }
            Os::Ios => {
                let archs = if settings.arch.is_arm() {
                    IOS_FAT_ARCHS.iter().map(|a| a.to_string()).collect()
                } else {
                    vec![apple_arch_or_literal(&settings.arch)]
                };
                TargetToolchain::Ios(IosToolchain {
                    platform: IosPlatform::for_arch(&settings.arch),
                    archs,
                })
            }
            Os::Macos => TargetToolchain::Macos(MacosToolchain {
                osx_architectures: apple_arch_or_literal(&settings.arch),
            }),
            Os::Windows => TargetToolchain::Windows(resolve_windows(settings)?),
            Os::Other(_) => TargetToolchain::Other,
        };
        Ok(toolchain)
    }

    /// Whether the project's own test suite is built for this target.
    pub fn builds_tests(&self) -> bool {
        !matches!(self, TargetToolchain::Android(_) | TargetToolchain::Ios(_))
    }

    pub fn definitions(&self) -> Definitions {
        let mut defs = Definitions::new();
        match self {
            TargetToolchain::Android(android) => {
                defs.set("CMAKE_SYSTEM_NAME", "Android");
                defs.set("CMAKE_TOOLCHAIN_FILE", android.toolchain_file());
                defs.set("ANDROID_NDK", android.ndk_path.as_str());
                defs.set("ANDROID_ABI", android.abi.as_str());
                defs.set("ANDROID_STL", android.stl.as_str());
                defs.set("ANDROID_NATIVE_API_LEVEL", android.api_level.to_string());
                defs.set("ANDROID_TOOLCHAIN", "clang");
                defs.set("BUILD_TESTS", "OFF");
            }
            TargetToolchain::Ios(ios) => {
                defs.set("CMAKE_TOOLCHAIN_FILE", IOS_TOOLCHAIN_FILE);
                defs.set("DEPLOYMENT_TARGET", IOS_DEPLOYMENT_TARGET);
                defs.set("BUILD_TESTS", "OFF");
                defs.set("PLATFORM", ios.platform.as_str());
                defs.set("ARCHS", ios.archs.join(";"));
            }
            TargetToolchain::Macos(macos) => {
                defs.set("CMAKE_OSX_ARCHITECTURES", macos.osx_architectures.as_str());
            }
            TargetToolchain::Windows(windows) => {
                defs.set("CMAKE_BUILD_TYPE", windows.build_type.as_str());
                if let Some(flag) = windows.runtime_flag {
                    let key = match flag.build_type {
                        BuildType::Debug => "CMAKE_CXX_FLAGS_DEBUG",
                        _ => "CMAKE_CXX_FLAGS_RELEASE",
                    };
                    defs.set(key, format!("/{}", flag.runtime));
                }
            }
            TargetToolchain::Other => {}
        }
        defs
    }
}

fn apple_arch_or_literal(arch: &Arch) -> String {
    arch.apple_arch()
        .map(str::to_string)
        .unwrap_or_else(|| arch.to_string())
}

fn resolve_windows(settings: &Settings) -> Result<WindowsToolchain, RecipeError> {
    let runtime_flag = match &settings.compiler {
        Compiler::VisualStudio { runtime, .. } => {
            if settings.build_type == BuildType::Debug && !runtime.is_debug() {
                return Err(RecipeError::RuntimeMismatch { runtime: *runtime });
            }
            match settings.build_type {
                BuildType::Debug | BuildType::Release => Some(RuntimeFlag {
                    build_type: settings.build_type,
                    runtime: *runtime,
                }),
                _ => None,
            }
        }
        _ => None,
    };
    Ok(WindowsToolchain {
        build_type: settings.build_type,
        runtime_flag,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{OptionValues, config_options};

    fn settings(os: Os, arch: Arch) -> Settings {
        Settings {
            compiler: Compiler::default_for(&os, BuildType::Release),
            os,
            arch,
            build_type: BuildType::Release,
        }
    }

    fn msvc(runtime: MsvcRuntime, build_type: BuildType) -> Settings {
        Settings {
            os: Os::Windows,
            arch: Arch::X86_64,
            compiler: Compiler::VisualStudio {
                version: "16".into(),
                runtime,
            },
            build_type,
        }
    }

    fn resolve(settings: &Settings, env: &BuildEnv) -> Result<Definitions, RecipeError> {
        let options = config_options(settings, &OptionValues::default());
        TargetToolchain::resolve(settings, &options, env).map(|t| t.definitions())
    }

    #[test]
    fn test_android_definitions() {
        let s = settings(Os::Android { api_level: 21 }, Arch::Armv7);
        let options = config_options(
            &s,
            &OptionValues {
                android_stl_type: Some(AndroidStl::CxxStatic),
                ..Default::default()
            },
        );
        let defs = TargetToolchain::resolve(&s, &options, &BuildEnv::with_android_ndk("/opt/ndk"))
            .unwrap()
            .definitions();

        assert_eq!(defs.get("CMAKE_SYSTEM_NAME"), Some("Android"));
        assert_eq!(
            defs.get("CMAKE_TOOLCHAIN_FILE"),
            Some("/opt/ndk/build/cmake/android.toolchain.cmake")
        );
        assert_eq!(defs.get("ANDROID_NDK"), Some("/opt/ndk"));
        assert_eq!(defs.get("ANDROID_ABI"), Some("armeabi-v7a"));
        assert_eq!(defs.get("ANDROID_STL"), Some("c++_static"));
        assert_eq!(defs.get("ANDROID_NATIVE_API_LEVEL"), Some("21"));
        assert_eq!(defs.get("ANDROID_TOOLCHAIN"), Some("clang"));
        assert_eq!(defs.get("BUILD_TESTS"), Some("OFF"));
    }

    #[test]
    fn test_android_requires_ndk_env() {
        let s = settings(Os::Android { api_level: 21 }, Arch::Armv8);
        let err = resolve(&s, &BuildEnv::default()).unwrap_err();
        assert!(matches!(
            err,
            RecipeError::MissingEnvironment(ANDROID_NDK_PATH_VAR)
        ));
    }

    #[test]
    fn test_android_empty_ndk_env_is_missing() {
        let s = settings(Os::Android { api_level: 21 }, Arch::Armv8);
        let err = resolve(&s, &BuildEnv::from_ndk_var(Some(String::new()))).unwrap_err();
        assert!(matches!(err, RecipeError::MissingEnvironment(_)));
    }

    #[test]
    fn test_ios_arm_builds_fat_library() {
        let env = BuildEnv::default();
        for arch in [Arch::Armv7, Arch::Armv7s, Arch::Armv8, Arch::Arm64, Arch::Arm64e] {
            let defs = resolve(&settings(Os::Ios, arch.clone()), &env).unwrap();
            assert_eq!(defs.get("ARCHS"), Some("armv7;armv7s;arm64;arm64e"), "{}", arch);
            assert_eq!(defs.get("PLATFORM"), Some("OS"));
            assert_eq!(defs.get("BUILD_TESTS"), Some("OFF"));
            assert_eq!(defs.get("DEPLOYMENT_TARGET"), Some("10.0"));
            assert_eq!(defs.get("CMAKE_TOOLCHAIN_FILE"), Some(IOS_TOOLCHAIN_FILE));
        }
    }

    #[test]
    fn test_ios_simulators() {
        let env = BuildEnv::default();
        let defs = resolve(&settings(Os::Ios, Arch::X86), &env).unwrap();
        assert_eq!(defs.get("PLATFORM"), Some("SIMULATOR"));
        assert_eq!(defs.get("ARCHS"), Some("i386"));

        let defs = resolve(&settings(Os::Ios, Arch::X86_64), &env).unwrap();
        assert_eq!(defs.get("PLATFORM"), Some("SIMULATOR64"));
        assert_eq!(defs.get("ARCHS"), Some("x86_64"));
    }

    #[test]
    fn test_ios_unknown_arch_falls_into_device_branch() {
        let defs = resolve(&settings(Os::Ios, Arch::Other("mips".into())), &BuildEnv::default())
            .unwrap();
        assert_eq!(defs.get("PLATFORM"), Some("OS"));
        assert_eq!(defs.get("ARCHS"), Some("mips"));
    }

    #[test]
    fn test_macos_architectures() {
        let env = BuildEnv::default();
        let defs = resolve(&settings(Os::Macos, Arch::Armv8), &env).unwrap();
        assert_eq!(defs.get("CMAKE_OSX_ARCHITECTURES"), Some("arm64"));
        assert!(!defs.contains("BUILD_TESTS"));

        let defs = resolve(&settings(Os::Macos, Arch::X86_64), &env).unwrap();
        assert_eq!(defs.get("CMAKE_OSX_ARCHITECTURES"), Some("x86_64"));
    }

    #[test]
    fn test_windows_debug_runtime_flags() {
        let defs = resolve(&msvc(MsvcRuntime::MtD, BuildType::Debug), &BuildEnv::default())
            .unwrap();
        assert_eq!(defs.get("CMAKE_BUILD_TYPE"), Some("Debug"));
        assert_eq!(defs.get("CMAKE_CXX_FLAGS_DEBUG"), Some("/MTd"));
        assert!(!defs.contains("CMAKE_CXX_FLAGS_RELEASE"));
    }

    #[test]
    fn test_windows_release_runtime_flags() {
        let defs = resolve(&msvc(MsvcRuntime::Md, BuildType::Release), &BuildEnv::default())
            .unwrap();
        assert_eq!(defs.get("CMAKE_CXX_FLAGS_RELEASE"), Some("/MD"));
        assert!(!defs.contains("CMAKE_CXX_FLAGS_DEBUG"));
    }

    #[test]
    fn test_windows_debug_with_release_runtime_fails() {
        for runtime in [MsvcRuntime::Mt, MsvcRuntime::Md] {
            let err = resolve(&msvc(runtime, BuildType::Debug), &BuildEnv::default()).unwrap_err();
            assert!(matches!(err, RecipeError::RuntimeMismatch { runtime: r } if r == runtime));
        }
    }

    #[test]
    fn test_windows_non_msvc_has_no_runtime_flags() {
        let s = Settings {
            os: Os::Windows,
            arch: Arch::X86_64,
            compiler: Compiler::Gcc {
                version: "9".into(),
            },
            build_type: BuildType::Debug,
        };
        let defs = resolve(&s, &BuildEnv::default()).unwrap();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs.get("CMAKE_BUILD_TYPE"), Some("Debug"));
    }

    #[test]
    fn test_other_os_has_no_toolchain_definitions() {
        let defs = resolve(&settings(Os::Other("Linux".into()), Arch::X86_64), &BuildEnv::default())
            .unwrap();
        assert!(defs.is_empty());
    }

    #[test]
    fn test_builds_tests() {
        let env = BuildEnv::with_android_ndk("/opt/ndk");
        let opts = Options::default();
        let android = TargetToolchain::resolve(&settings(Os::Android { api_level: 21 }, Arch::X86), &opts, &env)
            .unwrap();
        assert!(!android.builds_tests());
        let ios = TargetToolchain::resolve(&settings(Os::Ios, Arch::X86), &opts, &env).unwrap();
        assert!(!ios.builds_tests());
        let mac = TargetToolchain::resolve(&settings(Os::Macos, Arch::X86_64), &opts, &env).unwrap();
        assert!(mac.builds_tests());
    }
}
