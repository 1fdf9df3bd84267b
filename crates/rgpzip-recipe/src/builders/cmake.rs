//! CMake build automation
//!
//! [`CMakeBuilder`] configures, builds, installs and (when the target can run
//! on the host) tests the package, then records what was installed.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use super::common::{CommandRunner, Invocation, ProcessRunner};
use crate::definitions::Definitions;
use crate::recipe::{AUTHOR, CppInfo, DESCRIPTION, LICENSE, Recipe, Reference, URL};
use crate::settings::HostPlatform;
use crate::types::{BuildEnv, RecipeError};

/// Dependency paths file written into the build folder.
pub const PATHS_FILE: &str = "dependency_paths.cmake";

/// Package manifest written into the package folder after install.
pub const MANIFEST_FILE: &str = "rgpzipinfo.json";

/// Source, build and package folders of one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub source_dir: PathBuf,
    pub build_dir: PathBuf,
    pub package_dir: PathBuf,
}

impl Layout {
    pub fn new(
        source_dir: impl Into<PathBuf>,
        build_dir: impl Into<PathBuf>,
        package_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source_dir: source_dir.into(),
            build_dir: build_dir.into(),
            package_dir: package_dir.into(),
        }
    }
}

/// What happened to the test suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestStatus {
    Passed,
    /// The target cannot execute on the host; not a failure.
    SkippedCrossBuilding,
    /// The toolchain turns the test suite off (`BUILD_TESTS=OFF`).
    NotBuilt,
    /// Dry run: the test command was recorded but not executed.
    DryRun,
}

/// Result of a successful build.
#[derive(Debug, Clone)]
pub struct BuildResult {
    pub reference: Reference,
    /// Hash of the normalised package id.
    pub package_id: String,
    pub definitions: Definitions,
    /// Every command of the pipeline, in order.
    pub invocations: Vec<Invocation>,
    pub tests: TestStatus,
    /// Installed package description, absent for dry runs.
    pub cpp_info: Option<CppInfo>,
    pub manifest_path: Option<PathBuf>,
}

/// CMake builder that handles the complete build pipeline
#[derive(Debug)]
pub struct CMakeBuilder<R = ProcessRunner> {
    layout: Layout,
    runner: R,
    verbose: bool,
    dry_run: bool,
    host: HostPlatform,
    generator: Option<String>,
    jobs: usize,
    dependency_roots: BTreeMap<String, PathBuf>,
}

impl CMakeBuilder<ProcessRunner> {
    /// Creates a builder that runs commands as child processes.
    pub fn new(layout: Layout) -> Self {
        Self::with_runner(layout, ProcessRunner::default())
    }
}

impl<R: CommandRunner> CMakeBuilder<R> {
    /// Creates a builder that executes commands through `runner`.
    pub fn with_runner(layout: Layout, runner: R) -> Self {
        Self {
            layout,
            runner,
            verbose: false,
            dry_run: false,
            host: HostPlatform::detect(),
            generator: None,
            jobs: num_cpus::get(),
            dependency_roots: BTreeMap::new(),
        }
    }

    /// Enables verbose CMake output
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Records commands without executing them or touching the filesystem
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Overrides the detected host platform
    pub fn host(mut self, host: HostPlatform) -> Self {
        self.host = host;
        self
    }

    /// Selects a CMake generator (`-G`)
    pub fn generator(mut self, generator: Option<String>) -> Self {
        self.generator = generator;
        self
    }

    /// Sets the number of parallel build jobs
    pub fn jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Registers the install root of a build requirement
    pub fn dependency_root(mut self, name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        self.dependency_roots.insert(name.into(), root.into());
        self
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Builds and packages `recipe`.
    ///
    /// This performs the following steps:
    /// 1. Resolve the target toolchain (configuration errors stop here)
    /// 2. Configure with CMake
    /// 3. Build
    /// 4. Install into the package folder
    /// 5. Run the tests unless cross-building
    /// 6. Collect the installed libraries and write the package manifest
    pub fn build(&self, recipe: &Recipe, env: &BuildEnv) -> Result<BuildResult, RecipeError> {
        let settings = recipe.settings();
        log::info!(
            "Configuring {} for {} {} ({})",
            recipe.reference(),
            settings.os,
            settings.arch,
            settings.build_type
        );

        let toolchain = recipe.toolchain(env)?;
        let mut definitions = recipe.definitions_for(&toolchain);

        let package_dir = std::path::absolute(&self.layout.package_dir)?;
        definitions.set("CMAKE_INSTALL_PREFIX", cmake_path(&package_dir));
        // package_info scans lib/ and include/ only.
        definitions.set("CMAKE_INSTALL_LIBDIR", "lib");
        definitions.set("CMAKE_INSTALL_BINDIR", "bin");
        definitions.set("CMAKE_INSTALL_INCLUDEDIR", "include");
        if self.verbose {
            definitions.set("CMAKE_VERBOSE_MAKEFILE", "ON");
        }

        if !self.dry_run {
            fs::create_dir_all(&self.layout.build_dir)?;
        }
        if !self.dependency_roots.is_empty() {
            let paths_file = std::path::absolute(self.layout.build_dir.join(PATHS_FILE))?;
            if !self.dry_run {
                write_paths_file(&paths_file, &self.dependency_roots)?;
            }
            definitions.set("CMAKE_PROJECT_INCLUDE", cmake_path(&paths_file));
        }

        let build_type = settings.build_type.as_str();
        let build_dir = self.layout.build_dir.display().to_string();
        let mut invocations = Vec::new();

        let mut configure = Invocation::new("cmake", "CMake configure")
            .arg("-S")
            .arg(self.layout.source_dir.display().to_string())
            .arg("-B")
            .arg(build_dir.as_str());
        if let Some(generator) = &self.generator {
            configure = configure.arg("-G").arg(generator.as_str());
        }
        configure = configure.args(definitions.to_args());
        self.execute(configure, &mut invocations)?;

        log::info!("Building {}...", recipe.reference());
        let mut build = Invocation::new("cmake", "CMake build")
            .args(["--build", build_dir.as_str(), "--config", build_type])
            .arg("--parallel")
            .arg(self.jobs.to_string());
        if self.verbose {
            build = build.arg("--verbose");
        }
        self.execute(build, &mut invocations)?;

        log::info!("Installing into {}...", package_dir.display());
        let install = Invocation::new("cmake", "CMake install").args([
            "--build",
            build_dir.as_str(),
            "--config",
            build_type,
            "--target",
            "install",
        ]);
        self.execute(install, &mut invocations)?;

        let tests = if self.host.is_cross_building(settings) {
            log::warn!(
                "Skipping tests: cross-building for {}/{} on {}/{}",
                settings.os,
                settings.arch,
                self.host.os,
                self.host.arch
            );
            TestStatus::SkippedCrossBuilding
        } else if !toolchain.builds_tests() {
            log::info!("Skipping tests: test suite is not built for {}", settings.os);
            TestStatus::NotBuilt
        } else {
            log::info!("Running tests...");
            let test = Invocation::new("ctest", "CTest").args([
                "--test-dir",
                build_dir.as_str(),
                "-C",
                build_type,
                "--output-on-failure",
            ]);
            self.execute(test, &mut invocations)?;
            if self.dry_run {
                TestStatus::DryRun
            } else {
                TestStatus::Passed
            }
        };

        let package_id = recipe.package_id();
        let (cpp_info, manifest_path) = if self.dry_run {
            (None, None)
        } else {
            let cpp_info = recipe.package_info(&package_dir)?;
            let manifest_path = package_dir.join(MANIFEST_FILE);
            write_manifest(&manifest_path, recipe, &cpp_info)?;
            log::info!("Packaged libraries: {:?}", cpp_info.libs);
            (Some(cpp_info), Some(manifest_path))
        };

        Ok(BuildResult {
            reference: recipe.reference(),
            package_id: package_id.hash(),
            definitions,
            invocations,
            tests,
            cpp_info,
            manifest_path,
        })
    }

    fn execute(
        &self,
        invocation: Invocation,
        invocations: &mut Vec<Invocation>,
    ) -> Result<(), RecipeError> {
        if self.dry_run {
            log::info!("[dry-run] {}", invocation);
        } else {
            self.runner.run(&invocation)?;
        }
        invocations.push(invocation);
        Ok(())
    }
}

/// Writes a CMake script exposing the install roots of the build requirements.
///
/// Each root is prepended to `CMAKE_PREFIX_PATH` and `CMAKE_MODULE_PATH` and
/// exported as `<NAME>_ROOT`.
pub fn write_paths_file(path: &Path, roots: &BTreeMap<String, PathBuf>) -> Result<(), RecipeError> {
    let mut script = String::from("# Install roots of the rgpzip build requirements.\n");
    let quoted: Vec<String> = roots
        .values()
        .map(|root| format!("\"{}\"", cmake_path(root)))
        .collect();
    for (name, root) in roots {
        script.push_str(&format!(
            "set({}_ROOT \"{}\")\n",
            name.to_ascii_uppercase().replace('-', "_"),
            cmake_path(root)
        ));
    }
    script.push_str(&format!(
        "set(CMAKE_PREFIX_PATH {} ${{CMAKE_PREFIX_PATH}})\n",
        quoted.join(" ")
    ));
    script.push_str(&format!(
        "set(CMAKE_MODULE_PATH {} ${{CMAKE_MODULE_PATH}})\n",
        quoted.join(" ")
    ));

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, script)?;
    log::debug!("Wrote dependency paths to {}", path.display());
    Ok(())
}

#[derive(Serialize)]
struct PackageManifest<'a> {
    reference: String,
    description: &'static str,
    author: &'static str,
    url: &'static str,
    license: &'static str,
    package_id: String,
    settings: BTreeMap<String, String>,
    options: BTreeMap<String, String>,
    cpp_info: &'a CppInfo,
    built_at: String,
}

fn write_manifest(path: &Path, recipe: &Recipe, cpp_info: &CppInfo) -> Result<(), RecipeError> {
    let package_id = recipe.package_id();
    let built_at = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(|e| RecipeError::Build(format!("Failed to format build timestamp: {}", e)))?;
    let manifest = PackageManifest {
        reference: recipe.reference().to_string(),
        description: DESCRIPTION,
        author: AUTHOR,
        url: URL,
        license: LICENSE,
        package_id: package_id.hash(),
        settings: package_id.settings,
        options: package_id.options,
        cpp_info,
        built_at,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(&manifest)?)?;
    Ok(())
}

/// CMake accepts forward slashes on every platform.
fn cmake_path(path: &Path) -> String {
    path.display().to_string().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{AndroidStl, OptionValues};
    use crate::settings::{Arch, BuildType, Compiler, MsvcRuntime, Os, Settings};
    use std::cell::RefCell;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingRunner {
        calls: RefCell<Vec<Invocation>>,
        fail_on: Option<&'static str>,
    }

    impl CommandRunner for RecordingRunner {
        fn run(&self, invocation: &Invocation) -> Result<(), RecipeError> {
            self.calls.borrow_mut().push(invocation.clone());
            if self.fail_on == Some(invocation.description.as_str()) {
                return Err(RecipeError::Build(format!("{} failed", invocation.description)));
            }
            Ok(())
        }
    }

    fn linux_host() -> HostPlatform {
        HostPlatform {
            os: Os::Other("Linux".into()),
            arch: Arch::X86_64,
        }
    }

    fn layout(dir: &TempDir) -> Layout {
        Layout::new(
            dir.path().join("src"),
            dir.path().join("build"),
            dir.path().join("package"),
        )
    }

    fn native_recipe() -> Recipe {
        let settings = Settings {
            os: Os::Other("Linux".into()),
            arch: Arch::X86_64,
            compiler: Compiler::Gcc {
                version: "9".into(),
            },
            build_type: BuildType::Release,
        };
        Recipe::new(settings, &OptionValues::default())
    }

    fn android_recipe() -> Recipe {
        let settings = Settings {
            os: Os::Android { api_level: 21 },
            arch: Arch::Armv7,
            compiler: Compiler::Clang {
                version: "8".into(),
            },
            build_type: BuildType::Release,
        };
        Recipe::new(
            settings,
            &OptionValues {
                android_stl_type: Some(AndroidStl::CxxStatic),
                ..Default::default()
            },
        )
    }

    fn descriptions(runner: &RecordingRunner) -> Vec<String> {
        runner
            .calls
            .borrow()
            .iter()
            .map(|i| i.description.clone())
            .collect()
    }

    #[test]
    fn test_native_build_runs_tests_and_packages() {
        let dir = TempDir::new().unwrap();
        let lib_dir = dir.path().join("package/lib");
        fs::create_dir_all(&lib_dir).unwrap();
        fs::write(lib_dir.join("librgpzip.a"), b"").unwrap();

        let builder = CMakeBuilder::with_runner(layout(&dir), RecordingRunner::default())
            .host(linux_host())
            .jobs(4);
        let result = builder.build(&native_recipe(), &BuildEnv::default()).unwrap();

        assert_eq!(
            descriptions(builder.runner()),
            vec!["CMake configure", "CMake build", "CMake install", "CTest"]
        );
        assert_eq!(result.tests, TestStatus::Passed);
        assert_eq!(result.cpp_info.as_ref().unwrap().libs, vec!["rgpzip"]);

        let manifest_path = result.manifest_path.unwrap();
        let manifest: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(manifest_path).unwrap()).unwrap();
        assert_eq!(manifest["package_id"], result.package_id);
        assert_eq!(manifest["settings"]["os"], "Linux");
        assert_eq!(manifest["cpp_info"]["include_dirs"][0], "include");
        assert_eq!(manifest["license"], "MIT");
        assert_eq!(manifest["url"], "https://github.com/RGPaul/RGPZip");

        let calls = builder.runner().calls.borrow();
        assert!(calls[1].args.windows(2).any(|w| w[0] == "--parallel" && w[1] == "4"));
    }

    #[test]
    fn test_cross_build_skips_tests() {
        let dir = TempDir::new().unwrap();
        let builder = CMakeBuilder::with_runner(layout(&dir), RecordingRunner::default())
            .host(linux_host());
        let result = builder
            .build(&android_recipe(), &BuildEnv::with_android_ndk("/opt/ndk"))
            .unwrap();

        assert_eq!(result.tests, TestStatus::SkippedCrossBuilding);
        assert_eq!(
            descriptions(builder.runner()),
            vec!["CMake configure", "CMake build", "CMake install"]
        );
        assert_eq!(result.definitions.get("ANDROID_ABI"), Some("armeabi-v7a"));
        assert_eq!(result.definitions.get("BUILD_TESTS"), Some("OFF"));

        let calls = builder.runner().calls.borrow();
        assert!(calls[0].args.contains(&"-DANDROID_STL=c++_static".to_string()));
    }

    #[test]
    fn test_android_on_android_host_does_not_run_tests() {
        let dir = TempDir::new().unwrap();
        let host = HostPlatform {
            os: Os::Android { api_level: 28 },
            arch: Arch::Armv7,
        };
        let builder =
            CMakeBuilder::with_runner(layout(&dir), RecordingRunner::default()).host(host);
        let result = builder
            .build(&android_recipe(), &BuildEnv::with_android_ndk("/opt/ndk"))
            .unwrap();

        assert_eq!(result.tests, TestStatus::NotBuilt);
        assert_eq!(
            descriptions(builder.runner()),
            vec!["CMake configure", "CMake build", "CMake install"]
        );
    }

    #[test]
    fn test_missing_ndk_fails_before_any_command() {
        let dir = TempDir::new().unwrap();
        let builder = CMakeBuilder::with_runner(layout(&dir), RecordingRunner::default())
            .host(linux_host());
        let err = builder.build(&android_recipe(), &BuildEnv::default()).unwrap_err();

        assert!(matches!(err, RecipeError::MissingEnvironment(_)));
        assert!(builder.runner().calls.borrow().is_empty());
        assert!(!dir.path().join("build").exists());
    }

    #[test]
    fn test_runtime_mismatch_fails_before_any_command() {
        let dir = TempDir::new().unwrap();
        let settings = Settings {
            os: Os::Windows,
            arch: Arch::X86_64,
            compiler: Compiler::VisualStudio {
                version: "16".into(),
                runtime: MsvcRuntime::Mt,
            },
            build_type: BuildType::Debug,
        };
        let recipe = Recipe::new(settings, &OptionValues::default());
        let builder = CMakeBuilder::with_runner(layout(&dir), RecordingRunner::default())
            .host(linux_host());
        let err = builder.build(&recipe, &BuildEnv::default()).unwrap_err();

        assert!(matches!(err, RecipeError::RuntimeMismatch { .. }));
        assert!(builder.runner().calls.borrow().is_empty());
    }

    #[test]
    fn test_dry_run_records_without_running() {
        let dir = TempDir::new().unwrap();
        let builder = CMakeBuilder::with_runner(layout(&dir), RecordingRunner::default())
            .host(linux_host())
            .dependency_root("zlib", "/deps/zlib")
            .dry_run(true);
        let result = builder.build(&native_recipe(), &BuildEnv::default()).unwrap();

        assert!(builder.runner().calls.borrow().is_empty());
        assert_eq!(result.invocations.len(), 4);
        assert_eq!(result.tests, TestStatus::DryRun);
        assert!(result.cpp_info.is_none());
        assert!(result.definitions.contains("CMAKE_PROJECT_INCLUDE"));
        assert!(!dir.path().join("build").exists());
    }

    #[test]
    fn test_failed_build_stops_pipeline() {
        let dir = TempDir::new().unwrap();
        let runner = RecordingRunner {
            fail_on: Some("CMake build"),
            ..Default::default()
        };
        let builder = CMakeBuilder::with_runner(layout(&dir), runner).host(linux_host());
        let err = builder.build(&native_recipe(), &BuildEnv::default()).unwrap_err();

        assert!(matches!(err, RecipeError::Build(_)));
        assert_eq!(
            descriptions(builder.runner()),
            vec!["CMake configure", "CMake build"]
        );
    }

    #[test]
    fn test_builder_definitions_and_generator() {
        let dir = TempDir::new().unwrap();
        let builder = CMakeBuilder::with_runner(layout(&dir), RecordingRunner::default())
            .host(linux_host())
            .generator(Some("Ninja".into()))
            .verbose(true);
        let result = builder.build(&native_recipe(), &BuildEnv::default()).unwrap();

        assert_eq!(result.definitions.get("CMAKE_VERBOSE_MAKEFILE"), Some("ON"));
        assert_eq!(result.definitions.get("CMAKE_INSTALL_LIBDIR"), Some("lib"));
        assert_eq!(result.definitions.get("CMAKE_INSTALL_BINDIR"), Some("bin"));
        assert_eq!(result.definitions.get("CMAKE_INSTALL_INCLUDEDIR"), Some("include"));
        let prefix = result.definitions.get("CMAKE_INSTALL_PREFIX").unwrap();
        assert!(prefix.ends_with("package"));

        let calls = builder.runner().calls.borrow();
        assert!(calls[0].args.windows(2).any(|w| w[0] == "-G" && w[1] == "Ninja"));
        assert_eq!(calls[1].args.last().map(String::as_str), Some("--verbose"));
    }

    #[test]
    fn test_write_paths_file() {
        let dir = TempDir::new().unwrap();
        let mut roots = BTreeMap::new();
        roots.insert("boost".to_string(), PathBuf::from("/deps/boost"));
        roots.insert("zlib".to_string(), PathBuf::from("/deps/zlib"));
        let path = dir.path().join("build").join(PATHS_FILE);

        write_paths_file(&path, &roots).unwrap();
        let script = fs::read_to_string(path).unwrap();
        assert!(script.contains("set(BOOST_ROOT \"/deps/boost\")"));
        assert!(script.contains("set(ZLIB_ROOT \"/deps/zlib\")"));
        assert!(script.contains(
            "set(CMAKE_PREFIX_PATH \"/deps/boost\" \"/deps/zlib\" ${CMAKE_PREFIX_PATH})"
        ));
    }
}
