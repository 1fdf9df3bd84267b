//! Build automation.
//!
//! This module drives CMake through the complete package pipeline:
//!
//! 1. **Configure** - `cmake -S <src> -B <build>` with the recipe's definitions
//! 2. **Build** - `cmake --build`
//! 3. **Install** - `cmake --build --target install` into the package folder
//! 4. **Test** - `ctest`, only when the target can run on the host
//! 5. **Package** - manifest and [`CppInfo`](crate::recipe::CppInfo) collection
//!
//! ## Builder Options
//!
//! - **`verbose(bool)`** - Verbose CMake output and command logging
//! - **`dry_run(bool)`** - Record the commands without running them
//! - **`host(HostPlatform)`** - Override host detection for cross-build checks
//! - **`dependency_root(name, path)`** - Install root of a build requirement
//!
//! ## Example
//!
//! ```ignore
//! use rgpzip_recipe::builders::{CMakeBuilder, Layout};
//! use rgpzip_recipe::{BuildEnv, OptionValues, Recipe, Settings};
//!
//! let recipe = Recipe::new(Settings::host_default(), &OptionValues::default());
//! let layout = Layout::new(".", "build", "package");
//!
//! let result = CMakeBuilder::new(layout)
//!     .verbose(true)
//!     .build(&recipe, &BuildEnv::from_process())?;
//! println!("{:?}", result.tests);
//! # Ok::<(), rgpzip_recipe::RecipeError>(())
//! ```

pub mod cmake;
pub mod common;

pub use cmake::{BuildResult, CMakeBuilder, Layout, TestStatus, write_paths_file};
pub use common::{CommandRunner, Invocation, ProcessRunner};
