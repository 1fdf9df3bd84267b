//! Build recipe for RGPZip
//!
//! `rgpzip-recipe` turns a target platform description into a CMake build of
//! RGPZip, "a lightweight C++ wrapper for Minizip", and describes the
//! installed package to its consumers. The zip handling itself lives in the
//! C++ sources; this crate only configures, builds and packages them.
//!
//! # Quick Start
//!
//! ```ignore
//! use rgpzip_recipe::builders::{CMakeBuilder, Layout};
//! use rgpzip_recipe::{Arch, BuildEnv, BuildType, Compiler, OptionValues, Os, Recipe, Settings};
//!
//! let settings = Settings {
//!     os: Os::Android { api_level: 21 },
//!     arch: Arch::Armv8,
//!     compiler: Compiler::Clang { version: "8".into() },
//!     build_type: BuildType::Release,
//! };
//! let recipe = Recipe::new(settings, &OptionValues::default());
//!
//! // Definitions only
//! let defs = recipe.definitions(&BuildEnv::from_process())?;
//!
//! // Full configure/build/install/test pipeline
//! let result = CMakeBuilder::new(Layout::new(".", "build", "package"))
//!     .build(&recipe, &BuildEnv::from_process())?;
//! # Ok::<(), rgpzip_recipe::RecipeError>(())
//! ```
//!
//! # Architecture
//!
//! - **Settings / Options**: the target tuple and the user's option choices;
//!   Android-only options exist only for Android targets
//! - **Toolchain**: one typed record per target OS, rendered as CMake definitions
//! - **Recipe**: lifecycle hooks (requirements, option propagation, package id,
//!   package info)
//! - **Builders**: the CMake pipeline
//! - **Export**: staging of the recipe's source files

pub mod builders;
pub mod definitions;
pub mod export;
pub mod options;
pub mod recipe;
pub mod settings;
pub mod toolchain;
pub mod types;

pub use definitions::Definitions;
pub use options::{AndroidOptions, AndroidStl, OptionValues, Options, config_options};
pub use recipe::{CppInfo, PackageId, Recipe, Reference, collect_libs};
pub use settings::{Arch, BuildType, Compiler, HostPlatform, MsvcRuntime, Os, Settings};
pub use toolchain::TargetToolchain;
pub use types::{BuildEnv, Namespace, RecipeError};

/// Library version, also the default package version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
