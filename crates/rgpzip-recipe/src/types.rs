//! Core types for rgpzip-recipe.
//!
//! - [`RecipeError`] - Error types for configuration and build operations
//! - [`BuildEnv`] - Snapshot of the process environment the recipe reads
//! - [`Namespace`] - The `user/channel` pair a package is published under

use std::fmt;

use crate::settings::MsvcRuntime;

/// Environment variable holding the Android NDK root.
pub const ANDROID_NDK_PATH_VAR: &str = "ANDROID_NDK_PATH";

/// Error types for rgpzip-recipe operations.
///
/// Configuration errors (`MissingEnvironment`, `RuntimeMismatch`, `Config`)
/// are raised while resolving the toolchain, before any external command
/// is started.
///
/// # Example
///
/// ```ignore
/// use rgpzip_recipe::{Recipe, RecipeError};
///
/// match recipe.definitions(&env) {
///     Ok(defs) => println!("{}", defs),
///     Err(RecipeError::MissingEnvironment(var)) => {
///         eprintln!("export {} before building for Android", var);
///     }
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// ```
#[derive(Debug, thiserror::Error)]
pub enum RecipeError {
    /// A required environment variable is not set.
    ///
    /// Android builds need `ANDROID_NDK_PATH` to locate the NDK toolchain file.
    #[error("configuration error: environment variable {0} is not set. Export it before building for Android")]
    MissingEnvironment(&'static str),

    /// A Visual Studio Debug build was requested with a release runtime.
    ///
    /// Mixing a release CRT with debug code produces binaries with
    /// mismatched runtime linkage, so the build is refused.
    #[error("Compiling for Debug mode but compiler runtime '{runtime}' does not contain 'd' flag")]
    RuntimeMismatch {
        /// The runtime that was requested.
        runtime: MsvcRuntime,
    },

    /// A setting or option value could not be understood.
    #[error("configuration error: {0}")]
    Config(String),

    /// An external build command failed or could not be started.
    ///
    /// The message carries the tool's own output unchanged.
    #[error("build error: {0}")]
    Build(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}. Check file paths and permissions")]
    Io(#[from] std::io::Error),

    /// JSON serialization failed while writing the package manifest.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Values the recipe reads from the process environment.
///
/// Captured once and passed in explicitly so toolchain resolution stays a
/// pure function of its inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildEnv {
    /// Value of `ANDROID_NDK_PATH`, if set and non-empty.
    pub android_ndk_path: Option<String>,
}

impl BuildEnv {
    /// Reads the recipe's variables from the current process environment.
    pub fn from_process() -> Self {
        Self::from_ndk_var(std::env::var(ANDROID_NDK_PATH_VAR).ok())
    }

    /// Builds an environment from a raw `ANDROID_NDK_PATH` value.
    ///
    /// An empty value counts as unset.
    pub fn from_ndk_var(value: Option<String>) -> Self {
        Self {
            android_ndk_path: value.filter(|value| !value.is_empty()),
        }
    }

    /// Builds an environment with the given NDK root.
    pub fn with_android_ndk(path: impl Into<String>) -> Self {
        Self {
            android_ndk_path: Some(path.into()),
        }
    }
}

/// The `user/channel` pair of a package reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    pub user: String,
    pub channel: String,
}

impl Namespace {
    pub fn new(user: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            channel: channel.into(),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.user, self.channel)
    }
}
