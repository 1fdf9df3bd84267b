//! Package options and OS-dependent option pruning.
//!
//! The option surface is `shared`, `android_ndk` and `android_stl_type`.
//! The last two only exist for Android builds: [`config_options`] drops them
//! for every other OS, so they read as absent rather than defaulted.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::settings::Settings;
use crate::types::RecipeError;

pub const SHARED: &str = "shared";
pub const ANDROID_NDK: &str = "android_ndk";
pub const ANDROID_STL_TYPE: &str = "android_stl_type";

/// C++ runtime variant linked by Android builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AndroidStl {
    #[default]
    #[serde(rename = "c++_static")]
    CxxStatic,
    #[serde(rename = "c++_shared")]
    CxxShared,
}

impl AndroidStl {
    pub fn as_str(&self) -> &'static str {
        match self {
            AndroidStl::CxxStatic => "c++_static",
            AndroidStl::CxxShared => "c++_shared",
        }
    }
}

impl FromStr for AndroidStl {
    type Err = RecipeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "c++_static" => Ok(AndroidStl::CxxStatic),
            "c++_shared" => Ok(AndroidStl::CxxShared),
            _ => Err(RecipeError::Config(format!(
                "unknown android_stl_type '{}'. Expected c++_static or c++_shared",
                s
            ))),
        }
    }
}

impl fmt::Display for AndroidStl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options that only exist when building for Android.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AndroidOptions {
    /// NDK path recorded as an option. Propagated to dependencies; the
    /// toolchain itself is located through `ANDROID_NDK_PATH`.
    pub ndk: Option<String>,
    pub stl: AndroidStl,
}

/// Option values as requested by the user, before pruning.
///
/// Every field is optional; unset fields take the recipe defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptionValues {
    pub shared: Option<bool>,
    pub android_ndk: Option<String>,
    pub android_stl_type: Option<AndroidStl>,
}

/// The option set of one build, after pruning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Options {
    pub shared: bool,
    android: Option<AndroidOptions>,
}

impl Options {
    pub fn new(shared: bool, android: Option<AndroidOptions>) -> Self {
        Self { shared, android }
    }

    /// Android options, present only when the target OS is Android.
    pub fn android(&self) -> Option<&AndroidOptions> {
        self.android.as_ref()
    }

    /// Whether `name` is part of this option set.
    pub fn is_declared(&self, name: &str) -> bool {
        match name {
            SHARED => true,
            ANDROID_NDK | ANDROID_STL_TYPE => self.android.is_some(),
            _ => false,
        }
    }

    /// Looks an option up by name.
    ///
    /// Returns `None` for pruned or unknown options. A declared
    /// `android_ndk` without a value reads as `"None"`.
    pub fn value(&self, name: &str) -> Option<String> {
        match name {
            SHARED => Some(python_bool(self.shared).to_string()),
            ANDROID_NDK => self
                .android
                .as_ref()
                .map(|a| a.ndk.clone().unwrap_or_else(|| "None".to_string())),
            ANDROID_STL_TYPE => self.android.as_ref().map(|a| a.stl.to_string()),
            _ => None,
        }
    }

    /// All declared options as `(name, value)` pairs, sorted by name.
    pub fn values(&self) -> Vec<(&'static str, String)> {
        let mut values: Vec<(&'static str, String)> = [ANDROID_NDK, ANDROID_STL_TYPE, SHARED]
            .into_iter()
            .filter_map(|name| self.value(name).map(|v| (name, v)))
            .collect();
        values.sort();
        values
    }
}

fn python_bool(value: bool) -> &'static str {
    if value { "True" } else { "False" }
}

/// Resolves requested option values against the target settings.
///
/// Android-only options are dropped entirely when the OS is not Android.
pub fn config_options(settings: &Settings, requested: &OptionValues) -> Options {
    let shared = requested.shared.unwrap_or(false);

    if !settings.os.is_android() {
        if requested.android_ndk.is_some() || requested.android_stl_type.is_some() {
            log::debug!(
                "Ignoring Android options for {} build: {} and {} are not declared",
                settings.os,
                ANDROID_NDK,
                ANDROID_STL_TYPE
            );
        }
        return Options::new(shared, None);
    }

    let ndk = requested
        .android_ndk
        .clone()
        .filter(|path| !path.is_empty() && path != "None");
    let android = AndroidOptions {
        ndk,
        stl: requested.android_stl_type.unwrap_or_default(),
    };
    Options::new(shared, Some(android))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{Arch, BuildType, Compiler, Os};

    fn settings_for(os: Os) -> Settings {
        Settings {
            compiler: Compiler::default_for(&os, BuildType::Release),
            os,
            arch: Arch::Armv7,
            build_type: BuildType::Release,
        }
    }

    fn android_request() -> OptionValues {
        OptionValues {
            shared: Some(true),
            android_ndk: Some("/opt/ndk".into()),
            android_stl_type: Some(AndroidStl::CxxShared),
        }
    }

    #[test]
    fn test_android_options_kept_for_android() {
        let options = config_options(&settings_for(Os::Android { api_level: 21 }), &android_request());
        assert!(options.shared);
        let android = options.android().expect("android options");
        assert_eq!(android.ndk.as_deref(), Some("/opt/ndk"));
        assert_eq!(android.stl, AndroidStl::CxxShared);
        assert_eq!(options.value(ANDROID_STL_TYPE).as_deref(), Some("c++_shared"));
    }

    #[test]
    fn test_android_options_absent_for_other_os() {
        for os in [Os::Ios, Os::Macos, Os::Windows, Os::Other("Linux".into())] {
            let options = config_options(&settings_for(os), &android_request());
            assert!(options.android().is_none());
            assert!(!options.is_declared(ANDROID_NDK));
            assert!(!options.is_declared(ANDROID_STL_TYPE));
            assert_eq!(options.value(ANDROID_NDK), None);
            assert_eq!(options.value(ANDROID_STL_TYPE), None);
            assert!(options.is_declared(SHARED));
        }
    }

    #[test]
    fn test_defaults() {
        let options = config_options(
            &settings_for(Os::Android { api_level: 21 }),
            &OptionValues::default(),
        );
        assert!(!options.shared);
        assert_eq!(options.value(SHARED).as_deref(), Some("False"));
        assert_eq!(options.value(ANDROID_NDK).as_deref(), Some("None"));
        assert_eq!(options.value(ANDROID_STL_TYPE).as_deref(), Some("c++_static"));
    }

    #[test]
    fn test_values_sorted() {
        let options = config_options(&settings_for(Os::Android { api_level: 21 }), &android_request());
        let names: Vec<_> = options.values().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec![ANDROID_NDK, ANDROID_STL_TYPE, SHARED]);

        let options = config_options(&settings_for(Os::Ios), &android_request());
        assert_eq!(options.values(), vec![(SHARED, "True".to_string())]);
    }

    #[test]
    fn test_stl_parse() {
        assert_eq!("c++_static".parse::<AndroidStl>().unwrap(), AndroidStl::CxxStatic);
        assert!("gnustl_static".parse::<AndroidStl>().is_err());
    }
}
