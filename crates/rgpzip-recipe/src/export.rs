//! Staging of the recipe's source files.
//!
//! Copies everything matched by [`EXPORT_SOURCES`] from a source tree into a
//! staging folder so a build can run from a self-contained copy.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::recipe::EXPORT_SOURCES;
use crate::types::RecipeError;

/// Copies the recipe's source patterns from `root` into `dest`.
///
/// Matched directories are copied recursively. Relative paths are kept.
/// Patterns that match nothing are skipped.
///
/// # Returns
///
/// The copied files, relative to `dest`, sorted.
pub fn export_sources(root: &Path, dest: &Path) -> Result<Vec<PathBuf>, RecipeError> {
    export_patterns(root, dest, EXPORT_SOURCES)
}

/// Like [`export_sources`], for an explicit pattern list.
pub fn export_patterns(
    root: &Path,
    dest: &Path,
    patterns: &[&str],
) -> Result<Vec<PathBuf>, RecipeError> {
    if !root.is_dir() {
        return Err(RecipeError::Config(format!(
            "Source root is not a directory: {}",
            root.display()
        )));
    }

    let mut copied = Vec::new();
    for pattern in patterns {
        let full = root.join(pattern);
        let full = full.to_string_lossy();
        let matches = glob::glob(&full).map_err(|e| {
            RecipeError::Config(format!("invalid export pattern '{}': {}", pattern, e))
        })?;

        let mut matched_any = false;
        for entry in matches {
            let path = entry.map_err(|e| RecipeError::Io(e.into()))?;
            matched_any = true;
            if path.is_dir() {
                for file in WalkDir::new(&path) {
                    let file = file.map_err(|e| RecipeError::Io(e.into()))?;
                    if file.file_type().is_file() {
                        copy_relative(root, dest, file.path(), &mut copied)?;
                    }
                }
            } else if path.is_file() {
                copy_relative(root, dest, &path, &mut copied)?;
            }
        }
        if !matched_any {
            log::debug!("Export pattern '{}' matched nothing", pattern);
        }
    }

    copied.sort();
    copied.dedup();
    log::info!("Exported {} source files to {}", copied.len(), dest.display());
    Ok(copied)
}

fn copy_relative(
    root: &Path,
    dest: &Path,
    file: &Path,
    copied: &mut Vec<PathBuf>,
) -> Result<(), RecipeError> {
    let relative = file.strip_prefix(root).map_err(|_| {
        RecipeError::Config(format!(
            "{} is outside the source root {}",
            file.display(),
            root.display()
        ))
    })?;
    let target = dest.join(relative);
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(file, &target)?;
    copied.push(relative.to_path_buf());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, rel.as_bytes()).unwrap();
    }

    #[test]
    fn test_export_sources_copies_patterns() {
        let src = TempDir::new().unwrap();
        let dest = TempDir::new().unwrap();
        touch(src.path(), "CMakeLists.txt");
        touch(src.path(), "src/RGPZip.cpp");
        touch(src.path(), "include/rgpaul/RGPZip.hpp");
        touch(src.path(), "cmake-modules/Toolchains/ios.toolchain.cmake");
        touch(src.path(), "deps/zlib/zlib.h");
        touch(src.path(), "deps/boost/version.hpp");
        touch(src.path(), "README.md");

        let copied = export_sources(src.path(), dest.path()).unwrap();
        let copied: Vec<String> = copied
            .iter()
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(
            copied,
            vec![
                "CMakeLists.txt",
                "cmake-modules/Toolchains/ios.toolchain.cmake",
                "deps/zlib/zlib.h",
                "include/rgpaul/RGPZip.hpp",
                "src/RGPZip.cpp",
            ]
        );
        assert_eq!(
            fs::read_to_string(dest.path().join("src/RGPZip.cpp")).unwrap(),
            "src/RGPZip.cpp"
        );
        assert!(!dest.path().join("README.md").exists());
        assert!(!dest.path().join("deps/boost").exists());
    }

    #[test]
    fn test_export_missing_root() {
        let dest = TempDir::new().unwrap();
        let err = export_sources(Path::new("/definitely/not/here"), dest.path()).unwrap_err();
        assert!(matches!(err, RecipeError::Config(_)));
    }
}
