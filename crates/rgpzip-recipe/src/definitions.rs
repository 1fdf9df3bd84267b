//! Ordered CMake cache definitions (`-DKEY=VALUE`).

use std::fmt;

use serde::Serialize;

/// Insertion-ordered `key → value` map passed to CMake.
///
/// Setting a key that already exists replaces its value in place, so the
/// position of the first definition is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Definitions {
    entries: Vec<(String, String)>,
}

impl Definitions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Appends every entry of `other`, with `other` winning on conflicts.
    pub fn extend(&mut self, other: Definitions) {
        for (key, value) in other.entries {
            self.set(key, value);
        }
    }

    /// Renders the entries as CMake command-line arguments.
    pub fn to_args(&self) -> Vec<String> {
        self.iter().map(|(k, v)| format!("-D{}={}", k, v)).collect()
    }
}

impl fmt::Display for Definitions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (key, value) in self.iter() {
            writeln!(f, "{}={}", key, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_replaces_in_place() {
        let mut defs = Definitions::new();
        defs.set("CMAKE_BUILD_TYPE", "Release");
        defs.set("BUILD_TESTS", "OFF");
        defs.set("CMAKE_BUILD_TYPE", "Debug");

        assert_eq!(defs.len(), 2);
        let keys: Vec<_> = defs.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["CMAKE_BUILD_TYPE", "BUILD_TESTS"]);
        assert_eq!(defs.get("CMAKE_BUILD_TYPE"), Some("Debug"));
    }

    #[test]
    fn test_to_args() {
        let mut defs = Definitions::new();
        defs.set("ARCHS", "armv7;armv7s;arm64;arm64e");
        assert_eq!(defs.to_args(), vec!["-DARCHS=armv7;armv7s;arm64;arm64e"]);
    }

    #[test]
    fn test_extend_overrides() {
        let mut base = Definitions::new();
        base.set("A", "1");
        let mut more = Definitions::new();
        more.set("A", "2");
        more.set("B", "3");
        base.extend(more);
        assert_eq!(base.to_string(), "A=2\nB=3\n");
    }
}
