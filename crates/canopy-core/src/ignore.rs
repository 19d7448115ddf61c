//! Directory-name ignore list for change detection.

use serde::{Deserialize, Serialize};

/// Fallback list used when the server's configuration endpoint is
/// unavailable.
pub const DEFAULT_IGNORED_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "dist",
    "build",
    "target",
    ".next",
    ".cache",
    "__pycache__",
    ".venv",
    "coverage",
];

/// A set of directory names whose contents never produce change records.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoreList {
    names: Vec<String>,
}

impl IgnoreList {
    /// Build an ignore list. Empty names and slashes around names are
    /// dropped.
    pub fn new(names: impl IntoIterator<Item = String>) -> Self {
        let mut names: Vec<String> = names
            .into_iter()
            .map(|n| n.trim_matches('/').to_string())
            .filter(|n| !n.is_empty())
            .collect();
        names.sort();
        names.dedup();
        Self { names }
    }

    /// The hard-coded fallback list.
    pub fn fallback() -> Self {
        Self::new(DEFAULT_IGNORED_DIRS.iter().map(|s| s.to_string()))
    }

    /// Check whether a project-relative path is ignored.
    ///
    /// A path matches a name when any `/`-separated component is that
    /// name, so both an ignored folder and everything under it match. Names
    /// with a slash match as a prefix or as an inner run of components.
    pub fn matches(&self, path: &str) -> bool {
        self.names.iter().any(|name| {
            if name.contains('/') {
                path == name
                    || path
                        .strip_prefix(name.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
                    || path.contains(&format!("/{name}/"))
                    || path.ends_with(&format!("/{name}"))
            } else {
                path.split('/').any(|segment| segment == name)
            }
        })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list() -> IgnoreList {
        IgnoreList::new(vec!["node_modules".to_string(), ".git/".to_string()])
    }

    #[test]
    fn test_exact_top_level_name() {
        assert!(list().matches("node_modules"));
        assert!(list().matches(".git"));
    }

    #[test]
    fn test_prefix_match() {
        assert!(list().matches("node_modules/react/index.js"));
        assert!(!list().matches("node_modules_backup/a.js"));
    }

    #[test]
    fn test_inner_component_match() {
        assert!(list().matches("packages/app/node_modules/x.js"));
        assert!(!list().matches("src/my_node_modules/x.js"));
    }

    #[test]
    fn test_inner_folder_itself_matches() {
        assert!(list().matches("src/node_modules"));
        assert!(list().matches("a/b/.git"));
        assert!(!list().matches("src/node_modules.txt"));
    }

    #[test]
    fn test_multi_component_name() {
        let list = IgnoreList::new(vec!["vendor/cache".to_string()]);
        assert!(list.matches("vendor/cache"));
        assert!(list.matches("vendor/cache/a.bin"));
        assert!(list.matches("app/vendor/cache"));
        assert!(!list.matches("vendor/cached"));
        assert!(!list.matches("vendor/a.bin"));
    }

    #[test]
    fn test_unrelated_paths() {
        assert!(!list().matches("src/main.rs"));
        assert!(!IgnoreList::default().matches("node_modules"));
    }

    #[test]
    fn test_fallback_contains_git() {
        assert!(IgnoreList::fallback().matches(".git/HEAD"));
    }
}
