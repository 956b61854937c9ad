//! Media sources (mount alias to root directory) and path guards.

use std::path::{Component, Path, PathBuf};

/// Ordered mapping of mount alias to root directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaSources {
    sources: Vec<(String, PathBuf)>,
}

impl MediaSources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a source, replacing the root of an existing alias in place.
    pub fn insert(&mut self, alias: impl Into<String>, root: impl Into<PathBuf>) {
        let alias = alias.into();
        let root = root.into();
        match self.sources.iter_mut().find(|(existing, _)| *existing == alias) {
            Some((_, existing_root)) => *existing_root = root,
            None => self.sources.push((alias, root)),
        }
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.sources
            .iter()
            .map(|(alias, root)| (alias.as_str(), root.as_path()))
    }

    pub fn root(&self, alias: &str) -> Option<&Path> {
        self.sources
            .iter()
            .find(|(existing, _)| existing == alias)
            .map(|(_, root)| root.as_path())
    }

    pub fn full_path(&self, alias: &str, relative_path: &str) -> Option<PathBuf> {
        self.root(alias).map(|root| root.join(relative_path))
    }

    /// Resolves a full path back to `(alias, relative_path)`.
    pub fn locate(&self, full_path: &Path) -> Option<(&str, String)> {
        let normalized = normalize_path(full_path);
        self.sources.iter().find_map(|(alias, root)| {
            let relative = normalized.strip_prefix(normalize_path(root)).ok()?;
            if relative.as_os_str().is_empty() {
                return None;
            }
            relative
                .to_str()
                .map(|relative| (alias.as_str(), relative.to_string()))
        })
    }

    /// Why `path` must never be deleted, if it is protected.
    pub fn protection_reason(&self, path: &Path) -> Option<&'static str> {
        let normalized = normalize_path(path);
        if normalized.has_root() && normalized.parent().is_none() {
            return Some("it is the filesystem root");
        }
        if self
            .sources
            .iter()
            .any(|(_, root)| normalize_path(root) == normalized)
        {
            return Some("it is a media source root");
        }
        None
    }
}

/// Lexical normalization: drops `.` and redundant separators, resolves `..`
/// against preceding segments. Never touches the filesystem.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                // `..` above the root is the root
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => normalized.push(".."),
            },
            other => normalized.push(other.as_os_str()),
        }
    }
    if normalized.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        normalized
    }
}
