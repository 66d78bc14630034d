//! Core data carried between pipeline phases.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// What the user asked for. Never modified once the pipeline starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSpec {
    /// Natural-language description of the project.
    pub description: String,
    /// Project name, also the root folder name of the structure tree.
    pub name: String,
}

/// One generated file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Relative `/`-separated path inside the project.
    pub path: String,
    /// Full file content.
    pub content: String,
}

/// The in-memory map of generated files, keyed by path.
///
/// Iteration follows generation order: a path keeps the position of its
/// first insertion even when its content is later replaced by refinement.
/// Context selection relies on this order for tie-breaking.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedFiles {
    records: Vec<FileRecord>,
    index: HashMap<String, usize>,
}

impl GeneratedFiles {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the content at `path`. Returns the previous content.
    pub fn insert(&mut self, path: impl Into<String>, content: impl Into<String>) -> Option<String> {
        let path = path.into();
        let content = content.into();
        if let Some(&slot) = self.index.get(&path) {
            return Some(std::mem::replace(&mut self.records[slot].content, content));
        }
        self.index.insert(path.clone(), self.records.len());
        self.records.push(FileRecord { path, content });
        None
    }

    /// Content at `path`, if generated.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&str> {
        self.index.get(path).map(|&slot| self.records[slot].content.as_str())
    }

    /// Whether `path` has been generated.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.index.contains_key(path)
    }

    /// Records in generation order.
    pub fn iter(&self) -> impl Iterator<Item = &FileRecord> {
        self.records.iter()
    }

    /// Paths in generation order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.path.as_str())
    }

    /// Number of files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no file has been generated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromIterator<(String, String)> for GeneratedFiles {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        let mut files = Self::new();
        for (path, content) in iter {
            files.insert(path, content);
        }
        files
    }
}

/// Final file name component of a `/`-separated path.
#[must_use]
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Parent directory of a `/`-separated path (`""` for root-level files).
#[must_use]
pub fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map_or("", |(dir, _)| dir)
}

/// File name without its last extension (`"app.test.js"` -> `"app.test"`).
#[must_use]
pub fn file_stem(path: &str) -> &str {
    let name = file_name(path);
    match name.rfind('.') {
        Some(0) | None => name,
        Some(dot) => &name[..dot],
    }
}

/// Lowercased extension including the dot (`".py"`), or `""`.
#[must_use]
pub fn extension(path: &str) -> String {
    let name = file_name(path);
    match name.rfind('.') {
        Some(0) | None => String::new(),
        Some(dot) => name[dot..].to_ascii_lowercase(),
    }
}
