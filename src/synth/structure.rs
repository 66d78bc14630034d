//! The proposed file/folder tree of a project.
//!
//! The tree is a tagged union of folders and file leaves. The root is a
//! folder named after the project; its children sit at "tree root" for
//! the review heuristics, and paths are reported relative to it.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{SynthError, SynthResult};
use crate::synth::extract::extract_json_object;

/// Wrapper keys models like to put around the actual tree.
const WRAPPER_KEYS: &[&str] = &["structure", "tree", "project", "root", "files"];

/// A node in the structure tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StructureNode {
    /// A directory and its entries.
    Folder {
        /// Directory name (one path segment).
        name: String,
        /// Entries in proposal order.
        children: Vec<StructureNode>,
    },
    /// A file leaf.
    File {
        /// File name (one path segment).
        name: String,
    },
}

impl StructureNode {
    /// Creates an empty folder.
    #[must_use]
    pub fn folder(name: impl Into<String>) -> Self {
        Self::Folder { name: name.into(), children: Vec::new() }
    }

    /// Name of this node.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Folder { name, .. } | Self::File { name } => name,
        }
    }

    /// Children of a folder; a file has none.
    #[must_use]
    pub fn children(&self) -> &[StructureNode] {
        match self {
            Self::Folder { children, .. } => children,
            Self::File { .. } => &[],
        }
    }

    /// Builds a tree from `/`-separated relative paths. A trailing `/` marks
    /// a folder. Unsafe segments drop the whole path.
    #[must_use]
    pub fn from_paths<'a>(root_name: &str, paths: impl IntoIterator<Item = &'a str>) -> Self {
        let mut root = Self::folder(root_name);
        for raw in paths {
            let is_dir = raw.ends_with('/');
            let segments: Vec<&str> = raw.trim_matches('/').split('/').collect();
            if segments.iter().all(|s| is_safe_segment(s)) {
                root.insert_path(&segments, is_dir);
            }
        }
        root
    }

    /// Converts a JSON object tree (folders are objects or arrays, files are
    /// `null`/string leaves) into a tree rooted at `root_name`.
    ///
    /// # Errors
    ///
    /// Returns [`SynthError::InvalidStructure`] if `value` is not an object.
    pub fn from_json(root_name: &str, value: &Value) -> SynthResult<Self> {
        let Value::Object(map) = unwrap_wrapper(root_name, value) else {
            return Err(SynthError::InvalidStructure("structure JSON is not an object".into()));
        };
        let mut root = Self::folder(root_name);
        for (key, child) in map {
            add_json_entry(&mut root, &[], key, child);
        }
        Ok(root)
    }

    /// Parses a structure reply: a JSON object tree, or failing that, one
    /// path per line.
    ///
    /// # Errors
    ///
    /// Returns [`SynthError::InvalidStructure`] if the reply yields no files.
    pub fn parse_reply(root_name: &str, raw: &str) -> SynthResult<Self> {
        let tree = match extract_json_object(raw) {
            Some(value) => Self::from_json(root_name, &value)?,
            None => Self::from_paths(root_name, raw.lines().filter_map(clean_list_line)),
        };
        if tree.file_paths().is_empty() {
            return Err(SynthError::InvalidStructure("structure contains no files".into()));
        }
        Ok(tree)
    }

    /// Relative paths of every file, depth-first in proposal order.
    #[must_use]
    pub fn file_paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect(&mut String::new(), &mut out, false);
        out
    }

    /// Relative paths of every folder below the root, depth-first.
    #[must_use]
    pub fn folder_paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect(&mut String::new(), &mut out, true);
        out
    }

    /// Files that are direct children of the root.
    #[must_use]
    pub fn root_file_count(&self) -> usize {
        self.children().iter().filter(|c| matches!(c, Self::File { .. })).count()
    }

    /// Number of path segments of the deepest entry below the root.
    #[must_use]
    pub fn max_depth(&self) -> usize {
        fn depth(node: &StructureNode) -> usize {
            1 + node.children().iter().map(depth).max().unwrap_or(0)
        }
        self.children().iter().map(depth).max().unwrap_or(0)
    }

    /// Renders the tree as an indented listing for prompts.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}/", self.name());
        render_children(self.children(), 1, &mut out);
        out
    }

    fn collect(&self, prefix: &mut String, out: &mut Vec<String>, folders: bool) {
        for child in self.children() {
            let path = if prefix.is_empty() {
                child.name().to_string()
            } else {
                format!("{prefix}/{}", child.name())
            };
            match child {
                Self::File { .. } if !folders => out.push(path),
                Self::File { .. } => {}
                Self::Folder { .. } => {
                    if folders {
                        out.push(path.clone());
                    }
                    let mut nested = path;
                    child.collect(&mut nested, out, folders);
                }
            }
        }
    }

    fn insert_path(&mut self, segments: &[&str], is_dir: bool) {
        let Self::Folder { children, .. } = self else {
            return;
        };
        let Some((first, rest)) = segments.split_first() else {
            return;
        };
        if rest.is_empty() && !is_dir {
            if !children.iter().any(|c| matches!(c, Self::File { name } if name == first)) {
                children.push(Self::File { name: (*first).to_string() });
            }
            return;
        }
        let slot = children
            .iter()
            .position(|c| matches!(c, Self::Folder { name, .. } if name == first))
            .unwrap_or_else(|| {
                children.push(Self::folder(*first));
                children.len() - 1
            });
        children[slot].insert_path(rest, is_dir);
    }
}

fn render_children(children: &[StructureNode], level: usize, out: &mut String) {
    for child in children {
        let indent = "  ".repeat(level);
        match child {
            StructureNode::Folder { name, children } => {
                let _ = writeln!(out, "{indent}{name}/");
                render_children(children, level + 1, out);
            }
            StructureNode::File { name } => {
                let _ = writeln!(out, "{indent}{name}");
            }
        }
    }
}

fn unwrap_wrapper<'a>(root_name: &str, value: &'a Value) -> &'a Value {
    if let Value::Object(map) = value {
        if map.len() == 1 {
            if let Some((key, inner @ Value::Object(_))) = map.iter().next() {
                let key = key.trim_end_matches('/');
                if key.eq_ignore_ascii_case(root_name)
                    || WRAPPER_KEYS.contains(&key.to_ascii_lowercase().as_str())
                {
                    return inner;
                }
            }
        }
    }
    value
}

fn add_json_entry(root: &mut StructureNode, parent: &[String], key: &str, value: &Value) {
    let is_dir_key = key.ends_with('/');
    let mut segments: Vec<String> = parent.to_vec();
    for segment in key.trim_matches('/').split('/') {
        if !is_safe_segment(segment) {
            return;
        }
        segments.push(segment.to_string());
    }
    fn as_refs(segs: &[String]) -> Vec<&str> {
        segs.iter().map(String::as_str).collect::<Vec<_>>()
    }

    match value {
        Value::Object(map) => {
            root.insert_path(&as_refs(&segments), true);
            for (child_key, child) in map {
                add_json_entry(root, &segments, child_key, child);
            }
        }
        Value::Array(items) => {
            root.insert_path(&as_refs(&segments), true);
            for item in items {
                match item {
                    Value::String(name) => add_json_entry(root, &segments, name, &Value::Null),
                    Value::Object(map) => {
                        for (child_key, child) in map {
                            add_json_entry(root, &segments, child_key, child);
                        }
                    }
                    _ => {}
                }
            }
        }
        _ => root.insert_path(&as_refs(&segments), is_dir_key),
    }
}

fn clean_list_line(line: &str) -> Option<&str> {
    let cleaned = line
        .trim()
        .trim_start_matches(|c: char| matches!(c, '-' | '*' | '|' | '`' | '│' | '├' | '└' | '─'))
        .trim()
        .trim_matches('`');
    (!cleaned.is_empty() && !cleaned.contains(' ')).then_some(cleaned)
}

/// Whether `segment` can be used as a single path component.
#[must_use]
pub fn is_safe_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains('\\')
        && !segment.contains(':')
        && segment.trim() == segment
}
