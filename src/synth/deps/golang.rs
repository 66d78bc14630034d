//! Go import scanning for `go.mod`.

use std::sync::LazyLock;

use regex::Regex;

use super::stdlib::GO;
use super::{LanguageImportScanner, ScanScope};

static SINGLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*import\s+(?:[\w.]+\s+)?"([^"]+)""#).expect("go import pattern compiles")
});
static BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\bimport\s*\((.*?)\)").expect("go block pattern compiles"));
static BLOCK_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^\s*(?:[\w.]+\s+)?"([^"]+)""#).expect("go block line pattern compiles")
});

/// Hosts whose module paths span `host/owner/repo`.
const THREE_SEGMENT_HOSTS: &[&str] =
    &["github.com", "gitlab.com", "bitbucket.org", "golang.org"];

/// Scans single-line and parenthesised Go imports.
pub struct GoScanner;

impl LanguageImportScanner for GoScanner {
    fn language(&self) -> &'static str {
        "go"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".go"]
    }

    fn manifest_name(&self) -> &'static str {
        "go.mod"
    }

    /// Returns full import paths; the module key is derived in
    /// [`GoScanner::package_name`] so locality checks see the whole path.
    fn imports(&self, source: &str) -> Vec<String> {
        let mut found: Vec<String> =
            SINGLE.captures_iter(source).map(|caps| caps[1].to_string()).collect();
        for block in BLOCK.captures_iter(source) {
            found.extend(BLOCK_LINE.captures_iter(&block[1]).map(|caps| caps[1].to_string()));
        }
        found
    }

    fn is_standard(&self, import: &str) -> bool {
        let first = import.split('/').next().unwrap_or_default();
        !first.contains('.') || GO.contains(&import)
    }

    fn is_local(&self, import: &str, scope: &ScanScope) -> bool {
        scope.own_package.as_deref().is_some_and(|module| {
            import == module || import.strip_prefix(module).is_some_and(|rest| rest.starts_with('/'))
        })
    }

    fn package_name(&self, import: &str) -> String {
        module_key(import)
    }
}

/// Module path for an import path, by hosting convention.
fn module_key(import: &str) -> String {
    let segments: Vec<&str> = import.split('/').collect();
    let keep = match segments[0] {
        host if THREE_SEGMENT_HOSTS.contains(&host) => 3,
        _ => 2,
    };
    segments[..keep.min(segments.len())].join("/")
}
