//! Rust `use`/`extern crate` scanning for `Cargo.toml`.

use std::sync::LazyLock;

use regex::Regex;

use super::stdlib::RUST;
use super::{LanguageImportScanner, ScanScope};

static USE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:pub(?:\([\w\s:]+\))?\s+)?use\s+(?:::)?(\w+)")
        .expect("rust use pattern compiles")
});
static EXTERN_CRATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*extern\s+crate\s+(\w+)").expect("rust extern pattern compiles")
});
static MOD_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:pub(?:\([\w\s:]+\))?\s+)?mod\s+(\w+)").expect("rust mod pattern compiles")
});

/// Scans the first path segment of `use` items and `extern crate` lines.
pub struct RustScanner;

impl LanguageImportScanner for RustScanner {
    fn language(&self) -> &'static str {
        "rust"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".rs"]
    }

    fn manifest_name(&self) -> &'static str {
        "Cargo.toml"
    }

    fn imports(&self, source: &str) -> Vec<String> {
        let local: Vec<&str> =
            MOD_DECL.captures_iter(source).filter_map(|c| c.get(1)).map(|m| m.as_str()).collect();
        USE.captures_iter(source)
            .chain(EXTERN_CRATE.captures_iter(source))
            .map(|caps| caps[1].to_string())
            .filter(|name| !local.contains(&name.as_str()))
            .collect()
    }

    fn is_standard(&self, import: &str) -> bool {
        RUST.contains(&import)
    }

    fn is_local(&self, import: &str, scope: &ScanScope) -> bool {
        let import = import.to_lowercase();
        scope.local_modules.contains(&import)
            || scope.own_package.as_deref().is_some_and(|own| own.replace('-', "_") == import)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_segment_of_use_items() {
        let source = "\
use std::collections::HashMap;
use serde::{Deserialize, Serialize};
pub use tokio::sync::Mutex;
pub(crate) use crate::config::Config;
use ::anyhow::Result;
extern crate log;
mod handlers;
use handlers::router;
";
        assert_eq!(
            RustScanner.imports(source),
            vec!["std", "serde", "tokio", "crate", "anyhow", "log"]
        );
    }

    #[test]
    fn own_crate_name_is_local() {
        let scope = ScanScope::default().with_own_package(Some("todo-api".into()));
        assert!(RustScanner.is_local("todo_api", &scope));
        assert!(!RustScanner.is_local("axum", &scope));
        assert!(RustScanner.is_standard("core"));
    }
}
