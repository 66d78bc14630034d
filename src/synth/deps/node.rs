//! JavaScript/TypeScript import scanning for `package.json`.

use std::sync::LazyLock;

use regex::Regex;

use super::stdlib::NODE;
use super::LanguageImportScanner;

/// `require('x')`, `import('x')`, `import 'x'` and `... from 'x'`.
static SPECIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?:\brequire\s*\(\s*|\bimport\s*\(\s*|\bimport\s+|\bfrom\s+)['"]([^'"\s]+)['"]"#,
    )
    .expect("node import pattern compiles")
});

/// Scans CommonJS and ES module imports.
pub struct NodeScanner;

impl LanguageImportScanner for NodeScanner {
    fn language(&self) -> &'static str {
        "node"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".js", ".jsx", ".ts", ".tsx", ".mjs", ".cjs", ".vue", ".svelte"]
    }

    fn manifest_name(&self) -> &'static str {
        "package.json"
    }

    fn imports(&self, source: &str) -> Vec<String> {
        SPECIFIER
            .captures_iter(source)
            .filter_map(|caps| package_of(&caps[1]))
            .collect()
    }

    fn is_standard(&self, import: &str) -> bool {
        NODE.contains(&import)
    }
}

/// Reduces a module specifier to its npm package name. Relative and
/// absolute paths yield `None`.
fn package_of(specifier: &str) -> Option<String> {
    if specifier.starts_with('.') || specifier.starts_with('/') {
        return None;
    }
    let specifier = specifier.strip_prefix("node:").unwrap_or(specifier);
    let mut segments = specifier.split('/');
    let first = segments.next().filter(|s| !s.is_empty())?;
    if first.starts_with('@') {
        let second = segments.next().filter(|s| !s.is_empty())?;
        return Some(format!("{first}/{second}"));
    }
    Some(first.to_string())
}
