//! Python import scanning for `requirements.txt`.

use std::sync::LazyLock;

use regex::Regex;

use super::stdlib::{PYTHON, PYTHON_ALIASES};
use super::LanguageImportScanner;

static IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*import[ \t]+([\w.]+(?:[ \t]+as[ \t]+\w+)?(?:[ \t]*,[ \t]*[\w.]+(?:[ \t]+as[ \t]+\w+)?)*)")
        .expect("python import pattern compiles")
});
static FROM_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*from[ \t]+(\.*[\w.]*)[ \t]+import\b").expect("python from pattern compiles")
});

/// Scans `import x` and `from x import y` statements.
pub struct PythonScanner;

impl LanguageImportScanner for PythonScanner {
    fn language(&self) -> &'static str {
        "python"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".py"]
    }

    fn manifest_name(&self) -> &'static str {
        "requirements.txt"
    }

    fn imports(&self, source: &str) -> Vec<String> {
        let mut found = Vec::new();
        for caps in IMPORT.captures_iter(source) {
            for item in caps[1].split(',') {
                let module = item.split_whitespace().next().unwrap_or_default();
                push_top_level(&mut found, module);
            }
        }
        for caps in FROM_IMPORT.captures_iter(source) {
            let module = &caps[1];
            // relative imports are always project code
            if !module.starts_with('.') {
                push_top_level(&mut found, module);
            }
        }
        found
    }

    fn is_standard(&self, import: &str) -> bool {
        PYTHON.contains(&import)
    }

    fn package_name(&self, import: &str) -> String {
        PYTHON_ALIASES
            .iter()
            .find(|(module, _)| *module == import)
            .map_or_else(|| import.to_string(), |(_, package)| (*package).to_string())
    }
}

fn push_top_level(found: &mut Vec<String>, module: &str) {
    let top = module.split('.').next().unwrap_or_default();
    if !top.is_empty() {
        found.push(top.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_top_level_modules() {
        let source = "\
import os, sys
import numpy as np
from flask import Flask, jsonify
from google.cloud import storage
    import yaml  # inside a function
from . import views
from .models import User
";
        assert_eq!(
            PythonScanner.imports(source),
            vec!["os", "sys", "numpy", "yaml", "flask", "google"]
        );
    }

    #[test]
    fn aliases_map_to_distribution_names() {
        assert_eq!(PythonScanner.package_name("cv2"), "opencv-python");
        assert_eq!(PythonScanner.package_name("flask"), "Flask");
        assert_eq!(PythonScanner.package_name("requests"), "requests");
    }

    #[test]
    fn standard_modules_are_recognised() {
        assert!(PythonScanner.is_standard("asyncio"));
        assert!(PythonScanner.is_standard("typing"));
        assert!(!PythonScanner.is_standard("django"));
    }
}
