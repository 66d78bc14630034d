//! Import scanning and dependency-manifest reconciliation.
//!
//! Each language contributes a [`LanguageImportScanner`]; the
//! [`ScannerRegistry`] maps file extensions and manifest names to scanners
//! so the reconciliation loop never names a language directly.

pub mod golang;
pub mod node;
pub mod python;
pub mod reconcile;
pub mod rust;
pub mod stdlib;

use std::collections::{BTreeSet, HashMap, HashSet};

use crate::synth::model::{extension, file_name, file_stem};

pub use reconcile::{reconcile_manifests, ManifestAction, ManifestReport};

/// Names that belong to the project itself and are never packages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanScope {
    /// Lowercased file stems and folder names inside the scanned subtree.
    pub local_modules: HashSet<String>,
    /// The package/module name the manifest declares for the project itself.
    pub own_package: Option<String>,
}

impl ScanScope {
    /// Collects local module names from relative file paths.
    #[must_use]
    pub fn from_paths<'a>(paths: impl IntoIterator<Item = &'a str>) -> Self {
        let mut local_modules = HashSet::new();
        for path in paths {
            local_modules.insert(file_stem(path).to_lowercase());
            let mut dirs: Vec<&str> = path.split('/').collect();
            dirs.pop();
            local_modules.extend(dirs.into_iter().map(str::to_lowercase));
        }
        Self { local_modules, own_package: None }
    }

    /// Sets the project's own package name.
    #[must_use]
    pub fn with_own_package(mut self, name: Option<String>) -> Self {
        self.own_package = name;
        self
    }
}

/// Finds third-party imports for one language.
pub trait LanguageImportScanner: Send + Sync {
    /// Display name of the language.
    fn language(&self) -> &'static str;

    /// Source file extensions, lowercase with the leading dot.
    fn extensions(&self) -> &'static [&'static str];

    /// File name of the manifest this language declares dependencies in.
    fn manifest_name(&self) -> &'static str;

    /// Import keys found in `source`, reduced to the unit a manifest declares
    /// (top-level module, npm package, Go module path, crate name).
    fn imports(&self, source: &str) -> Vec<String>;

    /// Whether `import` ships with the language runtime or toolchain.
    fn is_standard(&self, import: &str) -> bool;

    /// Whether `import` refers to the project's own code.
    fn is_local(&self, import: &str, scope: &ScanScope) -> bool {
        scope.local_modules.contains(&import.to_lowercase())
            || scope.own_package.as_deref().is_some_and(|own| own.eq_ignore_ascii_case(import))
    }

    /// Manifest entry name for `import`.
    fn package_name(&self, import: &str) -> String {
        import.to_string()
    }
}

/// Third-party packages found across a set of source files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResult {
    /// Whether any import statement was seen at all, standard or not.
    pub saw_imports: bool,
    /// Manifest entry names, sorted.
    pub packages: BTreeSet<String>,
}

/// Scanners keyed by extension and manifest name.
pub struct ScannerRegistry {
    scanners: Vec<Box<dyn LanguageImportScanner>>,
    by_extension: HashMap<&'static str, usize>,
}

impl Default for ScannerRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(python::PythonScanner));
        registry.register(Box::new(node::NodeScanner));
        registry.register(Box::new(golang::GoScanner));
        registry.register(Box::new(rust::RustScanner));
        registry
    }
}

impl ScannerRegistry {
    /// A registry with no languages.
    #[must_use]
    pub fn empty() -> Self {
        Self { scanners: Vec::new(), by_extension: HashMap::new() }
    }

    /// Adds a language. Later registrations win for shared extensions.
    pub fn register(&mut self, scanner: Box<dyn LanguageImportScanner>) {
        let slot = self.scanners.len();
        for ext in scanner.extensions() {
            self.by_extension.insert(*ext, slot);
        }
        self.scanners.push(scanner);
    }

    /// Scanner for a source path, by extension.
    #[must_use]
    pub fn for_path(&self, path: &str) -> Option<&dyn LanguageImportScanner> {
        self.by_extension.get(extension(path).as_str()).map(|&slot| self.scanners[slot].as_ref())
    }

    /// Scanner whose manifest is named like the last component of `path`.
    #[must_use]
    pub fn for_manifest(&self, path: &str) -> Option<&dyn LanguageImportScanner> {
        let name = file_name(path);
        self.scanners.iter().find(|s| s.manifest_name() == name).map(AsRef::as_ref)
    }
}

/// Scans every `(path, content)` pair that `scanner` handles.
#[must_use]
pub fn scan<'a>(
    scanner: &dyn LanguageImportScanner,
    sources: impl IntoIterator<Item = (&'a str, &'a str)>,
    scope: &ScanScope,
) -> ScanResult {
    let mut result = ScanResult::default();
    for (path, content) in sources {
        if !scanner.extensions().contains(&extension(path).as_str()) {
            continue;
        }
        for import in scanner.imports(content) {
            result.saw_imports = true;
            if scanner.is_standard(&import) || scanner.is_local(&import, scope) {
                continue;
            }
            result.packages.insert(scanner.package_name(&import));
        }
    }
    result
}

/// Normalises a package name for comparisons: lowercase, `_` and `.` as `-`.
#[must_use]
pub fn normalize_package(name: &str) -> String {
    name.trim().to_lowercase().replace(['_', '.'], "-")
}
