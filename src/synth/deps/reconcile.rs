//! Rewrites dependency manifests that disagree with scanned imports.
//!
//! A manifest is regenerated only when it looks disproportionate to what
//! the code actually imports. Otherwise packages the code uses but the
//! manifest lacks are appended. Either way every scanned package ends up
//! declared. A manifest whose language shows no import statement at all is
//! never touched.

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use super::{normalize_package, scan, ScanResult, ScanScope, ScannerRegistry};
use crate::synth::model::{file_name, parent_dir, GeneratedFiles};

const REQUIREMENTS_MAX_LINES: usize = 30;
const PACKAGE_JSON_FLOOR: usize = 30;
const GO_MOD_FLOOR: usize = 30;
const CARGO_FLOOR: usize = 20;
const GO_PLACEHOLDER_VERSION: &str = "v0.0.0";

/// What reconciliation did to one manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ManifestAction {
    /// Left as generated.
    Untouched,
    /// Dependency list replaced with the scanned packages.
    Regenerated,
    /// Missing scanned packages appended.
    Extended {
        /// Packages that were added.
        added: Vec<String>,
    },
}

/// Reconciliation outcome for one manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestReport {
    /// Manifest path.
    pub manifest: String,
    /// Scanner language.
    pub language: &'static str,
    /// Entries declared before reconciliation.
    pub declared: usize,
    /// Third-party packages found in the manifest's subtree.
    pub scanned: Vec<String>,
    /// What happened.
    pub action: ManifestAction,
}

/// Reconciles every known manifest in `files` against the sources in its
/// directory subtree, rewriting stale manifests in place.
pub fn reconcile_manifests(
    files: &mut GeneratedFiles,
    registry: &ScannerRegistry,
) -> Vec<ManifestReport> {
    let manifests: Vec<String> =
        files.paths().filter(|p| registry.for_manifest(p).is_some()).map(String::from).collect();

    let mut reports = Vec::new();
    for manifest in manifests {
        let Some(scanner) = registry.for_manifest(&manifest) else {
            continue;
        };
        let Some(content) = files.get(&manifest).map(str::to_string) else {
            continue;
        };

        let dir = parent_dir(&manifest);
        let in_scope: Vec<(&str, &str)> = files
            .iter()
            .filter(|r| dir.is_empty() || r.path.starts_with(&format!("{dir}/")))
            .map(|r| (r.path.as_str(), r.content.as_str()))
            .collect();
        let scope = ScanScope::from_paths(in_scope.iter().map(|(p, _)| *p))
            .with_own_package(own_package(&manifest, &content));
        let scanned = scan(scanner, in_scope, &scope);

        let outcome = reconcile_one(file_name(&manifest), &content, &scanned);
        if let Some(updated) = &outcome.content {
            files.insert(manifest.clone(), updated.clone());
        }
        match &outcome.action {
            ManifestAction::Untouched => {}
            ManifestAction::Regenerated => info!(
                path = %manifest,
                declared = outcome.declared,
                scanned = scanned.packages.len(),
                "manifest regenerated from scanned imports"
            ),
            ManifestAction::Extended { added } => {
                info!(path = %manifest, added = ?added, "manifest extended with missing packages");
            }
        }
        reports.push(ManifestReport {
            manifest,
            language: scanner.language(),
            declared: outcome.declared,
            scanned: scanned.packages.into_iter().collect(),
            action: outcome.action,
        });
    }
    reports
}

/// Result of reconciling one manifest's text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// New content when the manifest changed.
    pub content: Option<String>,
    /// Entries declared before reconciliation.
    pub declared: usize,
    /// What happened.
    pub action: ManifestAction,
}

impl Outcome {
    fn untouched(declared: usize) -> Self {
        Self { content: None, declared, action: ManifestAction::Untouched }
    }
}

/// Reconciles one manifest, dispatching on its file name.
#[must_use]
pub fn reconcile_one(name: &str, content: &str, scanned: &ScanResult) -> Outcome {
    match name {
        "requirements.txt" => requirements(content, scanned),
        "package.json" => package_json(content, scanned),
        "go.mod" => go_mod(content, scanned),
        "Cargo.toml" => cargo_toml(content, scanned),
        _ => Outcome::untouched(0),
    }
}

fn is_stale(declared: usize, scanned: usize, floor: usize) -> bool {
    declared > (3 * scanned).max(floor)
}

/// Scanned packages sorted case-insensitively.
fn sorted(scanned: &ScanResult) -> Vec<&str> {
    let mut packages: Vec<&str> = scanned.packages.iter().map(String::as_str).collect();
    packages.sort_by_key(|p| p.to_lowercase());
    packages
}

fn missing<'a>(scanned: &'a ScanResult, declared: &[String]) -> Vec<&'a str> {
    let declared: Vec<String> = declared.iter().map(|d| normalize_package(d)).collect();
    sorted(scanned)
        .into_iter()
        .filter(|p| !declared.contains(&normalize_package(p)))
        .collect()
}

fn own_package(manifest: &str, content: &str) -> Option<String> {
    match file_name(manifest) {
        "package.json" => serde_json::from_str::<Value>(content)
            .ok()?
            .get("name")?
            .as_str()
            .map(String::from),
        "go.mod" => content.lines().find_map(|line| {
            line.trim().strip_prefix("module ").map(|m| m.trim().trim_matches('"').to_string())
        }),
        "Cargo.toml" => toml::from_str::<toml::Table>(content)
            .ok()?
            .get("package")?
            .get("name")?
            .as_str()
            .map(String::from),
        _ => None,
    }
}

// requirements.txt

fn requirement_name(line: &str) -> &str {
    let end = line.find(|c: char| "<>=!~;[ @".contains(c)).unwrap_or(line.len());
    line[..end].trim()
}

fn requirements(content: &str, scanned: &ScanResult) -> Outcome {
    let declared: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#') && !l.starts_with('-'))
        .map(|l| requirement_name(l).to_string())
        .collect();

    if !scanned.saw_imports {
        return Outcome::untouched(declared.len());
    }
    let stale = declared.len() > REQUIREMENTS_MAX_LINES
        || (scanned.packages.is_empty() && !declared.is_empty());
    if stale {
        let mut body = sorted(scanned).join("\n");
        if !body.is_empty() {
            body.push('\n');
        }
        return Outcome {
            content: Some(body),
            declared: declared.len(),
            action: ManifestAction::Regenerated,
        };
    }

    let added = missing(scanned, &declared);
    if added.is_empty() {
        return Outcome::untouched(declared.len());
    }
    let mut body = content.trim_end().to_string();
    for package in &added {
        if !body.is_empty() {
            body.push('\n');
        }
        body.push_str(package);
    }
    body.push('\n');
    Outcome {
        content: Some(body),
        declared: declared.len(),
        action: ManifestAction::Extended { added: added.into_iter().map(String::from).collect() },
    }
}

// package.json

fn package_json(content: &str, scanned: &ScanResult) -> Outcome {
    let Ok(Value::Object(mut doc)) = serde_json::from_str::<Value>(content) else {
        warn!("package.json is not a JSON object; leaving it untouched");
        return Outcome::untouched(0);
    };
    let names_in = |doc: &Map<String, Value>, key: &str| -> Vec<String> {
        doc.get(key).and_then(Value::as_object).map_or_else(Vec::new, |m| m.keys().cloned().collect())
    };
    let declared = names_in(&doc, "dependencies");
    if !scanned.saw_imports || scanned.packages.is_empty() {
        return Outcome::untouched(declared.len());
    }

    let action = if is_stale(declared.len(), scanned.packages.len(), PACKAGE_JSON_FLOOR) {
        let deps: Map<String, Value> =
            sorted(scanned).into_iter().map(|p| (p.to_string(), Value::from("*"))).collect();
        doc.insert("dependencies".into(), Value::Object(deps));
        ManifestAction::Regenerated
    } else {
        let mut present = declared.clone();
        present.extend(names_in(&doc, "devDependencies"));
        present.extend(names_in(&doc, "peerDependencies"));
        let added: Vec<String> =
            missing(scanned, &present).into_iter().map(String::from).collect();
        if added.is_empty() {
            return Outcome::untouched(declared.len());
        }
        let deps = doc
            .entry("dependencies")
            .or_insert_with(|| Value::Object(Map::new()));
        if !deps.is_object() {
            *deps = Value::Object(Map::new());
        }
        if let Value::Object(deps) = deps {
            for package in &added {
                deps.insert(package.clone(), Value::from("*"));
            }
        }
        ManifestAction::Extended { added }
    };

    match serde_json::to_string_pretty(&Value::Object(doc)) {
        Ok(mut text) => {
            text.push('\n');
            Outcome { content: Some(text), declared: declared.len(), action }
        }
        Err(e) => {
            warn!(error = %e, "failed to serialise package.json");
            Outcome::untouched(declared.len())
        }
    }
}

// go.mod

/// Splits go.mod into lines outside `require` directives and the required
/// module paths. Also returns the index of a require block's closing `)`.
fn split_go_mod(content: &str) -> (Vec<&str>, Vec<String>, Option<usize>) {
    let mut others = Vec::new();
    let mut required = Vec::new();
    let mut block_close = None;
    let mut in_block = false;

    for (idx, line) in content.lines().enumerate() {
        let trimmed = line.trim();
        if in_block {
            if trimmed.starts_with(')') {
                in_block = false;
                block_close = Some(idx);
            } else if let Some(path) = trimmed.split_whitespace().next() {
                if !path.starts_with("//") {
                    required.push(path.to_string());
                }
            }
            continue;
        }
        if trimmed.starts_with("require") && trimmed.trim_start_matches("require").trim() == "(" {
            in_block = true;
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("require ") {
            if let Some(path) = rest.split_whitespace().next() {
                required.push(path.to_string());
            }
            continue;
        }
        others.push(line);
    }
    (others, required, block_close)
}

fn go_requires(scanned: &[&str]) -> String {
    let mut block = String::from("require (\n");
    for module in scanned {
        block.push('\t');
        block.push_str(module);
        block.push(' ');
        block.push_str(GO_PLACEHOLDER_VERSION);
        block.push('\n');
    }
    block.push_str(")\n");
    block
}

fn go_mod(content: &str, scanned: &ScanResult) -> Outcome {
    let (others, required, block_close) = split_go_mod(content);
    if !scanned.saw_imports || scanned.packages.is_empty() {
        return Outcome::untouched(required.len());
    }

    if is_stale(required.len(), scanned.packages.len(), GO_MOD_FLOOR) {
        let head = others.join("\n");
        let text = format!("{}\n\n{}", head.trim_end(), go_requires(&sorted(scanned)));
        return Outcome {
            content: Some(text),
            declared: required.len(),
            action: ManifestAction::Regenerated,
        };
    }

    let added: Vec<&str> = sorted(scanned)
        .into_iter()
        .filter(|p| {
            !required.iter().any(|r| {
                r == p || p.starts_with(&format!("{r}/")) || r.starts_with(&format!("{p}/"))
            })
        })
        .collect();
    if added.is_empty() {
        return Outcome::untouched(required.len());
    }

    let text = if let Some(close) = block_close {
        let mut lines: Vec<String> = content.lines().map(String::from).collect();
        let inserts = added.iter().map(|m| format!("\t{m} {GO_PLACEHOLDER_VERSION}"));
        lines.splice(close..close, inserts);
        let mut text = lines.join("\n");
        text.push('\n');
        text
    } else {
        format!("{}\n\n{}", content.trim_end(), go_requires(&added))
    };
    Outcome {
        content: Some(text),
        declared: required.len(),
        action: ManifestAction::Extended { added: added.into_iter().map(String::from).collect() },
    }
}

// Cargo.toml

fn is_header(line: &str) -> bool {
    line.trim_start().starts_with('[')
}

fn dependency_key(line: &str) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    let (key, _) = trimmed.split_once('=')?;
    Some(key.trim().trim_matches('"').to_string())
}

/// Names declared in any dependency table, including dev/build and
/// `[dependencies.name]` forms.
fn cargo_declared_anywhere(content: &str) -> Vec<String> {
    let Ok(table) = toml::from_str::<toml::Table>(content) else {
        return Vec::new();
    };
    let mut names = Vec::new();
    for key in ["dependencies", "dev-dependencies", "build-dependencies"] {
        if let Some(deps) = table.get(key).and_then(toml::Value::as_table) {
            names.extend(deps.keys().cloned());
        }
    }
    names
}

fn cargo_toml(content: &str, scanned: &ScanResult) -> Outcome {
    let lines: Vec<&str> = content.lines().collect();
    let header = lines.iter().position(|l| l.trim() == "[dependencies]");
    let body_end = header.map(|h| {
        lines[h + 1..].iter().position(|l| is_header(l)).map_or(lines.len(), |p| h + 1 + p)
    });
    let declared: Vec<String> = match (header, body_end) {
        (Some(h), Some(end)) => lines[h + 1..end].iter().filter_map(|l| dependency_key(l)).collect(),
        _ => Vec::new(),
    };
    if !scanned.saw_imports || scanned.packages.is_empty() {
        return Outcome::untouched(declared.len());
    }

    let entry = |name: &str| format!("{name} = \"*\"");
    let (Some(h), Some(end)) = (header, body_end) else {
        let added: Vec<String> = missing(scanned, &cargo_declared_anywhere(content))
            .into_iter()
            .map(String::from)
            .collect();
        if added.is_empty() {
            return Outcome::untouched(0);
        }
        let mut text = format!("{}\n\n[dependencies]\n", content.trim_end());
        for name in &added {
            text.push_str(&entry(name.as_str()));
            text.push('\n');
        }
        return Outcome {
            content: Some(text.trim_start().to_string()),
            declared: 0,
            action: ManifestAction::Extended { added },
        };
    };

    let (replacement, action): (Vec<String>, ManifestAction) =
        if is_stale(declared.len(), scanned.packages.len(), CARGO_FLOOR) {
            let mut body: Vec<String> = sorted(scanned).into_iter().map(entry).collect();
            if end < lines.len() {
                body.push(String::new());
            }
            (body, ManifestAction::Regenerated)
        } else {
            let mut present = declared.clone();
            present.extend(cargo_declared_anywhere(content));
            let added: Vec<String> =
                missing(scanned, &present).into_iter().map(String::from).collect();
            if added.is_empty() {
                return Outcome::untouched(declared.len());
            }
            let mut body: Vec<String> = lines[h + 1..end].iter().map(|l| (*l).to_string()).collect();
            let trailing_blank = body.iter().rev().take_while(|l| l.trim().is_empty()).count();
            let insert_at = body.len() - trailing_blank;
            body.splice(insert_at..insert_at, added.iter().map(|n| entry(n.as_str())));
            (body, ManifestAction::Extended { added })
        };

    let mut out: Vec<String> = lines[..=h].iter().map(|l| (*l).to_string()).collect();
    out.extend(replacement);
    out.extend(lines[end..].iter().map(|l| (*l).to_string()));
    let mut text = out.join("\n");
    text.push('\n');
    Outcome { content: Some(text), declared: declared.len(), action }
}
