//! Ranks already generated files as context for the next file.

use crate::synth::model::{extension, file_name, file_stem, parent_dir, GeneratedFiles};

const FRONTEND_EXTENSIONS: &[&str] =
    &[".js", ".jsx", ".ts", ".tsx", ".vue", ".svelte", ".html", ".css", ".scss", ".less"];
const ROUTE_KEYWORDS: &[&str] = &["routes", "views", "api", "endpoints", "controllers"];
const SOURCE_EXTENSIONS: &[&str] = &[".py", ".js", ".ts", ".go", ".rs", ".rb"];
const ALWAYS_USEFUL: &[&str] = &["__init__.py", "config.py", "settings.py", "app.py"];

/// File names treated as dependency manifests.
pub const MANIFEST_NAMES: &[&str] = &[
    "requirements.txt",
    "package.json",
    "Cargo.toml",
    "go.mod",
    "Gemfile",
    "pyproject.toml",
    "build.gradle",
    "pom.xml",
    "Dockerfile",
];

/// Whether `path` names a dependency manifest.
#[must_use]
pub fn is_manifest(path: &str) -> bool {
    MANIFEST_NAMES.contains(&file_name(path))
}

/// Relevance of `candidate` as context for `target`.
#[must_use]
pub fn score(target: &str, candidate: &str) -> u32 {
    let target_stem = file_stem(target).to_lowercase();
    let candidate_stem = file_stem(candidate).to_lowercase();
    let has_route = |stem: &str| ROUTE_KEYWORDS.iter().any(|k| stem.contains(k));
    let mut score = 0;

    if parent_dir(target) == parent_dir(candidate) {
        score += 3;
    }
    if FRONTEND_EXTENSIONS.contains(&extension(target).as_str()) {
        if has_route(&candidate_stem) {
            score += 5;
        }
        if candidate_stem.contains("model") {
            score += 3;
        }
    }
    if is_manifest(target) && SOURCE_EXTENSIONS.contains(&extension(candidate).as_str()) {
        score += 4;
    }
    if has_route(&target_stem) && candidate_stem.contains("model") {
        score += 4;
    }
    if ALWAYS_USEFUL.contains(&file_name(candidate)) {
        score += 2;
    }
    score
}

/// Picks at most `max_files` generated files for `target`, highest score
/// first. Equal scores keep generation order; `target` itself is excluded.
#[must_use]
pub fn select<'a>(
    target: &str,
    generated: &'a GeneratedFiles,
    max_files: usize,
) -> Vec<(&'a str, &'a str)> {
    let mut ranked: Vec<(u32, &'a str, &'a str)> = generated
        .iter()
        .filter(|record| record.path != target)
        .map(|record| (score(target, &record.path), record.path.as_str(), record.content.as_str()))
        .collect();
    // stable: ties stay in generation order
    ranked.sort_by(|a, b| b.0.cmp(&a.0));
    ranked.into_iter().take(max_files).map(|(_, path, content)| (path, content)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(paths: &[&str]) -> GeneratedFiles {
        paths.iter().map(|p| ((*p).to_string(), format!("// {p}"))).collect()
    }

    #[test]
    fn same_directory_scores_three() {
        assert_eq!(score("app/service.py", "app/helpers.py"), 3);
        assert_eq!(score("app/service.py", "lib/helpers.py"), 0);
    }

    #[test]
    fn frontend_prefers_routes_and_models() {
        assert_eq!(score("web/main.js", "server/routes.py"), 5);
        assert_eq!(score("web/main.js", "server/user_model.py"), 3);
    }

    #[test]
    fn manifest_prefers_source_files() {
        assert_eq!(score("requirements.txt", "app/main.py"), 4);
        assert_eq!(score("requirements.txt", "app/__init__.py"), 6);
        assert_eq!(score("requirements.txt", "notes.md"), 3);
    }

    #[test]
    fn routes_pull_in_models() {
        assert_eq!(score("app/api.py", "db/models.py"), 4);
    }

    #[test]
    fn selection_is_bounded_sorted_and_stable() {
        let generated = files(&[
            "lib/a.py",
            "app/b.py",
            "lib/c.py",
            "app/config.py",
            "app/target.py",
        ]);
        let picked = select("app/target.py", &generated, 3);
        let paths: Vec<&str> = picked.iter().map(|(p, _)| *p).collect();
        assert_eq!(paths, vec!["app/config.py", "app/b.py", "lib/a.py"]);
    }

    #[test]
    fn zero_score_candidates_fill_remaining_slots() {
        let generated = files(&["x/one.go", "y/two.go"]);
        let picked = select("z/three.go", &generated, 8);
        assert_eq!(picked.len(), 2);
        assert_eq!(picked[0].0, "x/one.go");
    }

    #[test]
    fn input_is_not_mutated() {
        let generated = files(&["a.py", "b.py"]);
        let before = generated.clone();
        let _ = select("c.py", &generated, 1);
        assert_eq!(generated, before);
    }
}
