//! Structure quality gate.
//!
//! Five independent heuristic checks each start from a component score of
//! 100 and subtract per finding. One subjective chat pass may add further
//! issues. The final score is the mean of the component scores minus 15 per
//! critical and 5 per high issue, clamped to `[0, 100]`.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::config::SynthConfig;
use crate::context::ServiceContext;
use crate::error::SynthResult;
use crate::ports::llm::ChatRole;
use crate::synth::chat;
use crate::synth::extract::{extract_json_object, truncate_chars};
use crate::synth::model::{extension, file_name, file_stem};
use crate::synth::structure::StructureNode;

const MAX_ROOT_FILES: usize = 5;
const MAX_DEPTH: usize = 6;
const PASS_THRESHOLD: f64 = 80.0;
const IMPROVE_THRESHOLD: f64 = 60.0;
const CONFIDENCE_WITH_LLM: f64 = 0.9;
const CONFIDENCE_HEURISTIC_ONLY: f64 = 0.6;

/// Keyword sets used by the completeness check. A category is present when
/// any file path contains one of its keywords.
const COMPLETENESS: &[(&str, &[&str])] = &[
    ("readme", &["readme"]),
    ("license", &["license", "licence", "copying"]),
    (
        "config",
        &[
            "config", "settings", ".env", ".toml", ".ini", ".yaml", ".yml", "package.json",
            "go.mod", "requirements.txt", "setup.py", "setup.cfg",
        ],
    ),
    ("tests", &["test", "spec"]),
    ("docs", &["docs/", "doc/", "documentation", "guide", "changelog", "contributing"]),
];

/// What a structure issue is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    /// Too flat or too deep.
    Hierarchy,
    /// Mixed naming conventions.
    Naming,
    /// A file and a folder share a name.
    Conflict,
    /// Expected project files are missing.
    Completeness,
    /// Missing conventional folders.
    Organization,
}

impl IssueCategory {
    fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "hierarchy" | "structure" | "depth" => Self::Hierarchy,
            "naming" | "naming_convention" | "naming_conventions" => Self::Naming,
            "conflict" | "naming_conflict" | "naming_conflicts" => Self::Conflict,
            "completeness" | "missing" => Self::Completeness,
            _ => Self::Organization,
        }
    }
}

/// Issue severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Cosmetic.
    Low,
    /// Worth fixing.
    Medium,
    /// Lowers the score by an extra 5 points.
    High,
    /// Lowers the score by an extra 15 points and blocks `Passed`.
    Critical,
}

impl Severity {
    /// Parses a severity label, defaulting to `Low`.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "critical" | "blocker" => Self::Critical,
            "high" | "major" => Self::High,
            "medium" | "moderate" => Self::Medium,
            _ => Self::Low,
        }
    }
}

/// Outcome of the quality gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    /// Score of at least 80 with no critical issue.
    Passed,
    /// Score of at least 60, or a passing score with a critical issue.
    NeedsImprovement,
    /// Score below 60.
    Critical,
}

/// One finding about the structure tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureIssue {
    /// Finding category.
    pub category: IssueCategory,
    /// Finding severity.
    pub severity: Severity,
    /// What is wrong.
    pub description: String,
    /// Paths involved, relative to the project root.
    pub affected_paths: Vec<String>,
    /// How to fix it.
    pub suggestion: String,
}

/// Scored review of a structure tree. Always recomputable from the tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructureReview {
    /// Final score in `[0, 100]`.
    pub quality_score: f64,
    /// How much of the review could be computed, in `[0, 1]`.
    pub confidence: f64,
    /// Gate outcome.
    pub status: ReviewStatus,
    /// Heuristic findings followed by subjective ones.
    pub issues: Vec<StructureIssue>,
    /// Component scores plus `final`.
    pub metric_breakdown: BTreeMap<String, f64>,
    /// First high/critical suggestion per issue category.
    pub recommendations: Vec<String>,
}

/// Result of the five heuristic checks.
#[derive(Debug, Clone, PartialEq)]
pub struct HeuristicReport {
    /// Findings in check order.
    pub issues: Vec<StructureIssue>,
    /// `(metric name, component score)` per check.
    pub components: Vec<(&'static str, f64)>,
}

/// Runs the five heuristic checks on `tree`.
#[must_use]
pub fn review_heuristics(tree: &StructureNode) -> HeuristicReport {
    let files = tree.file_paths();
    let folders = tree.folder_paths();
    let checks: [(&'static str, (Vec<StructureIssue>, f64)); 5] = [
        ("hierarchy", check_hierarchy(tree)),
        ("naming_conventions", check_naming_conventions(&files)),
        ("naming_conflicts", check_naming_conflicts(&files, &folders)),
        ("completeness", check_completeness(&files)),
        ("organization", check_organization(&folders)),
    ];

    let mut issues = Vec::new();
    let mut components = Vec::with_capacity(checks.len());
    for (metric, (found, score)) in checks {
        issues.extend(found);
        components.push((metric, score));
    }
    HeuristicReport { issues, components }
}

impl StructureReview {
    /// Scores a review from heuristic results and any subjective issues.
    #[must_use]
    pub fn from_parts(
        heuristics: HeuristicReport,
        subjective: Vec<StructureIssue>,
        subjective_parsed: bool,
    ) -> Self {
        let HeuristicReport { mut issues, components } = heuristics;
        issues.extend(subjective);

        #[allow(clippy::cast_precision_loss)]
        let mean = components.iter().map(|(_, s)| s).sum::<f64>() / components.len().max(1) as f64;
        let critical = issues.iter().filter(|i| i.severity == Severity::Critical).count();
        let high = issues.iter().filter(|i| i.severity == Severity::High).count();
        #[allow(clippy::cast_precision_loss)]
        let score = (mean - 15.0 * critical as f64 - 5.0 * high as f64).clamp(0.0, 100.0);

        let mut status = if score >= PASS_THRESHOLD {
            ReviewStatus::Passed
        } else if score >= IMPROVE_THRESHOLD {
            ReviewStatus::NeedsImprovement
        } else {
            ReviewStatus::Critical
        };
        if critical > 0 && status == ReviewStatus::Passed {
            status = ReviewStatus::NeedsImprovement;
        }

        let mut metric_breakdown: BTreeMap<String, f64> =
            components.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
        metric_breakdown.insert("final".into(), score);

        let recommendations = recommendations(&issues);
        Self {
            quality_score: score,
            confidence: if subjective_parsed {
                CONFIDENCE_WITH_LLM
            } else {
                CONFIDENCE_HEURISTIC_ONLY
            },
            status,
            issues,
            metric_breakdown,
            recommendations,
        }
    }

    /// Review from the heuristic checks alone.
    #[must_use]
    pub fn heuristic_only(tree: &StructureNode) -> Self {
        Self::from_parts(review_heuristics(tree), Vec::new(), false)
    }
}

/// Reviews `tree`: heuristic checks plus one subjective chat pass.
///
/// A reply that carries no parsable JSON contributes no issues.
///
/// # Errors
///
/// Returns an error if the chat call itself fails or times out.
pub async fn review_structure(
    ctx: &ServiceContext,
    config: &SynthConfig,
    readme: &str,
    tree: &StructureNode,
) -> SynthResult<StructureReview> {
    let heuristics = review_heuristics(tree);

    let prompt = build_review_prompt(readme, tree, config.generation.readme_excerpt_chars);
    let reply = chat::ask(ctx, config, ChatRole::StructureReview, REVIEW_SYSTEM, prompt).await?;
    let subjective = parse_subjective_issues(&reply);
    if subjective.is_none() {
        warn!("structure review reply was not JSON; using heuristic issues only");
    }
    let parsed = subjective.is_some();
    let review = StructureReview::from_parts(heuristics, subjective.unwrap_or_default(), parsed);

    info!(
        score = review.quality_score,
        status = ?review.status,
        issues = review.issues.len(),
        "structure reviewed"
    );
    Ok(review)
}

const REVIEW_SYSTEM: &str = "You are a senior software architect reviewing a proposed \
    project layout. Respond with a single JSON object and nothing else.";

fn build_review_prompt(readme: &str, tree: &StructureNode, readme_chars: usize) -> String {
    let mut prompt = String::new();
    let _ = write!(
        prompt,
        "## README (excerpt)\n\n{}\n\n## Proposed structure\n\n{}\n",
        truncate_chars(readme, readme_chars),
        tree.render()
    );
    prompt.push_str(
        "## Instructions\n\n\
        List subjective problems with this layout that simple checks would miss \
        (misplaced modules, missing entry points, unclear boundaries).\n\
        Respond in the following JSON format (no markdown fences):\n\
        {\n  \"issues\": [\n    {\n      \
          \"category\": \"hierarchy|naming|conflict|completeness|organization\",\n      \
          \"severity\": \"low|medium|high|critical\",\n      \
          \"description\": \"<what is wrong>\",\n      \
          \"affected_paths\": [\"<path>\"],\n      \
          \"suggestion\": \"<how to fix>\"\n    }\n  ]\n}\n\
        Return an empty issues array if the layout is sound.\n",
    );
    prompt
}

/// Parses subjective issues; `None` when the reply holds no JSON object.
fn parse_subjective_issues(reply: &str) -> Option<Vec<StructureIssue>> {
    #[derive(Deserialize)]
    struct RawIssue {
        #[serde(default)]
        category: String,
        #[serde(default)]
        severity: String,
        #[serde(default)]
        description: String,
        #[serde(default)]
        affected_paths: Vec<String>,
        #[serde(default)]
        suggestion: String,
    }

    let value = extract_json_object(reply)?;
    let raw_issues = match value.get("issues") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| serde_json::from_value::<RawIssue>(item.clone()).ok())
            .collect(),
        _ => Vec::new(),
    };
    Some(
        raw_issues
            .into_iter()
            .filter(|raw| !raw.description.trim().is_empty())
            .map(|raw| StructureIssue {
                category: IssueCategory::parse(&raw.category),
                severity: Severity::parse(&raw.severity),
                description: raw.description,
                affected_paths: raw.affected_paths,
                suggestion: raw.suggestion,
            })
            .collect(),
    )
}

fn recommendations(issues: &[StructureIssue]) -> Vec<String> {
    let mut by_category: BTreeMap<IssueCategory, Vec<&StructureIssue>> = BTreeMap::new();
    for issue in issues {
        by_category.entry(issue.category).or_default().push(issue);
    }
    by_category
        .values()
        .filter_map(|group| {
            group
                .iter()
                .find(|i| i.severity >= Severity::High && !i.suggestion.is_empty())
                .map(|i| i.suggestion.clone())
        })
        .collect()
}

fn check_hierarchy(tree: &StructureNode) -> (Vec<StructureIssue>, f64) {
    let mut issues = Vec::new();
    let mut score = 100.0;

    let root_files = tree.root_file_count();
    if root_files > MAX_ROOT_FILES {
        score -= 10.0;
        issues.push(StructureIssue {
            category: IssueCategory::Hierarchy,
            severity: Severity::Medium,
            description: format!("{root_files} files sit directly at the project root"),
            affected_paths: tree
                .children()
                .iter()
                .filter(|c| matches!(c, StructureNode::File { .. }))
                .map(|c| c.name().to_string())
                .collect(),
            suggestion: "Group root-level files into purpose-specific folders".into(),
        });
    }

    let depth = tree.max_depth();
    if depth > MAX_DEPTH {
        score -= 5.0;
        issues.push(StructureIssue {
            category: IssueCategory::Hierarchy,
            severity: Severity::Low,
            description: format!("nesting reaches depth {depth} (limit {MAX_DEPTH})"),
            affected_paths: Vec::new(),
            suggestion: "Flatten deeply nested folders".into(),
        });
    }
    (issues, score)
}

fn check_naming_conventions(files: &[String]) -> (Vec<StructureIssue>, f64) {
    let mut by_ext: BTreeMap<String, (Vec<&str>, Vec<&str>)> = BTreeMap::new();
    for path in files {
        let stem = file_stem(path);
        let (snake, kebab) = (stem.contains('_'), stem.contains('-'));
        if snake == kebab {
            continue;
        }
        let entry = by_ext.entry(extension(path)).or_default();
        if snake {
            entry.0.push(path);
        } else {
            entry.1.push(path);
        }
    }

    let mut issues = Vec::new();
    let mut score = 100.0;
    for (ext, (snake, kebab)) in by_ext {
        if snake.is_empty() || kebab.is_empty() {
            continue;
        }
        score -= 5.0;
        let label = if ext.is_empty() { "extensionless" } else { ext.as_str() };
        issues.push(StructureIssue {
            category: IssueCategory::Naming,
            severity: Severity::Low,
            description: format!("{label} files mix snake_case and kebab-case names"),
            affected_paths: snake.iter().chain(kebab.iter()).map(|p| (*p).to_string()).collect(),
            suggestion: format!("Use one naming convention for {label} files"),
        });
    }
    (issues, score)
}

fn check_naming_conflicts(files: &[String], folders: &[String]) -> (Vec<StructureIssue>, f64) {
    let mut file_names: HashMap<String, Vec<&str>> = HashMap::new();
    for path in files {
        file_names.entry(file_stem(path).to_lowercase()).or_default().push(path);
    }
    let mut folder_names: HashMap<String, Vec<&str>> = HashMap::new();
    for path in folders {
        folder_names.entry(file_name(path).to_lowercase()).or_default().push(path);
    }

    let colliding: BTreeSet<&String> =
        file_names.keys().filter(|name| folder_names.contains_key(*name)).collect();
    if colliding.is_empty() {
        return (Vec::new(), 100.0);
    }

    let mut affected = Vec::new();
    for name in &colliding {
        affected.extend(file_names[*name].iter().map(|p| (*p).to_string()));
        affected.extend(folder_names[*name].iter().map(|p| (*p).to_string()));
    }
    let names: Vec<&str> = colliding.iter().map(|s| s.as_str()).collect();
    let issue = StructureIssue {
        category: IssueCategory::Conflict,
        severity: Severity::Critical,
        description: format!("files and folders share names: {}", names.join(", ")),
        affected_paths: affected,
        suggestion: "Rename the file or the folder so imports resolve unambiguously".into(),
    };
    (vec![issue], 80.0)
}

fn check_completeness(files: &[String]) -> (Vec<StructureIssue>, f64) {
    let lowered: Vec<String> = files.iter().map(|p| p.to_lowercase()).collect();
    let mut issues = Vec::new();
    let mut score = 100.0;

    for (category, keywords) in COMPLETENESS {
        let present = lowered.iter().any(|path| keywords.iter().any(|k| path.contains(k)));
        if present {
            continue;
        }
        let optional = *category == "license";
        if !optional {
            score -= 5.0;
        }
        issues.push(StructureIssue {
            category: IssueCategory::Completeness,
            severity: if optional { Severity::Low } else { Severity::Medium },
            description: format!("no {category} file found"),
            affected_paths: Vec::new(),
            suggestion: format!("Add {category} files to the project"),
        });
    }
    (issues, score)
}

fn check_organization(folders: &[String]) -> (Vec<StructureIssue>, f64) {
    let names: Vec<String> = folders.iter().map(|p| file_name(p).to_lowercase()).collect();
    let mut issues = Vec::new();
    let mut score = 100.0;

    if !names.iter().any(|n| n.contains("test")) {
        score -= 3.0;
        issues.push(StructureIssue {
            category: IssueCategory::Organization,
            severity: Severity::Low,
            description: "no test folder".into(),
            affected_paths: Vec::new(),
            suggestion: "Add a tests folder".into(),
        });
    }
    if !names.iter().any(|n| n.contains("config") || n.contains("conf")) {
        score -= 3.0;
        issues.push(StructureIssue {
            category: IssueCategory::Organization,
            severity: Severity::Low,
            description: "no configuration folder".into(),
            affected_paths: Vec::new(),
            suggestion: "Keep configuration in a config folder".into(),
        });
    }
    (issues, score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cassette::format::Cassette;

    fn tidy_tree() -> StructureNode {
        StructureNode::from_paths(
            "demo",
            [
                "README.md",
                "LICENSE",
                "requirements.txt",
                "app/main.py",
                "app/models.py",
                "config/settings.py",
                "tests/test_main.py",
                "docs/guide.md",
            ],
        )
    }

    fn component(report: &HeuristicReport, name: &str) -> f64 {
        report.components.iter().find(|(k, _)| *k == name).map(|(_, v)| *v).unwrap()
    }

    #[test]
    fn six_root_files_cost_ten_hierarchy_points() {
        let tree = StructureNode::from_paths(
            "demo",
            ["a.py", "b.py", "c.py", "d.py", "e.py", "f.py", "tests/test_a.py"],
        );
        let report = review_heuristics(&tree);
        assert_eq!(component(&report, "hierarchy"), 90.0);
        let issue = report.issues.iter().find(|i| i.category == IssueCategory::Hierarchy).unwrap();
        assert_eq!(issue.severity, Severity::Medium);
        assert_eq!(issue.affected_paths.len(), 6);
    }

    #[test]
    fn deep_nesting_is_flagged_low() {
        let tree = StructureNode::from_paths("demo", ["a/b/c/d/e/f/g.py"]);
        let report = review_heuristics(&tree);
        assert_eq!(component(&report, "hierarchy"), 95.0);
    }

    #[test]
    fn mixed_conventions_are_flagged_per_extension() {
        let tree = StructureNode::from_paths(
            "demo",
            ["src/user_model.py", "src/order-model.py", "web/app_main.js", "web/app-util.js"],
        );
        let report = review_heuristics(&tree);
        assert_eq!(component(&report, "naming_conventions"), 90.0);
    }

    #[test]
    fn file_folder_collision_is_critical_and_blocks_passed() {
        let mut paths = vec![
            "README.md",
            "LICENSE",
            "requirements.txt",
            "app/main.py",
            "config/settings.py",
            "tests/test_main.py",
            "docs/guide.md",
        ];
        paths.push("app.py");
        let tree = StructureNode::from_paths("demo", paths);
        let review = StructureReview::heuristic_only(&tree);

        let conflict =
            review.issues.iter().find(|i| i.category == IssueCategory::Conflict).unwrap();
        assert_eq!(conflict.severity, Severity::Critical);
        assert!(conflict.description.contains("app"));
        assert_eq!(review.metric_breakdown["naming_conflicts"], 80.0);
        // mean 96, minus 15 for the critical issue
        assert_eq!(review.quality_score, 81.0);
        assert_eq!(review.status, ReviewStatus::NeedsImprovement);
        assert_eq!(
            review.recommendations,
            vec!["Rename the file or the folder so imports resolve unambiguously"]
        );
    }

    #[test]
    fn collision_check_is_case_insensitive() {
        let tree = StructureNode::from_paths("demo", ["Utils.py", "utils/helpers.py"]);
        let report = review_heuristics(&tree);
        assert_eq!(component(&report, "naming_conflicts"), 80.0);
    }

    #[test]
    fn missing_license_is_not_penalized() {
        let tree = StructureNode::from_paths(
            "demo",
            ["README.md", "pyproject.toml", "tests/test_x.py", "docs/index.md"],
        );
        let report = review_heuristics(&tree);
        assert_eq!(component(&report, "completeness"), 100.0);
        assert!(report.issues.iter().any(|i| i.description == "no license file found"));
    }

    #[test]
    fn tidy_tree_passes() {
        let review = StructureReview::heuristic_only(&tidy_tree());
        assert_eq!(review.status, ReviewStatus::Passed);
        assert_eq!(review.quality_score, 100.0);
        assert!(review.issues.is_empty());
        assert_eq!(review.confidence, 0.6);
    }

    #[test]
    fn score_is_clamped_at_zero() {
        let heuristics = review_heuristics(&tidy_tree());
        let subjective = (0..10)
            .map(|n| StructureIssue {
                category: IssueCategory::Organization,
                severity: Severity::Critical,
                description: format!("problem {n}"),
                affected_paths: Vec::new(),
                suggestion: String::new(),
            })
            .collect();
        let review = StructureReview::from_parts(heuristics, subjective, true);
        assert_eq!(review.quality_score, 0.0);
        assert_eq!(review.status, ReviewStatus::Critical);
    }

    #[tokio::test]
    async fn subjective_high_issue_lowers_score() {
        let reply = r#"{"issues": [{"category": "organization", "severity": "high",
            "description": "models mixed with views", "affected_paths": ["app/models.py"],
            "suggestion": "Split models into their own package"}]}"#;
        let ctx = ServiceContext::with_chat_cassette(&Cassette::scripted_chat("sr", &[reply]));
        let review = review_structure(&ctx, &SynthConfig::default(), "# Demo", &tidy_tree())
            .await
            .unwrap();
        assert_eq!(review.quality_score, 95.0);
        assert_eq!(review.confidence, 0.9);
        assert_eq!(review.recommendations, vec!["Split models into their own package"]);
    }

    #[tokio::test]
    async fn non_json_reply_contributes_no_issues() {
        let ctx = ServiceContext::with_chat_cassette(&Cassette::scripted_chat(
            "sr",
            &["Looks fine to me!"],
        ));
        let review = review_structure(&ctx, &SynthConfig::default(), "# Demo", &tidy_tree())
            .await
            .unwrap();
        assert!(review.issues.is_empty());
        assert_eq!(review.confidence, 0.6);
    }
}
