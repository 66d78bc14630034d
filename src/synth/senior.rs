//! Whole-project senior review.
//!
//! The review never fails: transport errors and unparsable replies become a
//! `Failed` result. Parsing runs as an explicit sequence
//! `Parse -> ReformatRetry -> Failed`, where the retry asks the model to
//! convert its own previous reply into the required JSON shape.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::config::SynthConfig;
use crate::context::ServiceContext;
use crate::ports::llm::ChatRole;
use crate::synth::chat;
use crate::synth::extract::{extract_json_object, truncate_chars};
use crate::synth::model::{GeneratedFiles, ProjectSpec};
use crate::synth::structure::StructureNode;

/// Summary used when neither the reply nor the reformatted reply parses.
pub const INVALID_JSON_SUMMARY: &str = "LLM returned invalid JSON review.";
const DEFAULT_SUMMARY: &str = "Review completed.";
const FILE_EXCERPT_CHARS: usize = 1_500;
const TOTAL_EXCERPT_CHARS: usize = 24_000;

/// Overall verdict of a senior review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeniorStatus {
    /// The project is acceptable.
    Passed,
    /// The project needs work (or could not be reviewed).
    Failed,
}

/// One finding from the senior review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewIssue {
    /// What is wrong.
    pub description: String,
    /// Severity label as given by the reviewer.
    pub severity: String,
    /// How to fix it.
    pub recommendation: String,
    /// Affected file; `None` for project-wide issues.
    pub file: Option<String>,
}

/// Structured outcome of one senior review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeniorReviewResult {
    /// Verdict.
    pub status: SeniorStatus,
    /// One-paragraph summary.
    pub summary: String,
    /// Findings.
    pub issues: Vec<ReviewIssue>,
}

impl SeniorReviewResult {
    /// The fixed result for a reply that could not be parsed even after the
    /// reformat retry.
    #[must_use]
    pub fn invalid_json() -> Self {
        Self { status: SeniorStatus::Failed, summary: INVALID_JSON_SUMMARY.into(), issues: Vec::new() }
    }
}

/// One senior-review cycle of the issue-refinement loop. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefinementAttempt {
    /// 1-based review attempt.
    pub attempt_number: u32,
    /// Issues the review raised.
    pub issues: Vec<ReviewIssue>,
    /// Files whose refined content was accepted.
    pub files_touched: Vec<String>,
    /// Review verdict for this attempt.
    pub result_status: SeniorStatus,
}

/// Reviews the whole project. Always returns a well-formed result.
pub async fn review_project(
    ctx: &ServiceContext,
    config: &SynthConfig,
    spec: &ProjectSpec,
    readme: &str,
    structure: &StructureNode,
    files: &GeneratedFiles,
    attempt: u32,
) -> SeniorReviewResult {
    let prompt = build_review_prompt(spec, readme, structure, files, attempt, config);
    let raw = match chat::ask(ctx, config, ChatRole::SeniorReview, REVIEW_SYSTEM, prompt).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!(attempt, error = %e, "senior review request failed");
            return SeniorReviewResult {
                status: SeniorStatus::Failed,
                summary: format!("Senior review could not be completed: {e}"),
                issues: Vec::new(),
            };
        }
    };

    let result = parse_with_repair(ctx, config, raw).await;
    info!(
        attempt,
        status = ?result.status,
        issues = result.issues.len(),
        "senior review finished"
    );
    result
}

/// States of the reply-parsing sequence.
enum ParseStage {
    Parse(String),
    ReformatRetry(String),
    Failed,
}

async fn parse_with_repair(
    ctx: &ServiceContext,
    config: &SynthConfig,
    raw: String,
) -> SeniorReviewResult {
    let mut stage = ParseStage::Parse(raw);
    loop {
        stage = match stage {
            ParseStage::Parse(raw) => match parse_review(&raw) {
                Some(result) => return result,
                None => {
                    warn!("senior review reply was not JSON; asking for a reformat");
                    ParseStage::ReformatRetry(raw)
                }
            },
            ParseStage::ReformatRetry(raw) => {
                let prompt = build_formatter_prompt(&raw);
                match chat::ask(ctx, config, ChatRole::SeniorReview, FORMATTER_SYSTEM, prompt)
                    .await
                {
                    Ok(reformatted) => match parse_review(&reformatted) {
                        Some(result) => return result,
                        None => ParseStage::Failed,
                    },
                    Err(e) => {
                        warn!(error = %e, "reformat request failed");
                        ParseStage::Failed
                    }
                }
            }
            ParseStage::Failed => {
                warn!("senior review JSON could not be recovered");
                return SeniorReviewResult::invalid_json();
            }
        };
    }
}

/// Parses a review reply, defaulting missing keys. `None` when the reply
/// holds no JSON object.
#[must_use]
pub fn parse_review(raw: &str) -> Option<SeniorReviewResult> {
    let value = extract_json_object(raw)?;

    let status = match value.get("status").and_then(Value::as_str) {
        Some(s) if matches!(s.trim().to_lowercase().as_str(), "passed" | "pass" | "approved") => {
            SeniorStatus::Passed
        }
        _ => SeniorStatus::Failed,
    };
    let summary = value
        .get("summary")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(DEFAULT_SUMMARY)
        .to_string();
    let issues = value
        .get("issues")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(parse_issue).collect())
        .unwrap_or_default();

    Some(SeniorReviewResult { status, summary, issues })
}

fn parse_issue(item: &Value) -> Option<ReviewIssue> {
    let text = |keys: &[&str]| {
        keys.iter()
            .find_map(|k| item.get(*k).and_then(Value::as_str))
            .map(str::trim)
            .unwrap_or_default()
            .to_string()
    };
    if let Some(description) = item.as_str() {
        return Some(ReviewIssue {
            description: description.to_string(),
            severity: "medium".into(),
            recommendation: String::new(),
            file: None,
        });
    }
    let description = text(&["description", "issue", "problem"]);
    if description.is_empty() {
        return None;
    }
    let severity = text(&["severity", "priority"]);
    let file = text(&["file", "path", "file_path"]);
    Some(ReviewIssue {
        description,
        severity: if severity.is_empty() { "medium".into() } else { severity.to_lowercase() },
        recommendation: text(&["recommendation", "suggestion", "fix"]),
        file: match file.as_str() {
            "" | "N/A" | "n/a" | "none" | "project" => None,
            path => Some(path.trim_start_matches("./").to_string()),
        },
    })
}

/// Renders issues in the artifact grammar consumed by downstream tooling.
#[must_use]
pub fn render_issues_markdown(issues: &[ReviewIssue]) -> String {
    let mut out = String::new();
    for (idx, issue) in issues.iter().enumerate() {
        if idx > 0 {
            out.push('\n');
        }
        let _ = writeln!(out, "## Issue {}: [{}]", idx + 1, issue.severity);
        let _ = writeln!(out, "**File:** {}", issue.file.as_deref().unwrap_or("N/A"));
        let _ = writeln!(out, "**Description:** {}", single_line(&issue.description));
        let _ = writeln!(out, "**Recommendation:** {}", single_line(&issue.recommendation));
    }
    out
}

fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

const REVIEW_SYSTEM: &str = "You are a senior software engineer reviewing a generated \
    project for correctness, completeness and consistency between files. Respond with a \
    single JSON object and nothing else.";

const FORMATTER_SYSTEM: &str = "You are a JSON formatter. Convert the given review into \
    the requested JSON shape. Respond with the JSON object only.";

fn build_review_prompt(
    spec: &ProjectSpec,
    readme: &str,
    structure: &StructureNode,
    files: &GeneratedFiles,
    attempt: u32,
    config: &SynthConfig,
) -> String {
    let mut prompt = String::new();
    let _ = write!(
        prompt,
        "## Project\n\nName: {}\nDescription: {}\nReview attempt: {attempt}\n\n",
        spec.name, spec.description
    );
    let _ = write!(
        prompt,
        "## README (excerpt)\n\n{}\n\n## Structure\n\n{}\n## Files\n\n",
        truncate_chars(readme, config.generation.readme_excerpt_chars),
        structure.render()
    );
    for record in files.iter() {
        let _ = writeln!(prompt, "- {} ({} chars)", record.path, record.content.chars().count());
    }

    prompt.push_str("\n## File excerpts\n\n");
    let mut budget = TOTAL_EXCERPT_CHARS;
    for record in files.iter() {
        if budget == 0 {
            break;
        }
        let excerpt = truncate_chars(&record.content, FILE_EXCERPT_CHARS.min(budget));
        budget = budget.saturating_sub(excerpt.chars().count());
        let _ = write!(prompt, "### {}\n{excerpt}\n\n", record.path);
    }

    prompt.push_str(REVIEW_SHAPE);
    prompt
}

const REVIEW_SHAPE: &str = "## Instructions\n\n\
    Respond in the following JSON format (no markdown fences):\n\
    {\n  \"status\": \"passed|failed\",\n  \"summary\": \"<one paragraph>\",\n  \
    \"issues\": [\n    {\n      \"description\": \"<what is wrong>\",\n      \
    \"severity\": \"low|medium|high|critical\",\n      \
    \"recommendation\": \"<how to fix>\",\n      \
    \"file\": \"<relative path or N/A>\"\n    }\n  ]\n}\n\
    Use \"passed\" only when no issue needs fixing.\n";

fn build_formatter_prompt(previous: &str) -> String {
    let mut prompt = String::new();
    let _ = write!(prompt, "## Review text\n\n{previous}\n\n");
    prompt.push_str(REVIEW_SHAPE);
    prompt
}
