//! Single-file refinement with a content-degradation guard.

use std::fmt::Write as _;

use tracing::{debug, warn};

use crate::config::SynthConfig;
use crate::context::ServiceContext;
use crate::error::SynthResult;
use crate::ports::llm::ChatRole;
use crate::synth::chat;
use crate::synth::extract::strip_code_fences;
use crate::synth::senior::ReviewIssue;

const REFINE_SYSTEM: &str = "You are an expert software engineer improving one file of a \
    project. Output only the complete, raw file content with no markdown fences or commentary.";

/// Asks the model for an improved version of `path`.
///
/// With `issues`, the prompt enumerates the review findings to fix;
/// without, it asks for a general quality pass. Returns `None` when the
/// reply is no longer than half the current content, in which case the
/// caller keeps what it has.
///
/// # Errors
///
/// Returns an error if the chat call fails or times out.
pub async fn refine_file(
    ctx: &ServiceContext,
    config: &SynthConfig,
    path: &str,
    current: &str,
    readme_excerpt: &str,
    issues: Option<&[ReviewIssue]>,
) -> SynthResult<Option<String>> {
    let prompt = match issues {
        Some(issues) => build_issue_prompt(path, current, readme_excerpt, issues),
        None => build_generic_prompt(path, current, readme_excerpt),
    };
    let reply = chat::ask(ctx, config, ChatRole::Refinement, REFINE_SYSTEM, prompt).await?;
    let refined = strip_code_fences(&reply);

    if !keeps_enough(current, &refined) {
        warn!(
            path,
            before = current.chars().count(),
            after = refined.chars().count(),
            "refinement discarded: reply shrank the file by more than half"
        );
        return Ok(None);
    }
    debug!(path, "refinement accepted");
    Ok(Some(ensure_trailing_newline(refined)))
}

/// Whether `refined` is longer than half of `current`.
#[must_use]
pub fn keeps_enough(current: &str, refined: &str) -> bool {
    refined.chars().count() * 2 > current.chars().count()
}

fn ensure_trailing_newline(mut content: String) -> String {
    if !content.is_empty() && !content.ends_with('\n') {
        content.push('\n');
    }
    content
}

fn build_generic_prompt(path: &str, current: &str, readme_excerpt: &str) -> String {
    let mut prompt = String::new();
    let _ = write!(prompt, "## Project README (excerpt)\n\n{readme_excerpt}\n\n");
    let _ = write!(prompt, "## File: {path}\n\n{current}\n\n");
    prompt.push_str(
        "## Instructions\n\n\
        Improve this file: fix bugs, complete missing logic, remove placeholders, and keep it \
        consistent with the README. Preserve all existing functionality. Return the whole file.\n",
    );
    prompt
}

fn build_issue_prompt(
    path: &str,
    current: &str,
    readme_excerpt: &str,
    issues: &[ReviewIssue],
) -> String {
    let mut prompt = String::new();
    let _ = write!(prompt, "## Project README (excerpt)\n\n{readme_excerpt}\n\n");
    let _ = write!(prompt, "## File: {path}\n\n{current}\n\n## Review issues to fix\n\n");
    for (idx, issue) in issues.iter().enumerate() {
        let _ = writeln!(prompt, "{}. [{}] {}", idx + 1, issue.severity, issue.description);
        let _ = writeln!(prompt, "   Recommendation: {}", issue.recommendation);
        let _ = writeln!(prompt, "   File: {}", issue.file.as_deref().unwrap_or("project-wide"));
    }
    prompt.push_str(
        "\n## Instructions\n\n\
        Rewrite this file so every issue above that concerns it is resolved. Preserve all \
        other functionality. Return the whole file.\n",
    );
    prompt
}
