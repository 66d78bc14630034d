//! Per-file content generation with output validation and bounded retries.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::config::SynthConfig;
use crate::context::ServiceContext;
use crate::error::SynthResult;
use crate::ports::llm::ChatRole;
use crate::synth::chat;
use crate::synth::extract::{strip_code_fences, truncate_chars};
use crate::synth::model::{extension, file_name, ProjectSpec};
use crate::synth::structure::StructureNode;

const GENERATE_SYSTEM: &str = "You are an expert software engineer writing one file of a \
    larger project. Output only the raw file content with no markdown fences, explanations \
    or commentary.";

const FRONTEND_DIRS: &[&str] = &["frontend", "client", "web", "ui"];
const BACKEND_DIRS: &[&str] = &["backend", "server", "api"];

/// Which side of a split project a `package.json` belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppType {
    /// Browser application.
    Frontend,
    /// Node server.
    Backend,
}

/// Resolves the app type of a `package.json` from its leading directory.
#[must_use]
pub fn resolve_app_type(path: &str) -> Option<AppType> {
    let (first, _) = path.split_once('/')?;
    let first = first.to_lowercase();
    if FRONTEND_DIRS.contains(&first.as_str()) {
        Some(AppType::Frontend)
    } else if BACKEND_DIRS.contains(&first.as_str()) {
        Some(AppType::Backend)
    } else {
        None
    }
}

/// Everything the generator needs to write one file.
pub struct FileRequest<'a> {
    /// Relative path of the file to write.
    pub path: &'a str,
    /// The project being built.
    pub spec: &'a ProjectSpec,
    /// Planner README.
    pub readme: &'a str,
    /// Structure tree.
    pub structure: &'a StructureNode,
    /// Selected context files, most relevant first.
    pub related: &'a [(&'a str, &'a str)],
}

/// Result of generating one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Valid content was produced.
    Generated(String),
    /// The file was skipped without calling the model.
    Skipped {
        /// Why it was skipped.
        reason: String,
    },
    /// Every attempt produced invalid output.
    Exhausted,
}

/// Generates one file, retrying on invalid output up to
/// `generation.max_file_retries` attempts.
///
/// # Errors
///
/// Returns an error if a chat call fails or times out.
pub async fn generate_file(
    ctx: &ServiceContext,
    config: &SynthConfig,
    request: &FileRequest<'_>,
) -> SynthResult<FileOutcome> {
    let is_package_json = file_name(request.path) == "package.json";
    let app_type = if is_package_json {
        match resolve_app_type(request.path) {
            Some(app_type) => Some(app_type),
            None => {
                warn!(
                    path = request.path,
                    "cannot tell whether package.json is frontend or backend; skipping"
                );
                return Ok(FileOutcome::Skipped {
                    reason: "package.json app type could not be resolved from its path".into(),
                });
            }
        }
    } else {
        None
    };

    let max_attempts = config.generation.max_file_retries;
    let mut last_problem: Option<String> = None;
    for attempt in 1..=max_attempts {
        let prompt = build_prompt(request, app_type, config, last_problem.as_deref());
        let reply =
            chat::ask(ctx, config, ChatRole::FileGeneration, GENERATE_SYSTEM, prompt).await?;
        let content = strip_code_fences(&reply);

        match validate(&content, is_package_json) {
            Ok(()) => {
                debug!(path = request.path, attempt, "file generated");
                let mut content = content;
                content.push('\n');
                return Ok(FileOutcome::Generated(content));
            }
            Err(problem) => {
                warn!(path = request.path, attempt, problem = %problem, "generated content rejected");
                last_problem = Some(problem);
            }
        }
    }

    error!(path = request.path, attempts = max_attempts, "file generation exhausted retries");
    Ok(FileOutcome::Exhausted)
}

fn validate(content: &str, is_package_json: bool) -> Result<(), String> {
    if content.trim().is_empty() {
        return Err("the reply was empty".into());
    }
    if is_package_json {
        match serde_json::from_str::<Value>(content) {
            Ok(Value::Object(_)) => {}
            Ok(_) => return Err("package.json must be a JSON object".into()),
            Err(e) => return Err(format!("package.json is not valid JSON: {e}")),
        }
    }
    Ok(())
}

/// Language-specific guidance keyed by extension.
fn language_instructions(path: &str) -> Option<&'static str> {
    let text = match extension(path).as_str() {
        ".py" => "Write idiomatic Python 3 following PEP 8, with type hints and docstrings on public functions.",
        ".js" | ".mjs" | ".cjs" => "Write modern JavaScript (ES2020+) with const/let, async/await and clear module exports.",
        ".jsx" => "Write a React component in JavaScript using function components and hooks.",
        ".ts" => "Write strict TypeScript with explicit types on exported functions; avoid `any`.",
        ".tsx" => "Write a React component in strict TypeScript using function components and hooks.",
        ".go" => "Write idiomatic Go: gofmt formatting, explicit error returns, no panics for control flow.",
        ".rs" => "Write idiomatic Rust: Result-based error handling, no unwrap in library code.",
        ".rb" => "Write idiomatic Ruby following the community style guide.",
        ".java" => "Write idiomatic Java 17 with clear package declarations.",
        ".html" => "Write semantic HTML5 that links the project's scripts and styles by their relative paths.",
        ".css" | ".scss" | ".less" => "Write maintainable styles with consistent class naming.",
        ".sql" => "Write portable SQL with explicit column types and constraints.",
        ".sh" => "Write a POSIX-compatible shell script with `set -eu`.",
        ".yml" | ".yaml" => "Write valid YAML.",
        ".toml" => "Write valid TOML.",
        ".md" => "Write clear Markdown documentation.",
        _ => return None,
    };
    Some(text)
}

fn build_prompt(
    request: &FileRequest<'_>,
    app_type: Option<AppType>,
    config: &SynthConfig,
    last_problem: Option<&str>,
) -> String {
    let excerpt_chars = config.generation.context_excerpt_chars;
    let mut prompt = String::new();
    let _ = write!(
        prompt,
        "## Project\n\nName: {}\nDescription: {}\n\n## README (excerpt)\n\n{}\n\n",
        request.spec.name,
        request.spec.description,
        truncate_chars(request.readme, config.generation.readme_excerpt_chars)
    );
    let _ = write!(prompt, "## Structure\n\n{}\n", request.structure.render());

    if !request.related.is_empty() {
        prompt.push_str("## Related files already written\n\n");
        for (path, content) in request.related {
            let _ = write!(prompt, "### {path}\n{}\n\n", truncate_chars(content, excerpt_chars));
        }
    }

    let _ = write!(prompt, "## Task\n\nWrite the complete content of `{}`.\n", request.path);
    if let Some(instructions) = language_instructions(request.path) {
        let _ = writeln!(prompt, "{instructions}");
    }
    match app_type {
        Some(AppType::Frontend) => prompt.push_str(
            "This package.json belongs to the frontend application: include build/dev scripts \
            and the browser dependencies its source files import. Output valid JSON only.\n",
        ),
        Some(AppType::Backend) => prompt.push_str(
            "This package.json belongs to the backend server: include a start script and the \
            server dependencies its source files import. Output valid JSON only.\n",
        ),
        None => {}
    }
    prompt.push_str("Make it consistent with the related files and the structure above.\n");
    if let Some(problem) = last_problem {
        let _ = writeln!(prompt, "\nYour previous attempt was rejected: {problem}. Fix this.");
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cassette::format::Cassette;

    fn spec() -> ProjectSpec {
        ProjectSpec { description: "shop".into(), name: "shop".into() }
    }

    async fn generate(path: &str, cassette: &Cassette) -> FileOutcome {
        let ctx = ServiceContext::with_chat_cassette(cassette);
        let spec = spec();
        let tree = StructureNode::from_paths("shop", [path]);
        let request =
            FileRequest { path, spec: &spec, readme: "# Shop", structure: &tree, related: &[] };
        generate_file(&ctx, &SynthConfig::default(), &request).await.unwrap()
    }

    #[test]
    fn app_type_comes_from_the_leading_directory() {
        assert_eq!(resolve_app_type("frontend/package.json"), Some(AppType::Frontend));
        assert_eq!(resolve_app_type("Client/package.json"), Some(AppType::Frontend));
        assert_eq!(resolve_app_type("server/package.json"), Some(AppType::Backend));
        assert_eq!(resolve_app_type("package.json"), None);
        assert_eq!(resolve_app_type("tools/package.json"), None);
    }

    #[tokio::test]
    async fn strips_fences_from_generated_code() {
        let outcome = generate("app.py", &Cassette::scripted_chat("g", &["```python\nprint(1)\n```"])).await;
        assert_eq!(outcome, FileOutcome::Generated("print(1)\n".into()));
    }

    #[tokio::test]
    async fn invalid_package_json_is_retried() {
        let cassette = Cassette::scripted_chat("g", &["{broken", r#"{"name": "web"}"#]);
        let outcome = generate("web/package.json", &cassette).await;
        assert_eq!(outcome, FileOutcome::Generated("{\"name\": \"web\"}\n".into()));
    }

    #[tokio::test]
    async fn exhausting_retries_yields_no_content() {
        let cassette = Cassette::scripted_chat("g", &["", "   ", "```\n```"]);
        assert_eq!(generate("app.py", &cassette).await, FileOutcome::Exhausted);
    }

    #[tokio::test]
    async fn unresolvable_package_json_is_skipped_without_a_call() {
        let cassette = Cassette::new("g");
        let ctx = ServiceContext::with_chat_cassette(&cassette);
        let spec = spec();
        let tree = StructureNode::from_paths("shop", ["package.json"]);
        let request = FileRequest {
            path: "package.json",
            spec: &spec,
            readme: "",
            structure: &tree,
            related: &[],
        };
        let outcome = generate_file(&ctx, &SynthConfig::default(), &request).await.unwrap();
        // an empty cassette panics on any chat call
        assert!(matches!(outcome, FileOutcome::Skipped { .. }));
    }

    #[test]
    fn prompt_carries_context_and_feedback() {
        let spec = spec();
        let tree = StructureNode::from_paths("shop", ["api/routes.py", "api/models.py"]);
        let related = [("api/models.py", "class Item: ...")];
        let request = FileRequest {
            path: "api/routes.py",
            spec: &spec,
            readme: "# Shop",
            structure: &tree,
            related: &related,
        };
        let prompt = build_prompt(&request, None, &SynthConfig::default(), Some("the reply was empty"));
        assert!(prompt.contains("### api/models.py\nclass Item: ..."));
        assert!(prompt.contains("PEP 8"));
        assert!(prompt.contains("previous attempt was rejected: the reply was empty"));
    }
}
