//! README planning and structure proposal.

use std::fmt::Write as _;

use tracing::info;

use crate::config::SynthConfig;
use crate::context::ServiceContext;
use crate::error::{SynthError, SynthResult};
use crate::ports::llm::ChatRole;
use crate::synth::chat;
use crate::synth::extract::{strip_code_fences, truncate_chars};
use crate::synth::model::ProjectSpec;
use crate::synth::structure::StructureNode;
use crate::synth::structure_review::StructureReview;

const README_SYSTEM: &str = "You are a senior software architect. Write the README.md for a \
    new project as raw Markdown, with no surrounding code fence.";

const STRUCTURE_SYSTEM: &str = "You are a senior software architect designing a project's \
    file layout. Respond with a single JSON object and nothing else.";

/// Turns the project description into a README.
///
/// # Errors
///
/// Returns [`SynthError::EmptyReadme`] for an empty reply, or the chat error.
pub async fn plan_readme(
    ctx: &ServiceContext,
    config: &SynthConfig,
    spec: &ProjectSpec,
) -> SynthResult<String> {
    let mut prompt = String::new();
    let _ = write!(
        prompt,
        "## Project\n\nName: {}\nDescription: {}\n\n",
        spec.name, spec.description
    );
    prompt.push_str(
        "## Instructions\n\n\
        Write a README.md covering: overview, features, tech stack, project layout, setup, \
        usage, configuration and testing. Choose one concrete technology stack and name the \
        main dependencies; the rest of the project will be generated from this README.\n",
    );

    let reply = chat::ask(ctx, config, ChatRole::Planner, README_SYSTEM, prompt).await?;
    let mut readme = strip_code_fences(&reply);
    if readme.is_empty() {
        return Err(SynthError::EmptyReadme);
    }
    readme.push('\n');
    info!(chars = readme.chars().count(), "README planned");
    Ok(readme)
}

/// Proposes a structure tree for the README. With `feedback`, the prompt
/// includes the previous review so the model can fix what it flagged.
///
/// # Errors
///
/// Returns [`SynthError::InvalidStructure`] when the reply yields no files,
/// or the chat error.
pub async fn plan_structure(
    ctx: &ServiceContext,
    config: &SynthConfig,
    spec: &ProjectSpec,
    readme: &str,
    feedback: Option<(&StructureNode, &StructureReview)>,
) -> SynthResult<StructureNode> {
    let prompt = build_structure_prompt(spec, readme, feedback, config);
    let reply = chat::ask(ctx, config, ChatRole::Structure, STRUCTURE_SYSTEM, prompt).await?;
    let tree = StructureNode::parse_reply(&spec.name, &reply)?;
    info!(files = tree.file_paths().len(), "structure proposed");
    Ok(tree)
}

fn build_structure_prompt(
    spec: &ProjectSpec,
    readme: &str,
    feedback: Option<(&StructureNode, &StructureReview)>,
    config: &SynthConfig,
) -> String {
    let mut prompt = String::new();
    let _ = write!(
        prompt,
        "## Project\n\nName: {}\nDescription: {}\n\n## README\n\n{}\n\n",
        spec.name,
        spec.description,
        truncate_chars(readme, config.generation.readme_excerpt_chars * 2)
    );

    if let Some((previous, review)) = feedback {
        let _ = write!(
            prompt,
            "## Previous proposal (score {:.0}/100)\n\n{}\n## Problems to fix\n\n",
            review.quality_score,
            previous.render()
        );
        for issue in &review.issues {
            let _ = writeln!(
                prompt,
                "- [{:?}] {} -> {}",
                issue.severity, issue.description, issue.suggestion
            );
        }
        prompt.push('\n');
    }

    prompt.push_str(
        "## Instructions\n\n\
        Propose the complete file layout. Folders are JSON objects, files are keys with a \
        null value (or a one-line string describing the file). Do not include the project \
        folder itself. Example:\n\
        {\"README.md\": null, \"src\": {\"main.py\": \"entry point\"}, \"tests\": {\"test_main.py\": null}}\n\
        Never give a file and a folder the same name. Include a README.md, the dependency \
        manifest for the chosen stack, configuration, tests and docs.\n",
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cassette::format::Cassette;

    fn spec() -> ProjectSpec {
        ProjectSpec { description: "A tiny URL shortener".into(), name: "shorty".into() }
    }

    #[tokio::test]
    async fn readme_is_unfenced() {
        let ctx = ServiceContext::with_chat_cassette(&Cassette::scripted_chat(
            "p",
            &["```markdown\n# Shorty\n\nShort links.\n```"],
        ));
        let readme = plan_readme(&ctx, &SynthConfig::default(), &spec()).await.unwrap();
        assert_eq!(readme, "# Shorty\n\nShort links.\n");
    }

    #[tokio::test]
    async fn empty_readme_is_an_error() {
        let ctx = ServiceContext::with_chat_cassette(&Cassette::scripted_chat("p", &["  "]));
        let err = plan_readme(&ctx, &SynthConfig::default(), &spec()).await.unwrap_err();
        assert!(matches!(err, SynthError::EmptyReadme));
    }

    #[tokio::test]
    async fn structure_reply_becomes_a_tree() {
        let reply = r#"{"README.md": null, "app": {"main.py": "entry"}, "requirements.txt": null}"#;
        let ctx = ServiceContext::with_chat_cassette(&Cassette::scripted_chat("p", &[reply]));
        let tree = plan_structure(&ctx, &SynthConfig::default(), &spec(), "# Shorty", None)
            .await
            .unwrap();
        assert_eq!(tree.name(), "shorty");
        assert_eq!(tree.file_paths(), vec!["README.md", "app/main.py", "requirements.txt"]);
    }

    #[test]
    fn feedback_prompt_lists_previous_issues() {
        let previous = StructureNode::from_paths("shorty", ["app.py", "app/x.py"]);
        let review = StructureReview::heuristic_only(&previous);
        let prompt = build_structure_prompt(
            &spec(),
            "# Shorty",
            Some((&previous, &review)),
            &SynthConfig::default(),
        );
        assert!(prompt.contains("Previous proposal"));
        assert!(prompt.contains("[Critical] files and folders share names: app"));
    }
}
