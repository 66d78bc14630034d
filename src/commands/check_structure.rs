//! `projsynth check-structure` command.

use std::path::Path;

use crate::context::ServiceContext;
use crate::synth::structure::StructureNode;
use crate::synth::structure_review::StructureReview;

/// Scores the layout under `dir` with the heuristic checks and prints the
/// review as JSON.
///
/// # Errors
///
/// Returns an error string if the directory cannot be listed.
pub fn run_with_context(ctx: &ServiceContext, dir: &Path, name: Option<&str>) -> Result<(), String> {
    let review = review_dir(ctx, dir, name)?;
    let json = serde_json::to_string_pretty(&review)
        .map_err(|e| format!("Failed to serialize review: {e}"))?;
    println!("{json}");
    Ok(())
}

/// Builds the tree for `dir` and reviews it.
///
/// # Errors
///
/// Returns an error string if the directory cannot be listed.
pub fn review_dir(
    ctx: &ServiceContext,
    dir: &Path,
    name: Option<&str>,
) -> Result<StructureReview, String> {
    let paths = ctx
        .fs
        .list_files(dir)
        .map_err(|e| format!("Failed to list {}: {e}", dir.display()))?;
    let root_name = name
        .map(String::from)
        .or_else(|| dir.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "project".into());
    let tree = StructureNode::from_paths(&root_name, paths.iter().map(String::as_str));
    Ok(StructureReview::heuristic_only(&tree))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cassette::format::Cassette;
    use crate::synth::structure_review::{IssueCategory, ReviewStatus};

    #[test]
    fn colliding_names_never_pass() {
        let dir = tempfile::tempdir().unwrap();
        for rel in ["README.md", "utils.py", "utils/helpers.py", "tests/test_utils.py"] {
            let path = dir.path().join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, "x\n").unwrap();
        }
        let ctx = ServiceContext::with_chat_cassette(&Cassette::new("none"));

        let review = review_dir(&ctx, dir.path(), Some("demo")).unwrap();
        assert_ne!(review.status, ReviewStatus::Passed);
        assert!(review.issues.iter().any(|i| i.category == IssueCategory::Conflict));
    }

    #[test]
    fn missing_directory_is_an_error() {
        let ctx = ServiceContext::with_chat_cassette(&Cassette::new("none"));
        assert!(review_dir(&ctx, Path::new("/definitely/not/here"), None).is_err());
    }
}
