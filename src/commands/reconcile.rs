//! `projsynth reconcile` command.

use std::path::Path;

use crate::context::ServiceContext;
use crate::synth::deps::{reconcile_manifests, ManifestAction, ManifestReport, ScannerRegistry};
use crate::synth::workspace::ProjectWorkspace;

/// Reconciles the manifests of the project in `dir` and prints one report
/// per manifest as JSON.
///
/// # Errors
///
/// Returns an error string if the project cannot be read or written.
pub fn run_with_context(ctx: &ServiceContext, dir: &Path, dry_run: bool) -> Result<(), String> {
    let reports = reconcile_dir(ctx, dir, dry_run)?;
    let json = serde_json::to_string_pretty(&reports)
        .map_err(|e| format!("Failed to serialize reports: {e}"))?;
    println!("{json}");
    Ok(())
}

/// Loads the project, reconciles it, and writes changed manifests back
/// unless `dry_run` is set.
///
/// # Errors
///
/// Returns an error string if the project cannot be read or written.
pub fn reconcile_dir(
    ctx: &ServiceContext,
    dir: &Path,
    dry_run: bool,
) -> Result<Vec<ManifestReport>, String> {
    let workspace = ProjectWorkspace::new(ctx, dir);
    let mut files = workspace.load_all().map_err(|e| e.to_string())?;
    let reports = reconcile_manifests(&mut files, &ScannerRegistry::default());
    if dry_run {
        return Ok(reports);
    }
    for report in reports.iter().filter(|r| r.action != ManifestAction::Untouched) {
        if let Some(content) = files.get(&report.manifest) {
            workspace.write(&report.manifest, content).map_err(|e| e.to_string())?;
        }
    }
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cassette::format::Cassette;

    fn project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("requirements.txt"), "flask\n").unwrap();
        std::fs::create_dir_all(dir.path().join("app")).unwrap();
        std::fs::write(
            dir.path().join("app/main.py"),
            "import flask\nimport requests\nfrom app import models\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("app/models.py"), "import os\n").unwrap();
        dir
    }

    #[test]
    fn missing_packages_are_written_back() {
        let dir = project();
        let ctx = ServiceContext::with_chat_cassette(&Cassette::new("none"));

        let reports = reconcile_dir(&ctx, dir.path(), false).unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].action, ManifestAction::Extended { added: vec!["requests".into()] });
        let written = std::fs::read_to_string(dir.path().join("requirements.txt")).unwrap();
        assert!(written.contains("flask"));
        assert!(written.contains("requests"));
    }

    #[test]
    fn dry_run_leaves_files_alone() {
        let dir = project();
        let ctx = ServiceContext::with_chat_cassette(&Cassette::new("none"));

        let reports = reconcile_dir(&ctx, dir.path(), true).unwrap();
        assert_ne!(reports[0].action, ManifestAction::Untouched);
        let written = std::fs::read_to_string(dir.path().join("requirements.txt")).unwrap();
        assert_eq!(written, "flask\n");
    }
}
