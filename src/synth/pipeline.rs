//! Pipeline orchestrator.
//!
//! Drives one synthesis run through its phases:
//!
//! ```text
//! Planning -> StructureGeneration -> StructureGate -> FileGeneration
//!   -> DependencyReconciliation -> Refinement -> SeniorReview
//!   -> (IssueRefinement -> SeniorReview)* -> Completed
//! ```
//!
//! The abort flag is checked at every phase boundary. Files are written
//! through to the output directory as they are produced, so an abort after
//! `FileGeneration` leaves a complete (if unrefined) project on disk.
//!
//! Chat failures and timeouts end the run with an error. An exhausted
//! review loop does not: the run completes with the best-effort project and
//! the full review history.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::SynthConfig;
use crate::context::ServiceContext;
use crate::error::{SynthError, SynthResult};
use crate::synth::context_select::{self, is_manifest};
use crate::synth::deps::{reconcile_manifests, ManifestAction, ManifestReport, ScannerRegistry};
use crate::synth::extract::truncate_chars;
use crate::synth::generator::{generate_file, FileOutcome, FileRequest};
use crate::synth::model::{GeneratedFiles, ProjectSpec};
use crate::synth::planner::{plan_readme, plan_structure};
use crate::synth::refiner::refine_file;
use crate::synth::senior::{
    render_issues_markdown, review_project, RefinementAttempt, ReviewIssue, SeniorReviewResult,
    SeniorStatus,
};
use crate::synth::structure::StructureNode;
use crate::synth::structure_review::{review_structure, ReviewStatus, StructureReview};
use crate::synth::workspace::{
    issues_artifact_name, ProjectWorkspace, REVIEW_HISTORY_FILE, STRUCTURE_REVIEW_FILE,
};

const README_PATH: &str = "README.md";

/// Phases of a synthesis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Writing the README.
    Planning,
    /// Proposing a structure tree.
    StructureGeneration,
    /// Scoring the proposed tree.
    StructureGate,
    /// Generating every file of the tree.
    FileGeneration,
    /// Aligning manifests with scanned imports.
    DependencyReconciliation,
    /// One generic refinement pass over source files.
    Refinement,
    /// Whole-project review.
    SeniorReview,
    /// Refining the files a review flagged.
    IssueRefinement,
    /// The run finished.
    Completed,
    /// The run ended with an error.
    Failed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Planning => "planning",
            Self::StructureGeneration => "structure generation",
            Self::StructureGate => "structure gate",
            Self::FileGeneration => "file generation",
            Self::DependencyReconciliation => "dependency reconciliation",
            Self::Refinement => "refinement",
            Self::SeniorReview => "senior review",
            Self::IssueRefinement => "issue refinement",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A file from the structure tree that has no content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedFile {
    /// Relative path.
    pub path: String,
    /// Why nothing was written.
    pub reason: String,
}

/// Summary of a finished run, printed as JSON by the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    /// Terminal state.
    pub state: PipelineState,
    /// Project name.
    pub project_name: String,
    /// Output directory.
    pub output_dir: String,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
    /// Files on disk, in generation order.
    pub files_generated: Vec<String>,
    /// Files from the tree that were not written.
    pub files_skipped: Vec<SkippedFile>,
    /// Manifest reconciliation results.
    pub manifests: Vec<ManifestReport>,
    /// Review of the structure that was used.
    pub structure_review: StructureReview,
    /// One entry per senior-review cycle.
    pub review_history: Vec<RefinementAttempt>,
    /// Verdict of the last senior review.
    pub final_status: SeniorStatus,
    /// Summary of the last senior review.
    pub final_summary: String,
}

/// Runs the full synthesis pipeline.
pub struct Pipeline<'a> {
    ctx: &'a ServiceContext,
    config: &'a SynthConfig,
    registry: ScannerRegistry,
    abort: Arc<AtomicBool>,
}

impl<'a> Pipeline<'a> {
    /// Creates a pipeline with the default scanner registry.
    #[must_use]
    pub fn new(ctx: &'a ServiceContext, config: &'a SynthConfig) -> Self {
        Self {
            ctx,
            config,
            registry: ScannerRegistry::default(),
            abort: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shares `flag` as the abort flag. Setting it stops the run at the
    /// next phase boundary.
    #[must_use]
    pub fn with_abort_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.abort = flag;
        self
    }

    /// Replaces the import scanners used for reconciliation.
    #[must_use]
    pub fn with_registry(mut self, registry: ScannerRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Synthesises `spec` into `output_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error when a chat call fails or times out, a file cannot
    /// be written, no usable structure is proposed, or the run is aborted.
    pub async fn run(&self, spec: &ProjectSpec, output_dir: &Path) -> SynthResult<PipelineOutcome> {
        let mut state = PipelineState::Planning;
        match self.run_phases(spec, output_dir, &mut state).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                error!(phase = %state, error = %e, "pipeline failed");
                Err(e)
            }
        }
    }

    async fn run_phases(
        &self,
        spec: &ProjectSpec,
        output_dir: &Path,
        state: &mut PipelineState,
    ) -> SynthResult<PipelineOutcome> {
        let started_at = self.ctx.clock.now();
        let workspace = ProjectWorkspace::new(self.ctx, output_dir);
        info!(project = %spec.name, output = %output_dir.display(), "pipeline started");

        self.enter(state, PipelineState::Planning)?;
        let readme = plan_readme(self.ctx, self.config, spec).await?;
        workspace.write(README_PATH, &readme)?;

        let (structure, structure_review) = self.gate_structure(spec, &readme, state).await?;
        workspace.write_json(STRUCTURE_REVIEW_FILE, &structure_review)?;

        self.enter(state, PipelineState::FileGeneration)?;
        let mut generated = GeneratedFiles::new();
        generated.insert(README_PATH, readme.clone());
        let files_skipped =
            self.generate_files(spec, &readme, &structure, &workspace, &mut generated).await?;

        self.enter(state, PipelineState::DependencyReconciliation)?;
        let manifests = reconcile_manifests(&mut generated, &self.registry);
        for report in &manifests {
            if report.action != ManifestAction::Untouched {
                if let Some(content) = generated.get(&report.manifest) {
                    workspace.write(&report.manifest, content)?;
                }
            }
        }

        self.enter(state, PipelineState::Refinement)?;
        self.refine_all(&readme, &workspace, &mut generated).await?;

        let (review_history, last_review) =
            self.review_loop(spec, &readme, &structure, &workspace, &mut generated, state).await?;

        *state = PipelineState::Completed;
        info!(
            files = generated.len(),
            skipped = files_skipped.len(),
            status = ?last_review.status,
            "pipeline completed"
        );
        Ok(PipelineOutcome {
            state: PipelineState::Completed,
            project_name: spec.name.clone(),
            output_dir: output_dir.display().to_string(),
            started_at,
            finished_at: self.ctx.clock.now(),
            files_generated: generated.paths().map(String::from).collect(),
            files_skipped,
            manifests,
            structure_review,
            review_history,
            final_status: last_review.status,
            final_summary: last_review.summary,
        })
    }

    fn enter(&self, state: &mut PipelineState, next: PipelineState) -> SynthResult<()> {
        if self.abort.load(Ordering::SeqCst) {
            warn!(phase = %next, "abort requested");
            return Err(SynthError::Aborted { phase: next.to_string() });
        }
        if *state != next {
            info!(phase = %next, "entering phase");
        }
        *state = next;
        Ok(())
    }

    /// Proposes and scores structures until one is not `Critical` or the
    /// attempt bound is reached. On exhaustion the best-scoring tree is used.
    async fn gate_structure(
        &self,
        spec: &ProjectSpec,
        readme: &str,
        state: &mut PipelineState,
    ) -> SynthResult<(StructureNode, StructureReview)> {
        let max_attempts = self.config.structure.max_attempts;
        let mut best: Option<(StructureNode, StructureReview)> = None;
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            self.enter(state, PipelineState::StructureGeneration)?;
            let feedback = best.as_ref().map(|(tree, review)| (tree, review));
            let tree = match plan_structure(self.ctx, self.config, spec, readme, feedback).await {
                Ok(tree) => tree,
                Err(e @ SynthError::InvalidStructure(_)) => {
                    warn!(attempt, error = %e, "structure proposal rejected");
                    last_error = Some(e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            self.enter(state, PipelineState::StructureGate)?;
            let review = review_structure(self.ctx, self.config, readme, &tree).await?;
            if review.status != ReviewStatus::Critical {
                info!(attempt, score = review.quality_score, status = ?review.status, "structure accepted");
                return Ok((tree, review));
            }
            warn!(attempt, score = review.quality_score, "structure failed the quality gate");

            let better = match &best {
                Some((_, kept)) => review.quality_score > kept.quality_score,
                None => true,
            };
            if better {
                best = Some((tree, review));
            }
        }

        match best {
            Some((tree, review)) => {
                warn!(
                    score = review.quality_score,
                    "structure attempts exhausted; continuing with the best proposal"
                );
                Ok((tree, review))
            }
            None => Err(last_error.unwrap_or_else(|| {
                SynthError::InvalidStructure("no structure attempts were made".into())
            })),
        }
    }

    async fn generate_files(
        &self,
        spec: &ProjectSpec,
        readme: &str,
        structure: &StructureNode,
        workspace: &ProjectWorkspace<'_>,
        generated: &mut GeneratedFiles,
    ) -> SynthResult<Vec<SkippedFile>> {
        let mut skipped = Vec::new();
        for path in generation_order(structure) {
            let outcome = {
                let related =
                    context_select::select(&path, generated, self.config.generation.max_context_files);
                let request = FileRequest { path: &path, spec, readme, structure, related: &related };
                generate_file(self.ctx, self.config, &request).await?
            };
            match outcome {
                FileOutcome::Generated(content) => {
                    workspace.write(&path, &content)?;
                    generated.insert(path, content);
                }
                FileOutcome::Skipped { reason } => skipped.push(SkippedFile { path, reason }),
                FileOutcome::Exhausted => skipped.push(SkippedFile {
                    path,
                    reason: "no valid content after all generation attempts".into(),
                }),
            }
        }
        info!(generated = generated.len(), skipped = skipped.len(), "file generation finished");
        Ok(skipped)
    }

    async fn refine_all(
        &self,
        readme: &str,
        workspace: &ProjectWorkspace<'_>,
        generated: &mut GeneratedFiles,
    ) -> SynthResult<()> {
        let excerpt = truncate_chars(readme, self.config.generation.readme_excerpt_chars);
        let targets: Vec<String> = generated
            .paths()
            .filter(|p| *p != README_PATH && !is_manifest(p))
            .map(String::from)
            .collect();

        let mut accepted = 0usize;
        for path in targets {
            if self.refine_one(&path, &excerpt, None, workspace, generated).await? {
                accepted += 1;
            }
        }
        info!(accepted, "refinement pass finished");
        Ok(())
    }

    async fn review_loop(
        &self,
        spec: &ProjectSpec,
        readme: &str,
        structure: &StructureNode,
        workspace: &ProjectWorkspace<'_>,
        generated: &mut GeneratedFiles,
        state: &mut PipelineState,
    ) -> SynthResult<(Vec<RefinementAttempt>, SeniorReviewResult)> {
        let excerpt = truncate_chars(readme, self.config.generation.readme_excerpt_chars);
        let mut history = Vec::new();
        let mut last = None;

        for attempt in 1..=self.config.review.max_attempts {
            self.enter(state, PipelineState::SeniorReview)?;
            let review =
                review_project(self.ctx, self.config, spec, readme, structure, generated, attempt)
                    .await;

            let mut files_touched = Vec::new();
            if review.status == SeniorStatus::Failed && !review.issues.is_empty() {
                workspace.write(&issues_artifact_name(attempt), &render_issues_markdown(&review.issues))?;

                self.enter(state, PipelineState::IssueRefinement)?;
                for (path, issues) in group_issues(&spec.name, &review.issues, generated) {
                    if self.refine_one(&path, &excerpt, Some(&issues), workspace, generated).await? {
                        files_touched.push(path);
                    }
                }
            }

            history.push(RefinementAttempt {
                attempt_number: attempt,
                issues: review.issues.clone(),
                files_touched,
                result_status: review.status,
            });
            workspace.write_json(REVIEW_HISTORY_FILE, &history)?;

            let passed = review.status == SeniorStatus::Passed;
            last = Some(review);
            if passed {
                break;
            }
        }

        if history.last().is_some_and(|a| a.result_status != SeniorStatus::Passed) {
            warn!(attempts = history.len(), "senior review attempts exhausted without a pass");
        }
        let last = last.unwrap_or_else(|| SeniorReviewResult {
            status: SeniorStatus::Failed,
            summary: "No senior review was run.".into(),
            issues: Vec::new(),
        });
        Ok((history, last))
    }

    /// Refines `path` in place. Returns whether new content was accepted.
    async fn refine_one(
        &self,
        path: &str,
        excerpt: &str,
        issues: Option<&[ReviewIssue]>,
        workspace: &ProjectWorkspace<'_>,
        generated: &mut GeneratedFiles,
    ) -> SynthResult<bool> {
        let Some(current) = generated.get(path).map(str::to_string) else {
            return Ok(false);
        };
        match refine_file(self.ctx, self.config, path, &current, excerpt, issues).await? {
            Some(refined) => {
                workspace.write(path, &refined)?;
                generated.insert(path, refined);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Files of `structure` in depth-first order with manifests moved to the
/// end. The planner's README is not regenerated.
#[must_use]
pub fn generation_order(structure: &StructureNode) -> Vec<String> {
    let (manifests, sources): (Vec<String>, Vec<String>) = structure
        .file_paths()
        .into_iter()
        .filter(|p| p != README_PATH)
        .partition(|p| is_manifest(p));
    sources.into_iter().chain(manifests).collect()
}

/// Groups review issues by the generated file they name. Issues without a
/// file, or naming a file that does not exist, are project-wide and are
/// appended to every group; they never select a file on their own.
fn group_issues(
    project_name: &str,
    issues: &[ReviewIssue],
    generated: &GeneratedFiles,
) -> BTreeMap<String, Vec<ReviewIssue>> {
    let mut groups: BTreeMap<String, Vec<ReviewIssue>> = BTreeMap::new();
    let mut project_wide = Vec::new();
    for issue in issues {
        let target = issue
            .file
            .as_deref()
            .map(|f| normalize_issue_path(project_name, f))
            .filter(|f| generated.contains(f));
        match target {
            Some(path) => groups.entry(path).or_default().push(issue.clone()),
            None => project_wide.push(issue.clone()),
        }
    }
    if !project_wide.is_empty() {
        for group in groups.values_mut() {
            group.extend(project_wide.iter().cloned());
        }
    }
    groups
}

fn normalize_issue_path(project_name: &str, file: &str) -> String {
    let trimmed = file.trim().trim_start_matches("./").trim_start_matches('/');
    trimmed
        .strip_prefix(project_name)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(trimmed)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(file: Option<&str>, description: &str) -> ReviewIssue {
        ReviewIssue {
            description: description.into(),
            severity: "high".into(),
            recommendation: "fix".into(),
            file: file.map(String::from),
        }
    }

    #[test]
    fn manifests_are_generated_last_and_readme_never() {
        let tree = StructureNode::from_paths(
            "shop",
            ["README.md", "package.json", "server/index.js", "docs/README.md", "server/go.mod"],
        );
        assert_eq!(
            generation_order(&tree),
            vec!["server/index.js", "docs/README.md", "package.json", "server/go.mod"]
        );
    }

    #[test]
    fn issues_group_by_file_and_share_project_wide_ones() {
        let generated: GeneratedFiles = [
            ("app/main.py".to_string(), "x".to_string()),
            ("app/db.py".to_string(), "y".to_string()),
        ]
        .into_iter()
        .collect();
        let issues = vec![
            issue(Some("shop/app/main.py"), "a"),
            issue(Some("./app/db.py"), "b"),
            issue(None, "c"),
            issue(Some("missing.py"), "d"),
        ];
        let groups = group_issues("shop", &issues, &generated);
        assert_eq!(groups.len(), 2);
        let main: Vec<&str> = groups["app/main.py"].iter().map(|i| i.description.as_str()).collect();
        assert_eq!(main, vec!["a", "c", "d"]);
        let db: Vec<&str> = groups["app/db.py"].iter().map(|i| i.description.as_str()).collect();
        assert_eq!(db, vec!["b", "c", "d"]);
    }

    #[test]
    fn project_wide_issues_alone_select_nothing() {
        let generated: GeneratedFiles =
            [("a.py".to_string(), "x".to_string())].into_iter().collect();
        assert!(group_issues("p", &[issue(None, "general")], &generated).is_empty());
    }

    #[test]
    fn phase_names_read_naturally() {
        assert_eq!(PipelineState::StructureGate.to_string(), "structure gate");
        assert_eq!(
            serde_json::to_value(PipelineState::IssueRefinement).unwrap(),
            serde_json::json!("issue_refinement")
        );
    }
}
