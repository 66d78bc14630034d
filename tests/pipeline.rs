//! End-to-end pipeline runs against scripted chat cassettes.
//!
//! Each test scripts every chat reply in call order:
//! README, structure, structure review, one reply per generated file
//! (manifests last), one per refined source file, then the senior reviews
//! and any issue refinements.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use projsynth::cassette::format::Cassette;
use projsynth::config::SynthConfig;
use projsynth::context::ServiceContext;
use projsynth::error::SynthError;
use projsynth::synth::deps::ManifestAction;
use projsynth::synth::senior::{RefinementAttempt, SeniorStatus, INVALID_JSON_SUMMARY};
use projsynth::synth::structure_review::StructureReview;
use projsynth::synth::{Pipeline, PipelineState, ProjectSpec};

fn spec() -> ProjectSpec {
    ProjectSpec { description: "A URL shortener with a Flask API".into(), name: "shorty".into() }
}

const README: &str = "# Shorty\n\nA URL shortener built with Flask.";
const PYTHON_STRUCTURE: &str = r#"{"README.md": null, "requirements.txt": null, "app": {"main.py": "entry point"}, "tests": {"test_main.py": null}}"#;
const NO_ISSUES: &str = r#"{"issues": []}"#;
const MAIN_PY: &str =
    "import requests\n\n\ndef run():\n    return requests.get(\"https://example.com\").status_code\n";
const TEST_PY: &str = "from app.main import run\n\n\ndef test_run():\n    assert callable(run)\n";
const MAIN_PY_REFINED: &str = "import requests\n\n\ndef run() -> int:\n    \"\"\"Status of the landing page.\"\"\"\n    return requests.get(\"https://example.com\", timeout=10).status_code\n";
const MAIN_PY_FIXED: &str = "import requests\n\n\ndef run() -> int:\n    \"\"\"Status of the landing page, or 0 when unreachable.\"\"\"\n    try:\n        return requests.get(\"https://example.com\", timeout=10).status_code\n    except requests.RequestException:\n        return 0\n";

#[tokio::test]
async fn review_issues_drive_refinement_until_pass() {
    let review_failed = r#"{"status": "failed", "summary": "Missing error handling", "issues": [{"description": "No error handling around the HTTP call", "severity": "high", "recommendation": "Catch requests exceptions", "file": "app/main.py"}]}"#;
    let review_passed = r#"{"status": "passed", "summary": "Looks good", "issues": []}"#;
    let cassette = Cassette::scripted_chat(
        "full-run",
        &[
            README,
            PYTHON_STRUCTURE,
            NO_ISSUES,
            MAIN_PY,
            TEST_PY,
            "flask\n",
            MAIN_PY_REFINED,
            "x",
            review_failed,
            MAIN_PY_FIXED,
            review_passed,
        ],
    );
    let ctx = ServiceContext::with_chat_cassette(&cassette);
    let config = SynthConfig::default();
    let out = tempfile::tempdir().unwrap();

    let outcome = Pipeline::new(&ctx, &config).run(&spec(), out.path()).await.unwrap();

    assert_eq!(outcome.state, PipelineState::Completed);
    assert_eq!(outcome.final_status, SeniorStatus::Passed);
    assert_eq!(outcome.final_summary, "Looks good");
    assert_eq!(
        outcome.files_generated,
        vec!["README.md", "app/main.py", "tests/test_main.py", "requirements.txt"]
    );
    assert!(outcome.files_skipped.is_empty());
    assert_eq!(outcome.review_history.len(), 2);
    assert_eq!(outcome.review_history[0].files_touched, vec!["app/main.py"]);
    assert_eq!(outcome.review_history[1].result_status, SeniorStatus::Passed);

    // requests is imported but was not declared; the local `app` package is not a dependency
    assert_eq!(outcome.manifests.len(), 1);
    assert_eq!(
        outcome.manifests[0].action,
        ManifestAction::Extended { added: vec!["requests".into()] }
    );
    let requirements = std::fs::read_to_string(out.path().join("requirements.txt")).unwrap();
    assert_eq!(requirements, "flask\nrequests\n");

    let main = std::fs::read_to_string(out.path().join("app/main.py")).unwrap();
    assert_eq!(main, MAIN_PY_FIXED);
    // the one-character refinement was discarded
    let test = std::fs::read_to_string(out.path().join("tests/test_main.py")).unwrap();
    assert_eq!(test, TEST_PY);

    let issues = std::fs::read_to_string(out.path().join("SENIOR_REVIEW_ISSUES_ATTEMPT_1.md")).unwrap();
    assert_eq!(
        issues,
        "## Issue 1: [high]\n**File:** app/main.py\n**Description:** No error handling around the HTTP call\n**Recommendation:** Catch requests exceptions\n"
    );
    assert!(!out.path().join("SENIOR_REVIEW_ISSUES_ATTEMPT_2.md").exists());

    let history: Vec<RefinementAttempt> = serde_json::from_str(
        &std::fs::read_to_string(out.path().join("SENIOR_REVIEW_HISTORY.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(history, outcome.review_history);

    let structure: StructureReview = serde_json::from_str(
        &std::fs::read_to_string(out.path().join("STRUCTURE_REVIEW.json")).unwrap(),
    )
    .unwrap();
    assert!(structure.quality_score >= 80.0);
}

#[tokio::test]
async fn exhausted_review_loop_still_completes() {
    let cassette = Cassette::scripted_chat(
        "exhausted",
        &[
            README,
            r#"{"README.md": null, "main.py": null}"#,
            NO_ISSUES,
            "print('hello')",
            "print('hello, world')",
            "The project looks mostly fine.",
            "Still not JSON, sorry.",
            "Overall decent work.",
            "No JSON here either.",
        ],
    );
    let ctx = ServiceContext::with_chat_cassette(&cassette);
    let mut config = SynthConfig::default();
    config.review.max_attempts = 2;
    let out = tempfile::tempdir().unwrap();

    let outcome = Pipeline::new(&ctx, &config).run(&spec(), out.path()).await.unwrap();

    assert_eq!(outcome.state, PipelineState::Completed);
    assert_eq!(outcome.final_status, SeniorStatus::Failed);
    assert_eq!(outcome.final_summary, INVALID_JSON_SUMMARY);
    assert_eq!(outcome.review_history.len(), 2);
    assert!(outcome.review_history.iter().all(|a| a.issues.is_empty() && a.files_touched.is_empty()));
    assert!(!out.path().join("SENIOR_REVIEW_ISSUES_ATTEMPT_1.md").exists());
    assert_eq!(
        std::fs::read_to_string(out.path().join("main.py")).unwrap(),
        "print('hello, world')\n"
    );
}

#[tokio::test]
async fn critical_structure_is_regenerated_once() {
    let critical_review = r#"{"issues": [
        {"category": "hierarchy", "severity": "critical", "description": "no entry point", "affected_paths": [], "suggestion": "add main.py"},
        {"category": "organization", "severity": "critical", "description": "no source folder", "affected_paths": [], "suggestion": "add src"},
        {"category": "completeness", "severity": "critical", "description": "no tests", "affected_paths": [], "suggestion": "add tests"}
    ]}"#;
    let cassette = Cassette::scripted_chat(
        "regenerate",
        &[
            README,
            r#"{"README.md": null, "notes.txt": null}"#,
            critical_review,
            r#"{"README.md": null, "main.py": null}"#,
            NO_ISSUES,
            "print('hello')",
            "print('hello, world')",
            r#"{"status": "passed", "summary": "fine", "issues": []}"#,
        ],
    );
    let ctx = ServiceContext::with_chat_cassette(&cassette);
    let config = SynthConfig::default();
    let out = tempfile::tempdir().unwrap();

    let outcome = Pipeline::new(&ctx, &config).run(&spec(), out.path()).await.unwrap();

    assert_eq!(outcome.files_generated, vec!["README.md", "main.py"]);
    assert!(!out.path().join("notes.txt").exists());
    assert_eq!(outcome.final_status, SeniorStatus::Passed);
}

#[tokio::test]
async fn abort_before_start_makes_no_calls() {
    // an empty cassette panics on any chat call
    let ctx = ServiceContext::with_chat_cassette(&Cassette::new("abort"));
    let config = SynthConfig::default();
    let out = tempfile::tempdir().unwrap();

    let err = Pipeline::new(&ctx, &config)
        .with_abort_flag(Arc::new(AtomicBool::new(true)))
        .run(&spec(), out.path())
        .await
        .unwrap_err();

    assert!(matches!(err, SynthError::Aborted { ref phase } if phase == "planning"));
    assert!(!out.path().join("README.md").exists());
}

#[tokio::test]
async fn chat_failure_ends_the_run() {
    let mut cassette = Cassette::scripted_chat("failure", &[README]);
    cassette.push_chat_error("connection reset");
    let ctx = ServiceContext::with_chat_cassette(&cassette);
    let config = SynthConfig::default();
    let out = tempfile::tempdir().unwrap();

    let err = Pipeline::new(&ctx, &config).run(&spec(), out.path()).await.unwrap_err();

    assert!(matches!(err, SynthError::Llm { .. }));
    // the README was written before the structure phase failed
    assert!(out.path().join("README.md").exists());
}
