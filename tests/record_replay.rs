//! Record-replay round-trip integration test.
//!
//! Proves that the record/replay system works end-to-end:
//! 1. Run the README planner through recording adapters in a `RecordingSession`.
//! 2. Replay the session directory with `ServiceContext::replaying_from()`.
//! 3. Assert identical outputs between recording and replaying.
//! 4. Replay a second time and assert determinism.

use std::path::Path;

use projsynth::adapters::live::clock::LiveClock;
use projsynth::adapters::live::filesystem::LiveFileSystem;
use projsynth::adapters::recording::{RecordingChatClient, RecordingClock, RecordingFileSystem};
use projsynth::adapters::replaying::ReplayingChatClient;
use projsynth::cassette::config::CassetteConfig;
use projsynth::cassette::format::Cassette;
use projsynth::cassette::replayer::CassetteReplayer;
use projsynth::cassette::session::RecordingSession;
use projsynth::config::SynthConfig;
use projsynth::context::ServiceContext;
use projsynth::synth::planner::plan_readme;
use projsynth::synth::ProjectSpec;

/// Exercises the clock, fs and chat ports on the given context, returning a
/// snapshot of all outputs for comparison.
async fn exercise_ports(ctx: &ServiceContext, notes: &Path) -> (String, String, String) {
    let time = ctx.clock.now().to_rfc3339();
    let content = ctx.fs.read_to_string(notes).unwrap();
    let spec = ProjectSpec { description: content.clone(), name: "notes".into() };
    let readme = plan_readme(ctx, &SynthConfig::default(), &spec).await.unwrap();
    (time, content, readme)
}

#[tokio::test]
async fn record_then_replay_produces_identical_outputs() {
    let work = tempfile::tempdir().unwrap();
    let notes = work.path().join("idea.txt");
    std::fs::write(&notes, "A markdown note taker").unwrap();

    // --- Phase 1: Record interactions ---
    // The chat backend is itself scripted so the test stays offline.
    let session = RecordingSession::new(work.path().join("cassettes")).unwrap();
    let scripted = Cassette::scripted_chat("backend", &["```markdown\n# Notes\n\nTake notes.\n```"]);
    let recorded = {
        let ctx = ServiceContext::from_parts(
            Box::new(RecordingClock::new(Box::new(LiveClock), session.clock.clone())),
            Box::new(RecordingFileSystem::new(Box::new(LiveFileSystem), session.fs.clone())),
            Box::new(RecordingChatClient::new(
                Box::new(ReplayingChatClient::new(CassetteReplayer::new(&scripted))),
                session.llm.clone(),
            )),
        );
        exercise_ports(&ctx, &notes).await
    };
    let session_dir = session.finish().expect("recording should succeed");
    assert_eq!(recorded.2, "# Notes\n\nTake notes.\n");

    // The source file may change; replay must not look at it.
    std::fs::write(&notes, "something else").unwrap();

    // --- Phase 2: Replay and verify identical outputs ---
    let config = CassetteConfig::from_session_dir(&session_dir);
    let ctx1 = ServiceContext::replaying_from(&config).unwrap();
    let replayed1 = exercise_ports(&ctx1, &notes).await;
    assert_eq!(replayed1, recorded, "replay mismatch");

    // --- Phase 3: Replay a second time for determinism ---
    let ctx2 = ServiceContext::replaying_from(&config).unwrap();
    let replayed2 = exercise_ports(&ctx2, &notes).await;
    assert_eq!(replayed1, replayed2, "determinism: outputs differ between replays");
}
