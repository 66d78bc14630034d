//! Command dispatch and handlers.

pub mod check_structure;
pub mod generate;
pub mod reconcile;

use std::env;
use std::path::PathBuf;

use crate::cassette::config::CassetteConfig;
use crate::cassette::session::RecordingSession;
use crate::cli::Command;
use crate::config::LlmConfig;
use crate::context::ServiceContext;

/// Directory to record every port interaction into.
pub const RECORD_ENV: &str = "PROJSYNTH_RECORD";
/// Session directory whose cassettes replace the live ports.
pub const REPLAY_ENV: &str = "PROJSYNTH_REPLAY";

/// Dispatch a parsed command to its handler.
///
/// # Errors
///
/// Returns an error string if the selected command handler fails.
pub fn dispatch(command: &Command) -> Result<(), String> {
    match command {
        Command::Generate(args) => generate::run(args),
        Command::CheckStructure { dir, name } => with_context(&LlmConfig::default(), |ctx| {
            check_structure::run_with_context(ctx, dir, name.as_deref())
        }),
        Command::Reconcile { dir, dry_run } => {
            with_context(&LlmConfig::default(), |ctx| reconcile::run_with_context(ctx, dir, *dry_run))
        }
    }
}

/// Runs `f` with a context wired from the environment.
///
/// When `PROJSYNTH_REPLAY` names a session directory, its cassettes serve
/// the ports. Otherwise, when `PROJSYNTH_RECORD` is set to a directory path,
/// all port interactions are recorded to per-port cassette files below it.
/// Without either, the live adapters are used.
///
/// # Errors
///
/// Returns an error if the context cannot be built, `f` fails, or the
/// recording cannot be saved.
pub fn with_context<T>(
    llm: &LlmConfig,
    f: impl FnOnce(&ServiceContext) -> Result<T, String>,
) -> Result<T, String> {
    if let Ok(dir) = env::var(REPLAY_ENV) {
        let ctx = ServiceContext::replaying_from(&CassetteConfig::from_session_dir(&PathBuf::from(dir)))?;
        return f(&ctx);
    }

    let (ctx, session) = if let Ok(path) = env::var(RECORD_ENV) {
        let (ctx, session) = ServiceContext::recording_at(PathBuf::from(path), llm)?;
        (ctx, Some(session))
    } else {
        (ServiceContext::live(llm), None)
    };

    let result = f(&ctx);

    // Finish recording after command completes (even on error)
    if let Some(session) = session {
        // Drop context first to release Arc references
        drop(ctx);
        finish_recording(session)?;
    }

    result
}

/// Finish a recording session and print the output directory.
fn finish_recording(session: RecordingSession) -> Result<(), String> {
    let output_dir = session.finish()?;
    eprintln!("Recording saved to: {}", output_dir.display());
    Ok(())
}
