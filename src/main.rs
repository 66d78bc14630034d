//! Binary entrypoint for the `projsynth` CLI.

use std::process::ExitCode;

fn main() -> ExitCode {
    // A missing .env is fine; real environment variables still apply.
    let _ = dotenvy::dotenv();
    // Recording and replay are handled in commands via PROJSYNTH_RECORD / PROJSYNTH_REPLAY.
    match projsynth::run(std::env::args()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
