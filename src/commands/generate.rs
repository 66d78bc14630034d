//! `projsynth generate` command.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::warn;

use crate::cli::GenerateArgs;
use crate::config::{ConfigOverrides, Provider, SynthConfig};
use crate::context::ServiceContext;
use crate::synth::structure::is_safe_segment;
use crate::synth::{Pipeline, PipelineOutcome, ProjectSpec};

/// Execute the `generate` command and print the outcome as JSON.
///
/// # Errors
///
/// Returns an error string if the arguments or config are invalid, or the
/// pipeline fails.
pub fn run(args: &GenerateArgs) -> Result<(), String> {
    let config = load_config(args)?;
    let spec = ProjectSpec { description: read_description(args)?, name: args.name.clone() };
    if !is_safe_segment(&spec.name) {
        return Err(format!("invalid project name {:?}", spec.name));
    }

    super::with_context(&config.llm, |ctx| {
        let outcome = run_with_context(ctx, &config, &spec, &args.output)?;
        let json = serde_json::to_string_pretty(&outcome)
            .map_err(|e| format!("Failed to serialize outcome: {e}"))?;
        println!("{json}");
        Ok(())
    })
}

/// Runs the pipeline on a fresh single-threaded runtime. Ctrl-C requests an
/// abort that takes effect at the next phase boundary.
///
/// # Errors
///
/// Returns an error string if the runtime cannot start or the pipeline fails.
pub fn run_with_context(
    ctx: &ServiceContext,
    config: &SynthConfig,
    spec: &ProjectSpec,
    output: &Path,
) -> Result<PipelineOutcome, String> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("Failed to start async runtime: {e}"))?;

    runtime.block_on(async {
        let abort = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&abort);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received; stopping at the next phase boundary");
                flag.store(true, Ordering::SeqCst);
            }
        });

        Pipeline::new(ctx, config)
            .with_abort_flag(abort)
            .run(spec, output)
            .await
            .map_err(|e| e.to_string())
    })
}

fn load_config(args: &GenerateArgs) -> Result<SynthConfig, String> {
    let mut config = SynthConfig::load(args.config.as_deref()).map_err(|e| e.to_string())?;
    let provider = match args.provider.as_deref() {
        Some(raw) => Some(Provider::parse(raw).ok_or_else(|| format!("unknown provider {raw:?}"))?),
        None => None,
    };
    ConfigOverrides {
        provider,
        model: args.model.clone(),
        max_review_attempts: args.max_review_attempts,
        ..ConfigOverrides::default()
    }
    .apply(&mut config);
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

fn read_description(args: &GenerateArgs) -> Result<String, String> {
    let description = match (&args.description, &args.description_file) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {e}", path.display()))?,
        (None, None) => return Err("a description is required".into()),
    };
    let description = description.trim().to_string();
    if description.is_empty() {
        return Err("the project description is empty".into());
    }
    Ok(description)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args() -> GenerateArgs {
        GenerateArgs {
            name: "todo".into(),
            description: Some("  a todo api \n".into()),
            description_file: None,
            output: PathBuf::from("out"),
            config: None,
            model: Some("local-model".into()),
            provider: Some("Ollama".into()),
            max_review_attempts: Some(1),
        }
    }

    #[test]
    fn cli_flags_override_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("projsynth.toml");
        std::fs::write(&path, "[llm]\nmodel = \"from-file\"\n[review]\nmax_attempts = 3\n").unwrap();
        let mut args = args();
        args.config = Some(path);

        let config = load_config(&args).unwrap();
        assert_eq!(config.llm.model, "local-model");
        assert_eq!(config.llm.provider, Provider::Ollama);
        assert_eq!(config.review.max_attempts, 1);
    }

    #[test]
    fn out_of_range_review_attempts_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.toml");
        std::fs::write(&path, "").unwrap();
        let mut args = args();
        args.config = Some(path);
        args.max_review_attempts = Some(4);
        assert!(load_config(&args).unwrap_err().contains("review.max_attempts"));
    }

    #[test]
    fn description_is_trimmed_and_required() {
        assert_eq!(read_description(&args()).unwrap(), "a todo api");
        let mut blank = args();
        blank.description = Some("   ".into());
        assert!(read_description(&blank).is_err());
    }

    #[test]
    fn description_can_come_from_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("desc.txt");
        std::fs::write(&path, "a chat server\n").unwrap();
        let mut args = args();
        args.description = None;
        args.description_file = Some(path);
        assert_eq!(read_description(&args).unwrap(), "a chat server");
    }
}
