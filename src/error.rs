//! Error types for the synthesis pipeline.
//!
//! Only conditions that end a phase are errors. Degradations the pipeline
//! recovers from (invalid `package.json`, shrinking refinements, non-JSON
//! reviews) are logged and represented as values instead.

use thiserror::Error;

use crate::ports::llm::ChatRole;

/// Errors that abort the current pipeline phase.
#[derive(Debug, Error)]
pub enum SynthError {
    /// The chat backend failed (transport, auth, HTTP status, bad body).
    #[error("{role} chat request failed: {message}")]
    Llm {
        /// Which pipeline role issued the request.
        role: ChatRole,
        /// Underlying failure description.
        message: String,
    },

    /// The chat backend did not answer within the role's timeout.
    #[error("{role} chat request timed out after {secs}s")]
    Timeout {
        /// Which pipeline role issued the request.
        role: ChatRole,
        /// Timeout that elapsed.
        secs: u64,
    },

    /// Reading or writing a project file failed.
    #[error("io error on {path}: {message}")]
    Io {
        /// Path being accessed.
        path: String,
        /// Underlying failure description.
        message: String,
    },

    /// Configuration could not be loaded or failed validation.
    #[error("config: {0}")]
    Config(String),

    /// The model returned a structure that yields no usable files.
    #[error("invalid project structure: {0}")]
    InvalidStructure(String),

    /// The planner produced an empty README.
    #[error("planner returned an empty README")]
    EmptyReadme,

    /// An abort was requested; the pipeline stopped at a phase boundary.
    #[error("aborted before {phase}")]
    Aborted {
        /// Phase that was about to start.
        phase: String,
    },
}

impl SynthError {
    /// Builds an [`SynthError::Io`] from any displayable error.
    pub fn io(path: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Io { path: path.into(), message: err.to_string() }
    }
}

/// Convenience alias used across the `synth` modules.
pub type SynthResult<T> = Result<T, SynthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn llm_error_names_role() {
        let err = SynthError::Llm { role: ChatRole::SeniorReview, message: "503".into() };
        assert_eq!(err.to_string(), "senior-review chat request failed: 503");
    }

    #[test]
    fn timeout_error_reports_seconds() {
        let err = SynthError::Timeout { role: ChatRole::FileGeneration, secs: 600 };
        assert!(err.to_string().contains("600s"));
    }
}
