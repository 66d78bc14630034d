//! Chat client port for language-model completions.

use std::error::Error;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

/// Boxed future type alias used by [`ChatClient`] to keep the trait dyn-compatible.
pub type ChatFuture<'a> =
    Pin<Box<dyn Future<Output = Result<ChatResponse, Box<dyn Error + Send + Sync>>> + Send + 'a>>;

/// Sampling and length options passed with every chat request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatOptions {
    /// The model identifier.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum number of tokens to generate.
    pub max_tokens: u32,
}

/// A system + user prompt pair sent to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// System prompt establishing the role and output rules.
    pub system: String,
    /// User prompt carrying the task.
    pub user: String,
    /// Sampling options.
    pub options: ChatOptions,
}

/// The raw response from a chat call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// The generated text, unprocessed.
    pub text: String,
    /// Number of prompt tokens consumed.
    pub prompt_tokens: u32,
    /// Number of completion tokens generated.
    pub completion_tokens: u32,
}

/// The pipeline role issuing a chat request. Each role has its own timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChatRole {
    /// README planning.
    Planner,
    /// File/folder tree proposal.
    Structure,
    /// Subjective structure review pass.
    StructureReview,
    /// Per-file content generation.
    FileGeneration,
    /// Per-file refinement.
    Refinement,
    /// Whole-project senior review (including the JSON formatter retry).
    SeniorReview,
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Planner => "planner",
            Self::Structure => "structure",
            Self::StructureReview => "structure-review",
            Self::FileGeneration => "file-generation",
            Self::Refinement => "refinement",
            Self::SeniorReview => "senior-review",
        };
        f.write_str(name)
    }
}

/// Sends chat requests to a language model.
///
/// Transport retries, rate limiting and backoff belong to implementations of
/// this trait; callers only retry on invalid output.
pub trait ChatClient: Send + Sync {
    /// Sends a system + user prompt and returns the raw text reply.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails (network, auth, rate-limit, etc.).
    fn chat(&self, request: &ChatRequest) -> ChatFuture<'_>;
}
