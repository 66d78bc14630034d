//! Typed configuration for the synthesis pipeline.
//!
//! Precedence, lowest first: built-in defaults, the TOML file, environment
//! variables, then CLI flags. Every override is applied field by field in
//! [`ConfigOverrides::apply`].

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SynthError;
use crate::ports::llm::{ChatOptions, ChatRole};

/// Default config file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "projsynth.toml";

/// Which live chat backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Anthropic messages API.
    Anthropic,
    /// Local Ollama server.
    Ollama,
}

impl Provider {
    /// Parses a provider name, ignoring case and surrounding whitespace.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "anthropic" => Some(Self::Anthropic),
            "ollama" => Some(Self::Ollama),
            _ => None,
        }
    }
}

/// Chat backend settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Backend to call.
    pub provider: Provider,
    /// Model identifier passed with every request.
    pub model: String,
    /// Endpoint override.
    pub base_url: Option<String>,
    /// Environment variable holding the API key (Anthropic only).
    pub api_key_env: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: Provider::Anthropic,
            model: "claude-sonnet-4-20250514".into(),
            base_url: None,
            api_key_env: "ANTHROPIC_API_KEY".into(),
        }
    }
}

/// Per-file generation and refinement settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Attempts per file before giving up on invalid output.
    pub max_file_retries: u32,
    /// Upper bound on context files passed to each generation call.
    pub max_context_files: usize,
    /// Characters of each context file included in the prompt.
    pub context_excerpt_chars: usize,
    /// Characters of the README passed to refinement prompts.
    pub readme_excerpt_chars: usize,
    /// Sampling temperature for generation and refinement.
    pub temperature: f32,
    /// Token cap for generation and refinement replies.
    pub max_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_file_retries: 3,
            max_context_files: 8,
            context_excerpt_chars: 4000,
            readme_excerpt_chars: 2000,
            temperature: 0.2,
            max_tokens: 8192,
        }
    }
}

/// Structure quality-gate settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructureConfig {
    /// How many structures may be proposed before the gate gives up.
    pub max_attempts: u32,
}

impl Default for StructureConfig {
    fn default() -> Self {
        Self { max_attempts: 2 }
    }
}

/// Senior-review loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// Review cycles, 1 to 3.
    pub max_attempts: u32,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

/// Per-role chat timeouts in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// README planning.
    pub planner_secs: u64,
    /// Structure proposal and its subjective review.
    pub structure_secs: u64,
    /// Per-file generation.
    pub file_secs: u64,
    /// Per-file refinement.
    pub refine_secs: u64,
    /// Senior review and its JSON formatter retry.
    pub review_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            planner_secs: 300,
            structure_secs: 300,
            file_secs: 600,
            refine_secs: 600,
            review_secs: 900,
        }
    }
}

/// Complete pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthConfig {
    /// Chat backend.
    pub llm: LlmConfig,
    /// File generation.
    pub generation: GenerationConfig,
    /// Structure gate.
    pub structure: StructureConfig,
    /// Senior review loop.
    pub review: ReviewConfig,
    /// Per-role timeouts.
    pub timeouts: TimeoutConfig,
}

impl SynthConfig {
    /// Parses a TOML document; missing sections keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`SynthError::Config`] if the TOML is malformed.
    pub fn from_toml(text: &str) -> Result<Self, SynthError> {
        toml::from_str(text).map_err(|e| SynthError::Config(e.to_string()))
    }

    /// Loads configuration from `path`, or from [`DEFAULT_CONFIG_FILE`] when it
    /// exists, then applies environment overrides and validates.
    ///
    /// # Errors
    ///
    /// Returns [`SynthError::Config`] if an explicit file is missing, any file
    /// fails to parse, or the merged values are out of range.
    pub fn load(path: Option<&Path>) -> Result<Self, SynthError> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    SynthError::Config(format!("cannot read {}: {e}", path.display()))
                })?;
                Self::from_toml(&text)?
            }
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                let text = std::fs::read_to_string(DEFAULT_CONFIG_FILE)
                    .map_err(|e| SynthError::Config(format!("{DEFAULT_CONFIG_FILE}: {e}")))?;
                Self::from_toml(&text)?
            }
            None => Self::default(),
        };
        ConfigOverrides::from_env(|key| std::env::var(key).ok())?.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges the pipeline relies on.
    ///
    /// # Errors
    ///
    /// Returns [`SynthError::Config`] describing the first invalid field.
    pub fn validate(&self) -> Result<(), SynthError> {
        if !(1..=3).contains(&self.review.max_attempts) {
            return Err(SynthError::Config(format!(
                "review.max_attempts must be between 1 and 3, got {}",
                self.review.max_attempts
            )));
        }
        if self.structure.max_attempts == 0 {
            return Err(SynthError::Config("structure.max_attempts must be at least 1".into()));
        }
        if self.generation.max_file_retries == 0 {
            return Err(SynthError::Config(
                "generation.max_file_retries must be at least 1".into(),
            ));
        }
        if self.generation.max_context_files == 0 {
            return Err(SynthError::Config(
                "generation.max_context_files must be at least 1".into(),
            ));
        }
        if self.llm.model.trim().is_empty() {
            return Err(SynthError::Config("llm.model must not be empty".into()));
        }
        Ok(())
    }

    /// Timeout for chat calls made by `role`.
    #[must_use]
    pub fn timeout_for(&self, role: ChatRole) -> Duration {
        let secs = match role {
            ChatRole::Planner => self.timeouts.planner_secs,
            ChatRole::Structure | ChatRole::StructureReview => self.timeouts.structure_secs,
            ChatRole::FileGeneration => self.timeouts.file_secs,
            ChatRole::Refinement => self.timeouts.refine_secs,
            ChatRole::SeniorReview => self.timeouts.review_secs,
        };
        Duration::from_secs(secs)
    }

    /// Chat options for `role`.
    #[must_use]
    pub fn chat_options(&self, role: ChatRole) -> ChatOptions {
        let (temperature, max_tokens) = match role {
            ChatRole::Planner => (0.5, 4096),
            ChatRole::Structure => (0.3, 4096),
            ChatRole::StructureReview | ChatRole::SeniorReview => (0.1, 4096),
            ChatRole::FileGeneration | ChatRole::Refinement => {
                (self.generation.temperature, self.generation.max_tokens)
            }
        };
        ChatOptions { model: self.llm.model.clone(), temperature, max_tokens }
    }
}

/// Optional values layered over a loaded [`SynthConfig`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    /// Replaces `llm.provider`.
    pub provider: Option<Provider>,
    /// Replaces `llm.model`.
    pub model: Option<String>,
    /// Replaces `llm.base_url`.
    pub base_url: Option<String>,
    /// Replaces `review.max_attempts`.
    pub max_review_attempts: Option<u32>,
    /// Replaces `structure.max_attempts`.
    pub max_structure_attempts: Option<u32>,
    /// Replaces `generation.max_context_files`.
    pub max_context_files: Option<usize>,
}

impl ConfigOverrides {
    /// Reads `PROJSYNTH_PROVIDER`, `PROJSYNTH_MODEL` and `PROJSYNTH_BASE_URL`
    /// through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`SynthError::Config`] for an unknown provider name.
    pub fn from_env(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SynthError> {
        let provider = match lookup("PROJSYNTH_PROVIDER") {
            Some(raw) => Some(
                Provider::parse(&raw)
                    .ok_or_else(|| SynthError::Config(format!("unknown provider {raw:?}")))?,
            ),
            None => None,
        };
        Ok(Self {
            provider,
            model: lookup("PROJSYNTH_MODEL").filter(|v| !v.trim().is_empty()),
            base_url: lookup("PROJSYNTH_BASE_URL").filter(|v| !v.trim().is_empty()),
            ..Self::default()
        })
    }

    /// Writes every present override into `config`.
    pub fn apply(self, config: &mut SynthConfig) {
        if let Some(provider) = self.provider {
            config.llm.provider = provider;
        }
        if let Some(model) = self.model {
            config.llm.model = model;
        }
        if let Some(base_url) = self.base_url {
            config.llm.base_url = Some(base_url);
        }
        if let Some(attempts) = self.max_review_attempts {
            config.review.max_attempts = attempts;
        }
        if let Some(attempts) = self.max_structure_attempts {
            config.structure.max_attempts = attempts;
        }
        if let Some(files) = self.max_context_files {
            config.generation.max_context_files = files;
        }
    }
}
