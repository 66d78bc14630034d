//! Service context bundling all port trait objects.

use std::path::PathBuf;

use crate::adapters::live::anthropic::AnthropicChatClient;
use crate::adapters::live::clock::LiveClock;
use crate::adapters::live::filesystem::LiveFileSystem;
use crate::adapters::live::ollama::OllamaChatClient;
use crate::adapters::recording::{RecordingChatClient, RecordingClock, RecordingFileSystem};
use crate::adapters::replaying::{ReplayingChatClient, ReplayingClock, ReplayingFileSystem};
use crate::cassette::config::CassetteConfig;
use crate::cassette::format::Cassette;
use crate::cassette::replayer::CassetteReplayer;
use crate::cassette::session::RecordingSession;
use crate::config::{LlmConfig, Provider};
use crate::ports::clock::Clock;
use crate::ports::filesystem::FileSystem;
use crate::ports::llm::{ChatClient, ChatFuture, ChatRequest};

/// Bundles all port trait objects into a single context.
///
/// Each field provides access to one external boundary. Constructors
/// wire up different adapter implementations (live, replaying, recording).
pub struct ServiceContext {
    /// Clock for artifact timestamps.
    pub clock: Box<dyn Clock>,
    /// Filesystem for project I/O.
    pub fs: Box<dyn FileSystem>,
    /// Chat model client.
    pub llm: Box<dyn ChatClient>,
}

impl ServiceContext {
    /// Creates a context from explicit adapters.
    #[must_use]
    pub fn from_parts(
        clock: Box<dyn Clock>,
        fs: Box<dyn FileSystem>,
        llm: Box<dyn ChatClient>,
    ) -> Self {
        Self { clock, fs, llm }
    }

    /// Creates a live context: system clock, real disk, configured chat backend.
    #[must_use]
    pub fn live(llm: &LlmConfig) -> Self {
        Self::from_parts(Box::new(LiveClock), Box::new(LiveFileSystem), live_chat_client(llm))
    }

    /// Creates a live context whose interactions are captured into per-port
    /// cassettes under `root`. Call [`RecordingSession::finish`] after the
    /// context is dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the session directory cannot be created.
    pub fn recording_at(
        root: impl Into<PathBuf>,
        llm: &LlmConfig,
    ) -> Result<(Self, RecordingSession), String> {
        let session = RecordingSession::new(root)?;
        let ctx = Self::from_parts(
            Box::new(RecordingClock::new(Box::new(LiveClock), session.clock.clone())),
            Box::new(RecordingFileSystem::new(Box::new(LiveFileSystem), session.fs.clone())),
            Box::new(RecordingChatClient::new(live_chat_client(llm), session.llm.clone())),
        );
        Ok((ctx, session))
    }

    /// Creates a context that replays per-port cassettes.
    ///
    /// Clock and filesystem fall back to live adapters when no cassette is
    /// configured for them; an unconfigured chat port fails every call.
    ///
    /// # Errors
    ///
    /// Returns an error if any configured cassette file cannot be read or parsed.
    pub fn replaying_from(config: &CassetteConfig) -> Result<Self, String> {
        let replayers = config.load_all()?;

        Ok(Self::from_parts(
            match replayers.clock {
                Some(r) => Box::new(ReplayingClock::new(r)),
                None => Box::new(LiveClock),
            },
            match replayers.fs {
                Some(r) => Box::new(ReplayingFileSystem::new(r)),
                None => Box::new(LiveFileSystem),
            },
            match replayers.llm {
                Some(r) => Box::new(ReplayingChatClient::new(r)),
                None => Box::new(UnconfiguredChatClient),
            },
        ))
    }

    /// Creates a context with live clock and disk whose chat replies come
    /// from `cassette`.
    #[must_use]
    pub fn with_chat_cassette(cassette: &Cassette) -> Self {
        Self::from_parts(
            Box::new(LiveClock),
            Box::new(LiveFileSystem),
            Box::new(ReplayingChatClient::new(CassetteReplayer::new(cassette))),
        )
    }
}

fn live_chat_client(llm: &LlmConfig) -> Box<dyn ChatClient> {
    match llm.provider {
        Provider::Anthropic => {
            Box::new(AnthropicChatClient::new(llm.base_url.as_deref(), &llm.api_key_env))
        }
        Provider::Ollama => Box::new(OllamaChatClient::new(llm.base_url.as_deref())),
    }
}

/// Chat port used when a replay has no chat cassette.
struct UnconfiguredChatClient;

impl ChatClient for UnconfiguredChatClient {
    fn chat(&self, _request: &ChatRequest) -> ChatFuture<'_> {
        Box::pin(async { Err("chat port not configured in CassetteConfig".into()) })
    }
}
