//! Replaying adapter for the `ChatClient` port.

use std::sync::Mutex;

use super::{next_output, replay_result};
use crate::cassette::replayer::CassetteReplayer;
use crate::ports::llm::{ChatClient, ChatFuture, ChatRequest};

/// Serves recorded chat replies from a cassette, in order.
pub struct ReplayingChatClient {
    replayer: Mutex<CassetteReplayer>,
}

impl ReplayingChatClient {
    /// Create a replaying chat client backed by the given replayer.
    #[must_use]
    pub fn new(replayer: CassetteReplayer) -> Self {
        Self { replayer: Mutex::new(replayer) }
    }
}

impl ChatClient for ReplayingChatClient {
    fn chat(&self, _request: &ChatRequest) -> ChatFuture<'_> {
        let output = next_output(&self.replayer, "llm", "chat");
        Box::pin(async move { replay_result(&output, "llm::chat") })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cassette::format::Cassette;
    use crate::ports::llm::ChatOptions;

    fn request() -> ChatRequest {
        ChatRequest {
            system: String::new(),
            user: String::new(),
            options: ChatOptions { model: "m".into(), temperature: 0.0, max_tokens: 1 },
        }
    }

    #[tokio::test]
    async fn replays_scripted_replies_then_errors() {
        let mut cassette = Cassette::scripted_chat("chat", &["first", "second"]);
        cassette.push_chat_error("connection reset");
        let client = ReplayingChatClient::new(CassetteReplayer::new(&cassette));

        assert_eq!(client.chat(&request()).await.unwrap().text, "first");
        assert_eq!(client.chat(&request()).await.unwrap().text, "second");
        let err = client.chat(&request()).await.unwrap_err();
        assert!(err.to_string().contains("connection reset"));
    }
}
