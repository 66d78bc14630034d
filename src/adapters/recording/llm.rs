//! Recording adapter for the `ChatClient` port.

use std::sync::{Arc, Mutex};

use super::record_result;
use crate::cassette::recorder::CassetteRecorder;
use crate::ports::{ChatClient, ChatFuture, ChatRequest};

/// Records chat interactions while delegating to an inner implementation.
pub struct RecordingChatClient {
    inner: Box<dyn ChatClient>,
    recorder: Arc<Mutex<CassetteRecorder>>,
}

impl RecordingChatClient {
    /// Creates a new recording chat client wrapping the given implementation.
    pub fn new(inner: Box<dyn ChatClient>, recorder: Arc<Mutex<CassetteRecorder>>) -> Self {
        Self { inner, recorder }
    }
}

impl ChatClient for RecordingChatClient {
    fn chat(&self, request: &ChatRequest) -> ChatFuture<'_> {
        let request = request.clone();
        let recorder = Arc::clone(&self.recorder);

        Box::pin(async move {
            let result = self.inner.chat(&request).await;
            record_result(&recorder, "llm", "chat", &request, &result);
            result
        })
    }
}
