//! Cassette data structures for recording and replaying interactions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// A single recorded interaction with an external port.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Interaction {
    /// Sequence number (assigned automatically by the recorder).
    pub seq: u64,
    /// Port name (`"llm"`, `"fs"`, `"clock"`).
    pub port: String,
    /// Method name invoked on the port.
    pub method: String,
    /// Input data sent to the port.
    pub input: serde_json::Value,
    /// Output data returned from the port.
    pub output: serde_json::Value,
}

/// A cassette containing a sequence of recorded interactions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cassette {
    /// Human-readable name for this cassette.
    pub name: String,
    /// When this cassette was recorded.
    pub recorded_at: DateTime<Utc>,
    /// Free-form provenance tag (git commit of the recording tool, or `"scripted"`).
    pub commit: String,
    /// Ordered list of interactions.
    pub interactions: Vec<Interaction>,
}

impl Cassette {
    /// Creates an empty cassette tagged as hand-written.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            recorded_at: Utc::now(),
            commit: "scripted".into(),
            interactions: Vec::new(),
        }
    }

    /// Creates a cassette whose `llm::chat` calls answer with `replies`, in order.
    #[must_use]
    pub fn scripted_chat(name: impl Into<String>, replies: &[&str]) -> Self {
        let mut cassette = Self::new(name);
        for reply in replies {
            cassette.push_chat(reply);
        }
        cassette
    }

    /// Appends a successful chat reply.
    pub fn push_chat(&mut self, text: &str) {
        self.push(
            "llm",
            "chat",
            json!({"ok": {"text": text, "prompt_tokens": 0, "completion_tokens": 0}}),
        );
    }

    /// Appends a failed chat call.
    pub fn push_chat_error(&mut self, message: &str) {
        self.push("llm", "chat", json!({"err": message}));
    }

    fn push(&mut self, port: &str, method: &str, output: serde_json::Value) {
        let seq = self.interactions.len() as u64;
        self.interactions.push(Interaction {
            seq,
            port: port.into(),
            method: method.into(),
            input: json!({}),
            output,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_round_trip_preserves_scripted_replies() {
        let cassette = Cassette::scripted_chat("script", &["{\"status\": \"passed\"}", "done"]);
        let yaml = serde_yaml::to_string(&cassette).expect("serialize");
        let deserialized: Cassette = serde_yaml::from_str(&yaml).expect("deserialize");
        assert_eq!(cassette, deserialized);
        assert_eq!(deserialized.interactions[1].seq, 1);
        assert_eq!(deserialized.interactions[1].output["ok"]["text"], "done");
    }
}
