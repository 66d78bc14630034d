//! Replaying adapters that serve recorded interactions.

pub mod clock;
pub mod filesystem;
pub mod llm;

use std::sync::Mutex;

use serde::de::DeserializeOwned;

use crate::cassette::replayer::CassetteReplayer;

pub use clock::ReplayingClock;
pub use filesystem::ReplayingFileSystem;
pub use llm::ReplayingChatClient;

/// Pull the next recorded output for `port::method` out of a shared replayer.
///
/// # Panics
///
/// Panics if the lock is poisoned or the cassette has no more interactions
/// for this port/method pair.
pub(crate) fn next_output(
    replayer: &Mutex<CassetteReplayer>,
    port: &str,
    method: &str,
) -> serde_json::Value {
    let mut guard = replayer.lock().expect("replayer lock poisoned");
    guard.next_interaction(port, method).output.clone()
}

/// Decode a recorded `Result` using the `{"ok": v}` / `{"err": "msg"}` convention.
///
/// A bare value (no `ok`/`err` key) is treated as `Ok`.
pub(crate) fn replay_result<T: DeserializeOwned>(
    output: &serde_json::Value,
    context: &str,
) -> Result<T, Box<dyn std::error::Error + Send + Sync>> {
    if let Some(err) = output.get("err") {
        let msg = err.as_str().unwrap_or("unknown error").to_string();
        return Err(msg.into());
    }
    let value = output.get("ok").unwrap_or(output);
    serde_json::from_value(value.clone())
        .map_err(|e| format!("{context}: failed to deserialize: {e}").into())
}
