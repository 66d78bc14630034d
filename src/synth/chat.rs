//! Role-aware chat calls with per-role timeouts.

use tracing::debug;

use crate::config::SynthConfig;
use crate::context::ServiceContext;
use crate::error::{SynthError, SynthResult};
use crate::ports::llm::{ChatRequest, ChatRole};

/// Sends one chat round-trip for `role` and returns the raw reply text.
///
/// # Errors
///
/// Returns [`SynthError::Timeout`] when the role's timeout elapses and
/// [`SynthError::Llm`] when the backend reports a failure.
pub async fn ask(
    ctx: &ServiceContext,
    config: &SynthConfig,
    role: ChatRole,
    system: &str,
    user: String,
) -> SynthResult<String> {
    let request =
        ChatRequest { system: system.to_string(), user, options: config.chat_options(role) };
    let limit = config.timeout_for(role);
    debug!(%role, prompt_chars = request.user.len(), "sending chat request");

    let response = tokio::time::timeout(limit, ctx.llm.chat(&request))
        .await
        .map_err(|_| SynthError::Timeout { role, secs: limit.as_secs() })?
        .map_err(|e| SynthError::Llm { role, message: e.to_string() })?;

    debug!(
        %role,
        prompt_tokens = response.prompt_tokens,
        completion_tokens = response.completion_tokens,
        "chat response received"
    );
    Ok(response.text)
}
