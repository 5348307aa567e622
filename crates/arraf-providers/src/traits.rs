//! Backend traits — the seams between the conversation controller and the
//! upstream HTTP APIs.
//!
//! [`HttpChatClient`](crate::http_provider::HttpChatClient) and
//! [`WhisperTranscriber`](crate::transcription::WhisperTranscriber) are the
//! production implementations; tests drive the controller with stubs.

use async_trait::async_trait;

use arraf_core::{AudioClip, ChatError, Message, ModelEntry};

/// Chat-completion dispatch.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send the conversation to `model` and return the first completion's text.
    ///
    /// # Arguments
    /// * `history`      — full conversation, oldest first, including the new user turn.
    /// * `model`        — the selected catalog entry.
    /// * `override_key` — user-stored key; wins over `model.fallback_key` when non-blank.
    ///
    /// # Errors
    /// `Auth` when no key resolves, `Upstream` on a non-success response or
    /// transport failure, `MalformedResponse` when the reply has no text.
    async fn send_chat(
        &self,
        history: &[Message],
        model: &ModelEntry,
        override_key: Option<&str>,
    ) -> Result<String, ChatError>;

    /// Display name for logging.
    fn display_name(&self) -> &str;
}

/// Speech-to-text transcription.
#[async_trait]
pub trait TranscriptionProvider: Send + Sync {
    /// Upload a recorded clip and return its transcript.
    async fn transcribe(&self, clip: &AudioClip) -> Result<String, ChatError>;

    /// Display name for logging.
    fn display_name(&self) -> &str;
}

/// Pick the credential for a chat request: a non-blank override, else the
/// model's fallback key.
pub fn resolve_credential<'a>(model: &'a ModelEntry, override_key: Option<&'a str>) -> Option<&'a str> {
    override_key
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .or_else(|| model.fallback_key.as_deref().map(str::trim).filter(|k| !k.is_empty()))
}
