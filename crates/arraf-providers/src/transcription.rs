//! Voice transcription — speech-to-text via an OpenAI-compatible Whisper API.
//!
//! The credential is a single global key (not per model): the stored
//! transcription key wins, then the configured one.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, warn};

use arraf_core::config::schema::EndpointsConfig;
use arraf_core::credentials::TRANSCRIPTION_KEY_ID;
use arraf_core::types::TranscriptionResponse;
use arraf_core::{AudioClip, ChatError, CredentialStore};

use crate::http_provider::extract_error_message;
use crate::traits::TranscriptionProvider;

// ─────────────────────────────────────────────
// Whisper
// ─────────────────────────────────────────────

/// Whisper transcription client (`/v1/audio/transcriptions`).
pub struct WhisperTranscriber {
    client: reqwest::Client,
    api_url: String,
    model: String,
    credentials: CredentialStore,
    /// Key from config/env, used when nothing is stored.
    configured_key: Option<String>,
}

impl WhisperTranscriber {
    pub fn new(
        endpoints: &EndpointsConfig,
        credentials: CredentialStore,
        configured_key: &str,
    ) -> Result<Self, ChatError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(endpoints.timeout_secs))
            .build()
            .map_err(std::io::Error::other)?;

        let configured_key = Some(configured_key.trim().to_string()).filter(|k| !k.is_empty());

        Ok(Self {
            client,
            api_url: endpoints.transcription_url.clone(),
            model: endpoints.transcription_model.clone(),
            credentials,
            configured_key,
        })
    }

    /// Resolve the global transcription key.
    fn resolve_key(&self) -> Option<String> {
        self.credentials
            .load_global()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| self.configured_key.clone())
    }

    /// Whether any key is available.
    pub fn is_configured(&self) -> bool {
        self.resolve_key().is_some()
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl TranscriptionProvider for WhisperTranscriber {
    async fn transcribe(&self, clip: &AudioClip) -> Result<String, ChatError> {
        if clip.is_empty() {
            warn!("transcription: empty recording, skipping upload");
            return Err(ChatError::MediaAccess("recording is empty".into()));
        }

        let Some(api_key) = self.resolve_key() else {
            warn!("transcription: no API key configured");
            return Err(ChatError::Auth {
                model_id: TRANSCRIPTION_KEY_ID.to_string(),
            });
        };

        debug!(
            file = %clip.file_name,
            bytes = clip.bytes.len(),
            model = %self.model,
            "transcribing audio"
        );

        let file_part = reqwest::multipart::Part::bytes(clip.bytes.clone())
            .file_name(clip.file_name.clone())
            .mime_str(&clip.mime_type)
            .map_err(|e| ChatError::MediaAccess(format!("invalid audio type '{}': {e}", clip.mime_type)))?;

        let form = reqwest::multipart::Form::new()
            .part("file", file_part)
            .text("model", self.model.clone());

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "transcription request failed");
                ChatError::upstream(None, Some(format!("error contacting transcription service: {e}")))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(
                status = %status,
                body = %body,
                "transcription API error"
            );
            return Err(ChatError::upstream(
                Some(status.as_u16()),
                extract_error_message(&body)
                    .or_else(|| Some("failed to convert speech to text".to_string())),
            ));
        }

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| ChatError::MalformedResponse(format!("invalid transcription body: {e}")))?;

        let text = parsed
            .text
            .ok_or_else(|| ChatError::MalformedResponse("missing text field".into()))?;

        debug!(chars = text.chars().count(), "transcription complete");

        Ok(text)
    }

    fn display_name(&self) -> &str {
        "Whisper"
    }
}

// ─────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────

/// Check if a file path looks like an audio file.
pub fn is_audio_file(path: &str) -> bool {
    audio_mime(path).is_some()
}

/// MIME type for a known audio extension.
pub fn audio_mime(path: &str) -> Option<&'static str> {
    let lower = path.to_lowercase();
    let ext = lower.rsplit_once('.').map(|(_, ext)| ext)?;
    let mime = match ext {
        "wav" => "audio/wav",
        "mp3" => "audio/mpeg",
        "m4a" => "audio/mp4",
        "ogg" | "oga" => "audio/ogg",
        "opus" => "audio/opus",
        "flac" => "audio/flac",
        "aac" => "audio/aac",
        "webm" => "audio/webm",
        _ => return None,
    };
    Some(mime)
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
