//! Configuration schema.
//!
//! Hierarchy: `Config` → `DefaultsConfig`, `EndpointsConfig`, `TranscriptionConfig`,
//! `StorageConfig`, and a list of `ModelConfig` catalog overrides.
//!
//! JSON on disk uses **camelCase** keys; Rust uses snake_case.

use serde::{Deserialize, Serialize};

/// Root configuration — loaded from `~/.arraf/config.json` + env vars.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub defaults: DefaultsConfig,
    pub endpoints: EndpointsConfig,
    pub transcription: TranscriptionConfig,
    pub storage: StorageConfig,
    /// Catalog additions and overrides, merged over the built-in models.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub models: Vec<ModelConfig>,
}

impl Config {
    /// Find the configured entry for a model id.
    pub fn model(&self, id: &str) -> Option<&ModelConfig> {
        self.models.iter().find(|m| m.id == id)
    }
}

// ─────────────────────────────────────────────
// Defaults
// ─────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DefaultsConfig {
    /// Model id selected at startup.
    pub model: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            model: "qwen-coder".to_string(),
        }
    }
}

// ─────────────────────────────────────────────
// Endpoints
// ─────────────────────────────────────────────

/// Upstream endpoints and request attribution.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EndpointsConfig {
    /// Full chat-completions URL.
    pub chat_url: String,
    /// Full audio-transcriptions URL.
    pub transcription_url: String,
    /// Transcription model name sent in the multipart form.
    pub transcription_model: String,
    /// `HTTP-Referer` header sent with chat requests.
    pub referer: String,
    /// `X-Title` header sent with chat requests.
    pub title: String,
    /// Transport timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            chat_url: "https://openrouter.ai/api/v1/chat/completions".to_string(),
            transcription_url: "https://api.openai.com/v1/audio/transcriptions".to_string(),
            transcription_model: "whisper-1".to_string(),
            referer: "https://github.com/arraf-chat/arraf".to_string(),
            title: "Arraf".to_string(),
            timeout_secs: 120,
        }
    }
}

// ─────────────────────────────────────────────
// Transcription
// ─────────────────────────────────────────────

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TranscriptionConfig {
    /// Key used when no transcription key has been stored.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub api_key: String,
}

impl TranscriptionConfig {
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

// ─────────────────────────────────────────────
// Storage
// ─────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageConfig {
    /// Credential store file (`~` is expanded).
    pub credentials_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            credentials_path: "~/.arraf/credentials.json".to_string(),
        }
    }
}

// ─────────────────────────────────────────────
// Models
// ─────────────────────────────────────────────

/// A catalog entry override or addition.
///
/// For a built-in id, every `Some` field replaces the built-in value. For a new
/// id, `upstream_model_id` is required.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModelConfig {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_model_id: Option<String>,
    /// Default credential for this model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capability_tags: Option<Vec<String>>,
}

impl ModelConfig {
    pub fn new(id: impl Into<String>) -> Self {
        ModelConfig {
            id: id.into(),
            ..Default::default()
        }
    }
}
