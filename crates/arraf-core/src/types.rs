//! Core types for Arraf.
//!
//! Two layers live here:
//! - the **domain** layer (`Message`, `ImageRef`, `ModelEntry`, `AudioClip`) owned by the
//!   conversation controller, and
//! - the **wire** layer (`ChatCompletionRequest`, `WireMessage`, …) that mirrors the
//!   OpenAI chat-completions JSON the dispatch client sends and receives.

use std::collections::BTreeSet;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ChatError;

// ─────────────────────────────────────────────
// Conversation messages
// ─────────────────────────────────────────────

/// Who authored a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Opaque image reference: a remote URL or a `data:` URI.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageRef(String);

impl ImageRef {
    /// Wrap a URL (http(s) or `data:`) as-is.
    pub fn from_url(url: impl Into<String>) -> Self {
        ImageRef(url.into())
    }

    /// Build a base64 `data:` URI from raw image bytes.
    pub fn from_bytes(mime: &str, data: &[u8]) -> Self {
        ImageRef(format!("data:{mime};base64,{}", STANDARD.encode(data)))
    }

    /// Read a local image file into a `data:` URI. The MIME type is guessed
    /// from the extension.
    pub fn from_path(path: &Path) -> Result<Self, ChatError> {
        let data = std::fs::read(path)?;
        let mime = guess_image_mime(&path.to_string_lossy());
        Ok(Self::from_bytes(mime, &data))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_data_uri(&self) -> bool {
        self.0.starts_with("data:")
    }
}

/// One turn in the conversation log. Never mutated after creation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageRef>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Create a user message with text only.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content.into(), None)
    }

    /// Create a user message with an optional attached image.
    pub fn user_with_image(content: impl Into<String>, image: Option<ImageRef>) -> Self {
        Self::new(Role::User, content.into(), image)
    }

    /// Create an assistant reply.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content.into(), None)
    }

    fn new(role: Role, content: String, image: Option<ImageRef>) -> Self {
        Message {
            role,
            content,
            image,
            created_at: Utc::now(),
        }
    }

    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }
}

// ─────────────────────────────────────────────
// Model catalog entry
// ─────────────────────────────────────────────

/// One selectable upstream model.
///
/// The fallback key is a default credential injected from configuration at
/// startup; it is used only when the user has not stored an override.
#[derive(Clone, PartialEq, Eq)]
pub struct ModelEntry {
    /// Unique catalog id (e.g. `"qwen-coder"`).
    pub id: String,
    /// Human-readable name (e.g. `"Qwen Coder 32B"`).
    pub display_name: String,
    /// Model string sent upstream (e.g. `"qwen/qwen-2.5-coder-32b-instruct:free"`).
    pub upstream_model_id: String,
    pub fallback_key: Option<String>,
    pub capability_tags: BTreeSet<String>,
}

impl ModelEntry {
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        upstream_model_id: impl Into<String>,
    ) -> Self {
        ModelEntry {
            id: id.into(),
            display_name: display_name.into(),
            upstream_model_id: upstream_model_id.into(),
            fallback_key: None,
            capability_tags: BTreeSet::new(),
        }
    }

    /// Attach a fallback key. Blank keys are ignored.
    pub fn with_fallback_key(mut self, key: impl Into<String>) -> Self {
        let key = key.into();
        self.fallback_key = if key.trim().is_empty() { None } else { Some(key) };
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capability_tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn has_fallback_key(&self) -> bool {
        self.fallback_key.is_some()
    }
}

// Keys must never end up in logs.
impl std::fmt::Debug for ModelEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelEntry")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("upstream_model_id", &self.upstream_model_id)
            .field("fallback_key", &self.fallback_key.as_ref().map(|_| "<redacted>"))
            .field("capability_tags", &self.capability_tags)
            .finish()
    }
}

// ─────────────────────────────────────────────
// Audio
// ─────────────────────────────────────────────

/// A recorded audio blob, opaque to Arraf. Only uploaded, never decoded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioClip {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime_type: String,
}

impl AudioClip {
    /// Default upload name for recordings.
    pub const DEFAULT_FILE_NAME: &'static str = "audio.wav";

    /// A WAV recording with the default upload name.
    pub fn wav(bytes: Vec<u8>) -> Self {
        AudioClip {
            bytes,
            file_name: Self::DEFAULT_FILE_NAME.to_string(),
            mime_type: "audio/wav".to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// ─────────────────────────────────────────────
// Wire format (OpenAI chat completions)
// ─────────────────────────────────────────────

/// A message as sent upstream.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WireMessage {
    pub role: Role,
    pub content: MessageContent,
}

/// Plain text, or multipart (text + image) for vision models.
///
/// Serialized untagged: text becomes a JSON string, parts an array.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// A single part of a multipart message.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ImageUrl {
    pub url: String,
}

impl From<&Message> for WireMessage {
    fn from(msg: &Message) -> Self {
        let content = match &msg.image {
            Some(image) => MessageContent::Parts(vec![
                ContentPart::Text {
                    text: msg.content.clone(),
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: image.as_str().to_string(),
                    },
                },
            ]),
            None => MessageContent::Text(msg.content.clone()),
        };
        WireMessage {
            role: msg.role,
            content,
        }
    }
}

/// Request body for `/chat/completions`.
#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
}

impl ChatCompletionRequest {
    /// Build a request from the conversation history, order preserved.
    pub fn from_history(model: &ModelEntry, history: &[Message]) -> Self {
        ChatCompletionRequest {
            model: model.upstream_model_id.clone(),
            messages: history.iter().map(WireMessage::from).collect(),
        }
    }
}

/// Success body of `/chat/completions`.
///
/// Every field is optional so a missing path is reported as a malformed
/// response rather than a deserialization failure.
#[derive(Debug, Default, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Option<Vec<ChatChoice>>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    #[serde(default)]
    pub message: Option<AssistantMessage>,
}

#[derive(Debug, Deserialize)]
pub struct AssistantMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatCompletionResponse {
    /// Text of the first choice, if the response has the expected shape.
    pub fn into_first_content(self) -> Option<String> {
        self.choices?
            .into_iter()
            .next()?
            .message?
            .content
    }
}

/// Success body of `/audio/transcriptions`.
#[derive(Debug, Deserialize)]
pub struct TranscriptionResponse {
    #[serde(default)]
    pub text: Option<String>,
}

// ─────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────

/// Guess an image MIME type from a file name. Defaults to JPEG.
pub fn guess_image_mime(path: &str) -> &'static str {
    let lower = path.to_lowercase();
    if lower.ends_with(".png") {
        "image/png"
    } else if lower.ends_with(".gif") {
        "image/gif"
    } else if lower.ends_with(".webp") {
        "image/webp"
    } else if lower.ends_with(".svg") {
        "image/svg+xml"
    } else {
        "image/jpeg"
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_message_serializes_as_string() {
        let wire = WireMessage::from(&Message::user("مرحبا"));
        let json = serde_json::to_value(&wire).unwrap();

        assert_eq!(json, json!({"role": "user", "content": "مرحبا"}));
    }

    #[test]
    fn test_image_message_serializes_as_parts() {
        let msg = Message::user_with_image(
            "What's in this image?",
            Some(ImageRef::from_url("data:image/png;base64,abc123")),
        );
        let json = serde_json::to_value(WireMessage::from(&msg)).unwrap();

        assert_eq!(json["role"], "user");
        let content = json["content"].as_array().unwrap();
        assert_eq!(content.len(), 2);
        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[0]["text"], "What's in this image?");
        assert_eq!(content[1]["type"], "image_url");
        assert_eq!(content[1]["image_url"]["url"], "data:image/png;base64,abc123");
    }

    #[test]
    fn test_request_preserves_order_and_uses_upstream_id() {
        let model = ModelEntry::new("gemma-3", "Gemma 3 4B", "google/gemma-3-4b-it:free");
        let history = vec![
            Message::user("one"),
            Message::assistant("two"),
            Message::user("three"),
        ];
        let json = serde_json::to_value(ChatCompletionRequest::from_history(&model, &history)).unwrap();

        assert_eq!(json["model"], "google/gemma-3-4b-it:free");
        let messages = json["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0]["content"], "one");
        assert_eq!(messages[1]["role"], "assistant");
        assert_eq!(messages[2]["content"], "three");
    }

    #[test]
    fn test_response_first_content() {
        let resp: ChatCompletionResponse = serde_json::from_value(json!({
            "choices": [
                {"message": {"content": "أهلاً"}},
                {"message": {"content": "ignored"}}
            ]
        }))
        .unwrap();
        assert_eq!(resp.into_first_content().as_deref(), Some("أهلاً"));
    }

    #[test]
    fn test_response_missing_shape() {
        let empty: ChatCompletionResponse = serde_json::from_value(json!({})).unwrap();
        assert!(empty.into_first_content().is_none());

        let no_choices: ChatCompletionResponse =
            serde_json::from_value(json!({"choices": []})).unwrap();
        assert!(no_choices.into_first_content().is_none());

        let null_content: ChatCompletionResponse =
            serde_json::from_value(json!({"choices": [{"message": {"content": null}}]})).unwrap();
        assert!(null_content.into_first_content().is_none());
    }

    #[test]
    fn test_image_from_bytes_is_data_uri() {
        let image = ImageRef::from_bytes("image/png", b"Hello");
        assert_eq!(image.as_str(), "data:image/png;base64,SGVsbG8=");
        assert!(image.is_data_uri());
        assert!(!ImageRef::from_url("https://example.com/a.png").is_data_uri());
    }

    #[test]
    fn test_image_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chart.webp");
        std::fs::write(&path, b"ABC").unwrap();

        let image = ImageRef::from_path(&path).unwrap();
        assert_eq!(image.as_str(), "data:image/webp;base64,QUJD");
    }

    #[test]
    fn test_image_from_missing_path() {
        let err = ImageRef::from_path(Path::new("/nonexistent/photo.png")).unwrap_err();
        assert!(matches!(err, ChatError::Io(_)));
    }

    #[test]
    fn test_guess_image_mime() {
        assert_eq!(guess_image_mime("photo.png"), "image/png");
        assert_eq!(guess_image_mime("photo.PNG"), "image/png");
        assert_eq!(guess_image_mime("photo.jpg"), "image/jpeg");
        assert_eq!(guess_image_mime("photo.gif"), "image/gif");
        assert_eq!(guess_image_mime("photo.unknown"), "image/jpeg");
    }

    #[test]
    fn test_model_entry_debug_redacts_key() {
        let model = ModelEntry::new("qwen-coder", "Qwen Coder 32B", "qwen/qwen")
            .with_fallback_key("sk-or-secret");
        let debug = format!("{model:?}");
        assert!(!debug.contains("sk-or-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_blank_fallback_key_ignored() {
        let model = ModelEntry::new("a", "A", "a/a").with_fallback_key("  ");
        assert!(!model.has_fallback_key());
    }

    #[test]
    fn test_message_roles() {
        assert_eq!(Message::user("hi").role, Role::User);
        assert_eq!(Message::assistant("hello").role.as_str(), "assistant");
        assert!(!Message::user("hi").has_image());
    }
}
