//! Chat dispatch over an OpenAI-compatible `/chat/completions` endpoint.
//!
//! One POST per turn: bearer auth, attribution headers, the whole history as
//! `messages`. No retries; the only timeout is the transport one.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, error, warn};

use arraf_core::config::schema::EndpointsConfig;
use arraf_core::types::{ChatCompletionRequest, ChatCompletionResponse};
use arraf_core::{ChatError, Message, ModelEntry};

use crate::traits::{resolve_credential, ChatBackend};

// ─────────────────────────────────────────────
// HttpChatClient
// ─────────────────────────────────────────────

/// Dispatch client for an OpenAI-compatible chat gateway (OpenRouter by default).
pub struct HttpChatClient {
    /// HTTP client (shared, connection-pooled).
    client: reqwest::Client,
    /// Full chat-completions URL.
    chat_url: String,
    /// Attribution headers (`HTTP-Referer`, `X-Title`).
    extra_headers: HeaderMap,
}

impl std::fmt::Debug for HttpChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpChatClient")
            .field("chat_url", &self.chat_url)
            .field("extra_headers", &self.extra_headers.len())
            .finish()
    }
}

impl HttpChatClient {
    /// Build a client from the endpoints section of the config.
    pub fn new(endpoints: &EndpointsConfig) -> Result<Self, ChatError> {
        let mut extra_headers = HeaderMap::new();
        for (key, value) in [("HTTP-Referer", &endpoints.referer), ("X-Title", &endpoints.title)] {
            if value.trim().is_empty() {
                continue;
            }
            if let (Ok(name), Ok(val)) = (
                HeaderName::from_bytes(key.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                extra_headers.insert(name, val);
            } else {
                warn!("Invalid header: {}={}", key, value);
            }
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(endpoints.timeout_secs))
            .build()
            .map_err(std::io::Error::other)?;

        Ok(HttpChatClient {
            client,
            chat_url: endpoints.chat_url.clone(),
            extra_headers,
        })
    }

    pub fn chat_url(&self) -> &str {
        &self.chat_url
    }
}

#[async_trait]
impl ChatBackend for HttpChatClient {
    async fn send_chat(
        &self,
        history: &[Message],
        model: &ModelEntry,
        override_key: Option<&str>,
    ) -> Result<String, ChatError> {
        let Some(api_key) = resolve_credential(model, override_key) else {
            warn!(model = %model.id, "no API key for model");
            return Err(ChatError::Auth {
                model_id: model.id.clone(),
            });
        };

        let request_body = ChatCompletionRequest::from_history(model, history);

        debug!(
            model = %model.id,
            upstream = %model.upstream_model_id,
            messages = history.len(),
            images = history.iter().filter(|m| m.has_image()).count(),
            key_source = if override_key.is_some_and(|k| !k.trim().is_empty()) { "override" } else { "fallback" },
            "Calling chat endpoint"
        );

        let response = self
            .client
            .post(&self.chat_url)
            .bearer_auth(api_key)
            .headers(self.extra_headers.clone())
            .json(&request_body)
            .send()
            .await
            .map_err(|e| {
                error!(model = %model.id, error = %e, "HTTP request failed");
                ChatError::upstream(None, Some(format!("error contacting the model: {e}")))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!(
                model = %model.id,
                status = %status,
                body = %error_text,
                "API error"
            );
            return Err(ChatError::upstream(
                Some(status.as_u16()),
                extract_error_message(&error_text),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ChatError::MalformedResponse(format!("unreadable body: {e}")))?;

        let parsed: ChatCompletionResponse = serde_json::from_str(&body).map_err(|e| {
            error!(model = %model.id, error = %e, "Failed to parse chat response");
            ChatError::MalformedResponse(format!("invalid JSON: {e}"))
        })?;

        let content = parsed.into_first_content().ok_or_else(|| {
            ChatError::MalformedResponse("missing choices[0].message.content".into())
        })?;

        debug!(model = %model.id, chars = content.chars().count(), "Chat response received");
        Ok(content)
    }

    fn display_name(&self) -> &str {
        "OpenAI-compatible chat"
    }
}

/// Pull the provider's message out of an error body.
///
/// Accepts `{"message": "..."}`, `{"error": {"message": "..."}}`, and
/// `{"error": "..."}`. `None` when the body has none of these.
pub fn extract_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value["message"]
        .as_str()
        .or_else(|| value["error"]["message"].as_str())
        .or_else(|| value["error"].as_str())
        .map(String::from)
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use arraf_core::error::GENERIC_UPSTREAM_MESSAGE;
    use arraf_core::ImageRef;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn endpoints(chat_url: &str) -> EndpointsConfig {
        EndpointsConfig {
            chat_url: chat_url.to_string(),
            ..EndpointsConfig::default()
        }
    }

    fn client_for(server: &MockServer) -> HttpChatClient {
        HttpChatClient::new(&endpoints(&format!("{}/chat/completions", server.uri()))).unwrap()
    }

    fn qwen(fallback: Option<&str>) -> ModelEntry {
        let entry = ModelEntry::new(
            "qwen-coder",
            "Qwen Coder 32B",
            "qwen/qwen-2.5-coder-32b-instruct:free",
        );
        match fallback {
            Some(key) => entry.with_fallback_key(key),
            None => entry,
        }
    }

    fn ok_body(content: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "gen-1",
            "choices": [{ "message": { "role": "assistant", "content": content } }]
        })
    }

    // ── Unit tests ──

    #[test]
    fn test_attribution_headers() {
        let client = HttpChatClient::new(&EndpointsConfig::default()).unwrap();
        assert!(client.extra_headers.contains_key("http-referer"));
        assert_eq!(client.extra_headers["x-title"], "Arraf");
    }

    #[test]
    fn test_blank_attribution_headers_skipped() {
        let cfg = EndpointsConfig {
            referer: String::new(),
            title: " ".into(),
            ..EndpointsConfig::default()
        };
        let client = HttpChatClient::new(&cfg).unwrap();
        assert!(client.extra_headers.is_empty());
    }

    #[test]
    fn test_extract_error_message_shapes() {
        assert_eq!(
            extract_error_message(r#"{"message":"invalid key"}"#).as_deref(),
            Some("invalid key")
        );
        assert_eq!(
            extract_error_message(r#"{"error":{"message":"Rate limit exceeded","code":429}}"#)
                .as_deref(),
            Some("Rate limit exceeded")
        );
        assert_eq!(
            extract_error_message(r#"{"error":"bad model"}"#).as_deref(),
            Some("bad model")
        );
        assert_eq!(extract_error_message(r#"{"detail":"x"}"#), None);
        assert_eq!(extract_error_message("<html>502</html>"), None);
    }

    // ── Integration tests with mock server ──

    #[tokio::test]
    async fn test_chat_success_arabic() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer user-key"))
            .and(body_partial_json(serde_json::json!({
                "model": "qwen/qwen-2.5-coder-32b-instruct:free",
                "messages": [{ "role": "user", "content": "مرحبا" }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body("أهلاً")))
            .expect(1)
            .mount(&server)
            .await;

        let reply = client_for(&server)
            .send_chat(&[Message::user("مرحبا")], &qwen(None), Some("user-key"))
            .await
            .unwrap();

        assert_eq!(reply, "أهلاً");
    }

    #[tokio::test]
    async fn test_fallback_key_used_without_override() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(header("Authorization", "Bearer sk-or-fallback"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body("ok")))
            .expect(1)
            .mount(&server)
            .await;

        let reply = client_for(&server)
            .send_chat(&[Message::user("hi")], &qwen(Some("sk-or-fallback")), None)
            .await
            .unwrap();
        assert_eq!(reply, "ok");
    }

    #[tokio::test]
    async fn test_override_key_wins_over_fallback() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(header("Authorization", "Bearer sk-override"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body("ok")))
            .expect(1)
            .mount(&server)
            .await;

        let reply = client_for(&server)
            .send_chat(
                &[Message::user("hi")],
                &qwen(Some("sk-or-fallback")),
                Some("sk-override"),
            )
            .await
            .unwrap();
        assert_eq!(reply, "ok");
    }

    #[tokio::test]
    async fn test_no_key_is_auth_error_without_request() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body("unreachable")))
            .expect(0)
            .mount(&server)
            .await;

        let err = client_for(&server)
            .send_chat(&[Message::user("hi")], &qwen(None), None)
            .await
            .unwrap_err();

        match err {
            ChatError::Auth { model_id } => assert_eq!(model_id, "qwen-coder"),
            other => panic!("expected Auth, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unauthorized_carries_provider_message() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(serde_json::json!({"message": "invalid key"})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .send_chat(&[Message::user("hi")], &qwen(None), Some("bad"))
            .await
            .unwrap_err();

        match err {
            ChatError::Upstream { status, message } => {
                assert_eq!(status, Some(401));
                assert_eq!(message, "invalid key");
            }
            other => panic!("expected Upstream, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_error_without_message_uses_generic() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("<html>Bad Gateway</html>"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .send_chat(&[Message::user("hi")], &qwen(Some("k")), None)
            .await
            .unwrap_err();

        match err {
            ChatError::Upstream { status, message } => {
                assert_eq!(status, Some(502));
                assert_eq!(message, GENERIC_UPSTREAM_MESSAGE);
            }
            other => panic!("expected Upstream, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_success_without_content_is_malformed() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .send_chat(&[Message::user("hi")], &qwen(Some("k")), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_success_non_json_is_malformed() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("definitely not json"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .send_chat(&[Message::user("hi")], &qwen(Some("k")), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_image_turn_sends_multipart_content() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({
                "messages": [
                    { "role": "user", "content": "earlier" },
                    { "role": "assistant", "content": "reply" },
                    {
                        "role": "user",
                        "content": [
                            { "type": "text", "text": "what is this?" },
                            { "type": "image_url", "image_url": { "url": "https://example.com/chart.png" } }
                        ]
                    }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body("a chart")))
            .expect(1)
            .mount(&server)
            .await;

        let history = vec![
            Message::user("earlier"),
            Message::assistant("reply"),
            Message::user_with_image(
                "what is this?",
                Some(ImageRef::from_url("https://example.com/chart.png")),
            ),
        ];

        let reply = client_for(&server)
            .send_chat(&history, &qwen(Some("k")), None)
            .await
            .unwrap();
        assert_eq!(reply, "a chart");
    }

    #[tokio::test]
    async fn test_attribution_headers_sent() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(header("X-Title", "Arraf"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body("ok")))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server)
            .send_chat(&[Message::user("hi")], &qwen(Some("k")), None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_network_error_is_upstream_without_status() {
        // Point to a port that's not listening
        let client = HttpChatClient::new(&endpoints("http://127.0.0.1:1/chat/completions")).unwrap();

        let err = client
            .send_chat(&[Message::user("hi")], &qwen(Some("k")), None)
            .await
            .unwrap_err();

        match err {
            ChatError::Upstream { status, message } => {
                assert_eq!(status, None);
                assert!(message.contains("error contacting the model"));
            }
            other => panic!("expected Upstream, got {other:?}"),
        }
    }
}
