//! Error type shared by the dispatch client, credential store, and controller.

use thiserror::Error;

/// Generic message used when the upstream error body carries no message.
pub const GENERIC_UPSTREAM_MESSAGE: &str = "error contacting the model";

/// Everything that can go wrong while assembling, dispatching, or answering a turn.
///
/// None of these are fatal: the controller surfaces them as notices and
/// returns to idle.
#[derive(Debug, Error)]
pub enum ChatError {
    /// No credential could be resolved (no override, no fallback).
    #[error("no API key available for model '{model_id}'")]
    Auth { model_id: String },

    /// The upstream API answered with a non-success status, or could not be reached.
    #[error("{message}")]
    Upstream {
        /// HTTP status, `None` when the request never got a response.
        status: Option<u16>,
        message: String,
    },

    /// A success response without the expected fields.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Durable storage read/write failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Microphone (or capture source) unavailable or refused.
    #[error("audio capture unavailable: {0}")]
    MediaAccess(String),

    /// A turn is already being submitted.
    #[error("a message is already being sent")]
    SubmissionInFlight,

    #[error("unknown model '{0}'")]
    UnknownModel(String),

    /// A blank key was submitted for saving.
    #[error("please enter a valid key")]
    EmptyCredential,

    /// The model catalog failed validation at startup.
    #[error("invalid model catalog: {0}")]
    InvalidRegistry(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ChatError {
    /// Build an upstream error, falling back to the generic message when
    /// the provider supplied none.
    pub fn upstream(status: Option<u16>, message: Option<String>) -> Self {
        let message = message
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| GENERIC_UPSTREAM_MESSAGE.to_string());
        ChatError::Upstream { status, message }
    }

    /// Whether the error came from the remote API (as opposed to local state).
    pub fn is_upstream(&self) -> bool {
        matches!(self, ChatError::Upstream { .. } | ChatError::MalformedResponse(_))
    }
}
