//! Model catalog and upstream clients for Arraf.
//!
//! # Architecture
//!
//! - [`registry`] — built-in model catalog merged with config into a [`ModelRegistry`]
//! - [`traits`] — [`ChatBackend`] and [`TranscriptionProvider`], the controller's seams
//! - [`http_provider::HttpChatClient`] — OpenAI-compatible chat-completions client
//! - [`transcription::WhisperTranscriber`] — Whisper speech-to-text client

pub mod http_provider;
pub mod registry;
pub mod traits;
pub mod transcription;

pub use http_provider::HttpChatClient;
pub use registry::{ModelRegistry, BUILTIN_MODELS};
pub use traits::{ChatBackend, TranscriptionProvider};
pub use transcription::WhisperTranscriber;
