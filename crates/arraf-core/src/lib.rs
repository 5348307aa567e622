//! Arraf core — shared types, errors, credential storage, and configuration.
//!
//! # Modules
//!
//! - [`types`] — conversation messages, model entries, and the chat-completions wire format
//! - [`error`] — the [`ChatError`] enum used across every crate
//! - [`storage`] — the [`KeyValueStore`] capability trait and its file/memory backings
//! - [`credentials`] — per-model API key persistence on top of a `KeyValueStore`
//! - [`config`] — `~/.arraf/config.json` schema, loader, and env overrides
//! - [`utils`] — paths and small string helpers

pub mod config;
pub mod credentials;
pub mod error;
pub mod storage;
pub mod types;
pub mod utils;

pub use credentials::CredentialStore;
pub use error::ChatError;
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError};
pub use types::{AudioClip, ImageRef, Message, ModelEntry, Role};
