//! Per-model API key persistence.
//!
//! Keys are written under `<prefix><model_id>` after a base64 transform.
//! This is **encoding, not encryption**: anyone who can read the store can
//! recover the keys. It only avoids keeping keys as raw freeform text.
//!
//! Storage failures never propagate: they are logged and read as absence.

use std::collections::HashMap;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tracing::{debug, warn};

use crate::storage::KeyValueStore;

/// Storage key prefix for every credential record.
pub const STORAGE_PREFIX: &str = "encrypted_api_key_";

/// Model id of the single global transcription key slot.
pub const TRANSCRIPTION_KEY_ID: &str = "transcription";

/// Reversible credential store on top of any [`KeyValueStore`].
#[derive(Clone)]
pub struct CredentialStore {
    store: Arc<dyn KeyValueStore>,
    prefix: String,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl CredentialStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self::with_prefix(store, STORAGE_PREFIX)
    }

    pub fn with_prefix(store: Arc<dyn KeyValueStore>, prefix: impl Into<String>) -> Self {
        CredentialStore {
            store,
            prefix: prefix.into(),
        }
    }

    fn record_key(&self, model_id: &str) -> String {
        format!("{}{}", self.prefix, model_id)
    }

    /// Encode and persist a key, overwriting any previous record.
    pub fn save(&self, model_id: &str, plaintext_key: &str) {
        let encoded = encode_key(plaintext_key);
        match self.store.set(&self.record_key(model_id), &encoded) {
            Ok(()) => debug!(model = model_id, "credential saved"),
            Err(e) => warn!(model = model_id, error = %e, "failed to save credential"),
        }
    }

    /// Read and decode a key. `None` if absent, unreadable, or undecodable.
    pub fn load(&self, model_id: &str) -> Option<String> {
        let encoded = match self.store.get(&self.record_key(model_id)) {
            Ok(Some(v)) if !v.is_empty() => v,
            Ok(_) => return None,
            Err(e) => {
                warn!(model = model_id, error = %e, "failed to read credential");
                return None;
            }
        };

        match decode_key(&encoded) {
            Some(key) => Some(key),
            None => {
                warn!(model = model_id, "stored credential could not be decoded");
                None
            }
        }
    }

    /// Delete a key. No-op if absent.
    pub fn remove(&self, model_id: &str) {
        match self.store.remove(&self.record_key(model_id)) {
            Ok(()) => debug!(model = model_id, "credential removed"),
            Err(e) => warn!(model = model_id, error = %e, "failed to remove credential"),
        }
    }

    /// Load every present record for the given model ids.
    pub fn load_all<'a, I>(&self, model_ids: I) -> HashMap<String, String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        model_ids
            .into_iter()
            .filter_map(|id| self.load(id).map(|key| (id.to_string(), key)))
            .collect()
    }

    // ── Global transcription slot ──

    pub fn save_global(&self, plaintext_key: &str) {
        self.save(TRANSCRIPTION_KEY_ID, plaintext_key);
    }

    /// The model-agnostic lookup used by the transcription flow.
    pub fn load_global(&self) -> Option<String> {
        self.load(TRANSCRIPTION_KEY_ID)
    }

    pub fn remove_global(&self) {
        self.remove(TRANSCRIPTION_KEY_ID);
    }
}

/// Apply the reversible transform (base64 over UTF-8).
pub fn encode_key(plaintext: &str) -> String {
    STANDARD.encode(plaintext.as_bytes())
}

/// Reverse [`encode_key`]. `None` if the input is not valid base64 of UTF-8.
pub fn decode_key(encoded: &str) -> Option<String> {
    let bytes = STANDARD.decode(encoded.trim()).ok()?;
    String::from_utf8(bytes).ok()
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
