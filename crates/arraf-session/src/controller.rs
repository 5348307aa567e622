//! Conversation controller — owns the chat history and drives each turn.
//!
//! Per submission: `Idle → Submitting → Idle`. Only one submission may be in
//! flight; another `submit_turn` while `Submitting` is rejected, not queued.
//! The user message is appended before the network call (optimistic); the
//! assistant reply is appended only on success.
//!
//! State sits behind a `std::sync::Mutex` that is only held for short,
//! synchronous sections and never across `.await`.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use arraf_core::{ChatError, CredentialStore, ImageRef, Message, ModelEntry};
use arraf_providers::{ChatBackend, ModelRegistry, TranscriptionProvider};

use crate::capture::AudioCapture;
use crate::events::{Confirmer, ControllerEvent, EventSink, Notice};

/// Prompt passed to the [`Confirmer`] before clearing.
pub const CLEAR_PROMPT: &str = "Clear the whole conversation?";

/// Submission gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmissionState {
    Idle,
    Submitting,
}

/// Result of a successful `submit_turn` call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Blank text and no image: nothing was sent.
    Ignored,
    /// The assistant's reply, already appended to the conversation.
    Replied(String),
}

/// Where a model's credential would come from right now.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeySource {
    Override,
    Fallback,
    Missing,
}

struct ControllerState {
    conversation: Vec<Message>,
    submission: SubmissionState,
    selected: String,
    /// User-supplied keys by model id, hydrated from the credential store.
    keys: HashMap<String, String>,
}

// ─────────────────────────────────────────────
// ConversationController
// ─────────────────────────────────────────────

pub struct ConversationController {
    registry: Arc<ModelRegistry>,
    credentials: CredentialStore,
    backend: Arc<dyn ChatBackend>,
    transcriber: Option<Arc<dyn TranscriptionProvider>>,
    events: Arc<dyn EventSink>,
    confirmer: Arc<dyn Confirmer>,
    state: Mutex<ControllerState>,
}

impl ConversationController {
    /// Create a controller with the registry's default model selected and
    /// every stored key loaded.
    pub fn new(
        registry: Arc<ModelRegistry>,
        credentials: CredentialStore,
        backend: Arc<dyn ChatBackend>,
        events: Arc<dyn EventSink>,
        confirmer: Arc<dyn Confirmer>,
    ) -> Self {
        let keys = credentials.load_all(registry.ids());
        let selected = registry.default_model().id.clone();

        debug!(
            model = %selected,
            stored_keys = keys.len(),
            backend = backend.display_name(),
            "conversation controller ready"
        );

        ConversationController {
            registry,
            credentials,
            backend,
            transcriber: None,
            events,
            confirmer,
            state: Mutex::new(ControllerState {
                conversation: Vec::new(),
                submission: SubmissionState::Idle,
                selected,
                keys,
            }),
        }
    }

    /// Enable dictation through the given transcription provider.
    pub fn with_transcriber(mut self, transcriber: Arc<dyn TranscriptionProvider>) -> Self {
        self.transcriber = Some(transcriber);
        self
    }

    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, notice: Notice) {
        self.events.emit(ControllerEvent::Notice(notice));
    }

    // ── Turn submission ──

    /// Submit a user turn.
    ///
    /// Returns `Ignored` for blank text without an image. While another turn
    /// is in flight, fails with `SubmissionInFlight` and leaves the history
    /// untouched. On a dispatch failure the user message stays in the history
    /// without a reply, an error notice is emitted, and the error is returned.
    pub async fn submit_turn(
        &self,
        text: &str,
        image: Option<ImageRef>,
    ) -> Result<TurnOutcome, ChatError> {
        if text.trim().is_empty() && image.is_none() {
            return Ok(TurnOutcome::Ignored);
        }

        let (history, model, override_key, user_message) = {
            let mut state = self.lock();
            if state.submission == SubmissionState::Submitting {
                debug!("submission rejected: another turn is in flight");
                return Err(ChatError::SubmissionInFlight);
            }

            let model = self
                .registry
                .find_by_id(&state.selected)
                .cloned()
                .ok_or_else(|| ChatError::UnknownModel(state.selected.clone()))?;

            let user_message = Message::user_with_image(text, image);
            state.conversation.push(user_message.clone());
            state.submission = SubmissionState::Submitting;

            let override_key = state.keys.get(&model.id).cloned();
            (state.conversation.clone(), model, override_key, user_message)
        };

        // Resets to Idle on every exit path, including a dropped future.
        let _gate = SubmissionGate { controller: self };

        self.events.emit(ControllerEvent::MessageAppended(user_message));
        self.events
            .emit(ControllerEvent::StateChanged(SubmissionState::Submitting));

        info!(model = %model.id, turns = history.len(), "submitting turn");

        match self
            .backend
            .send_chat(&history, &model, override_key.as_deref())
            .await
        {
            Ok(reply) => {
                let assistant = Message::assistant(reply.clone());
                self.lock().conversation.push(assistant.clone());
                self.events.emit(ControllerEvent::MessageAppended(assistant));
                Ok(TurnOutcome::Replied(reply))
            }
            Err(e) => {
                warn!(model = %model.id, error = %e, "turn failed");
                self.notify(Notice::error(e.to_string()));
                Err(e)
            }
        }
    }

    /// Empty the conversation if the user confirms.
    ///
    /// Refused while a turn is in flight. Returns whether it was cleared.
    pub fn clear_conversation(&self) -> bool {
        if self.state() == SubmissionState::Submitting {
            self.notify(Notice::info("wait for the current reply before clearing"));
            return false;
        }

        if !self.confirmer.confirm(CLEAR_PROMPT) {
            debug!("clear declined");
            return false;
        }

        let removed = {
            let mut state = self.lock();
            let n = state.conversation.len();
            state.conversation.clear();
            n
        };

        info!(removed, "conversation cleared");
        self.events.emit(ControllerEvent::ConversationCleared);
        self.notify(Notice::success("conversation cleared"));
        true
    }

    // ── Model and key selection ──

    pub fn select_model(&self, id: &str) -> Result<ModelEntry, ChatError> {
        let Some(model) = self.registry.find_by_id(id).cloned() else {
            self.notify(Notice::error(format!("unknown model '{id}'")));
            return Err(ChatError::UnknownModel(id.to_string()));
        };

        self.lock().selected = model.id.clone();
        debug!(model = %model.id, "model selected");
        self.events.emit(ControllerEvent::ModelSelected {
            id: model.id.clone(),
            display_name: model.display_name.clone(),
        });
        Ok(model)
    }

    /// Store a key for a model and select that model.
    pub fn set_credential(&self, model_id: &str, key: &str) -> Result<(), ChatError> {
        let key = key.trim();
        if key.is_empty() {
            self.notify(Notice::error(ChatError::EmptyCredential.to_string()));
            return Err(ChatError::EmptyCredential);
        }
        if self.registry.find_by_id(model_id).is_none() {
            self.notify(Notice::error(format!("unknown model '{model_id}'")));
            return Err(ChatError::UnknownModel(model_id.to_string()));
        }

        self.credentials.save(model_id, key);
        self.lock().keys.insert(model_id.to_string(), key.to_string());
        self.notify(Notice::success("key saved"));
        self.select_model(model_id)?;
        Ok(())
    }

    /// Forget a model's stored key. The fallback key (if any) applies again.
    pub fn remove_credential(&self, model_id: &str) -> Result<(), ChatError> {
        if self.registry.find_by_id(model_id).is_none() {
            self.notify(Notice::error(format!("unknown model '{model_id}'")));
            return Err(ChatError::UnknownModel(model_id.to_string()));
        }

        self.credentials.remove(model_id);
        let had_key = self.lock().keys.remove(model_id).is_some();
        if had_key {
            self.notify(Notice::info("key removed"));
        }
        Ok(())
    }

    /// Store the global transcription key.
    pub fn set_transcription_key(&self, key: &str) -> Result<(), ChatError> {
        let key = key.trim();
        if key.is_empty() {
            self.notify(Notice::error(ChatError::EmptyCredential.to_string()));
            return Err(ChatError::EmptyCredential);
        }
        self.credentials.save_global(key);
        self.notify(Notice::success("transcription key saved"));
        Ok(())
    }

    pub fn remove_transcription_key(&self) {
        self.credentials.remove_global();
        self.notify(Notice::info("transcription key removed"));
    }

    // ── Dictation ──

    /// Record from `capture` until `stop` resolves, then transcribe.
    ///
    /// The capture source is released before the upload starts. The
    /// transcript is returned for the front end to place in its input line;
    /// the conversation is not touched.
    pub async fn dictate<F>(&self, capture: &dyn AudioCapture, stop: F) -> Result<String, ChatError>
    where
        F: Future<Output = ()>,
    {
        let result = self.record_and_transcribe(capture, stop).await;
        if let Err(e) = &result {
            warn!(error = %e, "dictation failed");
            self.notify(Notice::error(e.to_string()));
        }
        result
    }

    async fn record_and_transcribe<F>(
        &self,
        capture: &dyn AudioCapture,
        stop: F,
    ) -> Result<String, ChatError>
    where
        F: Future<Output = ()>,
    {
        let Some(transcriber) = self.transcriber.clone() else {
            return Err(ChatError::MediaAccess("voice input is not configured".into()));
        };

        let recording = capture.start()?;
        stop.await;
        let clip = recording.finish()?;

        debug!(
            bytes = clip.bytes.len(),
            provider = transcriber.display_name(),
            "recording finished"
        );
        transcriber.transcribe(&clip).await
    }

    // ── Accessors ──

    /// Snapshot of the conversation, oldest first.
    pub fn conversation(&self) -> Vec<Message> {
        self.lock().conversation.clone()
    }

    pub fn state(&self) -> SubmissionState {
        self.lock().submission
    }

    pub fn selected_model(&self) -> ModelEntry {
        let id = self.lock().selected.clone();
        self.registry
            .find_by_id(&id)
            .cloned()
            .unwrap_or_else(|| self.registry.default_model().clone())
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn has_override(&self, model_id: &str) -> bool {
        self.lock().keys.contains_key(model_id)
    }

    pub fn key_source(&self, model: &ModelEntry) -> KeySource {
        if self.has_override(&model.id) {
            KeySource::Override
        } else if model.has_fallback_key() {
            KeySource::Fallback
        } else {
            KeySource::Missing
        }
    }
}

/// Returns the controller to `Idle` when dropped.
struct SubmissionGate<'a> {
    controller: &'a ConversationController,
}

impl Drop for SubmissionGate<'_> {
    fn drop(&mut self) {
        self.controller.lock().submission = SubmissionState::Idle;
        self.controller
            .events
            .emit(ControllerEvent::StateChanged(SubmissionState::Idle));
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
