//! Controller → front-end notifications and confirmation callbacks.
//!
//! The controller never prints. It emits [`ControllerEvent`]s into an
//! [`EventSink`] and asks a [`Confirmer`] before destructive actions; a
//! terminal, web, or desktop front end decides how to render them.

use tokio::sync::mpsc;

use arraf_core::Message;

use crate::controller::SubmissionState;

/// Severity of a transient user-facing notice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// A transient notification (the front end decides how long to show it).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            text: text.into(),
        }
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            text: text.into(),
        }
    }
}

/// Everything the controller reports to the front end.
#[derive(Clone, Debug, PartialEq)]
pub enum ControllerEvent {
    /// Idle ↔ Submitting transition.
    StateChanged(SubmissionState),
    /// A user or assistant message was appended to the conversation.
    MessageAppended(Message),
    ConversationCleared,
    ModelSelected { id: String, display_name: String },
    Notice(Notice),
}

/// Receives controller events. Called synchronously, never while the
/// controller's state lock is held.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: ControllerEvent);
}

/// Discards every event.
#[derive(Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: ControllerEvent) {}
}

/// Forwards events into an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ControllerEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver that drains it.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ControllerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: ControllerEvent) {
        // A dropped receiver just means nobody is listening any more.
        let _ = self.tx.send(event);
    }
}

/// Asks the user to confirm a destructive action.
pub trait Confirmer: Send + Sync {
    fn confirm(&self, prompt: &str) -> bool;
}

/// Always answers the same way.
#[derive(Debug, Clone, Copy)]
pub struct AutoConfirm(pub bool);

impl Confirmer for AutoConfirm {
    fn confirm(&self, _prompt: &str) -> bool {
        self.0
    }
}
