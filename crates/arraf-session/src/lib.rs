//! Conversation state for Arraf.
//!
//! [`ConversationController`] owns the history, the selected model and the
//! per-model keys, and drives one turn at a time through a
//! [`arraf_providers::ChatBackend`]. Front ends observe it through
//! [`EventSink`] and answer its questions through [`Confirmer`].

pub mod capture;
pub mod controller;
pub mod events;

pub use capture::{AudioCapture, FileCapture, NoCapture, Recording};
pub use controller::{ConversationController, KeySource, SubmissionState, TurnOutcome};
pub use events::{
    AutoConfirm, ChannelSink, Confirmer, ControllerEvent, EventSink, Notice, NoticeLevel, NullSink,
};
