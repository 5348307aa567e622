//! Audio capture behind a capability trait.
//!
//! A [`Recording`] holds the capture source exclusively until it is finished
//! or dropped. Arraf treats audio as an opaque blob: nothing here decodes it.
//!
//! Backings:
//! - [`NoCapture`] — no microphone; every start fails with `MediaAccess`
//! - [`FileCapture`] — "records" a pre-recorded audio file, for terminals

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use arraf_core::{AudioClip, ChatError};
use arraf_providers::transcription::{audio_mime, is_audio_file};

/// A source of recorded audio.
pub trait AudioCapture: Send + Sync {
    /// Acquire the source and start recording.
    fn start(&self) -> Result<Box<dyn Recording>, ChatError>;
}

/// An in-progress recording. Dropping it releases the source.
pub trait Recording: Send {
    /// Stop, release the source, and return the clip.
    fn finish(self: Box<Self>) -> Result<AudioClip, ChatError>;
}

// ─────────────────────────────────────────────
// NoCapture
// ─────────────────────────────────────────────

#[derive(Debug, Default, Clone, Copy)]
pub struct NoCapture;

impl AudioCapture for NoCapture {
    fn start(&self) -> Result<Box<dyn Recording>, ChatError> {
        Err(ChatError::MediaAccess("no audio input device available".into()))
    }
}

// ─────────────────────────────────────────────
// FileCapture
// ─────────────────────────────────────────────

/// Capture that yields the contents of an audio file.
#[derive(Debug, Clone)]
pub struct FileCapture {
    path: PathBuf,
    in_use: Arc<AtomicBool>,
}

impl FileCapture {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            in_use: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a recording currently holds this source.
    pub fn is_in_use(&self) -> bool {
        self.in_use.load(Ordering::Acquire)
    }
}

impl AudioCapture for FileCapture {
    fn start(&self) -> Result<Box<dyn Recording>, ChatError> {
        let shown = self.path.display().to_string();
        if !is_audio_file(&shown) {
            return Err(ChatError::MediaAccess(format!("not an audio file: {shown}")));
        }
        if !self.path.is_file() {
            return Err(ChatError::MediaAccess(format!("audio file not found: {shown}")));
        }
        if self
            .in_use
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ChatError::MediaAccess("audio source is busy".into()));
        }

        debug!(path = %self.path.display(), "capture started");
        Ok(Box::new(FileRecording {
            path: self.path.clone(),
            _lease: CaptureLease(self.in_use.clone()),
        }))
    }
}

/// Releases the capture source when dropped.
struct CaptureLease(Arc<AtomicBool>);

impl Drop for CaptureLease {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
        debug!("capture released");
    }
}

struct FileRecording {
    path: PathBuf,
    _lease: CaptureLease,
}

impl Recording for FileRecording {
    fn finish(self: Box<Self>) -> Result<AudioClip, ChatError> {
        let bytes = std::fs::read(&self.path)
            .map_err(|e| ChatError::MediaAccess(format!("failed to read recording: {e}")))?;

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| AudioClip::DEFAULT_FILE_NAME.to_string());
        let mime_type = audio_mime(&file_name).unwrap_or("audio/wav").to_string();

        Ok(AudioClip {
            bytes,
            file_name,
            mime_type,
        })
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
