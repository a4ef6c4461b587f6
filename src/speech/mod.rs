//! Speech input and output adapters
//!
//! The turn controller only sees the [`SpeechInput`] and [`SpeechOutput`]
//! traits. Platform work (microphone, relay STT/TTS, speakers) sits behind
//! [`TranscriptSource`] and [`Voice`], wrapped by the generic [`Listener`]
//! and [`Speaker`] which own session bookkeeping and report back through
//! the controller's event channel.

mod input;
mod output;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;

pub use input::{Listener, MicrophoneSource, SpeechInput, TranscriptSource, UnavailableSource};
pub use output::{ConsoleVoice, Playback, RelayVoice, Speaker, SpeechOutput, Voice};

/// Why a capture session produced no transcript
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CaptureError {
    /// A capture session is already running
    #[error("capture already in progress")]
    AlreadyCapturing,

    /// No usable input device or permission denied
    #[error("speech input unavailable: {0}")]
    Unavailable(String),

    /// Nothing was said before the listen window closed
    #[error("no speech detected")]
    NoSpeech,

    /// Recording or transcription failed
    #[error("capture failed: {0}")]
    Failed(String),
}

/// Cooperative cancellation flag shared with blocking audio work
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    /// Create a lowered flag
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the holder to stop
    pub fn raise(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Whether a stop was requested
    #[must_use]
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
