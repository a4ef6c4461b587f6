//! Audio and speech services
//!
//! Microphone capture, end-of-utterance detection, and speaker playback
//! run on the client. STT and TTS clients hold the vendor credential and
//! run inside the relay (see `api::voice`).

mod capture;
mod detector;
mod playback;
mod stt;
mod tts;

pub use capture::{AudioCapture, SAMPLE_RATE, record_utterance, samples_to_wav};
pub use detector::{DetectorState, UtteranceDetector, rms};
pub use playback::AudioPlayback;
pub use stt::{DEFAULT_STT_MODEL, Transcriber};
pub use tts::{DEFAULT_TTS_MODEL, DEFAULT_TTS_SPEED, DEFAULT_TTS_VOICE, Synthesizer};
