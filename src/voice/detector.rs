//! End-of-utterance detection
//!
//! Energy-based endpointing over a mono 16kHz stream: an utterance starts
//! when the RMS energy crosses a threshold and is complete after enough
//! trailing silence.

use super::SAMPLE_RATE;

/// Minimum audio energy threshold to consider speech
const ENERGY_THRESHOLD: f32 = 0.03;

/// Minimum duration of speech to accept (in samples at 16kHz)
const MIN_SPEECH_SAMPLES: usize = SAMPLE_RATE as usize * 3 / 10; // 0.3 seconds

/// Silence duration that ends an utterance (in samples)
const SILENCE_SAMPLES: usize = SAMPLE_RATE as usize / 2; // 0.5 seconds

/// State of the utterance detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    /// Waiting for speech
    Waiting,
    /// Speech detected, accumulating
    InSpeech,
    /// Speech followed by enough silence
    Complete,
}

/// Splits an audio stream into a single utterance
pub struct UtteranceDetector {
    state: DetectorState,
    speech_buffer: Vec<f32>,
    silence_counter: usize,
}

impl Default for UtteranceDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl UtteranceDetector {
    /// Create a detector waiting for speech
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: DetectorState::Waiting,
            speech_buffer: Vec::new(),
            silence_counter: 0,
        }
    }

    /// Feed audio samples
    ///
    /// Returns true once the utterance is complete
    pub fn process(&mut self, samples: &[f32]) -> bool {
        let energy = rms(samples);
        let is_speech = energy > ENERGY_THRESHOLD;

        match self.state {
            DetectorState::Waiting => {
                if is_speech {
                    self.state = DetectorState::InSpeech;
                    self.speech_buffer.clear();
                    self.speech_buffer.extend_from_slice(samples);
                    self.silence_counter = 0;
                    tracing::trace!(energy, "speech started");
                }
            }
            DetectorState::InSpeech => {
                self.speech_buffer.extend_from_slice(samples);

                if is_speech {
                    self.silence_counter = 0;
                } else {
                    self.silence_counter += samples.len();
                }

                tracing::trace!(
                    buffer_len = self.speech_buffer.len(),
                    silence = self.silence_counter,
                    is_speech,
                    energy,
                    "in speech"
                );

                if self.silence_counter > SILENCE_SAMPLES {
                    let voiced = self.speech_buffer.len() - self.silence_counter;
                    if voiced > MIN_SPEECH_SAMPLES {
                        tracing::debug!(samples = self.speech_buffer.len(), "utterance complete");
                        self.state = DetectorState::Complete;
                    } else {
                        // A click or cough, not speech
                        tracing::trace!("speech too short - resetting");
                        self.reset();
                    }
                }
            }
            DetectorState::Complete => {}
        }

        self.state == DetectorState::Complete
    }

    /// Take the accumulated utterance, resetting the detector
    pub fn take_utterance(&mut self) -> Vec<f32> {
        let utterance = std::mem::take(&mut self.speech_buffer);
        self.reset();
        utterance
    }

    /// Accumulated samples so far
    #[must_use]
    pub fn speech_buffer(&self) -> &[f32] {
        &self.speech_buffer
    }

    /// Whether speech has started
    #[must_use]
    pub fn has_speech(&self) -> bool {
        self.state != DetectorState::Waiting
    }

    /// Reset detector to waiting state
    pub fn reset(&mut self) {
        self.state = DetectorState::Waiting;
        self.speech_buffer.clear();
        self.silence_counter = 0;
    }

    /// Get current state
    #[must_use]
    pub const fn state(&self) -> DetectorState {
        self.state
    }
}

/// Calculate RMS energy of audio samples
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}
