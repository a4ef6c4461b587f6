//! Error types for the voice assistant

use thiserror::Error;

/// Result type alias for voice assistant operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur outside the turn path
///
/// Failures inside a conversational turn never surface here; they are
/// turned into [`crate::completion::CompletionError`] or
/// [`crate::speech::CaptureError`] and degrade to an apology.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio device error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Failed to hand a URL to the system browser
    #[error("browser error: {0}")]
    Browser(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
