//! Client for the relay service
//!
//! The relay holds the vendor credential, so everything the client needs
//! from the vendor (chat, transcription, synthesis) goes through it:
//! - `POST /api/chat` for completions
//! - `POST /api/voice/transcribe` for speech-to-text
//! - `POST /api/voice/synthesize` for text-to-speech

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::completion::{CompletionClient, CompletionError, CompletionReply};
use crate::{Error, Result};

/// Default relay address
pub const DEFAULT_RELAY_URL: &str = "http://localhost:3001";

/// Upper bound for a single voice request
const VOICE_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
}

#[derive(Serialize)]
struct SynthesizeRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct TranscribeResponse {
    text: String,
}

/// HTTP client for one relay instance
#[derive(Debug, Clone)]
pub struct RelayClient {
    client: reqwest::Client,
    chat_url: Url,
    transcribe_url: Url,
    synthesize_url: Url,
}

impl RelayClient {
    /// Create a client for the relay at `base_url`
    ///
    /// # Errors
    ///
    /// Returns error if `base_url` is not an absolute http(s) URL
    pub fn new(base_url: &str) -> Result<Self> {
        let mut base = Url::parse(base_url)
            .map_err(|e| Error::Config(format!("invalid relay URL {base_url}: {e}")))?;

        if !matches!(base.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "relay URL must be http or https: {base_url}"
            )));
        }

        // Url::join replaces the last segment unless the path ends in '/'
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let join = |path: &str| {
            base.join(path)
                .map_err(|e| Error::Config(format!("invalid relay path {path}: {e}")))
        };

        Ok(Self {
            client: reqwest::Client::new(),
            chat_url: join("api/chat")?,
            transcribe_url: join("api/voice/transcribe")?,
            synthesize_url: join("api/voice/synthesize")?,
        })
    }

    /// Chat endpoint URL
    #[must_use]
    pub const fn chat_url(&self) -> &Url {
        &self.chat_url
    }

    /// Transcribe WAV audio via the relay
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the relay reports an error
    pub async fn transcribe(&self, wav: Vec<u8>) -> Result<String> {
        tracing::debug!(audio_bytes = wav.len(), "sending audio to relay");

        let response = self
            .client
            .post(self.transcribe_url.clone())
            .header("Content-Type", "audio/wav")
            .timeout(VOICE_REQUEST_TIMEOUT)
            .body(wav)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Stt(format!("relay transcription error {status}: {body}")));
        }

        let result: TranscribeResponse = response.json().await?;
        tracing::info!(transcript = %result.text, "transcription complete");
        Ok(result.text)
    }

    /// Synthesize speech via the relay, returning MP3 bytes
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the relay reports an error
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .post(self.synthesize_url.clone())
            .timeout(VOICE_REQUEST_TIMEOUT)
            .json(&SynthesizeRequest { text })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("relay synthesis error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }
}

#[async_trait]
impl CompletionClient for RelayClient {
    async fn complete(&self, text: &str) -> std::result::Result<CompletionReply, CompletionError> {
        let response = self
            .client
            .post(self.chat_url.clone())
            .json(&ChatRequest { message: text })
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "relay request failed");
                CompletionError::from(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "relay returned error");
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<CompletionReply>()
            .await
            .map_err(|e| CompletionError::Malformed(e.to_string()))
    }
}
