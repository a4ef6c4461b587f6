//! Text-to-speech via the OpenAI speech API

use secrecy::{ExposeSecret, SecretString};

use crate::{Error, Result};

/// Default speech model
pub const DEFAULT_TTS_MODEL: &str = "tts-1";

/// Default voice
pub const DEFAULT_TTS_VOICE: &str = "alloy";

/// Default speaking rate, slightly slower than normal
pub const DEFAULT_TTS_SPEED: f64 = 0.9;

/// Synthesizes speech from text (relay side, holds the credential)
pub struct Synthesizer {
    client: reqwest::Client,
    api_key: SecretString,
    api_base: String,
    model: String,
    voice: String,
    speed: f64,
}

impl Synthesizer {
    /// Create an `OpenAI` synthesizer
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty or the speed is out of range
    pub fn new(
        api_key: SecretString,
        api_base: String,
        model: String,
        voice: String,
        speed: f64,
    ) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config("OpenAI API key required for TTS".to_string()));
        }
        if !(0.25..=4.0).contains(&speed) {
            return Err(Error::Config(format!(
                "TTS speed must be between 0.25 and 4.0, got {speed}"
            )));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            api_base,
            model,
            voice,
            speed,
        })
    }

    /// Synthesize text, returning MP3 bytes
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct SpeechRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f64,
        }

        let request = SpeechRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            speed: self.speed,
        };

        let url = format!("{}/audio/speech", self.api_base.trim_end_matches('/'));

        let response = self
            .client
            .post(url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("OpenAI TTS error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        tracing::debug!(text_len = text.len(), audio_bytes = audio.len(), "speech synthesized");
        Ok(audio.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_empty_key() {
        let result = Synthesizer::new(
            SecretString::from(String::new()),
            "http://localhost".to_string(),
            DEFAULT_TTS_MODEL.to_string(),
            DEFAULT_TTS_VOICE.to_string(),
            DEFAULT_TTS_SPEED,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_out_of_range_speed() {
        let result = Synthesizer::new(
            SecretString::from("sk-test".to_string()),
            "http://localhost".to_string(),
            DEFAULT_TTS_MODEL.to_string(),
            DEFAULT_TTS_VOICE.to_string(),
            9.0,
        );
        assert!(result.is_err());
    }
}
