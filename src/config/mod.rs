//! Configuration management for the voice assistant
//!
//! Layered: defaults, then the TOML file, then environment variables.
//! CLI flags are applied last by the binary.

pub mod file;

use std::path::Path;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::completion::{VendorClient, VendorSettings};
use crate::relay::DEFAULT_RELAY_URL;
use crate::turn::{DEFAULT_COMPLETION_TIMEOUT, DEFAULT_OPEN_SITE_DELAY, TurnConfig};
use crate::voice::{
    DEFAULT_STT_MODEL, DEFAULT_TTS_MODEL, DEFAULT_TTS_SPEED, DEFAULT_TTS_VOICE, Synthesizer,
    Transcriber,
};
use crate::{Error, Result};

/// Default relay port
pub const DEFAULT_PORT: u16 = 3001;

/// Default wait for speech to start
pub const DEFAULT_LISTEN_TIMEOUT: Duration = Duration::from_secs(8);

/// Voice assistant configuration
#[derive(Debug)]
pub struct Config {
    /// Relay server configuration
    pub server: ServerConfig,

    /// Completion model parameters
    pub llm: VendorSettings,

    /// Voice processing configuration
    pub voice: VoiceConfig,

    /// Interactive client configuration
    pub client: ClientConfig,

    /// API keys
    pub api_keys: ApiKeys,
}

/// Relay server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,

    /// Chat requests allowed per minute (None = unlimited)
    pub rate_limit_per_minute: Option<u32>,
}

/// Voice processing configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// STT model (e.g. "whisper-1")
    pub stt_model: String,

    /// TTS model (e.g. "tts-1")
    pub tts_model: String,

    /// TTS voice identifier
    pub tts_voice: String,

    /// TTS speed multiplier (0.25 to 4.0)
    pub tts_speed: f64,

    /// How long to wait for speech to start
    pub listen_timeout: Duration,
}

/// Interactive client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Relay base URL
    pub relay_url: String,

    /// Bound on a completion call
    pub completion_timeout: Duration,

    /// Delay before opening a site requested by a remote reply
    pub open_site_delay: Duration,
}

/// API keys for external services
#[derive(Debug, Default)]
pub struct ApiKeys {
    /// `OpenAI` API key (chat, Whisper, and TTS)
    pub openai: Option<SecretString>,
}

impl ApiKeys {
    /// Copy of the `OpenAI` key, if set
    #[must_use]
    pub fn openai(&self) -> Option<SecretString> {
        self.openai
            .as_ref()
            .map(|key| SecretString::from(key.expose_secret().to_owned()))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                port: DEFAULT_PORT,
                rate_limit_per_minute: None,
            },
            llm: VendorSettings::default(),
            voice: VoiceConfig {
                stt_model: DEFAULT_STT_MODEL.to_string(),
                tts_model: DEFAULT_TTS_MODEL.to_string(),
                tts_voice: DEFAULT_TTS_VOICE.to_string(),
                tts_speed: DEFAULT_TTS_SPEED,
                listen_timeout: DEFAULT_LISTEN_TIMEOUT,
            },
            client: ClientConfig {
                relay_url: DEFAULT_RELAY_URL.to_string(),
                completion_timeout: DEFAULT_COMPLETION_TIMEOUT,
                open_site_delay: DEFAULT_OPEN_SITE_DELAY,
            },
            api_keys: ApiKeys::default(),
        }
    }
}

impl Config {
    /// Load configuration (env > toml > default)
    ///
    /// # Errors
    ///
    /// Returns error if the config file can't be read or parsed, or an
    /// environment override is malformed
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let fc = file::load_config_file(path)?;
        let mut config = Self::from_file(fc);
        config.apply_env_with(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that parse but make no sense
    ///
    /// # Errors
    ///
    /// Returns error if the rate limit is zero
    pub fn validate(&self) -> Result<()> {
        if self.server.rate_limit_per_minute == Some(0) {
            return Err(Error::Config(
                "rate_limit_per_minute must be at least 1; omit it for no limit".to_string(),
            ));
        }
        Ok(())
    }

    /// Overlay a parsed config file on the defaults
    #[must_use]
    pub fn from_file(fc: file::ConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            server: ServerConfig {
                port: fc.server.port.unwrap_or(defaults.server.port),
                rate_limit_per_minute: fc
                    .server
                    .rate_limit_per_minute
                    .or(defaults.server.rate_limit_per_minute),
            },
            llm: VendorSettings {
                api_base: fc.llm.api_base.unwrap_or(defaults.llm.api_base),
                model: fc.llm.model.unwrap_or(defaults.llm.model),
                max_tokens: fc.llm.max_tokens.unwrap_or(defaults.llm.max_tokens),
                system_prompt: fc.llm.system_prompt.unwrap_or(defaults.llm.system_prompt),
                request_timeout: fc
                    .llm
                    .timeout_secs
                    .map_or(defaults.llm.request_timeout, Duration::from_secs),
            },
            voice: VoiceConfig {
                stt_model: fc.voice.stt_model.unwrap_or(defaults.voice.stt_model),
                tts_model: fc.voice.tts_model.unwrap_or(defaults.voice.tts_model),
                tts_voice: fc.voice.tts_voice.unwrap_or(defaults.voice.tts_voice),
                tts_speed: fc.voice.tts_speed.unwrap_or(defaults.voice.tts_speed),
                listen_timeout: fc
                    .voice
                    .listen_timeout_secs
                    .map_or(defaults.voice.listen_timeout, Duration::from_secs),
            },
            client: ClientConfig {
                relay_url: fc.client.relay_url.unwrap_or(defaults.client.relay_url),
                completion_timeout: fc
                    .client
                    .completion_timeout_secs
                    .map_or(defaults.client.completion_timeout, Duration::from_secs),
                open_site_delay: fc
                    .client
                    .open_site_delay_ms
                    .map_or(defaults.client.open_site_delay, Duration::from_millis),
            },
            api_keys: ApiKeys {
                openai: fc
                    .api_keys
                    .openai
                    .filter(|key| !key.is_empty())
                    .map(SecretString::from),
            },
        }
    }

    /// Apply environment overrides read through `lookup`
    ///
    /// # Errors
    ///
    /// Returns error if a numeric override doesn't parse
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(key) = lookup("OPENAI_API_KEY").filter(|key| !key.is_empty()) {
            self.api_keys.openai = Some(SecretString::from(key));
        }
        if let Some(port) = lookup("VOICE_ASSISTANT_PORT") {
            self.server.port = parse_env("VOICE_ASSISTANT_PORT", &port)?;
        }
        if let Some(limit) = lookup("VOICE_ASSISTANT_RATE_LIMIT") {
            self.server.rate_limit_per_minute =
                Some(parse_env("VOICE_ASSISTANT_RATE_LIMIT", &limit)?);
        }
        if let Some(model) = lookup("VOICE_ASSISTANT_MODEL") {
            self.llm.model = model;
        }
        if let Some(url) = lookup("VOICE_ASSISTANT_RELAY_URL") {
            self.client.relay_url = url;
        }
        Ok(())
    }

    /// Vendor chat client using the configured key and model
    #[must_use]
    pub fn vendor_client(&self) -> VendorClient {
        VendorClient::new(self.api_keys.openai(), self.llm.clone())
    }

    /// Whisper transcriber, if a key is configured
    ///
    /// # Errors
    ///
    /// Returns error if the transcriber rejects its settings
    pub fn transcriber(&self) -> Result<Option<Transcriber>> {
        self.api_keys
            .openai()
            .map(|key| {
                Transcriber::new(
                    key,
                    self.llm.api_base.clone(),
                    self.voice.stt_model.clone(),
                )
            })
            .transpose()
    }

    /// Speech synthesizer, if a key is configured
    ///
    /// # Errors
    ///
    /// Returns error if the synthesizer rejects its settings (e.g. speed)
    pub fn synthesizer(&self) -> Result<Option<Synthesizer>> {
        self.api_keys
            .openai()
            .map(|key| {
                Synthesizer::new(
                    key,
                    self.llm.api_base.clone(),
                    self.voice.tts_model.clone(),
                    self.voice.tts_voice.clone(),
                    self.voice.tts_speed,
                )
            })
            .transpose()
    }

    /// Timing for the turn controller
    #[must_use]
    pub fn turn_config(&self) -> TurnConfig {
        TurnConfig {
            completion_timeout: self.client.completion_timeout,
            open_site_delay: self.client.open_site_delay,
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{key} has invalid value {value:?}")))
}
