//! TOML configuration file loading
//!
//! Supports `~/.config/voice-assistant/config.toml` as a persistent config
//! source. All fields are optional; the file is a partial overlay on top of
//! defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{Error, Result};

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    /// Relay server configuration
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Completion model configuration
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// Voice/audio configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Interactive client configuration
    #[serde(default)]
    pub client: ClientFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,
}

/// Relay server configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// Relay port
    pub port: Option<u16>,

    /// Chat requests allowed per minute (unset = unlimited)
    pub rate_limit_per_minute: Option<u32>,
}

/// LLM-related configuration
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    /// Model identifier (e.g. "gpt-4o")
    pub model: Option<String>,

    pub max_tokens: Option<u32>,

    pub system_prompt: Option<String>,

    /// OpenAI-compatible API base
    pub api_base: Option<String>,

    /// Per-request limit for vendor calls
    pub timeout_secs: Option<u64>,
}

/// Voice processing configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// STT model (e.g. "whisper-1")
    pub stt_model: Option<String>,

    /// TTS model (e.g. "tts-1")
    pub tts_model: Option<String>,

    /// TTS voice identifier (e.g. "alloy")
    pub tts_voice: Option<String>,

    /// TTS speed multiplier
    pub tts_speed: Option<f64>,

    /// Seconds to wait for speech to start
    pub listen_timeout_secs: Option<u64>,
}

/// Interactive client configuration
#[derive(Debug, Default, Deserialize)]
pub struct ClientFileConfig {
    /// Relay base URL
    pub relay_url: Option<String>,

    pub completion_timeout_secs: Option<u64>,

    pub open_site_delay_ms: Option<u64>,
}

/// API keys configuration
#[derive(Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
}

impl std::fmt::Debug for ApiKeysFileConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeysFileConfig")
            .field("openai", &self.openai.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Parse a config file body
///
/// # Errors
///
/// Returns error if the TOML is malformed
pub fn parse(content: &str) -> Result<ConfigFile> {
    Ok(toml::from_str(content)?)
}

/// Load the TOML config file
///
/// An explicit `path` must exist. Without one, the standard path is used
/// and a missing file yields defaults.
///
/// # Errors
///
/// Returns error if the file can't be read or parsed
pub fn load_config_file(path: Option<&Path>) -> Result<ConfigFile> {
    let (path, explicit) = match path {
        Some(path) => (path.to_path_buf(), true),
        None => match config_file_path() {
            Some(path) => (path, false),
            None => return Ok(ConfigFile::default()),
        },
    };

    if !explicit && !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(ConfigFile::default());
    }

    let content = std::fs::read_to_string(&path).map_err(|e| {
        Error::Config(format!("failed to read {}: {e}", path.display()))
    })?;

    let config = parse(&content)?;
    tracing::info!(path = %path.display(), "loaded config file");
    Ok(config)
}

/// Return the config file path: `~/.config/voice-assistant/config.toml`
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "voice-assistant")
        .map(|d| d.config_dir().join("config.toml"))
}
