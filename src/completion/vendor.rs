//! Direct chat completions against the LLM vendor

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{CompletionClient, CompletionError, CompletionReply};

/// Default vendor API base
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Default chat model
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Default response length cap
pub const DEFAULT_MAX_TOKENS: u32 = 200;

/// Default system message
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful assistant. Keep responses concise and friendly.";

/// Upper bound for one vendor request, body included
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Model parameters for vendor calls
#[derive(Debug, Clone)]
pub struct VendorSettings {
    /// API base, e.g. `https://api.openai.com/v1`
    pub api_base: String,
    pub model: String,
    pub max_tokens: u32,
    pub system_prompt: String,
    pub request_timeout: Duration,
}

impl Default for VendorSettings {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Calls an OpenAI-compatible chat completions endpoint
pub struct VendorClient {
    client: reqwest::Client,
    api_key: Option<SecretString>,
    settings: VendorSettings,
}

impl VendorClient {
    /// Create a vendor client
    ///
    /// A missing key is accepted; every call then fails with
    /// [`CompletionError::ConfigurationMissing`].
    #[must_use]
    pub fn new(api_key: Option<SecretString>, settings: VendorSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            settings,
        }
    }

    /// Whether a credential is present
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.settings.api_base.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl CompletionClient for VendorClient {
    async fn complete(&self, text: &str) -> Result<CompletionReply, CompletionError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or(CompletionError::ConfigurationMissing)?;

        let request = ChatRequest {
            model: &self.settings.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &self.settings.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: text,
                },
            ],
            max_tokens: self.settings.max_tokens,
        };

        tracing::debug!(model = %self.settings.model, prompt_len = text.len(), "requesting completion");

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key.expose_secret())
            .timeout(self.settings.request_timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "completion request failed");
                CompletionError::from(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "completion API error");
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let result: ChatResponse = response.json().await.map_err(CompletionError::from)?;

        let content = result
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| CompletionError::Malformed("no choices in response".to_string()))?
            .message
            .content
            .ok_or_else(|| CompletionError::Malformed("choice has no content".to_string()))?;

        tracing::debug!(response_len = content.len(), "completion received");
        Ok(CompletionReply::text(content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_key_is_configuration_error() {
        let client = VendorClient::new(None, VendorSettings::default());
        assert!(!client.is_configured());
        assert_eq!(
            client.complete("hello").await,
            Err(CompletionError::ConfigurationMissing)
        );
    }

    #[test]
    fn test_endpoint_joins_base() {
        let settings = VendorSettings {
            api_base: "http://localhost:9999/v1/".to_string(),
            ..VendorSettings::default()
        };
        let client = VendorClient::new(None, settings);
        assert_eq!(client.endpoint(), "http://localhost:9999/v1/chat/completions");
    }
}
