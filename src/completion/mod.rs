//! Remote completion of unmatched transcripts
//!
//! Two transports implement [`CompletionClient`]: the relay's `/api/chat`
//! endpoint ([`crate::relay::RelayClient`]) and the LLM vendor's chat
//! completions endpoint ([`VendorClient`]).

mod vendor;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use vendor::{DEFAULT_API_BASE, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, DEFAULT_SYSTEM_PROMPT, VendorClient, VendorSettings};

use crate::intent::Intent;

/// Action attached to a reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteAction {
    /// Open `url` in a new browsing context
    OpenSite,
}

/// Reply text plus an optional action, as returned by the relay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionReply {
    pub response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<SiteAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl CompletionReply {
    /// Plain text reply with no action
    #[must_use]
    pub fn text(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            action: None,
            url: None,
        }
    }

    /// Reply that asks the client to open a site
    #[must_use]
    pub fn open_site(response: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            action: Some(SiteAction::OpenSite),
            url: Some(url.into()),
        }
    }

    /// Reply for a locally intercepted intent, `None` when the intent delegates
    #[must_use]
    pub fn from_intent(intent: Intent) -> Option<Self> {
        match intent {
            Intent::OpenSite { url, reply } => Some(Self::open_site(reply, url)),
            Intent::Farewell { reply } => Some(Self::text(reply)),
            Intent::Delegate => None,
        }
    }

    /// URL to open, only when the action is `open_site`
    #[must_use]
    pub fn site_url(&self) -> Option<&str> {
        match self.action {
            Some(SiteAction::OpenSite) => self.url.as_deref(),
            None => None,
        }
    }
}

/// Why a completion produced no reply
///
/// Never fatal; the turn controller answers with an apology instead.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompletionError {
    /// No vendor credential available
    #[error("no vendor credential configured")]
    ConfigurationMissing,

    /// No reply within the allotted time
    #[error("completion timed out")]
    Timeout,

    /// Transport failure
    #[error("network error: {0}")]
    Network(String),

    /// Non-2xx response
    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body could not be interpreted
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for CompletionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Malformed(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

/// Maps prompt text to a reply
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Complete a single user message, no retry
    async fn complete(&self, text: &str) -> Result<CompletionReply, CompletionError>;
}
