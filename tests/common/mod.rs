//! Shared test utilities

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use voice_assistant::completion::{CompletionClient, CompletionError, CompletionReply};
use voice_assistant::speech::{CaptureError, Speaker, StopFlag, TranscriptSource, Voice};
use voice_assistant::{Result, SiteOpener};

/// Scripted completion client that counts its calls
pub struct MockCompletion {
    outcome: std::result::Result<CompletionReply, CompletionError>,
    delay: Duration,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl MockCompletion {
    /// Always answer with `response`
    #[must_use]
    pub fn replying(response: &str) -> Arc<Self> {
        Self::with_outcome(Ok(CompletionReply::text(response)))
    }

    /// Always answer with `reply`
    #[must_use]
    pub fn replying_with(reply: CompletionReply) -> Arc<Self> {
        Self::with_outcome(Ok(reply))
    }

    /// Always fail with `error`
    #[must_use]
    pub fn failing(error: CompletionError) -> Arc<Self> {
        Self::with_outcome(Err(error))
    }

    /// Answer with `response` after `delay`
    #[must_use]
    pub fn slow(response: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            ..Self::plain(Ok(CompletionReply::text(response)))
        })
    }

    fn with_outcome(outcome: std::result::Result<CompletionReply, CompletionError>) -> Arc<Self> {
        Arc::new(Self::plain(outcome))
    }

    fn plain(outcome: std::result::Result<CompletionReply, CompletionError>) -> Self {
        Self {
            outcome,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Number of `complete` calls so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts received, in order
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionClient for MockCompletion {
    async fn complete(
        &self,
        text: &str,
    ) -> std::result::Result<CompletionReply, CompletionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(text.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.outcome.clone()
    }
}

/// Transcript source that plays back a script, one entry per session
pub struct ScriptedSource {
    script: Mutex<VecDeque<std::result::Result<String, CaptureError>>>,
}

impl ScriptedSource {
    #[must_use]
    pub fn new(
        script: impl IntoIterator<Item = std::result::Result<String, CaptureError>>,
    ) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
        }
    }

    /// One session per transcript
    #[must_use]
    pub fn saying(transcripts: &[&str]) -> Self {
        Self::new(transcripts.iter().map(|t| Ok((*t).to_string())))
    }
}

#[async_trait]
impl TranscriptSource for ScriptedSource {
    async fn capture(&self, _stop: StopFlag) -> std::result::Result<String, CaptureError> {
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or(Err(CaptureError::NoSpeech))
    }
}

/// Voice that records what it was asked to say
#[derive(Clone, Default)]
pub struct RecordingVoice {
    spoken: Arc<Mutex<Vec<String>>>,
    delay: Duration,
}

impl RecordingVoice {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Each utterance takes `delay` to finish
    #[must_use]
    pub fn taking(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    /// Everything said so far
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    /// A speaker over a clone of this voice
    #[must_use]
    pub fn speaker(&self) -> Speaker<Self> {
        Speaker::new(self.clone())
    }
}

#[async_trait]
impl Voice for RecordingVoice {
    async fn say(&self, text: &str, _stop: StopFlag) -> Result<()> {
        self.spoken.lock().unwrap().push(text.to_string());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(())
    }
}

/// Opener that records URLs instead of launching a browser
#[derive(Default)]
pub struct RecordingOpener {
    opened: Mutex<Vec<String>>,
}

impl RecordingOpener {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// URLs opened so far
    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

impl SiteOpener for RecordingOpener {
    fn open(&self, url: &str) -> Result<()> {
        self.opened.lock().unwrap().push(url.to_string());
        Ok(())
    }
}
