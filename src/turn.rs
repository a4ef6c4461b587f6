//! Conversation turn controller
//!
//! One turn runs from a user utterance to the end of the spoken reply:
//!
//! ```text
//!   Idle ──start_capture──▶ Listening ──Transcript──▶ (classify)
//!    ▲                          │                       │         │
//!    │                    CaptureFailed           intercepted  delegated
//!    │                          │                       │         ▼
//!    ├──────────────────────────┘                       │   AwaitingReply
//!    │                                                  │         │
//!    │                                                  ▼  Reply / Failure
//!    └──────────────SpeechEnded──────────────────── Speaking ◀────┘
//! ```
//!
//! The controller exclusively owns the [`TurnState`] and the
//! [`Conversation`]. Adapters and the completion task report back through a
//! single event channel; every event carries the number of the turn it was
//! issued for, and events from an earlier turn are dropped.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::browser::SiteOpener;
use crate::completion::{CompletionClient, CompletionError, CompletionReply};
use crate::conversation::Conversation;
use crate::intent::{self, Intent};
use crate::speech::{CaptureError, Playback, SpeechInput, SpeechOutput};

/// Spoken and displayed when a completion fails
pub const APOLOGY: &str = "Sorry, I encountered an error processing your request.";

/// Default bound on a completion call
pub const DEFAULT_COMPLETION_TIMEOUT: Duration = Duration::from_secs(10);

/// Default delay before opening a site requested by a remote reply
pub const DEFAULT_OPEN_SITE_DELAY: Duration = Duration::from_millis(500);

/// Phase of the current turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    Listening,
    AwaitingReply,
    Speaking,
}

/// Something that happened outside the controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEvent {
    /// Final transcript of the capture session
    Transcript(String),
    /// Capture session ended without a transcript
    CaptureFailed(CaptureError),
    /// Completion client answered
    ReplyReceived(CompletionReply),
    /// Completion client failed or timed out
    RequestFailed(CompletionError),
    /// The spoken reply finished
    SpeechEnded,
}

/// An event tagged with the turn it belongs to
#[derive(Debug)]
pub struct StampedEvent {
    pub turn: u64,
    pub event: TurnEvent,
}

/// Receiving half of the event channel
pub type EventReceiver = mpsc::UnboundedReceiver<StampedEvent>;

/// Handle adapters use to report back for one turn
#[derive(Debug, Clone)]
pub struct EventSink {
    turn: u64,
    tx: mpsc::UnboundedSender<StampedEvent>,
}

impl EventSink {
    /// Create a sink and its receiver, detached from any controller
    #[must_use]
    pub fn channel(turn: u64) -> (Self, EventReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { turn, tx }, rx)
    }

    /// Turn this sink reports for
    #[must_use]
    pub const fn turn(&self) -> u64 {
        self.turn
    }

    /// Deliver an event; returns false if the controller is gone
    pub fn send(&self, event: TurnEvent) -> bool {
        self.tx
            .send(StampedEvent {
                turn: self.turn,
                event,
            })
            .is_ok()
    }
}

/// Why a controller operation was refused
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TurnError {
    /// Another turn is in progress
    #[error("a turn is already in progress ({0:?})")]
    Busy(TurnState),

    /// The speech input refused to start
    #[error(transparent)]
    Capture(#[from] CaptureError),

    /// Typed input was blank
    #[error("nothing to send")]
    EmptyInput,
}

/// Timing knobs for the controller
#[derive(Debug, Clone)]
pub struct TurnConfig {
    /// Bound on a completion call
    pub completion_timeout: Duration,
    /// Delay before opening a site requested by a remote reply
    pub open_site_delay: Duration,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            completion_timeout: DEFAULT_COMPLETION_TIMEOUT,
            open_site_delay: DEFAULT_OPEN_SITE_DELAY,
        }
    }
}

/// Drives capture, interception, completion, and playback for one session
pub struct TurnController {
    state: TurnState,
    turn: u64,
    conversation: Conversation,
    input: Box<dyn SpeechInput>,
    output: Box<dyn SpeechOutput>,
    completion: Arc<dyn CompletionClient>,
    opener: Arc<dyn SiteOpener>,
    config: TurnConfig,
    events_tx: mpsc::UnboundedSender<StampedEvent>,
    events_rx: EventReceiver,
    pending: Option<JoinHandle<()>>,
    site_open: Option<JoinHandle<()>>,
    degraded: bool,
    last_capture_error: Option<CaptureError>,
}

impl TurnController {
    /// Create an idle controller
    #[must_use]
    pub fn new(
        input: Box<dyn SpeechInput>,
        output: Box<dyn SpeechOutput>,
        completion: Arc<dyn CompletionClient>,
        opener: Arc<dyn SiteOpener>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            state: TurnState::Idle,
            turn: 0,
            conversation: Conversation::new(),
            input,
            output,
            completion,
            opener,
            config: TurnConfig::default(),
            events_tx,
            events_rx,
            pending: None,
            site_open: None,
            degraded: false,
            last_capture_error: None,
        }
    }

    /// Override timing configuration
    #[must_use]
    pub const fn with_config(mut self, config: TurnConfig) -> Self {
        self.config = config;
        self
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> TurnState {
        self.state
    }

    /// Messages so far
    #[must_use]
    pub const fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Whether the last completion attempt failed
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Take the reason the last capture session failed, if any
    pub const fn take_capture_error(&mut self) -> Option<CaptureError> {
        self.last_capture_error.take()
    }

    /// Whether speech output is muted
    #[must_use]
    pub fn is_muted(&self) -> bool {
        self.output.is_muted()
    }

    /// Start recording a new turn
    ///
    /// # Errors
    ///
    /// Returns `Busy` (state unchanged) unless idle, or `Capture` if the
    /// speech input refused to start
    pub fn start_capture(&mut self) -> Result<(), TurnError> {
        self.ensure_idle()?;

        let sink = EventSink {
            turn: self.turn + 1,
            tx: self.events_tx.clone(),
        };
        self.input.start_capture(sink).map_err(|e| {
            tracing::warn!(error = %e, "speech input refused to start");
            e
        })?;

        self.turn += 1;
        self.transition(TurnState::Listening);
        Ok(())
    }

    /// Abandon the recording in progress
    pub fn stop_capture(&mut self) {
        if self.state == TurnState::Listening {
            self.input.stop_capture();
            self.transition(TurnState::Idle);
        }
    }

    /// Start a turn from typed text instead of speech
    ///
    /// # Errors
    ///
    /// Returns `Busy` unless idle, `EmptyInput` for blank text
    pub fn submit_text(&mut self, text: &str) -> Result<(), TurnError> {
        self.ensure_idle()?;

        let text = text.trim();
        if text.is_empty() {
            return Err(TurnError::EmptyInput);
        }

        self.turn += 1;
        self.accept_transcript(text.to_string());
        Ok(())
    }

    /// Cut the spoken reply short
    pub fn cancel_speech(&mut self) {
        if self.state == TurnState::Speaking {
            self.output.cancel();
            self.transition(TurnState::Idle);
        }
    }

    /// Mute or unmute speech output
    ///
    /// Muting mid-reply ends the turn as if the reply had finished.
    pub fn set_muted(&mut self, muted: bool) {
        self.output.set_muted(muted);
        if muted && self.state == TurnState::Speaking {
            self.transition(TurnState::Idle);
        }
    }

    /// Wait for the next event and apply it
    ///
    /// Returns false if no further events can arrive.
    pub async fn step(&mut self) -> bool {
        match self.events_rx.recv().await {
            Some(stamped) => {
                self.handle_event(stamped);
                true
            }
            None => false,
        }
    }

    /// Process events until the current turn is over
    pub async fn run_until_idle(&mut self) {
        while self.state != TurnState::Idle {
            if !self.step().await {
                break;
            }
        }
    }

    /// Wait for a delayed site open from the last reply, if one is queued
    pub async fn finish_site_open(&mut self) {
        if let Some(task) = self.site_open.take() {
            let _ = task.await;
        }
    }

    /// Apply one event to the state machine
    pub fn handle_event(&mut self, stamped: StampedEvent) {
        if stamped.turn != self.turn {
            tracing::trace!(event_turn = stamped.turn, turn = self.turn, "discarding stale event");
            return;
        }

        match (self.state, stamped.event) {
            (TurnState::Listening, TurnEvent::Transcript(text)) => {
                tracing::info!(transcript = %text, "transcript received");
                self.accept_transcript(text);
            }
            (TurnState::Listening, TurnEvent::CaptureFailed(err)) => {
                tracing::warn!(error = %err, "capture failed");
                self.last_capture_error = Some(err);
                self.transition(TurnState::Idle);
            }
            (TurnState::AwaitingReply, TurnEvent::ReplyReceived(reply)) => {
                self.pending = None;
                self.degraded = false;
                if let Some(url) = reply.site_url() {
                    self.open_site(url.to_string(), self.config.open_site_delay);
                }
                self.reply(reply.response);
            }
            (TurnState::AwaitingReply, TurnEvent::RequestFailed(err)) => {
                tracing::warn!(error = %err, "completion failed");
                self.pending = None;
                self.degraded = true;
                self.reply(APOLOGY.to_string());
            }
            (TurnState::Speaking, TurnEvent::SpeechEnded) => {
                self.transition(TurnState::Idle);
            }
            (state, event) => {
                tracing::debug!(?state, ?event, "ignoring event");
            }
        }
    }

    fn ensure_idle(&self) -> Result<(), TurnError> {
        if self.state == TurnState::Idle {
            Ok(())
        } else {
            tracing::debug!(state = ?self.state, "turn rejected");
            Err(TurnError::Busy(self.state))
        }
    }

    fn accept_transcript(&mut self, text: String) {
        let intent = intent::classify(&text);
        self.conversation.push_user(text.as_str());

        match intent {
            Intent::Delegate => {
                self.transition(TurnState::AwaitingReply);
                self.dispatch(text);
            }
            intercepted => {
                tracing::debug!(?intercepted, "intent intercepted");
                if let Some(url) = intercepted.url() {
                    self.open_site(url.to_string(), Duration::ZERO);
                }
                if let Some(reply) = intercepted.reply() {
                    self.reply(reply.to_string());
                }
            }
        }
    }

    fn dispatch(&mut self, text: String) {
        debug_assert!(
            self.pending.as_ref().is_none_or(JoinHandle::is_finished),
            "completion already in flight"
        );

        let client = Arc::clone(&self.completion);
        let sink = self.sink();
        let timeout = self.config.completion_timeout;

        self.pending = Some(tokio::spawn(async move {
            let event = match tokio::time::timeout(timeout, client.complete(&text)).await {
                Ok(Ok(reply)) => TurnEvent::ReplyReceived(reply),
                Ok(Err(err)) => TurnEvent::RequestFailed(err),
                Err(_) => TurnEvent::RequestFailed(CompletionError::Timeout),
            };
            sink.send(event);
        }));
    }

    fn reply(&mut self, text: String) {
        self.conversation.push_assistant(text.as_str());
        self.transition(TurnState::Speaking);

        let sink = self.sink();
        if self.output.speak(&text, sink) == Playback::Suppressed {
            self.transition(TurnState::Idle);
        }
    }

    fn open_site(&mut self, url: String, delay: Duration) {
        let opener = Arc::clone(&self.opener);

        if delay.is_zero() {
            if let Err(e) = opener.open(&url) {
                tracing::warn!(url = %url, error = %e, "failed to open site");
            }
            return;
        }

        self.site_open = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = opener.open(&url) {
                tracing::warn!(url = %url, error = %e, "failed to open site");
            }
        }));
    }

    fn sink(&self) -> EventSink {
        EventSink {
            turn: self.turn,
            tx: self.events_tx.clone(),
        }
    }

    fn transition(&mut self, next: TurnState) {
        tracing::debug!(turn = self.turn, from = ?self.state, to = ?next, "turn state");
        self.state = next;
    }
}

impl Drop for TurnController {
    fn drop(&mut self) {
        if let Some(task) = self.pending.take() {
            task.abort();
        }
    }
}
