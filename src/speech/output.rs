//! Speech output: one audible utterance at a time

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;

use super::StopFlag;
use crate::Result;
use crate::relay::RelayClient;
use crate::turn::{EventSink, TurnEvent};
use crate::voice::AudioPlayback;

/// What [`SpeechOutput::speak`] did with the text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Playback {
    /// Playback started; `SpeechEnded` follows
    Started,
    /// Output is muted; nothing will be played or reported
    Suppressed,
}

/// Controller-facing speech output
pub trait SpeechOutput: Send {
    /// Speak `text`, cancelling any utterance still playing
    fn speak(&mut self, text: &str, sink: EventSink) -> Playback;

    /// Stop the current utterance without reporting `SpeechEnded`
    fn cancel(&mut self);

    /// Whether an utterance is playing
    fn is_speaking(&self) -> bool;

    /// Mute or unmute; muting cancels the current utterance
    fn set_muted(&mut self, muted: bool);

    /// Whether output is muted
    fn is_muted(&self) -> bool;
}

/// Renders one utterance to the listener
#[async_trait]
pub trait Voice: Send + Sync + 'static {
    /// Say `text`, returning when it has been heard or `stop` is raised
    async fn say(&self, text: &str, stop: StopFlag) -> Result<()>;
}

struct Utterance {
    task: JoinHandle<()>,
    stop: StopFlag,
}

/// [`SpeechOutput`] over any [`Voice`]
pub struct Speaker<V> {
    voice: Arc<V>,
    muted: bool,
    current: Option<Utterance>,
}

impl<V: Voice> Speaker<V> {
    /// Wrap a voice, initially unmuted
    #[must_use]
    pub fn new(voice: V) -> Self {
        Self {
            voice: Arc::new(voice),
            muted: false,
            current: None,
        }
    }
}

impl<V: Voice> SpeechOutput for Speaker<V> {
    fn speak(&mut self, text: &str, sink: EventSink) -> Playback {
        if self.muted {
            tracing::debug!("muted, not speaking");
            return Playback::Suppressed;
        }

        self.cancel();

        let voice = Arc::clone(&self.voice);
        let stop = StopFlag::new();
        let utterance_stop = stop.clone();
        let text = text.to_string();

        let task = tokio::spawn(async move {
            if let Err(e) = voice.say(&text, utterance_stop).await {
                tracing::warn!(error = %e, "speech output failed");
            }
            sink.send(TurnEvent::SpeechEnded);
        });

        self.current = Some(Utterance { task, stop });
        Playback::Started
    }

    fn cancel(&mut self) {
        if let Some(utterance) = self.current.take() {
            utterance.stop.raise();
            utterance.task.abort();
            tracing::debug!("speech cancelled");
        }
    }

    fn is_speaking(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|utterance| !utterance.task.is_finished())
    }

    fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        if muted {
            self.cancel();
        }
        tracing::info!(muted, "speech output mute changed");
    }

    fn is_muted(&self) -> bool {
        self.muted
    }
}

impl<V> Drop for Speaker<V> {
    fn drop(&mut self) {
        if let Some(utterance) = self.current.take() {
            utterance.stop.raise();
            utterance.task.abort();
        }
    }
}

/// Headless voice: logs the utterance and returns immediately
pub struct ConsoleVoice;

#[async_trait]
impl Voice for ConsoleVoice {
    async fn say(&self, text: &str, _stop: StopFlag) -> Result<()> {
        tracing::info!(text, "speaking");
        Ok(())
    }
}

/// Relay-synthesized speech played on the default output device
pub struct RelayVoice {
    relay: Arc<RelayClient>,
}

impl RelayVoice {
    /// Synthesize through `relay`
    #[must_use]
    pub const fn new(relay: Arc<RelayClient>) -> Self {
        Self { relay }
    }
}

#[async_trait]
impl Voice for RelayVoice {
    async fn say(&self, text: &str, stop: StopFlag) -> Result<()> {
        let audio = self.relay.synthesize(text).await?;
        if stop.is_raised() {
            return Ok(());
        }

        tokio::task::spawn_blocking(move || -> Result<()> {
            let playback = AudioPlayback::new()?;
            playback.play_mp3(&audio, &stop)
        })
        .await
        .map_err(|e| crate::Error::Audio(e.to_string()))?
    }
}
