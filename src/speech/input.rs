//! Speech input: one finalized transcript per capture session

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;

use super::{CaptureError, StopFlag};
use crate::relay::RelayClient;
use crate::turn::{EventSink, TurnEvent};
use crate::voice::{SAMPLE_RATE, record_utterance, samples_to_wav};

/// Controller-facing speech input
pub trait SpeechInput: Send {
    /// Begin a capture session
    ///
    /// The outcome arrives later on `sink` as exactly one
    /// [`TurnEvent::Transcript`] or [`TurnEvent::CaptureFailed`], unless the
    /// session is stopped first.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyCapturing` if a session is running
    fn start_capture(&mut self, sink: EventSink) -> Result<(), CaptureError>;

    /// Abandon the running session; nothing is delivered for it
    fn stop_capture(&mut self);

    /// Whether a session is running
    fn is_capturing(&self) -> bool;
}

/// Produces a single transcript
#[async_trait]
pub trait TranscriptSource: Send + Sync + 'static {
    /// Record and transcribe one utterance
    ///
    /// `stop` is raised when the session is abandoned; blocking work should
    /// poll it.
    async fn capture(&self, stop: StopFlag) -> Result<String, CaptureError>;
}

struct Session {
    task: JoinHandle<()>,
    stop: StopFlag,
}

/// [`SpeechInput`] over any [`TranscriptSource`]
pub struct Listener<S> {
    source: Arc<S>,
    session: Option<Session>,
}

impl<S: TranscriptSource> Listener<S> {
    /// Wrap a transcript source
    #[must_use]
    pub fn new(source: S) -> Self {
        Self {
            source: Arc::new(source),
            session: None,
        }
    }
}

impl<S: TranscriptSource> SpeechInput for Listener<S> {
    fn start_capture(&mut self, sink: EventSink) -> Result<(), CaptureError> {
        if self.is_capturing() {
            return Err(CaptureError::AlreadyCapturing);
        }

        let source = Arc::clone(&self.source);
        let stop = StopFlag::new();
        let session_stop = stop.clone();

        let task = tokio::spawn(async move {
            let event = match source.capture(session_stop).await {
                Ok(text) if text.trim().is_empty() => {
                    TurnEvent::CaptureFailed(CaptureError::NoSpeech)
                }
                Ok(text) => TurnEvent::Transcript(text.trim().to_string()),
                Err(e) => TurnEvent::CaptureFailed(e),
            };
            sink.send(event);
        });

        tracing::debug!("capture session started");
        self.session = Some(Session { task, stop });
        Ok(())
    }

    fn stop_capture(&mut self) {
        if let Some(session) = self.session.take() {
            session.stop.raise();
            session.task.abort();
            tracing::debug!("capture session stopped");
        }
    }

    fn is_capturing(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| !session.task.is_finished())
    }
}

impl<S> Drop for Listener<S> {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            session.stop.raise();
            session.task.abort();
        }
    }
}

/// Microphone recording transcribed by the relay
pub struct MicrophoneSource {
    relay: Arc<RelayClient>,
    listen_timeout: Duration,
}

impl MicrophoneSource {
    /// Record from the default microphone, waiting up to `listen_timeout`
    /// for speech to start
    #[must_use]
    pub const fn new(relay: Arc<RelayClient>, listen_timeout: Duration) -> Self {
        Self {
            relay,
            listen_timeout,
        }
    }
}

#[async_trait]
impl TranscriptSource for MicrophoneSource {
    async fn capture(&self, stop: StopFlag) -> Result<String, CaptureError> {
        let listen_timeout = self.listen_timeout;
        let samples = tokio::task::spawn_blocking(move || record_utterance(listen_timeout, &stop))
            .await
            .map_err(|e| CaptureError::Failed(e.to_string()))??;

        tracing::debug!(samples = samples.len(), "utterance recorded");

        let wav = samples_to_wav(&samples, SAMPLE_RATE)
            .map_err(|e| CaptureError::Failed(e.to_string()))?;

        self.relay
            .transcribe(wav)
            .await
            .map_err(|e| CaptureError::Failed(e.to_string()))
    }
}

/// Source for sessions without speech input
pub struct UnavailableSource;

#[async_trait]
impl TranscriptSource for UnavailableSource {
    async fn capture(&self, _stop: StopFlag) -> Result<String, CaptureError> {
        Err(CaptureError::Unavailable(
            "voice input disabled for this session".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::turn::EventSink;

    struct Fixed(&'static str);

    #[async_trait]
    impl TranscriptSource for Fixed {
        async fn capture(&self, _stop: StopFlag) -> Result<String, CaptureError> {
            Ok(self.0.to_string())
        }
    }

    struct Forever;

    #[async_trait]
    impl TranscriptSource for Forever {
        async fn capture(&self, _stop: StopFlag) -> Result<String, CaptureError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_single_transcript_per_session() {
        let (sink, mut rx) = EventSink::channel(7);
        let mut listener = Listener::new(Fixed("  hello  "));

        listener.start_capture(sink).unwrap();

        let stamped = rx.recv().await.unwrap();
        assert_eq!(stamped.turn, 7);
        assert_eq!(stamped.event, TurnEvent::Transcript("hello".to_string()));

        // Sender dropped with the finished task: nothing else arrives
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_blank_transcript_is_no_speech() {
        let (sink, mut rx) = EventSink::channel(1);
        let mut listener = Listener::new(Fixed("   "));

        listener.start_capture(sink).unwrap();

        let stamped = rx.recv().await.unwrap();
        assert_eq!(
            stamped.event,
            TurnEvent::CaptureFailed(CaptureError::NoSpeech)
        );
    }

    #[tokio::test]
    async fn test_already_capturing() {
        let (sink, _rx) = EventSink::channel(1);
        let mut listener = Listener::new(Forever);

        listener.start_capture(sink.clone()).unwrap();
        assert!(listener.is_capturing());
        assert_eq!(
            listener.start_capture(sink),
            Err(CaptureError::AlreadyCapturing)
        );

        listener.stop_capture();
        assert!(!listener.is_capturing());
    }

    #[tokio::test]
    async fn test_unavailable_source_reports_failure() {
        let (sink, mut rx) = EventSink::channel(1);
        let mut listener = Listener::new(UnavailableSource);

        listener.start_capture(sink).unwrap();

        let stamped = rx.recv().await.unwrap();
        assert!(matches!(
            stamped.event,
            TurnEvent::CaptureFailed(CaptureError::Unavailable(_))
        ));
    }
}
