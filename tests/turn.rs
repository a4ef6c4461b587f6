//! Turn controller integration tests
//!
//! Drives full turns through scripted speech adapters and a mocked
//! completion client

use std::sync::Arc;
use std::time::Duration;

use tokio_test::assert_ok;
use voice_assistant::completion::{CompletionError, CompletionReply};
use voice_assistant::intent::{GOOGLE_URL, YOUTUBE_URL};
use voice_assistant::speech::{CaptureError, Listener};
use voice_assistant::turn::{APOLOGY, StampedEvent, TurnConfig, TurnEvent};
use voice_assistant::{TurnController, TurnError, TurnState};

mod common;
use common::{MockCompletion, RecordingOpener, RecordingVoice, ScriptedSource};

fn controller(
    source: ScriptedSource,
    voice: &RecordingVoice,
    completion: Arc<MockCompletion>,
    opener: Arc<RecordingOpener>,
) -> TurnController {
    TurnController::new(
        Box::new(Listener::new(source)),
        Box::new(voice.speaker()),
        completion,
        opener,
    )
    .with_config(TurnConfig {
        completion_timeout: Duration::from_millis(200),
        open_site_delay: Duration::from_millis(10),
    })
}

fn texts(controller: &TurnController) -> Vec<String> {
    controller
        .conversation()
        .messages()
        .iter()
        .map(|m| m.text.clone())
        .collect()
}

#[tokio::test]
async fn test_full_voice_turn() {
    let voice = RecordingVoice::new();
    let completion = MockCompletion::replying("hi");
    let mut controller = controller(
        ScriptedSource::saying(&["hello"]),
        &voice,
        completion.clone(),
        RecordingOpener::new(),
    );

    assert_ok!(controller.start_capture());
    assert_eq!(controller.state(), TurnState::Listening);

    controller.run_until_idle().await;

    assert_eq!(controller.state(), TurnState::Idle);
    assert_eq!(texts(&controller), vec!["hello", "hi"]);
    assert_eq!(voice.spoken(), vec!["hi"]);
    assert_eq!(completion.calls(), 1);
    assert_eq!(completion.prompts(), vec!["hello"]);
    assert!(!controller.is_degraded());
}

#[tokio::test]
async fn test_open_youtube_is_intercepted() {
    let voice = RecordingVoice::new();
    let completion = MockCompletion::replying("unused");
    let opener = RecordingOpener::new();
    let mut controller = controller(
        ScriptedSource::saying(&["Could you OPEN YOUTUBE please"]),
        &voice,
        completion.clone(),
        opener.clone(),
    );

    controller.start_capture().unwrap();
    controller.run_until_idle().await;

    assert_eq!(completion.calls(), 0);
    assert_eq!(opener.opened(), vec![YOUTUBE_URL]);
    assert_eq!(voice.spoken(), vec!["Opening YouTube for you!"]);
    assert_eq!(controller.state(), TurnState::Idle);
}

#[tokio::test]
async fn test_open_youtube_beats_bye() {
    let voice = RecordingVoice::new();
    let completion = MockCompletion::replying("unused");
    let opener = RecordingOpener::new();
    let mut controller = controller(
        ScriptedSource::saying(&[]),
        &voice,
        completion.clone(),
        opener.clone(),
    );

    controller.submit_text("bye, but first open youtube").unwrap();
    controller.run_until_idle().await;

    assert_eq!(opener.opened(), vec![YOUTUBE_URL]);
    assert_eq!(texts(&controller)[1], "Opening YouTube for you!");
    assert_eq!(completion.calls(), 0);
}

#[tokio::test]
async fn test_farewell_answers_locally() {
    let voice = RecordingVoice::new();
    let completion = MockCompletion::replying("unused");
    let opener = RecordingOpener::new();
    let mut controller = controller(
        ScriptedSource::saying(&[]),
        &voice,
        completion.clone(),
        opener.clone(),
    );

    controller.submit_text("Goodbye for now").unwrap();
    controller.run_until_idle().await;

    assert_eq!(texts(&controller), vec!["Goodbye for now", "Goodbye! Have a great day!"]);
    assert!(opener.opened().is_empty());
    assert_eq!(completion.calls(), 0);
}

#[tokio::test]
async fn test_cannot_start_while_awaiting_reply() {
    let voice = RecordingVoice::new();
    let completion = MockCompletion::slow("later", Duration::from_millis(50));
    let mut controller = controller(
        ScriptedSource::saying(&["ignored"]),
        &voice,
        completion.clone(),
        RecordingOpener::new(),
    );

    controller.submit_text("what's the weather").unwrap();
    assert_eq!(controller.state(), TurnState::AwaitingReply);

    assert_eq!(
        controller.start_capture(),
        Err(TurnError::Busy(TurnState::AwaitingReply))
    );
    assert_eq!(
        controller.submit_text("again"),
        Err(TurnError::Busy(TurnState::AwaitingReply))
    );
    assert_eq!(controller.state(), TurnState::AwaitingReply);
    assert_eq!(controller.conversation().len(), 1);

    controller.run_until_idle().await;
    assert_eq!(completion.calls(), 1);
    assert_eq!(texts(&controller), vec!["what's the weather", "later"]);
}

#[tokio::test]
async fn test_cannot_start_while_speaking() {
    let voice = RecordingVoice::taking(Duration::from_millis(50));
    let mut controller = controller(
        ScriptedSource::saying(&["ignored"]),
        &voice,
        MockCompletion::replying("hi"),
        RecordingOpener::new(),
    );

    controller.submit_text("hello").unwrap();
    assert!(controller.step().await);
    assert_eq!(controller.state(), TurnState::Speaking);

    assert_eq!(
        controller.start_capture(),
        Err(TurnError::Busy(TurnState::Speaking))
    );
    assert_eq!(controller.state(), TurnState::Speaking);

    controller.run_until_idle().await;
    assert_eq!(controller.state(), TurnState::Idle);
}

#[tokio::test]
async fn test_messages_alternate() {
    let voice = RecordingVoice::new();
    let mut controller = controller(
        ScriptedSource::saying(&["open google"]),
        &voice,
        MockCompletion::replying("sure"),
        RecordingOpener::new(),
    );

    controller.submit_text("one").unwrap();
    controller.run_until_idle().await;
    controller.start_capture().unwrap();
    controller.run_until_idle().await;
    controller.submit_text("three").unwrap();
    controller.run_until_idle().await;

    let messages = controller.conversation().messages();
    assert_eq!(messages.len(), 6);
    for (i, message) in messages.iter().enumerate() {
        assert_eq!(message.is_user, i % 2 == 0);
    }
    for pair in messages.windows(2) {
        assert!(pair[0].timestamp <= pair[1].timestamp);
    }
}

#[tokio::test]
async fn test_failure_speaks_apology() {
    let voice = RecordingVoice::new();
    let mut controller = controller(
        ScriptedSource::saying(&[]),
        &voice,
        MockCompletion::failing(CompletionError::Status {
            status: 502,
            body: "bad gateway".to_string(),
        }),
        RecordingOpener::new(),
    );

    controller.submit_text("hello").unwrap();
    controller.run_until_idle().await;

    assert_eq!(controller.state(), TurnState::Idle);
    assert_eq!(texts(&controller), vec!["hello", APOLOGY]);
    assert_eq!(voice.spoken(), vec![APOLOGY]);
    assert!(controller.is_degraded());
}

#[tokio::test]
async fn test_timeout_speaks_apology() {
    let voice = RecordingVoice::new();
    let mut controller = controller(
        ScriptedSource::saying(&[]),
        &voice,
        MockCompletion::slow("too late", Duration::from_secs(5)),
        RecordingOpener::new(),
    );

    controller.submit_text("hello").unwrap();
    controller.run_until_idle().await;

    assert_eq!(texts(&controller), vec!["hello", APOLOGY]);
    assert!(controller.is_degraded());
}

#[tokio::test]
async fn test_success_clears_degraded() {
    let voice = RecordingVoice::new();
    let mut controller = controller(
        ScriptedSource::saying(&[]),
        &voice,
        MockCompletion::slow("recovered", Duration::from_millis(20)),
        RecordingOpener::new(),
    )
    .with_config(TurnConfig {
        completion_timeout: Duration::from_millis(5),
        open_site_delay: Duration::ZERO,
    });

    controller.submit_text("first").unwrap();
    controller.run_until_idle().await;
    assert!(controller.is_degraded());

    let mut controller = controller.with_config(TurnConfig::default());
    controller.submit_text("second").unwrap();
    controller.run_until_idle().await;

    assert!(!controller.is_degraded());
    assert_eq!(texts(&controller)[3], "recovered");
}

#[tokio::test]
async fn test_muted_before_reply() {
    let voice = RecordingVoice::new();
    let mut controller = controller(
        ScriptedSource::saying(&[]),
        &voice,
        MockCompletion::replying("hi"),
        RecordingOpener::new(),
    );

    controller.set_muted(true);
    controller.submit_text("hello").unwrap();
    controller.run_until_idle().await;

    assert!(controller.is_muted());
    assert_eq!(controller.state(), TurnState::Idle);
    assert_eq!(texts(&controller), vec!["hello", "hi"]);
    assert!(voice.spoken().is_empty());
}

#[tokio::test]
async fn test_mute_while_speaking_ends_turn() {
    let voice = RecordingVoice::taking(Duration::from_secs(5));
    let mut controller = controller(
        ScriptedSource::saying(&[]),
        &voice,
        MockCompletion::replying("a long answer"),
        RecordingOpener::new(),
    );

    controller.submit_text("hello").unwrap();
    controller.step().await;
    assert_eq!(controller.state(), TurnState::Speaking);

    controller.set_muted(true);
    assert_eq!(controller.state(), TurnState::Idle);
    assert_eq!(controller.conversation().len(), 2);

    controller.set_muted(false);
    controller.submit_text("next").unwrap();
    assert_eq!(controller.state(), TurnState::AwaitingReply);
}

#[tokio::test]
async fn test_cancel_speech() {
    let voice = RecordingVoice::taking(Duration::from_secs(5));
    let mut controller = controller(
        ScriptedSource::saying(&[]),
        &voice,
        MockCompletion::replying("a long answer"),
        RecordingOpener::new(),
    );

    controller.submit_text("hello").unwrap();
    controller.step().await;
    assert_eq!(controller.state(), TurnState::Speaking);

    controller.cancel_speech();
    assert_eq!(controller.state(), TurnState::Idle);
}

#[tokio::test]
async fn test_stale_event_is_ignored() {
    let voice = RecordingVoice::new();
    let mut controller = controller(
        ScriptedSource::saying(&[]),
        &voice,
        MockCompletion::slow("current", Duration::from_millis(20)),
        RecordingOpener::new(),
    );

    controller.submit_text("hello").unwrap();
    controller.handle_event(StampedEvent {
        turn: 0,
        event: TurnEvent::ReplyReceived(CompletionReply::text("stale")),
    });

    assert_eq!(controller.state(), TurnState::AwaitingReply);
    assert_eq!(controller.conversation().len(), 1);

    controller.run_until_idle().await;
    assert_eq!(texts(&controller), vec!["hello", "current"]);
}

#[tokio::test]
async fn test_capture_failure_returns_to_idle() {
    let voice = RecordingVoice::new();
    let completion = MockCompletion::replying("unused");
    let mut controller = controller(
        ScriptedSource::new([Err(CaptureError::NoSpeech)]),
        &voice,
        completion.clone(),
        RecordingOpener::new(),
    );

    assert_ok!(controller.start_capture());
    controller.run_until_idle().await;

    assert_eq!(controller.state(), TurnState::Idle);
    assert!(controller.conversation().is_empty());
    assert_eq!(controller.take_capture_error(), Some(CaptureError::NoSpeech));
    assert_eq!(controller.take_capture_error(), None);
    assert_eq!(completion.calls(), 0);
}

#[tokio::test]
async fn test_stop_capture_discards_session() {
    let voice = RecordingVoice::new();
    let mut controller = controller(
        ScriptedSource::saying(&["first", "second"]),
        &voice,
        MockCompletion::replying("ok"),
        RecordingOpener::new(),
    );

    controller.start_capture().unwrap();
    controller.stop_capture();
    assert_eq!(controller.state(), TurnState::Idle);

    controller.start_capture().unwrap();
    controller.run_until_idle().await;
    assert!(controller.conversation().messages()[0].is_user);
    assert_eq!(controller.conversation().len(), 2);
}

#[tokio::test]
async fn test_remote_open_site_action() {
    let voice = RecordingVoice::new();
    let opener = RecordingOpener::new();
    let mut controller = controller(
        ScriptedSource::saying(&[]),
        &voice,
        MockCompletion::replying_with(CompletionReply::open_site(
            "Opening Google for you!",
            GOOGLE_URL,
        )),
        opener.clone(),
    );

    controller.submit_text("search something").unwrap();
    controller.run_until_idle().await;
    controller.finish_site_open().await;

    assert_eq!(opener.opened(), vec![GOOGLE_URL]);
    assert_eq!(texts(&controller)[1], "Opening Google for you!");
}

#[tokio::test]
async fn test_blank_text_rejected() {
    let voice = RecordingVoice::new();
    let mut controller = controller(
        ScriptedSource::saying(&[]),
        &voice,
        MockCompletion::replying("unused"),
        RecordingOpener::new(),
    );

    assert_eq!(controller.submit_text("   "), Err(TurnError::EmptyInput));
    assert_eq!(controller.state(), TurnState::Idle);
    assert!(controller.conversation().is_empty());
}
