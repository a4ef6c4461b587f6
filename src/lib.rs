//! Voice Assistant - push-to-talk conversational assistant
//!
//! This library provides the core functionality for the voice assistant:
//! - Turn controller (capture, intent interception, completion, playback)
//! - Speech input/output adapters over the microphone and speakers
//! - Completion clients for the relay and the LLM vendor
//! - The relay HTTP API that keeps the vendor credential server-side
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                      Client                          │
//! │   SpeechInput  │  TurnController  │  SpeechOutput   │
//! └────────────────────┬────────────────────────────────┘
//!                      │ POST /api/chat, /api/voice/*
//! ┌────────────────────▼────────────────────────────────┐
//! │                      Relay                           │
//! │   Intent interceptor  │  Vendor client  │  STT/TTS  │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                   LLM vendor                         │
//! │   Chat completions  │  Whisper  │  Speech           │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod browser;
pub mod completion;
pub mod config;
pub mod conversation;
pub mod error;
pub mod intent;
pub mod relay;
pub mod speech;
pub mod turn;
pub mod voice;

pub use browser::{DryRunOpener, SiteOpener, SystemBrowser};
pub use completion::{CompletionClient, CompletionError, CompletionReply, VendorClient};
pub use config::Config;
pub use conversation::{Conversation, Message};
pub use error::{Error, Result};
pub use intent::{Intent, classify};
pub use relay::RelayClient;
pub use turn::{TurnController, TurnError, TurnEvent, TurnState};
