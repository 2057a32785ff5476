//! Voxwallet - voice command pipeline for a voice-controlled wallet demo
//!
//! This library provides the pipeline behind the `voxwallet` CLI:
//! - Microphone capture and WAV encoding
//! - Resilient speech-to-text / text-to-speech calls with simulation fallback
//! - Wallet command dispatch
//! - Multi-strategy audio playback
//! - A speech gateway fronting an upstream AI provider
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   WAV    ┌─────────────────────┐  transcript  ┌──────────────┐
//! │ AudioCapture ├─────────►│   ResilientClient   ├─────────────►│  Dispatcher  │
//! └──────────────┘          │ retry │ health │ sim │              └──────┬───────┘
//!                           └─────────┬───────────┘                     │ reply
//!                                     │ HTTP                            ▼
//!                           ┌─────────▼───────────┐   audio   ┌────────────────┐
//!                           │   Speech gateway    │◄──────────┤ PlaybackChain  │
//!                           │  Whisper │ TTS      │           │ direct│spool│pcm│
//!                           └─────────────────────┘           └────────────────┘
//! ```

pub mod commands;
pub mod config;
pub mod error;
pub mod gateway;
pub mod notify;
pub mod pipeline;
pub mod provider;
pub mod resilience;
pub mod simulation;
pub mod voice;
pub mod wallet;

pub use commands::{CommandDispatcher, DispatchOutcome, WalletCommand};
pub use config::Config;
pub use error::{Error, Result};
pub use gateway::{GatewayServer, GatewayState};
pub use notify::{ConsoleNotifier, Notice, NoticeLevel, Notifier, SharedNotifier};
pub use pipeline::{TurnReport, VoicePipeline};
pub use provider::{HttpSpeechProvider, SpeechProvider, Voice};
pub use resilience::{ResilientClient, Served, ServiceHealth, ServiceStatus, Source};
pub use simulation::Simulator;
pub use wallet::{DemoWallet, WalletActions};
