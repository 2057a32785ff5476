//! One voice turn: capture, transcribe, dispatch, speak

use std::time::Duration;

use crate::Error;
use crate::commands::{CommandDispatcher, WalletCommand};
use crate::notify::{Notice, SharedNotifier};
use crate::provider::{SynthesisRequest, TranscriptionRequest, Voice};
use crate::resilience::{FallbackReason, ResilientClient, Source};
use crate::voice::{AudioCapture, PlaybackChain, encode_wav};

/// What happened during one turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnReport {
    pub transcript: String,
    /// Where the transcript came from
    pub source: Source,
    pub command: WalletCommand,
    pub reply: String,
    /// Whether the reply was played back
    pub spoken: bool,
}

/// Wires capture, the resilient provider, dispatch and playback together
pub struct VoicePipeline {
    capture: AudioCapture,
    client: ResilientClient,
    dispatcher: CommandDispatcher,
    playback: PlaybackChain,
    notifier: SharedNotifier,
    voice: Voice,
    speak_responses: bool,
}

impl VoicePipeline {
    #[must_use]
    pub fn new(
        capture: AudioCapture,
        client: ResilientClient,
        dispatcher: CommandDispatcher,
        playback: PlaybackChain,
        notifier: SharedNotifier,
    ) -> Self {
        Self {
            capture,
            client,
            dispatcher,
            playback,
            notifier,
            voice: Voice::default(),
            speak_responses: true,
        }
    }

    #[must_use]
    pub const fn with_voice(mut self, voice: Voice) -> Self {
        self.voice = voice;
        self
    }

    #[must_use]
    pub const fn speak_responses(mut self, enabled: bool) -> Self {
        self.speak_responses = enabled;
        self
    }

    #[must_use]
    pub const fn client(&self) -> &ResilientClient {
        &self.client
    }

    /// Listen for `listen_for`, then act on what was heard
    ///
    /// Microphone and provider failures degrade to simulated transcripts;
    /// playback failures are reported through notices and do not fail the
    /// turn.
    pub async fn run_turn(&mut self, listen_for: Duration) -> TurnReport {
        let (transcript, source) = match self.listen(listen_for).await {
            Some(request) => {
                let served = self.client.transcribe(&request).await;
                (served.value, served.source)
            }
            None => (
                self.client.simulator().transcript(),
                Source::Simulated(FallbackReason::NoInput),
            ),
        };
        tracing::info!(transcript = %transcript, %source, "heard");

        let outcome = self.dispatcher.dispatch(&transcript);

        let spoken = if self.speak_responses {
            self.speak(&outcome.reply).await
        } else {
            false
        };

        TurnReport {
            transcript,
            source,
            command: outcome.command,
            reply: outcome.reply,
            spoken,
        }
    }

    /// Record audio; `None` when there is nothing usable to transcribe
    async fn listen(&mut self, listen_for: Duration) -> Option<TranscriptionRequest> {
        if let Err(e) = self.capture.start() {
            tracing::warn!(error = %e, "microphone unavailable, simulating");
            let detail = match e {
                Error::Permission(reason) | Error::Audio(reason) => reason,
                other => other.to_string(),
            };
            self.notifier.notify(Notice::warning(
                "Microphone unavailable",
                format!("{detail}; using a simulated command"),
            ));
            return None;
        }

        tracing::info!(seconds = listen_for.as_secs_f32(), "listening");
        tokio::time::sleep(listen_for).await;
        let buffer = self.capture.stop();

        if buffer.is_empty() {
            tracing::warn!("no audio captured");
            self.notifier.notify(Notice::info(
                "No speech detected",
                "Nothing was recorded; using a simulated command",
            ));
            return None;
        }

        let audio = encode_wav(&buffer);
        tracing::debug!(bytes = audio.len(), samples = buffer.len(), "encoded recording");
        Some(TranscriptionRequest::from_audio(&audio))
    }

    /// Synthesize and play `text`; returns whether playback succeeded
    pub async fn speak(&self, text: &str) -> bool {
        let speech = self
            .client
            .synthesize(&SynthesisRequest::new(text, self.voice))
            .await;
        tracing::debug!(source = %speech.source, "reply synthesized");

        match self.playback.play(Some(&speech.value.audio_content)).await {
            Ok(outcome) => {
                tracing::debug!(?outcome, "reply played");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "reply playback failed");
                false
            }
        }
    }
}
