//! Speech provider contract
//!
//! Request/response types for transcription and synthesis, the
//! [`SpeechProvider`] trait the resilience wrapper calls through, and the
//! HTTP client for the speech gateway.

mod http;
pub mod wire;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use http::HttpSpeechProvider;

use crate::voice::EncodedAudio;
use crate::{Error, Result};

/// TTS voice identifiers accepted by the provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Voice {
    #[default]
    Alloy,
    Echo,
    Fable,
    Onyx,
    Nova,
    Shimmer,
}

impl Voice {
    /// Every supported voice
    pub const ALL: [Self; 6] = [
        Self::Alloy,
        Self::Echo,
        Self::Fable,
        Self::Onyx,
        Self::Nova,
        Self::Shimmer,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Alloy => "alloy",
            Self::Echo => "echo",
            Self::Fable => "fable",
            Self::Onyx => "onyx",
            Self::Nova => "nova",
            Self::Shimmer => "shimmer",
        }
    }
}

impl fmt::Display for Voice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Voice {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|v| v.as_str() == wanted)
            .ok_or_else(|| {
                Error::Config(format!(
                    "unknown voice '{s}' (expected one of alloy, echo, fable, onyx, nova, shimmer)"
                ))
            })
    }
}

/// Audio to transcribe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptionRequest {
    /// Base64-encoded audio bytes
    Audio(String),
    /// Remote audio the provider fetches itself
    Url(String),
}

impl TranscriptionRequest {
    /// Request carrying encoded audio inline
    #[must_use]
    pub fn from_audio(audio: &EncodedAudio) -> Self {
        Self::Audio(audio.to_base64())
    }
}

/// Lifecycle of a transcription job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Error,
}

impl JobStatus {
    /// Whether polling can stop
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

/// Status of a transcription job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptionResult {
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TranscriptionResult {
    #[must_use]
    pub fn pending(status: JobStatus) -> Self {
        Self {
            status,
            text: None,
            error: None,
        }
    }

    #[must_use]
    pub fn completed(text: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Completed,
            text: Some(text.into()),
            error: None,
        }
    }

    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Error,
            text: None,
            error: Some(error.into()),
        }
    }

    /// Extract the transcript from a terminal result
    ///
    /// # Errors
    ///
    /// Returns [`Error::Provider`] for failed jobs and
    /// [`Error::MalformedResponse`] for completed jobs without text
    pub fn into_text(self) -> Result<String> {
        match self.status {
            JobStatus::Completed => self
                .text
                .filter(|t| !t.trim().is_empty())
                .ok_or_else(|| {
                    Error::MalformedResponse("completed job has no transcript text".to_string())
                }),
            JobStatus::Error => Err(Error::Provider(
                self.error
                    .unwrap_or_else(|| "transcription job failed".to_string()),
            )),
            status => Err(Error::MalformedResponse(format!(
                "job is not finished: {status:?}"
            ))),
        }
    }
}

/// Immediate reply to a transcription submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transcription {
    /// Transcript returned inline
    Text(String),
    /// Job accepted; poll for the result
    Job(String),
}

/// Text to speak
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisRequest {
    pub text: String,
    pub voice: Voice,
}

impl SynthesisRequest {
    #[must_use]
    pub fn new(text: impl Into<String>, voice: Voice) -> Self {
        Self {
            text: text.into(),
            voice,
        }
    }
}

/// Synthesized speech
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisResult {
    /// Base64-encoded audio bytes
    pub audio_content: String,
}

/// A remote speech-to-text / text-to-speech service
#[async_trait]
pub trait SpeechProvider: Send + Sync {
    /// Submit audio for transcription
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the reply is unusable
    async fn transcribe(&self, request: &TranscriptionRequest) -> Result<Transcription>;

    /// Fetch the status of a transcription job
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the provider has no job support
    async fn job_status(&self, job_id: &str) -> Result<TranscriptionResult> {
        Err(Error::Provider(format!(
            "provider does not run transcription jobs (job {job_id})"
        )))
    }

    /// Synthesize speech
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the reply is unusable
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<SynthesisResult>;
}
