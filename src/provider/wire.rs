//! JSON envelopes exchanged with the speech gateway

use serde::{Deserialize, Serialize};

use super::{TranscriptionRequest, Voice};

/// `POST /transcribe` body
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscribeBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
}

impl From<&TranscriptionRequest> for TranscribeBody {
    fn from(request: &TranscriptionRequest) -> Self {
        match request {
            TranscriptionRequest::Audio(audio) => Self {
                audio: Some(audio.clone()),
                audio_url: None,
            },
            TranscriptionRequest::Url(url) => Self {
                audio: None,
                audio_url: Some(url.clone()),
            },
        }
    }
}

/// `POST /transcribe` reply
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscribeReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `POST /transcription-status` body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusBody {
    pub job_id: String,
}

/// `POST /synthesize` body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesizeBody {
    pub text: String,
    #[serde(default)]
    pub voice: Voice,
}

/// `POST /synthesize` reply
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesizeReply {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Error-only envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReply {
    pub error: String,
}
