//! HTTP client for the speech gateway

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::wire::{
    StatusBody, SynthesizeBody, SynthesizeReply, TranscribeBody, TranscribeReply,
};
use super::{
    SpeechProvider, SynthesisRequest, SynthesisResult, Transcription, TranscriptionRequest,
    TranscriptionResult,
};
use crate::{Error, Result};

/// Talks to the transcribe / status / synthesize endpoints of a speech gateway
#[derive(Debug, Clone)]
pub struct HttpSpeechProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSpeechProvider {
    /// Create a client for the gateway at `base_url`
    ///
    /// # Errors
    ///
    /// Returns error if the URL is empty or the HTTP client cannot be built
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(Error::Config("speech provider URL is empty".to_string()));
        }

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self { client, base_url })
    }

    /// Base URL requests are sent to
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}/{path}", self.base_url);
        tracing::debug!(url = %url, "posting to speech gateway");

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(Error::from_transport)?;

        let status = response.status();
        let text = response.text().await.map_err(Error::from_transport)?;
        tracing::debug!(status = %status, bytes = text.len(), "received response");

        match serde_json::from_str::<R>(&text) {
            // Error envelopes parse too; callers check their `error` field
            Ok(reply) => Ok(reply),
            Err(_) if status == StatusCode::TOO_MANY_REQUESTS => {
                Err(Error::Provider(format!("rate limit: {status} {text}")))
            }
            Err(_) if !status.is_success() => {
                tracing::error!(status = %status, body = %text, "speech gateway error");
                Err(Error::Provider(format!("{status}: {text}")))
            }
            Err(e) => Err(Error::MalformedResponse(e.to_string())),
        }
    }
}

#[async_trait]
impl SpeechProvider for HttpSpeechProvider {
    async fn transcribe(&self, request: &TranscriptionRequest) -> Result<Transcription> {
        let reply: TranscribeReply = self
            .post("transcribe", &TranscribeBody::from(request))
            .await?;

        if let Some(error) = reply.error {
            return Err(Error::Provider(error));
        }
        if let Some(text) = reply.text.filter(|t| !t.trim().is_empty()) {
            tracing::info!(transcript = %text, "transcription complete");
            return Ok(Transcription::Text(text));
        }
        if let Some(job_id) = reply.job_id {
            tracing::debug!(job_id = %job_id, "transcription job queued");
            return Ok(Transcription::Job(job_id));
        }

        Err(Error::MalformedResponse(
            "transcription reply has no text".to_string(),
        ))
    }

    async fn job_status(&self, job_id: &str) -> Result<TranscriptionResult> {
        self.post(
            "transcription-status",
            &StatusBody {
                job_id: job_id.to_string(),
            },
        )
        .await
    }

    async fn synthesize(&self, request: &SynthesisRequest) -> Result<SynthesisResult> {
        let reply: SynthesizeReply = self
            .post(
                "synthesize",
                &SynthesizeBody {
                    text: request.text.clone(),
                    voice: request.voice,
                },
            )
            .await?;

        if let Some(error) = reply.error {
            return Err(Error::Provider(error));
        }

        reply
            .audio_content
            .filter(|a| !a.is_empty())
            .map(|audio_content| SynthesisResult { audio_content })
            .ok_or_else(|| Error::MalformedResponse("synthesis reply has no audio".to_string()))
    }
}
