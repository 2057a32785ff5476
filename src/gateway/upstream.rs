//! Upstream AI provider behind the speech gateway

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::config::GatewayConfig;
use crate::provider::Voice;
use crate::resilience::{FailureKind, classify};
use crate::voice::decode::Container;
use crate::{Error, Result};

/// Speech-to-text and text-to-speech backend the gateway fronts
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Transcribe container bytes (WAV or MP3)
    async fn transcribe(&self, audio: &[u8]) -> Result<String>;

    /// Synthesize `text`, returning container bytes
    async fn synthesize(&self, text: &str, voice: Voice) -> Result<Vec<u8>>;

    /// Download remote audio for a URL transcription job
    async fn fetch_audio(&self, url: &str) -> Result<Vec<u8>>;
}

/// Server-side retry for upstream calls
///
/// Makes up to `attempts` calls with delays of `base_delay`, then twice
/// that, and so on. Quota failures are returned at once.
#[derive(Debug, Clone)]
pub struct UpstreamRetry {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl Default for UpstreamRetry {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl UpstreamRetry {
    /// Delay after failed attempt `attempt` (1-based)
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }

    /// Run `call` until it succeeds or attempts run out
    ///
    /// # Errors
    ///
    /// Returns the last error
    pub async fn run<T, F, Fut>(&self, what: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.attempts && classify(&e) != FailureKind::Quota => {
                    let delay = self.delay_after(attempt);
                    tracing::warn!(
                        what,
                        attempt,
                        delay_secs = delay.as_secs_f32(),
                        error = %e,
                        "upstream call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(what, attempt, error = %e, "upstream call failed");
                    return Err(e);
                }
            }
        }
    }
}

/// `OpenAI` Whisper and TTS
pub struct OpenAiUpstream {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    stt_model: String,
    tts_model: String,
}

impl OpenAiUpstream {
    /// Create an upstream from gateway configuration
    ///
    /// # Errors
    ///
    /// Returns error if the API key is missing
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.expose_secret().is_empty())
            .ok_or_else(|| {
                Error::Config("OPENAI_API_KEY is required to run the speech gateway".to_string())
            })?;

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            client,
            base_url: config.upstream_url.trim_end_matches('/').to_string(),
            api_key,
            stt_model: config.stt_model.clone(),
            tts_model: config.tts_model.clone(),
        })
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.api_key.expose_secret())
    }
}

/// Pull `error.message` and `error.code` out of an `OpenAI` error body
fn upstream_error(status: reqwest::StatusCode, body: &str) -> Error {
    let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
    let error = parsed.as_ref().and_then(|v| v.get("error"));
    let message = error
        .and_then(|e| e.get("message"))
        .and_then(serde_json::Value::as_str)
        .unwrap_or(body);

    match error
        .and_then(|e| e.get("code"))
        .and_then(serde_json::Value::as_str)
    {
        Some(code) => Error::Provider(format!("{status}: {message} ({code})")),
        None => Error::Provider(format!("{status}: {message}")),
    }
}

#[async_trait]
impl Upstream for OpenAiUpstream {
    async fn transcribe(&self, audio: &[u8]) -> Result<String> {
        #[derive(serde::Deserialize)]
        struct WhisperResponse {
            text: String,
        }

        let (file_name, mime) = match Container::sniff(audio) {
            Some(Container::Mp3) => ("audio.mp3", "audio/mpeg"),
            _ => ("audio.wav", "audio/wav"),
        };
        tracing::debug!(audio_bytes = audio.len(), file_name, "starting Whisper transcription");

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio.to_vec())
                    .file_name(file_name)
                    .mime_str(mime)?,
            )
            .text("model", self.stt_model.clone());

        let response = self
            .client
            .post(format!("{}/v1/audio/transcriptions", self.base_url))
            .header("Authorization", self.bearer())
            .multipart(form)
            .send()
            .await
            .map_err(Error::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Whisper API error");
            return Err(upstream_error(status, &body));
        }

        let result: WhisperResponse = response.json().await.map_err(Error::from_transport)?;
        tracing::info!(transcript = %result.text, "transcription complete");
        Ok(result.text)
    }

    async fn synthesize(&self, text: &str, voice: Voice) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: Voice,
        }

        let request = TtsRequest {
            model: &self.tts_model,
            input: text,
            voice,
        };

        let response = self
            .client
            .post(format!("{}/v1/audio/speech", self.base_url))
            .header("Authorization", self.bearer())
            .json(&request)
            .send()
            .await
            .map_err(Error::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "OpenAI TTS error");
            return Err(upstream_error(status, &body));
        }

        let audio = response.bytes().await.map_err(Error::from_transport)?;
        tracing::debug!(bytes = audio.len(), %voice, "synthesis complete");
        Ok(audio.to_vec())
    }

    async fn fetch_audio(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(Error::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Provider(format!("audio download failed: {status}")));
        }

        Ok(response.bytes().await.map_err(Error::from_transport)?.to_vec())
    }
}
