//! Speech gateway HTTP service
//!
//! Fronts an upstream AI provider with the transcribe, transcription-status
//! and synthesize endpoints the speech provider client speaks, plus a
//! health probe. Remote audio URLs become background jobs.

mod jobs;
mod upstream;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderName, Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use jobs::JobStore;
pub use upstream::{OpenAiUpstream, Upstream, UpstreamRetry};

use crate::config::GatewayConfig;
use crate::provider::wire::{
    ErrorReply, StatusBody, SynthesizeBody, SynthesizeReply, TranscribeBody, TranscribeReply,
};
use crate::provider::{JobStatus, TranscriptionResult};
use crate::resilience::{FailureKind, classify};
use crate::voice::decode::decode_payload;
use crate::{Error, Result};

/// Shared state for gateway handlers
pub struct GatewayState {
    pub upstream: Arc<dyn Upstream>,
    pub jobs: JobStore,
    pub retry: UpstreamRetry,
}

impl GatewayState {
    #[must_use]
    pub fn new(upstream: Arc<dyn Upstream>) -> Self {
        Self {
            upstream,
            jobs: JobStore::new(),
            retry: UpstreamRetry::default(),
        }
    }

    #[must_use]
    pub fn with_retry(mut self, retry: UpstreamRetry) -> Self {
        self.retry = retry;
        self
    }
}

/// Build the gateway router with CORS and request tracing
pub fn router(state: Arc<GatewayState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::GET, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
            header::CONTENT_TYPE,
        ]);

    Router::new()
        .route("/transcribe", post(transcribe))
        .route("/transcription-status", post(transcription_status))
        .route("/synthesize", post(synthesize))
        .route("/health", get(health))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Transcribe inline audio, or queue a job for an audio URL
async fn transcribe(
    State(state): State<Arc<GatewayState>>,
    Json(body): Json<TranscribeBody>,
) -> std::result::Result<Json<TranscribeReply>, GatewayError> {
    if let Some(audio) = body.audio.filter(|a| !a.trim().is_empty()) {
        let bytes = decode_payload(&audio)
            .map_err(|e| GatewayError::BadRequest(format!("invalid audio payload: {e}")))?;
        if bytes.is_empty() {
            return Err(GatewayError::BadRequest("empty audio".to_string()));
        }

        let text = state
            .retry
            .run("transcribe", || state.upstream.transcribe(&bytes))
            .await
            .map_err(GatewayError::Upstream)?;

        return Ok(Json(TranscribeReply {
            text: Some(text),
            ..TranscribeReply::default()
        }));
    }

    if let Some(url) = body.audio_url.filter(|u| !u.trim().is_empty()) {
        let job_id = state.jobs.create().await;
        tokio::spawn(run_job(Arc::clone(&state), job_id.clone(), url));
        return Ok(Json(TranscribeReply {
            job_id: Some(job_id),
            ..TranscribeReply::default()
        }));
    }

    Err(GatewayError::BadRequest(
        "request needs audio or audioUrl".to_string(),
    ))
}

/// Download and transcribe remote audio, recording the outcome on the job
async fn run_job(state: Arc<GatewayState>, job_id: String, url: String) {
    state
        .jobs
        .update(&job_id, TranscriptionResult::pending(JobStatus::Processing))
        .await;

    let outcome = async {
        let audio = state
            .retry
            .run("fetch audio", || state.upstream.fetch_audio(&url))
            .await?;
        state
            .retry
            .run("transcribe", || state.upstream.transcribe(&audio))
            .await
    }
    .await;

    let result = match outcome {
        Ok(text) => TranscriptionResult::completed(text),
        Err(e) => {
            tracing::warn!(job_id = %job_id, error = %e, "transcription job failed");
            TranscriptionResult::failed(e.to_string())
        }
    };
    state.jobs.update(&job_id, result).await;
}

async fn transcription_status(
    State(state): State<Arc<GatewayState>>,
    Json(body): Json<StatusBody>,
) -> std::result::Result<Json<TranscriptionResult>, GatewayError> {
    state
        .jobs
        .fetch(&body.job_id)
        .await
        .map(Json)
        .ok_or_else(|| GatewayError::NotFound(format!("unknown job {}", body.job_id)))
}

async fn synthesize(
    State(state): State<Arc<GatewayState>>,
    Json(body): Json<SynthesizeBody>,
) -> std::result::Result<Json<SynthesizeReply>, GatewayError> {
    if body.text.trim().is_empty() {
        return Err(GatewayError::BadRequest("empty text".to_string()));
    }

    let audio = state
        .retry
        .run("synthesize", || state.upstream.synthesize(&body.text, body.voice))
        .await
        .map_err(GatewayError::Upstream)?;

    Ok(Json(SynthesizeReply {
        audio_content: Some(STANDARD.encode(audio)),
        error: None,
    }))
}

/// Gateway errors, rendered as `{ "error": message }`
#[derive(Debug)]
pub enum GatewayError {
    BadRequest(String),
    NotFound(String),
    Upstream(Error),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::Upstream(e) => {
                let status = if classify(&e) == FailureKind::Quota {
                    StatusCode::TOO_MANY_REQUESTS
                } else {
                    StatusCode::BAD_GATEWAY
                };
                (status, e.to_string())
            }
        };

        (status, Json(ErrorReply { error })).into_response()
    }
}

/// Speech gateway server
pub struct GatewayServer {
    state: Arc<GatewayState>,
    port: u16,
}

impl GatewayServer {
    #[must_use]
    pub fn new(state: GatewayState, port: u16) -> Self {
        Self {
            state: Arc::new(state),
            port,
        }
    }

    /// Build a server fronting `OpenAI` as described by `config`
    ///
    /// # Errors
    ///
    /// Returns error if the upstream cannot be configured
    pub fn from_config(config: &GatewayConfig) -> Result<Self> {
        let upstream = OpenAiUpstream::new(config)?;
        Ok(Self::new(GatewayState::new(Arc::new(upstream)), config.port))
    }

    #[must_use]
    pub fn router(&self) -> Router {
        router(Arc::clone(&self.state))
    }

    /// Bind the configured port and serve
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::Config(format!("failed to bind speech gateway: {e}")))?;

        tracing::info!(port = self.port, "speech gateway listening");
        self.serve(listener).await
    }

    /// Serve on an already bound listener
    ///
    /// # Errors
    ///
    /// Returns error if the server fails
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        axum::serve(listener, self.router())
            .await
            .map_err(|e| Error::Config(format!("speech gateway error: {e}")))?;

        Ok(())
    }

    /// Run the gateway in a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}
