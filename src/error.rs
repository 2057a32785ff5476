//! Error types for the voxwallet pipeline

use thiserror::Error;

/// Result type alias for voxwallet operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the voice pipeline
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Microphone access denied or no input device present
    #[error("microphone unavailable: {0}")]
    Permission(String),

    /// Audio device or processing error
    #[error("audio error: {0}")]
    Audio(String),

    /// Remote endpoint unreachable
    #[error("network error: {0}")]
    Network(String),

    /// An attempt ran past its deadline
    #[error("timed out: {0}")]
    Timeout(String),

    /// Error envelope returned by the speech provider
    #[error("provider error: {0}")]
    Provider(String),

    /// Provider replied without an expected field
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// A single playback strategy failed
    #[error("playback error: {0}")]
    Playback(String),

    /// Output device refused to start playback
    #[error("playback blocked: {0}")]
    PlaybackBlocked(String),

    /// Every playback strategy failed
    #[error("all playback strategies failed: {}", .0.join("; "))]
    PlaybackExhausted(Vec<String>),

    /// Wallet capability refused the request
    #[error("wallet error: {0}")]
    Wallet(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Base64 decoding error
    #[error("base64 error: {0}")]
    Base64(#[from] base64::DecodeError),
}

impl Error {
    /// Map a transport failure onto the pipeline taxonomy
    ///
    /// Connect failures become [`Error::Network`] and client-side deadlines
    /// become [`Error::Timeout`] so they classify without string matching
    /// on reqwest internals.
    #[must_use]
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::Network(err.to_string())
        } else if err.is_decode() {
            Self::MalformedResponse(err.to_string())
        } else {
            Self::Http(err)
        }
    }
}
