//! TOML configuration file loading
//!
//! Supports `~/.config/voxwallet/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{Error, Result};

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct VoxConfigFile {
    /// Speech provider endpoint
    #[serde(default)]
    pub provider: ProviderFileConfig,

    /// Retry, timeout and health settings
    #[serde(default)]
    pub resilience: ResilienceFileConfig,

    /// Capture and playback settings
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Speech gateway settings
    #[serde(default)]
    pub gateway: GatewayFileConfig,
}

/// Speech provider configuration
#[derive(Debug, Default, Deserialize)]
pub struct ProviderFileConfig {
    /// Base URL of the speech gateway (e.g. "http://localhost:8787")
    pub base_url: Option<String>,

    /// Skip the network entirely and serve simulated results
    pub simulation_only: Option<bool>,
}

/// Resilience configuration
#[derive(Debug, Default, Deserialize)]
pub struct ResilienceFileConfig {
    pub timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
    pub failure_threshold: Option<u32>,
    pub reset_interval_secs: Option<u64>,
}

/// Voice capture/playback configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// TTS voice identifier (e.g. "alloy")
    pub voice: Option<String>,

    /// Speak command replies aloud
    pub speak_responses: Option<bool>,

    /// Seconds to listen per turn
    pub listen_seconds: Option<u64>,

    pub echo_cancellation: Option<bool>,
    pub noise_suppression: Option<bool>,
    pub auto_gain_control: Option<bool>,
}

/// Gateway configuration
#[derive(Debug, Default, Deserialize)]
pub struct GatewayFileConfig {
    /// Port to listen on
    pub port: Option<u16>,

    /// Upstream AI provider base URL
    pub upstream_url: Option<String>,

    /// STT model (e.g. "whisper-1")
    pub stt_model: Option<String>,

    /// TTS model (e.g. "tts-1")
    pub tts_model: Option<String>,

    /// Upstream API key; `OPENAI_API_KEY` takes precedence
    pub api_key: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `VoxConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> VoxConfigFile {
    config_file_path().map_or_else(VoxConfigFile::default, |path| load_from(&path))
}

/// Load a TOML config file from an explicit path
///
/// Missing or unparseable files fall back to defaults with a warning.
pub fn load_from(path: &Path) -> VoxConfigFile {
    if !path.exists() {
        return VoxConfigFile::default();
    }

    match std::fs::read_to_string(path)
        .map_err(Error::from)
        .and_then(|content| parse_config(&content))
    {
        Ok(config) => {
            tracing::info!(path = %path.display(), "loaded config file");
            config
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to load config file, using defaults"
            );
            VoxConfigFile::default()
        }
    }
}

/// Parse config file contents
///
/// # Errors
///
/// Returns [`Error::Toml`] if the contents are not a valid config file
pub fn parse_config(content: &str) -> Result<VoxConfigFile> {
    Ok(toml::from_str(content)?)
}

/// Return the config file path: `~/.config/voxwallet/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("voxwallet").join("config.toml"))
}
