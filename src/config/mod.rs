//! Configuration management for voxwallet

pub mod file;

use std::time::Duration;

use secrecy::SecretString;

use crate::provider::Voice;
use crate::voice::CaptureConstraints;
use crate::{Error, Result};

/// Default gateway port
pub const DEFAULT_GATEWAY_PORT: u16 = 8787;

/// voxwallet configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Speech provider configuration
    pub provider: ProviderConfig,

    /// Retry/timeout/health configuration
    pub resilience: ResilienceConfig,

    /// Voice capture and playback configuration
    pub voice: VoiceConfig,

    /// Speech gateway configuration
    pub gateway: GatewayConfig,
}

/// Speech provider configuration
#[derive(Debug, Clone, Default)]
pub struct ProviderConfig {
    /// Base URL of the speech gateway; `None` disables remote calls
    pub base_url: Option<String>,

    /// Serve every call from the simulation engine
    pub simulation_only: bool,
}

impl ProviderConfig {
    /// Whether remote calls may be attempted at all
    #[must_use]
    pub const fn remote_enabled(&self) -> bool {
        !self.simulation_only && self.base_url.is_some()
    }
}

/// Retry, timeout and health settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResilienceConfig {
    /// Hard timeout per attempt
    pub attempt_timeout: Duration,

    /// Retries after the first attempt
    pub max_retries: u32,

    /// Consecutive failures that force offline status
    pub failure_threshold: u32,

    /// Period of the error budget reset timer
    pub reset_interval: Duration,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            attempt_timeout: Duration::from_secs(30),
            max_retries: 3,
            failure_threshold: 3,
            reset_interval: Duration::from_secs(60),
        }
    }
}

/// Voice processing configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// TTS voice
    pub voice: Voice,

    /// Speak command replies aloud
    pub speak_responses: bool,

    /// Seconds to listen per turn
    pub listen_for: Duration,

    /// Microphone constraints
    pub constraints: CaptureConstraints,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            voice: Voice::default(),
            speak_responses: true,
            listen_for: Duration::from_secs(5),
            constraints: CaptureConstraints::default(),
        }
    }
}

/// Speech gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Port to listen on
    pub port: u16,

    /// Upstream AI provider base URL
    pub upstream_url: String,

    /// STT model passed upstream
    pub stt_model: String,

    /// TTS model passed upstream
    pub tts_model: String,

    /// Upstream API key
    pub api_key: Option<SecretString>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_GATEWAY_PORT,
            upstream_url: "https://api.openai.com".to_string(),
            stt_model: "whisper-1".to_string(),
            tts_model: "tts-1".to_string(),
            api_key: None,
        }
    }
}

impl Config {
    /// Load configuration from the config file and environment
    ///
    /// # Errors
    ///
    /// Returns error if a configured value is invalid
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();
        Self::from_sources(fc, |key| std::env::var(key).ok())
    }

    /// Build configuration from a parsed file and an environment lookup
    ///
    /// Precedence is env > toml > default.
    ///
    /// # Errors
    ///
    /// Returns error if a configured value is invalid
    pub fn from_sources<F>(fc: file::VoxConfigFile, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let provider = ProviderConfig {
            base_url: env("VOXWALLET_PROVIDER_URL")
                .or(fc.provider.base_url)
                .filter(|url| !url.trim().is_empty()),
            simulation_only: env("VOXWALLET_SIMULATE")
                .map(|v| parse_flag(&v))
                .or(fc.provider.simulation_only)
                .unwrap_or(false),
        };

        let defaults = ResilienceConfig::default();
        let resilience = ResilienceConfig {
            attempt_timeout: fc
                .resilience
                .timeout_secs
                .map_or(defaults.attempt_timeout, Duration::from_secs),
            max_retries: fc.resilience.max_retries.unwrap_or(defaults.max_retries),
            failure_threshold: fc
                .resilience
                .failure_threshold
                .unwrap_or(defaults.failure_threshold),
            reset_interval: fc
                .resilience
                .reset_interval_secs
                .map_or(defaults.reset_interval, Duration::from_secs),
        };

        if resilience.attempt_timeout.is_zero() {
            return Err(Error::Config(
                "resilience.timeout_secs must be positive".to_string(),
            ));
        }
        if resilience.failure_threshold == 0 {
            return Err(Error::Config(
                "resilience.failure_threshold must be at least 1".to_string(),
            ));
        }
        if resilience.reset_interval.is_zero() {
            return Err(Error::Config(
                "resilience.reset_interval_secs must be positive".to_string(),
            ));
        }

        let voice = match env("VOXWALLET_VOICE").or(fc.voice.voice) {
            Some(name) => name.parse()?,
            None => Voice::default(),
        };
        let default_constraints = CaptureConstraints::default();
        let voice = VoiceConfig {
            voice,
            speak_responses: fc.voice.speak_responses.unwrap_or(true),
            listen_for: Duration::from_secs(fc.voice.listen_seconds.unwrap_or(5)),
            constraints: CaptureConstraints {
                echo_cancellation: fc
                    .voice
                    .echo_cancellation
                    .unwrap_or(default_constraints.echo_cancellation),
                noise_suppression: fc
                    .voice
                    .noise_suppression
                    .unwrap_or(default_constraints.noise_suppression),
                auto_gain_control: fc
                    .voice
                    .auto_gain_control
                    .unwrap_or(default_constraints.auto_gain_control),
                ..default_constraints
            },
        };

        let gateway_defaults = GatewayConfig::default();
        let gateway = GatewayConfig {
            port: env("VOXWALLET_GATEWAY_PORT")
                .and_then(|s| s.parse().ok())
                .or(fc.gateway.port)
                .unwrap_or(gateway_defaults.port),
            upstream_url: fc.gateway.upstream_url.unwrap_or(gateway_defaults.upstream_url),
            stt_model: fc.gateway.stt_model.unwrap_or(gateway_defaults.stt_model),
            tts_model: fc.gateway.tts_model.unwrap_or(gateway_defaults.tts_model),
            api_key: env("OPENAI_API_KEY")
                .or(fc.gateway.api_key)
                .filter(|k| !k.is_empty())
                .map(SecretString::from),
        };

        Ok(Self {
            provider,
            resilience,
            voice,
            gateway,
        })
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_sources() {
        let config = Config::from_sources(file::VoxConfigFile::default(), env_from(&[])).unwrap();

        assert!(config.provider.base_url.is_none());
        assert!(!config.provider.remote_enabled());
        assert_eq!(config.resilience, ResilienceConfig::default());
        assert_eq!(config.resilience.attempt_timeout, Duration::from_secs(30));
        assert_eq!(config.voice.voice, Voice::Alloy);
        assert_eq!(config.gateway.port, DEFAULT_GATEWAY_PORT);
        assert!(config.gateway.api_key.is_none());
    }

    #[test]
    fn env_overrides_file() {
        let fc: file::VoxConfigFile = toml::from_str(
            r#"
            [provider]
            base_url = "http://file:1"

            [voice]
            voice = "echo"
            "#,
        )
        .unwrap();

        let config = Config::from_sources(
            fc,
            env_from(&[
                ("VOXWALLET_PROVIDER_URL", "http://env:2"),
                ("VOXWALLET_VOICE", "nova"),
            ]),
        )
        .unwrap();

        assert_eq!(config.provider.base_url.as_deref(), Some("http://env:2"));
        assert_eq!(config.voice.voice, Voice::Nova);
        assert!(config.provider.remote_enabled());
    }

    #[test]
    fn simulate_flag_disables_remote() {
        let config = Config::from_sources(
            file::VoxConfigFile::default(),
            env_from(&[
                ("VOXWALLET_PROVIDER_URL", "http://env:2"),
                ("VOXWALLET_SIMULATE", "yes"),
            ]),
        )
        .unwrap();

        assert!(config.provider.simulation_only);
        assert!(!config.provider.remote_enabled());
    }

    #[test]
    fn rejects_unknown_voice() {
        let result = Config::from_sources(
            file::VoxConfigFile::default(),
            env_from(&[("VOXWALLET_VOICE", "robot")]),
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn rejects_zero_threshold() {
        let fc: file::VoxConfigFile = toml::from_str("[resilience]\nfailure_threshold = 0").unwrap();
        assert!(Config::from_sources(fc, env_from(&[])).is_err());
    }

    #[test]
    fn rejects_zero_timeout() {
        let fc = file::parse_config("[resilience]\ntimeout_secs = 0").unwrap();
        let result = Config::from_sources(fc, env_from(&[]));
        assert!(matches!(result, Err(Error::Config(msg)) if msg.contains("timeout_secs")));
    }
}
