//! Simulation fallback engine
//!
//! Stands in for the remote speech service: transcription picks a phrase
//! from a fixed catalog of wallet commands, synthesis returns a short
//! silent placeholder WAV. Every result is well formed.

use std::sync::Mutex;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::provider::SynthesisResult;

/// Wallet commands returned as simulated transcripts
pub const COMMAND_CATALOG: &[&str] = &[
    "Check my SOL balance",
    "Stake 10 SOL for maximum yield",
    "Send 5 SOL to my savings wallet",
    "What's the current price of SOL",
    "Show me the market trends",
    "Set a price alert for SOL at 200 dollars",
    "Connect my wallet",
    "What's my portfolio worth",
];

/// Base64 WAV: 16 silent samples, mono, 8 kHz, 16-bit
pub const PLACEHOLDER_AUDIO_BASE64: &str = "UklGRkQAAABXQVZFZm10IBAAAAABAAEAQB8AAIA+AAACABAAZGF0YSAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA==";

/// Produces simulated transcription and synthesis results
#[derive(Debug)]
pub struct Simulator {
    rng: Mutex<StdRng>,
}

impl Simulator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Reproducible selections
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// A pseudo-random command from [`COMMAND_CATALOG`]
    #[must_use]
    pub fn transcript(&self) -> String {
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        let phrase = COMMAND_CATALOG
            .choose(&mut *rng)
            .copied()
            .unwrap_or(COMMAND_CATALOG[0]);
        tracing::debug!(transcript = phrase, "simulated transcription");
        phrase.to_string()
    }

    /// The placeholder audio, whatever the requested text and voice
    #[must_use]
    pub fn speech(&self) -> SynthesisResult {
        tracing::debug!("simulated synthesis");
        SynthesisResult {
            audio_content: PLACEHOLDER_AUDIO_BASE64.to_string(),
        }
    }
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}
