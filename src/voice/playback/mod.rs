//! Audio playback to speakers
//!
//! Playback runs through an ordered chain of strategies. Each strategy makes
//! fewer assumptions about the output device than the one before it; the
//! first one that finishes wins.

mod direct;
mod output;
mod raw;
mod spooled;

use async_trait::async_trait;

pub use direct::DirectPlayback;
pub use output::{RateSelection, play_blocking, resample};
pub use raw::RawPcmPlayback;
pub use spooled::SpooledPlayback;

use crate::notify::{Notice, SharedNotifier};
use crate::{Error, Result};

/// One way of getting a base64 audio payload out of the speakers
#[async_trait]
pub trait PlaybackStrategy: Send + Sync {
    /// Short name used in logs and failure reports
    fn name(&self) -> &'static str;

    /// Play the payload to completion
    ///
    /// # Errors
    ///
    /// Returns error if this strategy cannot play the payload
    async fn play(&self, payload: &str) -> Result<()>;
}

/// Result of a successful chain run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// Nothing to play
    Skipped,
    /// A strategy played the payload
    Played {
        strategy: &'static str,
        /// Failures of the strategies tried before it
        failures: Vec<String>,
    },
}

/// Ordered list of playback strategies
pub struct PlaybackChain {
    strategies: Vec<Box<dyn PlaybackStrategy>>,
    notifier: SharedNotifier,
}

impl PlaybackChain {
    /// Chain with an explicit strategy order
    #[must_use]
    pub fn new(strategies: Vec<Box<dyn PlaybackStrategy>>, notifier: SharedNotifier) -> Self {
        Self {
            strategies,
            notifier,
        }
    }

    /// Direct device playback, then a spooled system player, then raw PCM
    #[must_use]
    pub fn system(notifier: SharedNotifier) -> Self {
        Self::new(
            vec![
                Box::new(DirectPlayback),
                Box::new(SpooledPlayback::default()),
                Box::new(RawPcmPlayback),
            ],
            notifier,
        )
    }

    /// Names of the strategies in the order they are tried
    #[must_use]
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Play a base64 payload through the first strategy that succeeds
    ///
    /// An empty or missing payload is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PlaybackExhausted`] once if every strategy fails
    pub async fn play(&self, payload: Option<&str>) -> Result<PlaybackOutcome> {
        let Some(payload) = payload.filter(|p| !p.trim().is_empty()) else {
            self.notifier.notify(Notice::info(
                "No audio",
                "There was no voice response to play.",
            ));
            return Ok(PlaybackOutcome::Skipped);
        };

        let mut failures = Vec::new();
        let mut blocked_notified = false;

        for strategy in &self.strategies {
            let name = strategy.name();
            tracing::debug!(strategy = name, "trying playback strategy");

            match strategy.play(payload).await {
                Ok(()) => {
                    tracing::debug!(strategy = name, "playback complete");
                    return Ok(PlaybackOutcome::Played {
                        strategy: name,
                        failures,
                    });
                }
                Err(e) => {
                    if matches!(e, Error::PlaybackBlocked(_)) && !blocked_notified {
                        blocked_notified = true;
                        self.notifier.notify(Notice::warning(
                            "Audio blocked",
                            "Audio output was refused. Check that an output device is \
                             available and not in exclusive use.",
                        ));
                    }
                    tracing::warn!(strategy = name, error = %e, "playback strategy failed");
                    failures.push(format!("{name}: {e}"));
                }
            }
        }

        self.notifier.notify(Notice::error(
            "Playback failed",
            "The voice response could not be played.",
        ));
        Err(Error::PlaybackExhausted(failures))
    }
}

/// Run blocking device work off the async runtime
pub(crate) async fn run_blocking<F>(f: F) -> Result<()>
where
    F: FnOnce() -> Result<()> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Playback(format!("playback task failed: {e}")))?
}
