//! Shared service health: status plus error budget

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Health of the remote speech service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    /// Calls go to the provider
    Online,
    /// Recent failures, still calling the provider
    Partial,
    /// Calls are served by simulation without network I/O
    Offline,
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Online => "online",
            Self::Partial => "partial",
            Self::Offline => "offline",
        })
    }
}

#[derive(Debug)]
struct HealthState {
    status: ServiceStatus,
    consecutive_failures: u32,
}

/// Status and error budget shared by every wrapper call
///
/// Cloning shares the same state. Created once at startup; the reset task
/// returns it to [`ServiceStatus::Online`] on every tick.
#[derive(Debug, Clone)]
pub struct ServiceHealth {
    state: Arc<Mutex<HealthState>>,
    failure_threshold: u32,
}

impl ServiceHealth {
    /// Create a health context that goes offline after `failure_threshold`
    /// consecutive failures
    #[must_use]
    pub fn new(failure_threshold: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(HealthState {
                status: ServiceStatus::Online,
                consecutive_failures: 0,
            })),
            failure_threshold: failure_threshold.max(1),
        }
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut HealthState) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut state)
    }

    #[must_use]
    pub fn status(&self) -> ServiceStatus {
        self.with_state(|s| s.status)
    }

    #[must_use]
    pub fn is_offline(&self) -> bool {
        self.status() == ServiceStatus::Offline
    }

    /// Consecutive failures since the last success or reset
    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.with_state(|s| s.consecutive_failures)
    }

    #[must_use]
    pub const fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    /// A call succeeded
    pub fn record_success(&self) {
        self.with_state(|s| {
            if s.status != ServiceStatus::Online {
                tracing::info!(previous = %s.status, "speech service back online");
            }
            s.consecutive_failures = 0;
            s.status = ServiceStatus::Online;
        });
    }

    /// An attempt failed; returns the new status
    pub fn record_failure(&self) -> ServiceStatus {
        let threshold = self.failure_threshold;
        self.with_state(|s| {
            s.consecutive_failures = s.consecutive_failures.saturating_add(1);
            s.status = if s.consecutive_failures >= threshold {
                ServiceStatus::Offline
            } else {
                ServiceStatus::Partial
            };
            if s.status == ServiceStatus::Offline {
                tracing::warn!(
                    failures = s.consecutive_failures,
                    "error budget exhausted, speech service offline"
                );
            }
            s.status
        })
    }

    /// A hard failure (quota, connectivity) takes the service offline at once
    pub fn force_offline(&self) {
        self.with_state(|s| {
            s.consecutive_failures = s.consecutive_failures.saturating_add(1);
            s.status = ServiceStatus::Offline;
        });
        tracing::warn!("speech service forced offline");
    }

    /// Clear the error budget and return to online
    pub fn reset(&self) {
        self.with_state(|s| {
            if s.status != ServiceStatus::Online || s.consecutive_failures > 0 {
                tracing::debug!(
                    previous = %s.status,
                    failures = s.consecutive_failures,
                    "error budget reset"
                );
            }
            s.consecutive_failures = 0;
            s.status = ServiceStatus::Online;
        });
    }

    /// Spawn the recurring reset timer on the current tokio runtime
    ///
    /// The first reset happens one full `interval` after spawning.
    #[must_use]
    pub fn spawn_reset_task(&self, interval: Duration) -> tokio::task::JoinHandle<()> {
        let health = self.clone();
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + interval;
            let mut ticker = tokio::time::interval_at(start, interval);
            loop {
                ticker.tick().await;
                health.reset();
            }
        })
    }
}

impl Default for ServiceHealth {
    fn default() -> Self {
        Self::new(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_walk_partial_then_offline() {
        let health = ServiceHealth::new(3);
        assert_eq!(health.status(), ServiceStatus::Online);

        assert_eq!(health.record_failure(), ServiceStatus::Partial);
        assert_eq!(health.record_failure(), ServiceStatus::Partial);
        assert_eq!(health.record_failure(), ServiceStatus::Offline);
        assert!(health.is_offline());
        assert_eq!(health.consecutive_failures(), 3);
    }

    #[test]
    fn success_clears_budget() {
        let health = ServiceHealth::new(3);
        health.record_failure();
        health.record_failure();
        health.record_success();

        assert_eq!(health.status(), ServiceStatus::Online);
        assert_eq!(health.consecutive_failures(), 0);
        assert_eq!(health.record_failure(), ServiceStatus::Partial);
    }

    #[test]
    fn clones_share_state() {
        let health = ServiceHealth::new(2);
        let other = health.clone();
        other.force_offline();
        assert!(health.is_offline());
        health.reset();
        assert_eq!(other.status(), ServiceStatus::Online);
    }

    #[test]
    fn zero_threshold_is_clamped() {
        let health = ServiceHealth::new(0);
        assert_eq!(health.failure_threshold(), 1);
        assert_eq!(health.record_failure(), ServiceStatus::Offline);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_task_restores_online() {
        let health = ServiceHealth::new(3);
        for _ in 0..3 {
            health.record_failure();
        }
        let task = health.spawn_reset_task(Duration::from_secs(60));

        tokio::time::sleep(Duration::from_secs(59)).await;
        assert!(health.is_offline());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(health.status(), ServiceStatus::Online);
        assert_eq!(health.consecutive_failures(), 0);

        task.abort();
    }
}
