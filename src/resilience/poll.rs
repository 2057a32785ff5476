//! Bounded polling of asynchronous transcription jobs

use std::future::Future;
use std::time::Duration;

use crate::provider::TranscriptionResult;
use crate::{Error, Result};

/// How often and how long to poll a transcription job
#[derive(Debug, Clone)]
pub struct PollPolicy {
    /// Wait before each status fetch
    pub interval: Duration,
    /// Status fetches before giving up
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_attempts: 30,
        }
    }
}

/// Poll `fetch` until it yields a terminal result
///
/// Sleeps `policy.interval` before every fetch, so a job is never polled
/// the instant it was queued.
///
/// # Errors
///
/// Returns the first fetch error, or [`Error::Timeout`] when the job is
/// still pending after `policy.max_attempts` fetches
pub async fn poll_job<F, Fut>(policy: &PollPolicy, mut fetch: F) -> Result<TranscriptionResult>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<TranscriptionResult>>,
{
    for attempt in 1..=policy.max_attempts {
        tokio::time::sleep(policy.interval).await;

        let result = fetch(attempt).await?;
        tracing::debug!(attempt, status = ?result.status, "polled transcription job");
        if result.status.is_terminal() {
            return Ok(result);
        }
    }

    Err(Error::Timeout(format!(
        "transcription job still pending after {} polls",
        policy.max_attempts
    )))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::provider::JobStatus;

    #[tokio::test(start_paused = true)]
    async fn returns_first_terminal_result() {
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let result = poll_job(&PollPolicy::default(), |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                Ok(if attempt < 3 {
                    TranscriptionResult::pending(JobStatus::Processing)
                } else {
                    TranscriptionResult::completed("send 5 sol")
                })
            }
        })
        .await
        .unwrap();

        assert_eq!(result.text.as_deref(), Some("send 5 sol"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn error_status_is_terminal() {
        let result = poll_job(&PollPolicy::default(), |_| async {
            Ok(TranscriptionResult::failed("bad audio"))
        })
        .await
        .unwrap();
        assert_eq!(result.status, JobStatus::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let err = poll_job(&PollPolicy::default(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(TranscriptionResult::pending(JobStatus::Queued)) }
        })
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Timeout(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 30);
        assert_eq!(started.elapsed(), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_error_stops_polling() {
        let calls = AtomicU32::new(0);
        let err = poll_job(&PollPolicy::default(), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::Network("connection reset".into())) }
        })
        .await
        .unwrap_err();

        assert!(matches!(err, Error::Network(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
