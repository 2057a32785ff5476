//! Transport-resilience wrapper around the speech provider
//!
//! Every transcription and synthesis call goes through [`ResilientClient`]:
//! a per-attempt timeout, exponential backoff, failure classification and
//! a shared error budget that trips the service into simulation mode. The
//! wrapper never returns an error; when the provider cannot serve a call
//! the [`Simulator`] does.

mod classify;
mod health;
mod poll;
mod retry;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

pub use classify::{CLASSIFICATION_RULES, FailureKind, classify, classify_message};
pub use health::{ServiceHealth, ServiceStatus};
pub use poll::{PollPolicy, poll_job};
pub use retry::RetryPolicy;

use crate::config::Config;
use crate::notify::{Notice, SharedNotifier};
use crate::provider::{
    HttpSpeechProvider, SpeechProvider, SynthesisRequest, SynthesisResult, Transcription,
    TranscriptionRequest,
};
use crate::simulation::Simulator;
use crate::{Error, Result};

/// Provider operation, used in logs and notices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Transcribe,
    Synthesize,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Transcribe => "speech-to-text",
            Self::Synthesize => "text-to-speech",
        })
    }
}

/// Why a call was served by simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    /// No provider configured, or simulation forced
    Disabled,
    /// Service was offline when the call started
    Offline,
    /// Quota or rate limit hit
    Quota,
    /// Provider unreachable
    Connectivity,
    /// Provider reply was missing an expected field
    Malformed,
    /// Every attempt failed
    Exhausted,
    /// Nothing was recorded to transcribe
    NoInput,
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disabled => "disabled",
            Self::Offline => "offline",
            Self::Quota => "quota",
            Self::Connectivity => "connectivity",
            Self::Malformed => "malformed",
            Self::Exhausted => "exhausted",
            Self::NoInput => "no input",
        })
    }
}

/// Where a served value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Provider,
    Simulated(FallbackReason),
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Provider => f.write_str("provider"),
            Self::Simulated(reason) => write!(f, "simulated ({reason})"),
        }
    }
}

/// A value returned by the wrapper, tagged with its source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Served<T> {
    pub value: T,
    pub source: Source,
}

impl<T> Served<T> {
    #[must_use]
    pub const fn provider(value: T) -> Self {
        Self {
            value,
            source: Source::Provider,
        }
    }

    #[must_use]
    pub const fn simulated(value: T, reason: FallbackReason) -> Self {
        Self {
            value,
            source: Source::Simulated(reason),
        }
    }

    #[must_use]
    pub const fn is_simulated(&self) -> bool {
        matches!(self.source, Source::Simulated(_))
    }
}

/// Speech provider calls with timeout, retry, classification and fallback
pub struct ResilientClient {
    provider: Option<Arc<dyn SpeechProvider>>,
    health: ServiceHealth,
    simulator: Simulator,
    notifier: SharedNotifier,
    policy: RetryPolicy,
    poll: PollPolicy,
}

impl ResilientClient {
    /// Create a wrapper around `provider`; `None` serves everything from
    /// simulation
    #[must_use]
    pub fn new(
        provider: Option<Arc<dyn SpeechProvider>>,
        health: ServiceHealth,
        notifier: SharedNotifier,
    ) -> Self {
        Self {
            provider,
            health,
            simulator: Simulator::new(),
            notifier,
            policy: RetryPolicy::default(),
            poll: PollPolicy::default(),
        }
    }

    /// Build the wrapper described by `config`
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP provider cannot be constructed
    pub fn from_config(config: &Config, notifier: SharedNotifier) -> Result<Self> {
        let provider: Option<Arc<dyn SpeechProvider>> = match &config.provider.base_url {
            Some(url) if config.provider.remote_enabled() => {
                tracing::info!(url = %url, "using remote speech provider");
                Some(Arc::new(HttpSpeechProvider::new(url.clone())?))
            }
            _ => {
                tracing::info!("speech provider disabled, simulation mode");
                None
            }
        };

        let health = ServiceHealth::new(config.resilience.failure_threshold);
        Ok(Self::new(provider, health, notifier)
            .with_policy(RetryPolicy::from(&config.resilience)))
    }

    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    #[must_use]
    pub fn with_simulator(mut self, simulator: Simulator) -> Self {
        self.simulator = simulator;
        self
    }

    /// Shared health context
    #[must_use]
    pub const fn health(&self) -> &ServiceHealth {
        &self.health
    }

    #[must_use]
    pub const fn simulator(&self) -> &Simulator {
        &self.simulator
    }

    /// Whether calls can reach a provider at all
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.provider.is_some()
    }

    /// Run `call` under the retry policy, falling back to `fallback`
    pub async fn invoke<T, F, Fut>(
        &self,
        operation: Operation,
        call: F,
        fallback: impl FnOnce() -> T,
    ) -> Served<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if !self.is_enabled() {
            return Served::simulated(fallback(), FallbackReason::Disabled);
        }

        match self.run(operation, call).await {
            Ok(value) => Served::provider(value),
            Err(reason) => Served::simulated(fallback(), reason),
        }
    }

    /// Transcribe audio, polling job replies to completion
    pub async fn transcribe(&self, request: &TranscriptionRequest) -> Served<String> {
        let Some(provider) = self.provider.as_ref() else {
            return Served::simulated(self.simulator.transcript(), FallbackReason::Disabled);
        };

        let submitted = self
            .run(Operation::Transcribe, || provider.transcribe(request))
            .await;

        let job_id = match submitted {
            Ok(Transcription::Text(text)) => return Served::provider(text),
            Ok(Transcription::Job(job_id)) => job_id,
            Err(reason) => return Served::simulated(self.simulator.transcript(), reason),
        };

        match self.await_job(provider.as_ref(), &job_id).await {
            Ok(text) => {
                self.health.record_success();
                Served::provider(text)
            }
            Err(error) => {
                let reason = self.give_up(Operation::Transcribe, &error, 1);
                Served::simulated(self.simulator.transcript(), reason)
            }
        }
    }

    /// Synthesize speech
    pub async fn synthesize(&self, request: &SynthesisRequest) -> Served<SynthesisResult> {
        let Some(provider) = self.provider.as_ref() else {
            return Served::simulated(self.simulator.speech(), FallbackReason::Disabled);
        };

        match self
            .run(Operation::Synthesize, || provider.synthesize(request))
            .await
        {
            Ok(result) => Served::provider(result),
            Err(reason) => Served::simulated(self.simulator.speech(), reason),
        }
    }

    async fn await_job(&self, provider: &dyn SpeechProvider, job_id: &str) -> Result<String> {
        let timeout = self.policy.attempt_timeout;
        let result = poll_job(&self.poll, |attempt| async move {
            tokio::time::timeout(timeout, provider.job_status(job_id))
                .await
                .map_err(|_| Error::Timeout(format!("job {job_id} poll {attempt}")))?
        })
        .await?;

        result.into_text()
    }

    async fn run<T, F, Fut>(
        &self,
        operation: Operation,
        mut call: F,
    ) -> std::result::Result<T, FallbackReason>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if self.health.is_offline() {
            tracing::debug!(%operation, "speech service offline, simulating");
            return Err(FallbackReason::Offline);
        }

        let max_attempts = self.policy.max_attempts();
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            let outcome = match tokio::time::timeout(self.policy.attempt_timeout, call()).await {
                Ok(outcome) => outcome,
                Err(_) => Err(Error::Timeout(format!(
                    "{operation} attempt {attempt} after {}s",
                    self.policy.attempt_timeout.as_secs()
                ))),
            };

            let error = match outcome {
                Ok(value) => {
                    self.health.record_success();
                    if attempt > 1 {
                        tracing::info!(%operation, attempt, "succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(error) => error,
            };

            let kind = classify(&error);
            tracing::warn!(%operation, attempt, max_attempts, ?kind, error = %error, "attempt failed");

            if kind != FailureKind::Transient {
                return Err(self.give_up(operation, &error, attempt));
            }

            self.health.record_failure();
            if attempt < max_attempts {
                let delay = self.policy.delay_after(attempt);
                tracing::debug!(%operation, attempt, delay_secs = delay.as_secs(), "backing off");
                tokio::time::sleep(delay).await;
            }
            last_error = Some(error);
        }

        let detail = last_error.map_or_else(String::new, |e| e.to_string());
        tracing::error!(%operation, attempts = max_attempts, error = %detail, "retries exhausted");
        self.notifier.notify(Notice::warning(
            "Speech service unavailable",
            format!("{operation} failed after {max_attempts} attempts; using simulation mode"),
        ));
        Err(FallbackReason::Exhausted)
    }

    /// Settle a failure that stops the call; returns the fallback reason
    fn give_up(&self, operation: Operation, error: &Error, attempt: u32) -> FallbackReason {
        let (reason, notice) = match classify(error) {
            FailureKind::Quota => {
                self.health.force_offline();
                (
                    FallbackReason::Quota,
                    Notice::warning(
                        "Speech quota reached",
                        format!("{operation} quota exhausted; using simulation mode"),
                    ),
                )
            }
            FailureKind::Connectivity => {
                self.health.force_offline();
                (
                    FallbackReason::Connectivity,
                    Notice::warning(
                        "Speech service unreachable",
                        format!("{operation} could not connect; using simulation mode"),
                    ),
                )
            }
            FailureKind::Malformed => (
                FallbackReason::Malformed,
                Notice::warning(
                    "Unexpected speech service reply",
                    format!("{operation} reply was incomplete; using simulation mode"),
                ),
            ),
            FailureKind::Transient => {
                self.health.record_failure();
                (
                    FallbackReason::Exhausted,
                    Notice::warning(
                        "Speech service unavailable",
                        format!("{operation} failed; using simulation mode"),
                    ),
                )
            }
        };

        tracing::warn!(%operation, attempt, %reason, error = %error, "falling back to simulation");
        self.notifier.notify(notice);
        reason
    }
}

impl fmt::Debug for ResilientClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResilientClient")
            .field("enabled", &self.is_enabled())
            .field("status", &self.health.status())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::notify::{NoticeLevel, RecordingNotifier};
    use crate::simulation::COMMAND_CATALOG;

    fn client(notifier: &RecordingNotifier) -> ResilientClient {
        ResilientClient::new(
            Some(Arc::new(NeverProvider)),
            ServiceHealth::new(3),
            Arc::new(notifier.clone()),
        )
        .with_simulator(Simulator::with_seed(3))
    }

    struct NeverProvider;

    #[async_trait::async_trait]
    impl SpeechProvider for NeverProvider {
        async fn transcribe(&self, _: &TranscriptionRequest) -> Result<Transcription> {
            Err(Error::Provider("unused".into()))
        }

        async fn synthesize(&self, _: &SynthesisRequest) -> Result<SynthesisResult> {
            Err(Error::Provider("unused".into()))
        }
    }

    // -- invoke ---------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn success_is_served_by_provider() {
        let notifier = RecordingNotifier::new();
        let client = client(&notifier);

        let served = client
            .invoke(Operation::Transcribe, || async { Ok(7) }, || 0)
            .await;

        assert_eq!(served, Served::provider(7));
        assert!(notifier.notices().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_then_success_resets_budget() {
        let notifier = RecordingNotifier::new();
        let client = client(&notifier);
        let calls = AtomicU32::new(0);

        let served = client
            .invoke(
                Operation::Synthesize,
                || {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n == 0 {
                            Err(Error::Provider("502 Bad Gateway".into()))
                        } else {
                            Ok("ok")
                        }
                    }
                },
                || "fallback",
            )
            .await;

        assert_eq!(served.value, "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(client.health().status(), ServiceStatus::Online);
        assert!(notifier.notices().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_reply_does_not_charge_budget() {
        let notifier = RecordingNotifier::new();
        let client = client(&notifier);
        let calls = AtomicU32::new(0);

        let served = client
            .invoke(
                Operation::Transcribe,
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err::<u8, _>(Error::MalformedResponse("no text".into())) }
                },
                || 1,
            )
            .await;

        assert_eq!(served, Served::simulated(1, FallbackReason::Malformed));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(client.health().consecutive_failures(), 0);
        assert_eq!(client.health().status(), ServiceStatus::Online);
        assert_eq!(notifier.at_level(NoticeLevel::Warning).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn connectivity_failure_forces_offline() {
        let notifier = RecordingNotifier::new();
        let client = client(&notifier);

        let served = client
            .invoke(
                Operation::Transcribe,
                || async { Err::<u8, _>(Error::Network("connection refused".into())) },
                || 0,
            )
            .await;

        assert_eq!(served.source, Source::Simulated(FallbackReason::Connectivity));
        assert!(client.health().is_offline());
        assert_eq!(notifier.notices().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_client_never_calls() {
        let notifier = RecordingNotifier::new();
        let client = ResilientClient::new(None, ServiceHealth::new(3), Arc::new(notifier.clone()));
        let calls = AtomicU32::new(0);

        let served = client
            .invoke(
                Operation::Transcribe,
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Ok(1) }
                },
                || 0,
            )
            .await;

        assert_eq!(served, Served::simulated(0, FallbackReason::Disabled));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(notifier.notices().is_empty());

        let text = client
            .transcribe(&TranscriptionRequest::Url("https://x/a.wav".into()))
            .await;
        assert!(COMMAND_CATALOG.contains(&text.value.as_str()));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_attempt_times_out() {
        let notifier = RecordingNotifier::new();
        let client = client(&notifier).with_policy(RetryPolicy {
            attempt_timeout: Duration::from_secs(1),
            max_retries: 0,
            ..RetryPolicy::default()
        });
        let seen = Mutex::new(Vec::new());

        let served = client
            .invoke(
                Operation::Synthesize,
                || {
                    seen.lock().unwrap().push(tokio::time::Instant::now());
                    async {
                        tokio::time::sleep(Duration::from_secs(5)).await;
                        Ok(1)
                    }
                },
                || 0,
            )
            .await;

        assert_eq!(served, Served::simulated(0, FallbackReason::Exhausted));
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(client.health().consecutive_failures(), 1);
        assert_eq!(client.health().status(), ServiceStatus::Partial);
    }

    // -- display --------------------------------------------------------------

    #[test]
    fn source_display() {
        assert_eq!(Source::Provider.to_string(), "provider");
        assert_eq!(
            Source::Simulated(FallbackReason::Quota).to_string(),
            "simulated (quota)"
        );
        assert_eq!(Operation::Transcribe.to_string(), "speech-to-text");
    }
}
