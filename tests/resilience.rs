//! Transport-resilience wrapper integration tests
//!
//! Run on tokio's paused clock so timeouts and backoff cost no wall time

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use voxwallet::Error;
use voxwallet::notify::{NoticeLevel, RecordingNotifier};
use voxwallet::provider::{
    JobStatus, SynthesisRequest, SynthesisResult, Transcription, TranscriptionRequest,
    TranscriptionResult, Voice,
};
use voxwallet::resilience::{
    FallbackReason, PollPolicy, ResilientClient, RetryPolicy, ServiceHealth, ServiceStatus, Source,
};
use voxwallet::simulation::{COMMAND_CATALOG, PLACEHOLDER_AUDIO_BASE64, Simulator};

mod common;
use common::{ScriptedProvider, Step};

fn client_for(
    provider: &Arc<ScriptedProvider>,
    notifier: &RecordingNotifier,
) -> ResilientClient {
    ResilientClient::new(
        Some(Arc::clone(provider) as Arc<dyn voxwallet::SpeechProvider>),
        ServiceHealth::new(3),
        Arc::new(notifier.clone()),
    )
    .with_simulator(Simulator::with_seed(42))
}

fn request() -> TranscriptionRequest {
    TranscriptionRequest::Audio("UklGRg==".to_string())
}

#[tokio::test(start_paused = true)]
async fn test_transcript_served_by_provider() {
    let provider = ScriptedProvider::new();
    provider.on_transcribe(Step::Reply(Transcription::Text("check my balance".into())));
    let notifier = RecordingNotifier::new();
    let client = client_for(&provider, &notifier);

    let served = client.transcribe(&request()).await;

    assert_eq!(served.value, "check my balance");
    assert_eq!(served.source, Source::Provider);
    assert_eq!(provider.calls(), 1);
    assert_eq!(client.health().status(), ServiceStatus::Online);
    assert!(notifier.notices().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_quota_error_falls_back_after_one_call() {
    let provider = ScriptedProvider::new();
    provider.on_transcribe(Step::Fail(Error::Provider(
        "You exceeded your current quota (insufficient_quota)".into(),
    )));
    let notifier = RecordingNotifier::new();
    let client = client_for(&provider, &notifier);
    let started = Instant::now();

    let served = client.transcribe(&request()).await;

    assert_eq!(provider.calls(), 1);
    assert_eq!(served.source, Source::Simulated(FallbackReason::Quota));
    assert!(COMMAND_CATALOG.contains(&served.value.as_str()));
    assert_eq!(started.elapsed(), Duration::ZERO);
    assert!(client.health().is_offline());
    assert_eq!(notifier.notices().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_four_timeouts_back_off_then_simulate() {
    let provider = ScriptedProvider::new();
    for _ in 0..4 {
        provider.on_transcribe(Step::Hang);
    }
    let notifier = RecordingNotifier::new();
    let client = client_for(&provider, &notifier);
    let started = Instant::now();

    let served = client.transcribe(&request()).await;

    assert_eq!(provider.calls(), 4);
    // Each gap is the 30 s timeout plus a 2 / 4 / 8 s backoff
    assert_eq!(provider.gaps_secs(), vec![32, 34, 38]);
    assert_eq!(started.elapsed().as_secs(), 4 * 30 + 2 + 4 + 8);
    assert_eq!(served.source, Source::Simulated(FallbackReason::Exhausted));
    assert!(COMMAND_CATALOG.contains(&served.value.as_str()));
    assert_eq!(notifier.notices().len(), 1);
    assert!(client.health().is_offline());
}

#[tokio::test(start_paused = true)]
async fn test_immediate_failures_use_backoff_schedule() {
    let provider = ScriptedProvider::new();
    for _ in 0..4 {
        provider.on_synthesize(Step::Fail(Error::Provider("500 Internal Server Error".into())));
    }
    let notifier = RecordingNotifier::new();
    let client = client_for(&provider, &notifier);
    let started = Instant::now();

    let served = client
        .synthesize(&SynthesisRequest::new("hello", Voice::Nova))
        .await;

    assert_eq!(provider.calls(), 4);
    assert_eq!(provider.gaps_secs(), vec![2, 4, 8]);
    assert_eq!(started.elapsed(), Duration::from_secs(14));
    assert_eq!(served.value.audio_content, PLACEHOLDER_AUDIO_BASE64);
    assert_eq!(notifier.at_level(NoticeLevel::Warning).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_offline_service_makes_no_calls() {
    let provider = ScriptedProvider::new();
    for _ in 0..3 {
        provider.on_transcribe(Step::Fail(Error::Provider("502 Bad Gateway".into())));
    }
    let notifier = RecordingNotifier::new();
    let client = client_for(&provider, &notifier).with_policy(RetryPolicy {
        max_retries: 0,
        ..RetryPolicy::default()
    });

    client.transcribe(&request()).await;
    assert_eq!(client.health().status(), ServiceStatus::Partial);
    client.transcribe(&request()).await;
    client.transcribe(&request()).await;
    assert!(client.health().is_offline());
    assert_eq!(provider.calls(), 3);

    let served = client.transcribe(&request()).await;
    assert_eq!(provider.calls(), 3);
    assert_eq!(served.source, Source::Simulated(FallbackReason::Offline));
    // One notice per failed call, none for the offline short-circuit
    assert_eq!(notifier.notices().len(), 3);

    let speech = client
        .synthesize(&SynthesisRequest::new("hi", Voice::Alloy))
        .await;
    assert_eq!(provider.calls(), 3);
    assert_eq!(speech.source, Source::Simulated(FallbackReason::Offline));
}

#[tokio::test(start_paused = true)]
async fn test_reset_tick_restores_online() {
    let provider = ScriptedProvider::new();
    provider.on_transcribe(Step::Fail(Error::Network("connection refused".into())));
    provider.on_transcribe(Step::Reply(Transcription::Text("send 5 sol".into())));
    let notifier = RecordingNotifier::new();
    let client = client_for(&provider, &notifier);
    let reset = client.health().spawn_reset_task(Duration::from_secs(60));

    let served = client.transcribe(&request()).await;
    assert_eq!(served.source, Source::Simulated(FallbackReason::Connectivity));
    assert!(client.health().is_offline());

    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(client.health().status(), ServiceStatus::Online);

    let served = client.transcribe(&request()).await;
    assert_eq!(served.value, "send 5 sol");
    assert_eq!(provider.calls(), 2);

    reset.abort();
}

#[tokio::test(start_paused = true)]
async fn test_malformed_reply_keeps_budget() {
    let provider = ScriptedProvider::new();
    provider.on_synthesize(Step::Fail(Error::MalformedResponse("no audioContent".into())));
    let notifier = RecordingNotifier::new();
    let client = client_for(&provider, &notifier);

    let served = client
        .synthesize(&SynthesisRequest::new("hello", Voice::Echo))
        .await;

    assert_eq!(provider.calls(), 1);
    assert_eq!(served.source, Source::Simulated(FallbackReason::Malformed));
    assert_eq!(client.health().consecutive_failures(), 0);
    assert_eq!(client.health().status(), ServiceStatus::Online);
}

#[tokio::test(start_paused = true)]
async fn test_job_is_polled_to_completion() {
    let provider = ScriptedProvider::new();
    provider.on_transcribe(Step::Reply(Transcription::Job("job-1".into())));
    provider.on_status(Step::Reply(TranscriptionResult::pending(JobStatus::Queued)));
    provider.on_status(Step::Reply(TranscriptionResult::pending(JobStatus::Processing)));
    provider.on_status(Step::Reply(TranscriptionResult::completed("stake 10 sol")));
    let notifier = RecordingNotifier::new();
    let client = client_for(&provider, &notifier);
    let started = Instant::now();

    let served = client.transcribe(&request()).await;

    assert_eq!(served.value, "stake 10 sol");
    assert_eq!(served.source, Source::Provider);
    assert_eq!(provider.calls(), 4);
    assert_eq!(provider.gaps_secs(), vec![2, 2, 2]);
    assert_eq!(started.elapsed(), Duration::from_secs(6));
}

#[tokio::test(start_paused = true)]
async fn test_job_polling_is_bounded() {
    let provider = ScriptedProvider::new();
    provider.on_transcribe(Step::Reply(Transcription::Job("job-2".into())));
    for _ in 0..5 {
        provider.on_status(Step::Reply(TranscriptionResult::pending(JobStatus::Processing)));
    }
    let notifier = RecordingNotifier::new();
    let client = client_for(&provider, &notifier).with_poll_policy(PollPolicy {
        interval: Duration::from_secs(2),
        max_attempts: 5,
    });

    let served = client.transcribe(&request()).await;

    assert_eq!(provider.calls(), 6);
    assert_eq!(served.source, Source::Simulated(FallbackReason::Exhausted));
    assert!(COMMAND_CATALOG.contains(&served.value.as_str()));
    assert_eq!(notifier.notices().len(), 1);
    assert_eq!(client.health().consecutive_failures(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_job_with_quota_error_goes_offline() {
    let provider = ScriptedProvider::new();
    provider.on_transcribe(Step::Reply(Transcription::Job("job-3".into())));
    provider.on_status(Step::Reply(TranscriptionResult::failed("rate limit reached")));
    let notifier = RecordingNotifier::new();
    let client = client_for(&provider, &notifier);

    let served = client.transcribe(&request()).await;

    assert_eq!(served.source, Source::Simulated(FallbackReason::Quota));
    assert!(client.health().is_offline());
}

#[tokio::test(start_paused = true)]
async fn test_disabled_client_simulates_everything() {
    let notifier = RecordingNotifier::new();
    let client = ResilientClient::new(None, ServiceHealth::new(3), Arc::new(notifier.clone()));

    let text = client.transcribe(&request()).await;
    let speech = client
        .synthesize(&SynthesisRequest::new("hi", Voice::Alloy))
        .await;

    assert_eq!(text.source, Source::Simulated(FallbackReason::Disabled));
    assert_eq!(
        speech.value,
        SynthesisResult {
            audio_content: PLACEHOLDER_AUDIO_BASE64.to_string()
        }
    );
    assert!(notifier.notices().is_empty());
}
