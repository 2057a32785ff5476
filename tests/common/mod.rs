//! Shared test utilities
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::time::Instant;
use voxwallet::provider::{
    SpeechProvider, SynthesisRequest, SynthesisResult, Transcription, TranscriptionRequest,
    TranscriptionResult,
};
use voxwallet::voice::{
    CaptureConstraints, ChunkList, InputDevice, InputStream, PlaybackStrategy,
};
use voxwallet::{Error, Result};

/// One scripted provider reply
pub enum Step<T> {
    Reply(T),
    Fail(Error),
    /// Never completes; only the wrapper timeout ends it
    Hang,
}

/// Provider that replays scripted steps and records every call
#[derive(Default)]
pub struct ScriptedProvider {
    transcribe: Mutex<VecDeque<Step<Transcription>>>,
    status: Mutex<VecDeque<Step<TranscriptionResult>>>,
    synthesize: Mutex<VecDeque<Step<SynthesisResult>>>,
    calls: AtomicU32,
    call_times: Mutex<Vec<Instant>>,
}

impl ScriptedProvider {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn on_transcribe(&self, step: Step<Transcription>) -> &Self {
        self.transcribe.lock().unwrap().push_back(step);
        self
    }

    pub fn on_status(&self, step: Step<TranscriptionResult>) -> &Self {
        self.status.lock().unwrap().push_back(step);
        self
    }

    pub fn on_synthesize(&self, step: Step<SynthesisResult>) -> &Self {
        self.synthesize.lock().unwrap().push_back(step);
        self
    }

    /// Network calls made so far, across all operations
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Seconds between consecutive calls
    pub fn gaps_secs(&self) -> Vec<u64> {
        let times = self.call_times.lock().unwrap();
        times
            .windows(2)
            .map(|w| (w[1] - w[0]).as_secs())
            .collect()
    }

    fn record(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.call_times.lock().unwrap().push(Instant::now());
    }
}

async fn play_step<T>(queue: &Mutex<VecDeque<Step<T>>>) -> Result<T> {
    let step = queue.lock().unwrap().pop_front();
    match step {
        Some(Step::Reply(value)) => Ok(value),
        Some(Step::Fail(e)) => Err(e),
        Some(Step::Hang) => {
            std::future::pending::<()>().await;
            unreachable!()
        }
        None => Err(Error::Provider("script exhausted".to_string())),
    }
}

#[async_trait]
impl SpeechProvider for ScriptedProvider {
    async fn transcribe(&self, _request: &TranscriptionRequest) -> Result<Transcription> {
        self.record();
        play_step(&self.transcribe).await
    }

    async fn job_status(&self, _job_id: &str) -> Result<TranscriptionResult> {
        self.record();
        play_step(&self.status).await
    }

    async fn synthesize(&self, _request: &SynthesisRequest) -> Result<SynthesisResult> {
        self.record();
        play_step(&self.synthesize).await
    }
}

/// Input device that delivers canned chunks, or refuses to open
#[derive(Clone)]
pub struct ScriptedInput {
    chunks: Vec<Vec<f32>>,
    fail_with: Option<fn() -> Error>,
    opens: Arc<AtomicU32>,
}

impl ScriptedInput {
    /// Device that pushes `chunks` as soon as it opens
    #[must_use]
    pub fn with_chunks(chunks: Vec<Vec<f32>>) -> Self {
        Self {
            chunks,
            fail_with: None,
            opens: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Device whose permission prompt is refused
    #[must_use]
    pub fn denied() -> Self {
        Self::failing(|| Error::Permission("permission denied by user".to_string()))
    }

    /// Device without any usable input configuration
    #[must_use]
    pub fn unsupported() -> Self {
        Self::failing(|| Error::Audio("no suitable audio config found".to_string()))
    }

    fn failing(error: fn() -> Error) -> Self {
        Self {
            chunks: Vec::new(),
            fail_with: Some(error),
            opens: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn opens(&self) -> u32 {
        self.opens.load(Ordering::SeqCst)
    }
}

struct ScriptedStream {
    sample_rate: u32,
}

impl InputStream for ScriptedStream {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl InputDevice for ScriptedInput {
    fn open(
        &mut self,
        constraints: &CaptureConstraints,
        sink: ChunkList,
    ) -> Result<Box<dyn InputStream>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.fail_with {
            return Err(error());
        }
        for chunk in &self.chunks {
            sink.push(chunk);
        }
        Ok(Box::new(ScriptedStream {
            sample_rate: constraints.sample_rate,
        }))
    }
}

/// Playback strategy with a fixed outcome
pub struct MockStrategy {
    name: &'static str,
    fail_with: Option<fn() -> Error>,
    calls: Arc<AtomicU32>,
    payloads: Arc<Mutex<Vec<String>>>,
    order: Arc<Mutex<Vec<&'static str>>>,
}

impl MockStrategy {
    pub fn succeeding(name: &'static str, order: &Arc<Mutex<Vec<&'static str>>>) -> Self {
        Self {
            name,
            fail_with: None,
            calls: Arc::new(AtomicU32::new(0)),
            payloads: Arc::new(Mutex::new(Vec::new())),
            order: Arc::clone(order),
        }
    }

    pub fn failing(
        name: &'static str,
        error: fn() -> Error,
        order: &Arc<Mutex<Vec<&'static str>>>,
    ) -> Self {
        Self {
            name,
            fail_with: Some(error),
            calls: Arc::new(AtomicU32::new(0)),
            payloads: Arc::new(Mutex::new(Vec::new())),
            order: Arc::clone(order),
        }
    }

    pub fn calls(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.calls)
    }

    /// Every payload this strategy was handed, in call order
    pub fn payloads(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.payloads)
    }
}

#[async_trait]
impl PlaybackStrategy for MockStrategy {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn play(&self, payload: &str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.payloads.lock().unwrap().push(payload.to_string());
        self.order.lock().unwrap().push(self.name);
        match self.fail_with {
            Some(error) => Err(error()),
            None => Ok(()),
        }
    }
}
