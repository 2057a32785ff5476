//! Audio capture from microphone

use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BuildStreamError, SampleFormat, SampleRate, Stream, StreamConfig};

use crate::{Error, Result};

/// Sample rate for audio capture
pub const SAMPLE_RATE: u32 = 48_000;

/// Constraints requested when opening the microphone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConstraints {
    pub channels: u16,
    pub sample_rate: u32,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            channels: 1,
            sample_rate: SAMPLE_RATE,
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
        }
    }
}

/// Mono samples captured in one session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioSampleBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioSampleBuffer {
    #[must_use]
    pub const fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    #[must_use]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[must_use]
    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }
}

/// Ordered list of hardware buffers received during a session
///
/// Cloning shares the same list; the device callback holds one handle and
/// the capture unit the other.
#[derive(Debug, Clone, Default)]
pub struct ChunkList {
    chunks: Arc<Mutex<Vec<Vec<f32>>>>,
}

impl ChunkList {
    /// Append one hardware buffer
    pub fn push(&self, chunk: &[f32]) {
        if chunk.is_empty() {
            return;
        }
        let mut chunks = self.chunks.lock().unwrap_or_else(|e| e.into_inner());
        chunks.push(chunk.to_vec());
    }

    /// Number of buffered chunks
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.chunks.lock().map(|c| c.len()).unwrap_or_default()
    }

    /// Concatenate all chunks in arrival order and clear the list
    #[must_use]
    pub fn drain_concat(&self) -> Vec<f32> {
        let mut chunks = self.chunks.lock().unwrap_or_else(|e| e.into_inner());
        let total = chunks.iter().map(Vec::len).sum();
        let mut out = Vec::with_capacity(total);
        for chunk in chunks.drain(..) {
            out.extend_from_slice(&chunk);
        }
        out
    }

    /// Concatenate all chunks without clearing
    #[must_use]
    pub fn snapshot(&self) -> Vec<f32> {
        self.chunks
            .lock()
            .map(|chunks| chunks.concat())
            .unwrap_or_default()
    }

    /// Drop all buffered chunks
    pub fn clear(&self) {
        if let Ok(mut chunks) = self.chunks.lock() {
            chunks.clear();
        }
    }
}

/// A microphone source that can be opened for one session
pub trait InputDevice {
    /// Open the device and start delivering mono buffers to `sink`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Permission`] if access is denied or no device exists
    fn open(&mut self, constraints: &CaptureConstraints, sink: ChunkList)
    -> Result<Box<dyn InputStream>>;
}

/// A running input stream; dropping it releases the device
pub trait InputStream {
    /// Sample rate the device actually delivers
    fn sample_rate(&self) -> u32;
}

/// Captures audio from an input device
pub struct AudioCapture {
    device: Box<dyn InputDevice>,
    constraints: CaptureConstraints,
    chunks: ChunkList,
    stream: Option<Box<dyn InputStream>>,
    sample_rate: u32,
}

impl AudioCapture {
    /// Create a capture unit on the default host microphone
    #[must_use]
    pub fn new(constraints: CaptureConstraints) -> Self {
        Self::with_device(Box::new(CpalInput), constraints)
    }

    /// Create a capture unit on an explicit input device
    #[must_use]
    pub fn with_device(device: Box<dyn InputDevice>, constraints: CaptureConstraints) -> Self {
        Self {
            device,
            sample_rate: constraints.sample_rate,
            constraints,
            chunks: ChunkList::default(),
            stream: None,
        }
    }

    /// Start capturing audio
    ///
    /// Calling this while already recording is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Permission`] if the microphone cannot be opened
    pub fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            tracing::trace!("capture already active");
            return Ok(());
        }

        self.chunks.clear();
        let stream = self.device.open(&self.constraints, self.chunks.clone())?;
        self.sample_rate = stream.sample_rate();
        self.stream = Some(stream);

        tracing::debug!(sample_rate = self.sample_rate, "audio capture started");
        Ok(())
    }

    /// Stop capturing and return everything recorded in this session
    ///
    /// Returns an empty buffer if no recording is active.
    pub fn stop(&mut self) -> AudioSampleBuffer {
        let Some(stream) = self.stream.take() else {
            return AudioSampleBuffer::new(Vec::new(), self.sample_rate);
        };
        drop(stream);

        let samples = self.chunks.drain_concat();
        tracing::debug!(samples = samples.len(), "audio capture stopped");
        AudioSampleBuffer::new(samples, self.sample_rate)
    }

    /// Samples captured so far, without ending the session
    #[must_use]
    pub fn peek(&self) -> Vec<f32> {
        self.chunks.snapshot()
    }

    /// Discard samples captured so far
    pub fn clear(&self) {
        self.chunks.clear();
    }

    /// Check if currently capturing
    #[must_use]
    pub const fn is_capturing(&self) -> bool {
        self.stream.is_some()
    }

    /// Get the sample rate of the current (or last) session
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Default host microphone through cpal
#[derive(Debug, Default)]
pub struct CpalInput;

struct CpalStream {
    _stream: Stream,
    sample_rate: u32,
}

impl InputStream for CpalStream {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl InputDevice for CpalInput {
    fn open(
        &mut self,
        constraints: &CaptureConstraints,
        sink: ChunkList,
    ) -> Result<Box<dyn InputStream>> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Permission("no input device available".to_string()))?;

        let rate = SampleRate(constraints.sample_rate);
        let mut configs: Vec<_> = device
            .supported_input_configs()
            .map_err(|e| Error::Permission(e.to_string()))?
            .filter(|c| c.sample_format() == SampleFormat::F32)
            .filter(|c| c.min_sample_rate() <= rate && c.max_sample_rate() >= rate)
            .collect();
        // Prefer the requested channel count, then the fewest channels
        configs.sort_by_key(|c| (c.channels() != constraints.channels, c.channels()));

        let supported = configs
            .into_iter()
            .next()
            .ok_or_else(|| Error::Audio("no suitable audio config found".to_string()))?;
        let config: StreamConfig = supported.with_sample_rate(rate).config();
        let channels = usize::from(config.channels.max(1));

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = constraints.sample_rate,
            channels = config.channels,
            echo_cancellation = constraints.echo_cancellation,
            noise_suppression = constraints.noise_suppression,
            auto_gain_control = constraints.auto_gain_control,
            "opening input device; processing flags are left to the host audio stack"
        );

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if channels == 1 {
                        sink.push(data);
                    } else {
                        sink.push(&downmix(data, channels));
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio capture error");
                },
                None,
            )
            .map_err(|e| match e {
                BuildStreamError::DeviceNotAvailable => {
                    Error::Permission("input device not available".to_string())
                }
                other => Error::Audio(other.to_string()),
            })?;

        stream
            .play()
            .map_err(|e| Error::Permission(e.to_string()))?;

        Ok(Box::new(CpalStream {
            _stream: stream,
            sample_rate: constraints.sample_rate,
        }))
    }
}

/// Average interleaved frames down to one channel
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}
