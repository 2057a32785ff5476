//! Blocking PCM output through cpal

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BuildStreamError, Device, SampleRate, StreamConfig};
use rubato::{FftFixedIn, Resampler};

use crate::voice::decode::Pcm;
use crate::{Error, Result};

/// Resampler input block size
const RESAMPLE_CHUNK: usize = 1024;

/// How the output stream rate is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateSelection {
    /// Open the device at the payload's own rate
    Native,
    /// Open the device with its default config and resample to it
    DeviceDefault,
}

/// Play mono PCM on the default output device and wait for it to finish
///
/// # Errors
///
/// Returns [`Error::PlaybackBlocked`] if the device refuses to open, or
/// [`Error::Playback`] if the stream fails or never finishes
pub fn play_blocking(pcm: Pcm, selection: RateSelection) -> Result<()> {
    if pcm.samples.is_empty() {
        return Ok(());
    }

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::PlaybackBlocked("no output device available".to_string()))?;

    let (config, samples) = match selection {
        RateSelection::Native => (exact_config(&device, pcm.sample_rate)?, pcm.samples),
        RateSelection::DeviceDefault => {
            let config: StreamConfig = device
                .default_output_config()
                .map_err(|e| Error::PlaybackBlocked(e.to_string()))?
                .config();
            let samples = resample(&pcm.samples, pcm.sample_rate, config.sample_rate.0)?;
            (config, samples)
        }
    };

    let channels = usize::from(config.channels.max(1));
    let rate = config.sample_rate.0.max(1);
    let sample_count = samples.len();

    let finished = Arc::new(AtomicBool::new(false));
    let finished_cb = Arc::clone(&finished);
    let stream_error: Arc<Mutex<Option<String>>> = Arc::new(Mutex::new(None));
    let stream_error_cb = Arc::clone(&stream_error);
    let mut position = 0_usize;

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                for frame in data.chunks_mut(channels) {
                    let sample = if let Some(&s) = samples.get(position) {
                        position += 1;
                        s
                    } else {
                        finished_cb.store(true, Ordering::Release);
                        0.0
                    };
                    frame.fill(sample);
                }
            },
            move |err| {
                tracing::error!(error = %err, "audio playback error");
                if let Ok(mut slot) = stream_error_cb.lock() {
                    slot.get_or_insert_with(|| err.to_string());
                }
            },
            None,
        )
        .map_err(|e| match e {
            BuildStreamError::DeviceNotAvailable => {
                Error::PlaybackBlocked("output device not available".to_string())
            }
            other => Error::Playback(other.to_string()),
        })?;

    stream
        .play()
        .map_err(|e| Error::PlaybackBlocked(e.to_string()))?;

    let duration_ms = (sample_count as u64 * 1000) / u64::from(rate);
    let deadline = Instant::now() + Duration::from_millis(duration_ms + 500);

    while !finished.load(Ordering::Acquire) {
        if let Some(err) = stream_error.lock().ok().and_then(|e| e.clone()) {
            return Err(Error::Playback(err));
        }
        if Instant::now() > deadline {
            return Err(Error::Playback("playback did not reach the end".to_string()));
        }
        std::thread::sleep(Duration::from_millis(20));
    }

    // Let the device drain its last buffer
    std::thread::sleep(Duration::from_millis(100));
    drop(stream);

    tracing::debug!(samples = sample_count, rate, "playback complete");
    Ok(())
}

/// Find an output config that runs at exactly `rate`, mono preferred
fn exact_config(device: &Device, rate: u32) -> Result<StreamConfig> {
    let wanted = SampleRate(rate);
    let mut configs: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| Error::PlaybackBlocked(e.to_string()))?
        .filter(|c| c.min_sample_rate() <= wanted && c.max_sample_rate() >= wanted)
        .collect();
    configs.sort_by_key(cpal::SupportedStreamConfigRange::channels);

    configs
        .into_iter()
        .next()
        .map(|c| c.with_sample_rate(wanted).config())
        .ok_or_else(|| Error::Playback(format!("output device does not support {rate} Hz")))
}

/// Resample mono samples between rates
///
/// # Errors
///
/// Returns error if the resampler cannot be built for these rates
pub fn resample(samples: &[f32], from: u32, to: u32) -> Result<Vec<f32>> {
    if from == to || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let mut resampler =
        FftFixedIn::<f32>::new(from as usize, to as usize, RESAMPLE_CHUNK, 2, 1)
            .map_err(|e| Error::Playback(e.to_string()))?;

    let expected = samples.len() * to as usize / from as usize;
    let mut out = Vec::with_capacity(expected + RESAMPLE_CHUNK);
    let mut pos = 0;

    loop {
        let needed = resampler.input_frames_next();
        if pos + needed > samples.len() {
            break;
        }
        let block = vec![samples[pos..pos + needed].to_vec()];
        let frames = resampler
            .process(&block, None)
            .map_err(|e| Error::Playback(e.to_string()))?;
        out.extend_from_slice(&frames[0]);
        pos += needed;
    }

    if pos < samples.len() {
        let block = vec![samples[pos..].to_vec()];
        let frames = resampler
            .process_partial(Some(block.as_slice()), None)
            .map_err(|e| Error::Playback(e.to_string()))?;
        out.extend_from_slice(&frames[0]);
    }

    Ok(out)
}
