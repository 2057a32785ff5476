//! Raw PCM playback on the device's default configuration

use async_trait::async_trait;

use super::output::{RateSelection, play_blocking};
use super::{PlaybackStrategy, run_blocking};
use crate::Result;
use crate::voice::decode::{decode_audio, decode_payload};

/// Decodes to PCM, resamples to whatever the device runs at, and writes the
/// buffer straight to an output stream
#[derive(Debug, Default, Clone, Copy)]
pub struct RawPcmPlayback;

#[async_trait]
impl PlaybackStrategy for RawPcmPlayback {
    fn name(&self) -> &'static str {
        "raw-pcm"
    }

    async fn play(&self, payload: &str) -> Result<()> {
        let bytes = decode_payload(payload)?;
        let pcm = decode_audio(&bytes)?;
        run_blocking(move || play_blocking(pcm, RateSelection::DeviceDefault)).await
    }
}
