//! Direct playback of the decoded container at its native rate

use async_trait::async_trait;

use super::output::{RateSelection, play_blocking};
use super::{PlaybackStrategy, run_blocking};
use crate::Result;
use crate::voice::decode::{decode_audio, decode_payload};

/// Decodes the payload container and plays it at the container's own rate
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectPlayback;

#[async_trait]
impl PlaybackStrategy for DirectPlayback {
    fn name(&self) -> &'static str {
        "direct"
    }

    async fn play(&self, payload: &str) -> Result<()> {
        let bytes = decode_payload(payload)?;
        let pcm = decode_audio(&bytes)?;
        tracing::debug!(
            samples = pcm.samples.len(),
            sample_rate = pcm.sample_rate,
            "direct playback"
        );
        run_blocking(move || play_blocking(pcm, RateSelection::Native)).await
    }
}
