//! WAV encoding for upload
//!
//! Produces the canonical 44-byte RIFF/WAVE header (PCM, mono, 16-bit)
//! followed by little-endian samples.

use std::io::{self, Write};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use byteorder::{LittleEndian, WriteBytesExt};

use super::AudioSampleBuffer;

/// MIME type of encoded audio
pub const WAV_MIME: &str = "audio/wav";

/// Size of the canonical PCM WAV header
pub const WAV_HEADER_LEN: usize = 44;

const BITS_PER_SAMPLE: u16 = 16;
const CHANNELS: u16 = 1;

/// Encoded audio ready for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedAudio {
    bytes: Vec<u8>,
    mime_type: &'static str,
}

impl EncodedAudio {
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub const fn mime_type(&self) -> &'static str {
        self.mime_type
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Base64 form used in JSON request bodies
    #[must_use]
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Encode a captured buffer as 16-bit mono WAV
#[must_use]
pub fn encode_wav(buffer: &AudioSampleBuffer) -> EncodedAudio {
    EncodedAudio {
        bytes: samples_to_wav(buffer.samples(), buffer.sample_rate()),
        mime_type: WAV_MIME,
    }
}

/// Convert f32 samples to 16-bit PCM WAV bytes
///
/// Samples are clipped to [-1, 1]; negative values scale by 32768 and
/// positive values by 32767.
#[must_use]
pub fn samples_to_wav(samples: &[f32], sample_rate: u32) -> Vec<u8> {
    let mut out = Vec::with_capacity(WAV_HEADER_LEN + samples.len() * 2);
    if let Err(e) = write_wav(&mut out, samples, sample_rate) {
        // io::Write for Vec<u8> does not fail short of allocation failure
        tracing::error!(error = %e, "wav encoding failed");
    }
    out
}

/// Write samples as a 16-bit mono PCM WAV stream
///
/// # Errors
///
/// Returns error if the writer fails
#[allow(clippy::cast_possible_truncation)]
pub fn write_wav<W: Write>(out: &mut W, samples: &[f32], sample_rate: u32) -> io::Result<()> {
    let block_align = CHANNELS * (BITS_PER_SAMPLE / 8);
    let data_len = (samples.len() * usize::from(block_align)) as u32;
    let byte_rate = sample_rate * u32::from(block_align);

    out.write_all(b"RIFF")?;
    out.write_u32::<LittleEndian>(36 + data_len)?;
    out.write_all(b"WAVE")?;

    out.write_all(b"fmt ")?;
    out.write_u32::<LittleEndian>(16)?;
    out.write_u16::<LittleEndian>(1)?; // PCM
    out.write_u16::<LittleEndian>(CHANNELS)?;
    out.write_u32::<LittleEndian>(sample_rate)?;
    out.write_u32::<LittleEndian>(byte_rate)?;
    out.write_u16::<LittleEndian>(block_align)?;
    out.write_u16::<LittleEndian>(BITS_PER_SAMPLE)?;

    out.write_all(b"data")?;
    out.write_u32::<LittleEndian>(data_len)?;

    for &sample in samples {
        out.write_i16::<LittleEndian>(sample_to_i16(sample))?;
    }

    out.flush()
}

#[allow(clippy::cast_possible_truncation)]
fn sample_to_i16(sample: f32) -> i16 {
    // NaN clamps to NaN; treat it as silence
    let s = if sample.is_nan() { 0.0 } else { sample.clamp(-1.0, 1.0) };
    if s < 0.0 {
        (s * 32768.0) as i16
    } else {
        (s * 32767.0) as i16
    }
}
