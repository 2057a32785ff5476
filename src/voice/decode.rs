//! Payload and container decoding for playback

use std::io::Cursor;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use super::capture::downmix;
use crate::{Error, Result};

/// Audio container detected from magic bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
    Wav,
    Mp3,
}

impl Container {
    /// Sniff the container from the leading bytes
    #[must_use]
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE" {
            return Some(Self::Wav);
        }
        if bytes.starts_with(b"ID3") {
            return Some(Self::Mp3);
        }
        // MPEG frame sync
        if bytes.len() >= 2 && bytes[0] == 0xFF && (bytes[1] & 0xE0) == 0xE0 {
            return Some(Self::Mp3);
        }
        None
    }

    /// File extension used when spooling to disk
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
        }
    }
}

/// Mono PCM ready for a device
#[derive(Debug, Clone, PartialEq)]
pub struct Pcm {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Decode a base64 payload, tolerating a `data:...;base64,` prefix
///
/// # Errors
///
/// Returns error if the payload is not valid base64
pub fn decode_payload(payload: &str) -> Result<Vec<u8>> {
    let trimmed = payload.trim();
    let body = match trimmed.strip_prefix("data:") {
        Some(rest) => rest
            .split_once(',')
            .map(|(_, data)| data)
            .ok_or_else(|| Error::Playback("data URI without payload".to_string()))?,
        None => trimmed,
    };
    Ok(STANDARD.decode(body)?)
}

/// Decode container bytes to mono PCM
///
/// # Errors
///
/// Returns error if the container is unknown or corrupt
pub fn decode_audio(bytes: &[u8]) -> Result<Pcm> {
    match Container::sniff(bytes) {
        Some(Container::Wav) => decode_wav(bytes),
        Some(Container::Mp3) => decode_mp3(bytes),
        None => Err(Error::Playback("unrecognized audio container".to_string())),
    }
}

/// Decode WAV bytes to mono f32 samples
fn decode_wav(bytes: &[u8]) -> Result<Pcm> {
    let mut reader =
        hound::WavReader::new(Cursor::new(bytes)).map_err(|e| Error::Playback(e.to_string()))?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::Playback(e.to_string()))?,
        hound::SampleFormat::Int => {
            #[allow(clippy::cast_precision_loss)]
            let scale = (1_i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
            #[allow(clippy::cast_precision_loss)]
            let samples = reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| Error::Playback(e.to_string()))?;
            samples
        }
    };

    Ok(Pcm {
        samples: downmix(&interleaved, usize::from(spec.channels)),
        sample_rate: spec.sample_rate,
    })
}

/// Decode MP3 bytes to mono f32 samples
fn decode_mp3(bytes: &[u8]) -> Result<Pcm> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(bytes));
    let mut samples = Vec::new();
    let mut sample_rate = 0_u32;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                if sample_rate == 0 {
                    sample_rate = u32::try_from(frame.sample_rate).unwrap_or(0);
                }
                let frame_samples: Vec<f32> =
                    frame.data.iter().map(|&s| f32::from(s) / 32768.0).collect();
                samples.extend(downmix(&frame_samples, frame.channels.max(1)));
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Playback(format!("MP3 decode error: {e}"))),
        }
    }

    if sample_rate == 0 {
        return Err(Error::Playback("MP3 stream has no frames".to_string()));
    }

    Ok(Pcm {
        samples,
        sample_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice::wav::samples_to_wav;

    #[test]
    fn sniffs_containers() {
        let wav = samples_to_wav(&[0.0], 8000);
        assert_eq!(Container::sniff(&wav), Some(Container::Wav));
        assert_eq!(Container::sniff(b"ID3\x04rest"), Some(Container::Mp3));
        assert_eq!(Container::sniff(&[0xFF, 0xFB, 0x90]), Some(Container::Mp3));
        assert_eq!(Container::sniff(b"OggS"), None);
        assert_eq!(Container::sniff(&[]), None);
    }

    #[test]
    fn strips_data_uri_prefix() {
        let bytes = decode_payload("data:audio/wav;base64,AAEC").unwrap();
        assert_eq!(bytes, vec![0, 1, 2]);
        assert_eq!(decode_payload("  AAEC\n").unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn rejects_invalid_base64() {
        assert!(matches!(decode_payload("@@@"), Err(Error::Base64(_))));
        assert!(decode_payload("data:audio/wav;base64").is_err());
    }

    #[test]
    fn decodes_wav_to_pcm() {
        let wav = samples_to_wav(&[0.5, -0.5, 0.0], 16_000);
        let pcm = decode_audio(&wav).unwrap();

        assert_eq!(pcm.sample_rate, 16_000);
        assert_eq!(pcm.samples.len(), 3);
        assert!((pcm.samples[0] - 0.5).abs() < 1e-3);
        assert!((pcm.samples[1] + 0.5).abs() < 1e-3);
    }

    #[test]
    fn unknown_container_is_playback_error() {
        assert!(matches!(decode_audio(b"not audio"), Err(Error::Playback(_))));
    }
}
