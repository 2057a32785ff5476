//! Voice processing module
//!
//! Handles microphone capture, WAV encoding, payload decoding, and playback.
//! Transcription and synthesis go through [`crate::resilience`].

mod capture;
pub mod decode;
pub mod playback;
pub mod wav;

pub use capture::{
    AudioCapture, AudioSampleBuffer, CaptureConstraints, ChunkList, CpalInput, InputDevice,
    InputStream, SAMPLE_RATE, downmix,
};
pub use playback::{PlaybackChain, PlaybackOutcome, PlaybackStrategy};
pub use wav::{EncodedAudio, encode_wav, samples_to_wav, write_wav};
