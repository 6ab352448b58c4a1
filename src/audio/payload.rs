//! Captured audio and its upload encodings.
//!
//! Capture backends deliver interleaved `f32` chunks at whatever rate and
//! channel count the device prefers.  The model backend wants one small,
//! predictable blob.  [`AudioPayload::assemble`] bridges the two:
//!
//! 1. downmix to mono,
//! 2. resample to [`TARGET_SAMPLE_RATE`] (16 kHz),
//! 3. encode with the negotiated [`AudioCodec`].
//!
//! The encoders are deliberately container-minimal: WAV is a fixed 44-byte
//! PCM header, raw is bare little-endian `i16` frames.

use serde::{Deserialize, Serialize};

/// Sample rate every payload is normalised to before upload.
pub const TARGET_SAMPLE_RATE: u32 = 16_000;

// ---------------------------------------------------------------------------
// Capture-side types
// ---------------------------------------------------------------------------

/// A slab of interleaved samples as delivered by a capture backend.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Everything a live capture stream can report.
#[derive(Debug)]
pub enum CaptureEvent {
    /// More interleaved samples.
    Data(AudioChunk),
    /// The device reported a runtime fault mid-stream.
    Error(String),
}

// ---------------------------------------------------------------------------
// AudioCodec
// ---------------------------------------------------------------------------

/// Wire encoding for a finished recording.
///
/// Listed in [`crate::config::RecordingConfig::codec_preferences`] in
/// preference order; the recorder picks the first one the device layer
/// supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AudioCodec {
    /// 16-bit PCM in a WAV container (44-byte header + frames).
    WavPcm16,
    /// Bare little-endian 16-bit PCM frames, no container.
    RawPcm16,
}

impl AudioCodec {
    /// MIME type to declare when uploading a payload in this encoding.
    pub fn mime_type(&self) -> &'static str {
        match self {
            AudioCodec::WavPcm16 => "audio/wav",
            AudioCodec::RawPcm16 => "audio/pcm",
        }
    }
}

// ---------------------------------------------------------------------------
// AudioPayload
// ---------------------------------------------------------------------------

/// A finished recording: 16 kHz mono, encoded and ready for upload.
#[derive(Debug, Clone)]
pub struct AudioPayload {
    /// Encoded bytes in the format described by `codec`.
    pub bytes: Vec<u8>,
    /// Encoding of `bytes`.
    pub codec: AudioCodec,
    /// Wall-clock length of the capture in milliseconds.
    pub duration_ms: u64,
}

impl AudioPayload {
    /// Assemble a payload from raw interleaved capture samples.
    ///
    /// `sample_rate` and `channels` describe the input; the output is always
    /// mono at [`TARGET_SAMPLE_RATE`].  An empty input yields a payload whose
    /// bytes are just the container header (WAV) or empty (raw).
    pub fn assemble(
        samples: &[f32],
        sample_rate: u32,
        channels: u16,
        codec: AudioCodec,
        duration_ms: u64,
    ) -> Self {
        let mono = downmix_mono(samples, channels);
        let normalised = resample(&mono, sample_rate, TARGET_SAMPLE_RATE);
        let bytes = match codec {
            AudioCodec::WavPcm16 => encode_wav_pcm16(&normalised, TARGET_SAMPLE_RATE),
            AudioCodec::RawPcm16 => encode_raw_pcm16(&normalised),
        };
        AudioPayload {
            bytes,
            codec,
            duration_ms,
        }
    }
}

// ---------------------------------------------------------------------------
// Downmix / resample
// ---------------------------------------------------------------------------

/// Average interleaved multi-channel audio down to mono.
///
/// Output length is `samples.len() / channels`.  Mono input is returned as
/// an owned copy; zero channels yields an empty vector.
fn downmix_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => samples.to_vec(),
        n => {
            let n = n as usize;
            samples
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect()
        }
    }
}

/// Resample mono audio from `from_hz` to `to_hz` by linear interpolation.
///
/// Equal rates are a no-op copy.  A zero source rate yields an empty vector.
fn resample(samples: &[f32], from_hz: u32, to_hz: u32) -> Vec<f32> {
    if from_hz == to_hz {
        return samples.to_vec();
    }
    if samples.is_empty() || from_hz == 0 {
        return Vec::new();
    }

    let ratio = to_hz as f64 / from_hz as f64;
    let output_len = (samples.len() as f64 * ratio).ceil() as usize;
    let mut output = Vec::with_capacity(output_len);

    for i in 0..output_len {
        let src_pos = i as f64 / ratio;
        let idx = src_pos as usize;
        let frac = (src_pos - idx as f64) as f32;

        let sample = if idx + 1 < samples.len() {
            samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
        } else if idx < samples.len() {
            samples[idx]
        } else {
            0.0
        };

        output.push(sample);
    }

    output
}

// ---------------------------------------------------------------------------
// Encoders
// ---------------------------------------------------------------------------

/// Convert one `f32` sample in `[-1.0, 1.0]` to a 16-bit PCM sample.
fn to_pcm16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * 32767.0) as i16
}

/// Encode mono samples as a minimal PCM WAV file.
fn encode_wav_pcm16(samples: &[f32], sample_rate: u32) -> Vec<u8> {
    const CHANNELS: u16 = 1;
    const BITS_PER_SAMPLE: u16 = 16;

    let data_len = (samples.len() * 2) as u32;
    let byte_rate = sample_rate * u32::from(CHANNELS) * u32::from(BITS_PER_SAMPLE) / 8;
    let block_align = CHANNELS * BITS_PER_SAMPLE / 8;

    let mut bytes = Vec::with_capacity(44 + data_len as usize);
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");
    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes()); // fmt chunk size
    bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
    bytes.extend_from_slice(&CHANNELS.to_le_bytes());
    bytes.extend_from_slice(&sample_rate.to_le_bytes());
    bytes.extend_from_slice(&byte_rate.to_le_bytes());
    bytes.extend_from_slice(&block_align.to_le_bytes());
    bytes.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());
    for &sample in samples {
        bytes.extend_from_slice(&to_pcm16(sample).to_le_bytes());
    }
    bytes
}

/// Encode mono samples as bare little-endian 16-bit PCM.
fn encode_raw_pcm16(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        bytes.extend_from_slice(&to_pcm16(sample).to_le_bytes());
    }
    bytes
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
