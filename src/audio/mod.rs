//! Audio subsystem: device capture, duration policy, and upload payloads.
//!
//! # Pipeline
//!
//! ```text
//! CaptureDevice → CaptureEvent (mpsc) → RecordingController
//!              → downmix + resample to 16 kHz → AudioPayload (WAV / raw PCM)
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use phonaify::audio::{CpalDevice, RecordingController};
//! use phonaify::config::RecordingConfig;
//!
//! # async fn demo() {
//! let device = Arc::new(CpalDevice::new());
//! let (mut recorder, mut events) = RecordingController::new(device, RecordingConfig::default());
//!
//! recorder.start_capture().unwrap();
//! while let Some(event) = events.recv().await {
//!     println!("{event:?}"); // Tick { elapsed_ms } every 100 ms, then TimeLimit
//! }
//! # }
//! ```

pub mod device;
pub mod payload;
pub mod recorder;

pub use device::{CaptureDevice, CaptureError, CaptureStream, CpalDevice};
pub use payload::{AudioChunk, AudioCodec, AudioPayload, CaptureEvent, TARGET_SAMPLE_RATE};
pub use recorder::{
    RecorderEvent, RecordingController, MAX_RECORDING_MS, MIN_RECORDING_MS, TICK_MS,
};

#[cfg(test)]
pub use device::MockDevice;
