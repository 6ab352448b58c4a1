//! Capture device abstraction and the `cpal` implementation.
//!
//! # Overview
//!
//! [`CaptureDevice`] is the seam between the recorder and the platform's
//! audio stack.  It is object-safe and `Send + Sync` so it can be held
//! behind an `Arc<dyn CaptureDevice>`.
//!
//! [`CpalDevice`] is the production implementation.  `cpal::Stream` is not
//! `Send` on every platform, so the stream lives on a dedicated thread for
//! its whole lifetime; the [`CaptureStream`] guard returned by
//! [`CaptureDevice::open`] only carries the shutdown signal and *is* `Send`.
//! Dropping the guard stops the thread, which drops the stream and releases
//! the microphone before the drop returns.
//!
//! [`MockDevice`] (under `#[cfg(test)]`) simulates a device without any
//! hardware: scripted open failures, seeded sample chunks, and counters for
//! how many streams were opened and how many are still live.

use std::sync::mpsc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;

use crate::audio::payload::{AudioChunk, AudioCodec, CaptureEvent};

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors raised while negotiating or running a capture stream.
#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    /// No input device is present on the default audio host.
    #[error("no input device found on the default audio host")]
    NoDevice,

    /// The platform refused microphone access.  `cpal` has no portable
    /// permission signal, so this is raised by backends that surface an
    /// explicit permission model (and by test doubles).
    #[error("microphone access denied by the platform")]
    PermissionDenied,

    /// The device exists but could not be configured or came unplugged.
    #[error("input device unavailable: {0}")]
    DeviceUnavailable(String),

    /// None of the configured codec preferences is supported by the device
    /// layer.
    #[error("no mutually supported audio codec")]
    CodecUnsupported,

    /// The platform rejected or aborted the stream.
    #[error("audio stream error: {0}")]
    Stream(String),
}

// ---------------------------------------------------------------------------
// CaptureDevice / CaptureStream traits
// ---------------------------------------------------------------------------

/// Object-safe, thread-safe interface to an audio input device.
///
/// # Contract
///
/// - [`open`] starts delivering [`CaptureEvent`]s to `events` until the
///   returned guard is dropped.
/// - Dropping the guard releases the underlying device *before* the drop
///   returns, so a caller that drops the guard and immediately re-opens
///   never sees two live streams.
///
/// [`open`]: CaptureDevice::open
pub trait CaptureDevice: Send + Sync {
    /// Encodings this device layer can deliver, in no particular order.
    fn supported_codecs(&self) -> Vec<AudioCodec>;

    /// Start capturing and send events to `events`.
    fn open(
        &self,
        codec: AudioCodec,
        events: mpsc::Sender<CaptureEvent>,
    ) -> Result<Box<dyn CaptureStream>, CaptureError>;
}

/// RAII guard for a live capture stream.  Dropping it stops the capture and
/// releases the device.
pub trait CaptureStream: Send {}

// Tests `unwrap_err()` on `Result<Box<dyn CaptureStream>, _>`, which needs
// the success type to be `Debug`.
#[cfg(test)]
impl std::fmt::Debug for dyn CaptureStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn CaptureStream")
    }
}

// Compile-time assertions: both traits must be object-safe and the stream
// guard must be able to cross threads.
const _: fn() = || {
    fn _assert_device(_: Box<dyn CaptureDevice>) {}
    fn _assert_stream_send<T: Send>(_: T) {}
    fn _assert_stream(s: Box<dyn CaptureStream>) {
        _assert_stream_send(s);
    }
};

// ---------------------------------------------------------------------------
// CpalDevice
// ---------------------------------------------------------------------------

/// Production capture device backed by the system default `cpal` input.
///
/// Device resolution happens at [`open`] time rather than at construction,
/// so a microphone plugged in after startup is picked up on the next
/// recording attempt.
///
/// [`open`]: CaptureDevice::open
#[derive(Debug, Default)]
pub struct CpalDevice;

impl CpalDevice {
    pub fn new() -> Self {
        Self
    }
}

impl CaptureDevice for CpalDevice {
    fn supported_codecs(&self) -> Vec<AudioCodec> {
        // Samples arrive as f32 and are encoded by the payload layer, so
        // both encodings are always available.
        vec![AudioCodec::WavPcm16, AudioCodec::RawPcm16]
    }

    fn open(
        &self,
        _codec: AudioCodec,
        events: mpsc::Sender<CaptureEvent>,
    ) -> Result<Box<dyn CaptureStream>, CaptureError> {
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), CaptureError>>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let join = std::thread::Builder::new()
            .name("audio-capture".into())
            .spawn(move || run_cpal_stream(events, ready_tx, stop_rx))
            .map_err(|e| CaptureError::Stream(e.to_string()))?;

        // The thread reports exactly once after stream setup.  A dropped
        // sender means it died before reporting.
        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Box::new(CpalStream {
                stop_tx,
                join: Some(join),
            })),
            Ok(Err(e)) => {
                let _ = join.join();
                Err(e)
            }
            Err(_) => {
                let _ = join.join();
                Err(CaptureError::Stream("capture thread died during setup".into()))
            }
        }
    }
}

/// Body of the capture thread: build the stream, report readiness, then hold
/// the stream alive until the stop signal (or the guard being dropped).
fn run_cpal_stream(
    events: mpsc::Sender<CaptureEvent>,
    ready_tx: mpsc::Sender<Result<(), CaptureError>>,
    stop_rx: mpsc::Receiver<()>,
) {
    let stream = match build_cpal_stream(events) {
        Ok(stream) => {
            let _ = ready_tx.send(Ok(()));
            stream
        }
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    // Park until the guard signals or is dropped; either way the stream is
    // dropped here, on the thread that built it.
    let _ = stop_rx.recv();
    drop(stream);
}

fn build_cpal_stream(events: mpsc::Sender<CaptureEvent>) -> Result<cpal::Stream, CaptureError> {
    let host = cpal::default_host();
    let device = host.default_input_device().ok_or(CaptureError::NoDevice)?;

    let supported = device
        .default_input_config()
        .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?;

    let channels = supported.channels();
    let sample_rate = supported.sample_rate().0;
    let config: cpal::StreamConfig = supported.into();

    let data_events = events.clone();
    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let chunk = AudioChunk {
                    samples: data.to_vec(),
                    sample_rate,
                    channels,
                };
                // Ignore send errors; the receiver may have been dropped.
                let _ = data_events.send(CaptureEvent::Data(chunk));
            },
            move |err: cpal::StreamError| {
                log::error!("cpal stream error: {err}");
                let _ = events.send(CaptureEvent::Error(err.to_string()));
            },
            None, // no timeout
        )
        .map_err(|e| match e {
            cpal::BuildStreamError::DeviceNotAvailable => {
                CaptureError::DeviceUnavailable("device not available".into())
            }
            other => CaptureError::Stream(other.to_string()),
        })?;

    stream
        .play()
        .map_err(|e| CaptureError::Stream(e.to_string()))?;

    Ok(stream)
}

/// Guard for a live cpal stream.  Only carries the shutdown signal, so it is
/// `Send` even though `cpal::Stream` is not.
struct CpalStream {
    stop_tx: mpsc::Sender<()>,
    join: Option<std::thread::JoinHandle<()>>,
}

impl CaptureStream for CpalStream {}

impl Drop for CpalStream {
    fn drop(&mut self) {
        // Wake the capture thread and wait for it to drop the stream, so the
        // microphone is fully released by the time this drop returns.
        let _ = self.stop_tx.send(());
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

// ---------------------------------------------------------------------------
// MockDevice  (test-only)
// ---------------------------------------------------------------------------

/// A hardware-free capture device for tests.
///
/// Cloning shares state, so a test can keep one handle for assertions while
/// the recorder owns another.
///
/// # Example
///
/// ```rust
/// # use std::sync::mpsc;
/// # use phonaify::audio::{AudioCodec, CaptureDevice, MockDevice};
/// let device = MockDevice::new();
/// let (tx, _rx) = mpsc::channel();
/// let stream = device.open(AudioCodec::WavPcm16, tx).unwrap();
/// assert_eq!(device.live_streams(), 1);
/// drop(stream);
/// assert_eq!(device.live_streams(), 0);
/// ```
#[cfg(test)]
#[derive(Clone)]
pub struct MockDevice {
    inner: std::sync::Arc<MockDeviceInner>,
}

#[cfg(test)]
struct MockDeviceInner {
    supported: Vec<AudioCodec>,
    fail_open: std::sync::Mutex<Option<CaptureError>>,
    seed: std::sync::Mutex<Vec<f32>>,
    tap: std::sync::Mutex<Option<mpsc::Sender<CaptureEvent>>>,
    opens: std::sync::atomic::AtomicUsize,
    live: std::sync::Arc<std::sync::atomic::AtomicUsize>,
}

#[cfg(test)]
impl MockDevice {
    /// A device that supports both codecs and opens successfully.
    pub fn new() -> Self {
        Self::supporting(vec![AudioCodec::WavPcm16, AudioCodec::RawPcm16])
    }

    /// A device that only supports the given codecs.
    pub fn supporting(supported: Vec<AudioCodec>) -> Self {
        Self {
            inner: std::sync::Arc::new(MockDeviceInner {
                supported,
                fail_open: std::sync::Mutex::new(None),
                seed: std::sync::Mutex::new(vec![0.01_f32; 1600]),
                tap: std::sync::Mutex::new(None),
                opens: std::sync::atomic::AtomicUsize::new(0),
                live: std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0)),
            }),
        }
    }

    /// Make every subsequent `open` fail with `error`.
    pub fn fail_open_with(&self, error: CaptureError) {
        *self.inner.fail_open.lock().unwrap() = Some(error);
    }

    /// Replace the sample chunk delivered immediately on open.
    pub fn seed_samples(&self, samples: Vec<f32>) {
        *self.inner.seed.lock().unwrap() = samples;
    }

    /// Send an extra chunk into the currently open stream, if any.
    pub fn push_chunk(&self, samples: Vec<f32>) {
        if let Some(tap) = self.inner.tap.lock().unwrap().as_ref() {
            let _ = tap.send(CaptureEvent::Data(AudioChunk {
                samples,
                sample_rate: 16_000,
                channels: 1,
            }));
        }
    }

    /// Report a runtime fault into the currently open stream, if any.
    pub fn push_error(&self, message: &str) {
        if let Some(tap) = self.inner.tap.lock().unwrap().as_ref() {
            let _ = tap.send(CaptureEvent::Error(message.to_string()));
        }
    }

    /// Total number of successful opens.
    pub fn open_count(&self) -> usize {
        self.inner.opens.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Number of streams currently open (opened and not yet dropped).
    pub fn live_streams(&self) -> usize {
        self.inner.live.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl CaptureDevice for MockDevice {
    fn supported_codecs(&self) -> Vec<AudioCodec> {
        self.inner.supported.clone()
    }

    fn open(
        &self,
        codec: AudioCodec,
        events: mpsc::Sender<CaptureEvent>,
    ) -> Result<Box<dyn CaptureStream>, CaptureError> {
        if let Some(error) = self.inner.fail_open.lock().unwrap().clone() {
            return Err(error);
        }
        if !self.inner.supported.contains(&codec) {
            return Err(CaptureError::CodecUnsupported);
        }

        let seed = self.inner.seed.lock().unwrap().clone();
        if !seed.is_empty() {
            let _ = events.send(CaptureEvent::Data(AudioChunk {
                samples: seed,
                sample_rate: 16_000,
                channels: 1,
            }));
        }

        *self.inner.tap.lock().unwrap() = Some(events);
        self.inner
            .opens
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.inner
            .live
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);

        Ok(Box::new(MockStream {
            live: std::sync::Arc::clone(&self.inner.live),
        }))
    }
}

#[cfg(test)]
struct MockStream {
    live: std::sync::Arc<std::sync::atomic::AtomicUsize>,
}

#[cfg(test)]
impl CaptureStream for MockStream {}

#[cfg(test)]
impl Drop for MockStream {
    fn drop(&mut self) {
        self.live.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
