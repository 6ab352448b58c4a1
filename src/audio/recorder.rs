//! Recording lifecycle: one capture at a time, with duration policy.
//!
//! # Overview
//!
//! [`RecordingController`] sits between the session loop and a
//! [`CaptureDevice`].  It enforces the recording rules so callers never
//! have to think about them:
//!
//! * at most **one** live capture: [`start_capture`] while active is a
//!   logged no-op, not an error;
//! * captures shorter than [`MIN_RECORDING_MS`] are discarded without a
//!   payload (a stray tap on the mic button is not a recording);
//! * a [`RecorderEvent::TimeLimit`] is emitted at [`MAX_RECORDING_MS`] so
//!   the session can stop the capture exactly as if the user had;
//! * progress [`RecorderEvent::Tick`]s are emitted every [`TICK_MS`] while
//!   listening;
//! * every exit path (stop, abort, time limit) releases the device
//!   before returning.
//!
//! Samples queue on an in-process channel while the device runs and are
//! drained when the capture ends; the payload is assembled off the
//! accumulated samples via [`AudioPayload::assemble`].
//!
//! [`start_capture`]: RecordingController::start_capture

use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::audio::device::{CaptureDevice, CaptureError, CaptureStream};
use crate::audio::payload::{AudioCodec, AudioPayload, CaptureEvent, TARGET_SAMPLE_RATE};
use crate::config::RecordingConfig;

/// Captures shorter than this are discarded as accidental taps.
pub const MIN_RECORDING_MS: u64 = 200;

/// Hard ceiling on capture length; the controller emits
/// [`RecorderEvent::TimeLimit`] when it is reached.
pub const MAX_RECORDING_MS: u64 = 10_000;

/// Cadence of [`RecorderEvent::Tick`] while listening.
pub const TICK_MS: u64 = 100;

// ---------------------------------------------------------------------------
// RecorderEvent
// ---------------------------------------------------------------------------

/// Timing events emitted while a capture is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderEvent {
    /// Periodic progress signal with the elapsed capture time.
    Tick { elapsed_ms: u64 },
    /// The capture hit the maximum duration and should be stopped now.
    TimeLimit,
}

// ---------------------------------------------------------------------------
// RecordingController
// ---------------------------------------------------------------------------

/// Owns the capture lifecycle for a practice session.
///
/// Created with [`RecordingController::new`], which also returns the
/// receiving end of the [`RecorderEvent`] channel.  Methods must be called
/// from within a tokio runtime; the internal timer runs as a spawned task.
pub struct RecordingController {
    device: Arc<dyn CaptureDevice>,
    config: RecordingConfig,
    events_tx: tokio::sync::mpsc::Sender<RecorderEvent>,
    active: Option<ActiveCapture>,
}

/// Everything tied to one live capture; dropped as a unit on any exit path.
struct ActiveCapture {
    stream: Box<dyn CaptureStream>,
    capture_rx: mpsc::Receiver<CaptureEvent>,
    codec: AudioCodec,
    started_at: Instant,
    timer: tokio::task::JoinHandle<()>,
}

impl RecordingController {
    /// Create a controller and the channel its timing events arrive on.
    pub fn new(
        device: Arc<dyn CaptureDevice>,
        config: RecordingConfig,
    ) -> (Self, tokio::sync::mpsc::Receiver<RecorderEvent>) {
        let (events_tx, events_rx) = tokio::sync::mpsc::channel(32);
        let controller = Self {
            device,
            config,
            events_tx,
            active: None,
        };
        (controller, events_rx)
    }

    /// `true` while a capture is live.
    pub fn is_capturing(&self) -> bool {
        self.active.is_some()
    }

    /// Elapsed time of the live capture, or 0 when idle.
    pub fn elapsed_ms(&self) -> u64 {
        self.active
            .as_ref()
            .map(|a| a.started_at.elapsed().as_millis() as u64)
            .unwrap_or(0)
    }

    /// Start a capture.
    ///
    /// A second call while a capture is live is a logged no-op returning
    /// `Ok(())`; the running capture keeps its original start time.
    ///
    /// # Errors
    ///
    /// - [`CaptureError::CodecUnsupported`] when none of the configured
    ///   codec preferences is supported by the device layer.
    /// - Any error the device reports while opening the stream.  The
    ///   controller stays idle in that case.
    pub fn start_capture(&mut self) -> Result<(), CaptureError> {
        if self.active.is_some() {
            log::debug!("recorder: start while already capturing, ignoring");
            return Ok(());
        }

        let supported = self.device.supported_codecs();
        let codec = self
            .config
            .codec_preferences
            .iter()
            .copied()
            .find(|c| supported.contains(c))
            .ok_or(CaptureError::CodecUnsupported)?;

        let (capture_tx, capture_rx) = mpsc::channel();
        let stream = self.device.open(codec, capture_tx)?;
        let started_at = Instant::now();

        let timer = tokio::spawn(run_timer(
            self.events_tx.clone(),
            started_at,
            self.config.tick_ms,
            self.config.max_ms,
        ));

        log::info!("recorder: capture started ({})", codec.mime_type());
        self.active = Some(ActiveCapture {
            stream,
            capture_rx,
            codec,
            started_at,
            timer,
        });
        Ok(())
    }

    /// Stop the live capture and assemble its payload.
    ///
    /// Returns `None` when nothing is being captured, and also when the
    /// capture ran shorter than the configured minimum; that recording is
    /// discarded silently.  The device is released on every path.
    pub fn stop_capture(&mut self) -> Option<AudioPayload> {
        let Some(active) = self.active.take() else {
            log::debug!("recorder: stop with no active capture, ignoring");
            return None;
        };

        active.timer.abort();
        let elapsed_ms = active.started_at.elapsed().as_millis() as u64;
        // Halt the device first so the sample channel stops growing, then
        // drain whatever it delivered.
        drop(active.stream);

        let mut samples: Vec<f32> = Vec::new();
        let mut sample_rate = TARGET_SAMPLE_RATE;
        let mut channels: u16 = 1;
        let mut saw_chunk = false;
        while let Ok(event) = active.capture_rx.try_recv() {
            match event {
                CaptureEvent::Data(chunk) => {
                    if !saw_chunk {
                        sample_rate = chunk.sample_rate;
                        channels = chunk.channels;
                        saw_chunk = true;
                    }
                    samples.extend_from_slice(&chunk.samples);
                }
                CaptureEvent::Error(message) => {
                    log::warn!("recorder: device fault during capture: {message}");
                }
            }
        }

        if elapsed_ms < self.config.min_ms {
            log::info!(
                "recorder: capture of {elapsed_ms} ms is below the {} ms minimum, discarding",
                self.config.min_ms
            );
            return None;
        }

        log::info!("recorder: captured {} samples over {elapsed_ms} ms", samples.len());
        Some(AudioPayload::assemble(
            &samples,
            sample_rate,
            channels,
            active.codec,
            elapsed_ms,
        ))
    }

    /// Abandon the live capture, discarding its samples.  No-op when idle.
    pub fn abort_capture(&mut self) {
        if let Some(active) = self.active.take() {
            active.timer.abort();
            drop(active.stream);
            log::debug!("recorder: capture aborted");
        }
    }
}

/// Timer task for one capture: ticks until the deadline, then emits
/// [`RecorderEvent::TimeLimit`] exactly once and exits.
async fn run_timer(
    events: tokio::sync::mpsc::Sender<RecorderEvent>,
    started_at: Instant,
    tick_ms: u64,
    max_ms: u64,
) {
    let tick = Duration::from_millis(tick_ms);
    let mut ticker = tokio::time::interval_at(started_at + tick, tick);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let limit = tokio::time::sleep_until(started_at + Duration::from_millis(max_ms));
    tokio::pin!(limit);

    loop {
        tokio::select! {
            // The deadline wins when both fire in the same instant.
            biased;
            _ = &mut limit => {
                let _ = events.send(RecorderEvent::TimeLimit).await;
                return;
            }
            _ = ticker.tick() => {
                let elapsed_ms = started_at.elapsed().as_millis() as u64;
                if events.send(RecorderEvent::Tick { elapsed_ms }).await.is_err() {
                    return;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
