//! Audio capture.
//! Device callback (cpal thread) → ring buffer → blocking frame reads on the loop thread.
//! Frames are mono i16 of exactly the wake engine's frame length.

pub mod ring_buffer;
pub mod wake;

use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel as cb;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info, warn};

use crate::config::{AudioConfig, WakeConfig};
use crate::error::AudioError;
use ring_buffer::RingBuffer;

/// One fixed-length block of mono PCM samples.
pub type Frame = Vec<i16>;

/// Frame source capability consumed by the controller.
pub trait AudioStream {
    /// Acquire the device and begin capturing.
    fn start(&mut self) -> Result<(), AudioError>;

    /// Block for the next frame. `Ok(None)` means no data this tick.
    fn read(&mut self) -> Result<Option<Frame>, AudioError>;

    /// Release the device. Idempotent.
    fn stop(&mut self);
}

/// Scoped acquisition: `start()` on creation, `stop()` on drop, on every exit path.
pub struct StreamGuard<'a, S: AudioStream + ?Sized> {
    stream: &'a mut S,
}

impl<'a, S: AudioStream + ?Sized> StreamGuard<'a, S> {
    pub fn start(stream: &'a mut S) -> Result<Self, AudioError> {
        stream.start()?;
        Ok(Self { stream })
    }
}

impl<S: AudioStream + ?Sized> Deref for StreamGuard<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.stream
    }
}

impl<S: AudioStream + ?Sized> DerefMut for StreamGuard<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        self.stream
    }
}

impl<S: AudioStream + ?Sized> Drop for StreamGuard<'_, S> {
    fn drop(&mut self) {
        self.stream.stop();
    }
}

/// Shared audio state between capture callback and reader.
struct SharedAudioState {
    ring_buffer: Mutex<RingBuffer>,
    frame_ready: Condvar,
    /// Set once the device disappears; sticky until the next `start()`.
    closed: Mutex<Option<String>>,
}

/// Default input device captured through cpal.
pub struct MicrophoneStream {
    sample_rate: u32,
    frame_length: usize,
    read_timeout: Duration,
    shared: Arc<SharedAudioState>,
    stream: Option<cpal::Stream>,
    errors_tx: cb::Sender<AudioError>,
    errors_rx: cb::Receiver<AudioError>,
    reported_overrun: u64,
}

impl MicrophoneStream {
    pub fn new(wake: &WakeConfig, audio: &AudioConfig) -> Self {
        let ring = RingBuffer::new(wake.sample_rate, audio.ring_buffer_secs);
        let (errors_tx, errors_rx) = cb::bounded(16);
        Self {
            sample_rate: wake.sample_rate,
            frame_length: wake.frame_length,
            read_timeout: Duration::from_millis(audio.read_timeout_ms),
            shared: Arc::new(SharedAudioState {
                ring_buffer: Mutex::new(ring),
                frame_ready: Condvar::new(),
                closed: Mutex::new(None),
            }),
            stream: None,
            errors_tx,
            errors_rx,
            reported_overrun: 0,
        }
    }

    fn build_stream(&self) -> Result<cpal::Stream, AudioError> {
        use cpal::traits::{DeviceTrait, HostTrait};

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(AudioError::NoInputDevice)?;
        let default_config = device
            .default_input_config()
            .map_err(|e| AudioError::UnsupportedConfig(e.to_string()))?;

        let channels = default_config.channels().max(1);
        let stream_config = cpal::StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(self.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };
        info!(
            device = %device.name().unwrap_or_else(|_| "unknown".into()),
            sample_rate = self.sample_rate,
            channels,
            format = ?default_config.sample_format(),
            "opening input device"
        );

        let errors = self.errors_tx.clone();
        let error_state = Arc::clone(&self.shared);
        let on_error = move |err: cpal::StreamError| {
            error!(error = %err, "audio capture error");
            let mapped = match err {
                cpal::StreamError::DeviceNotAvailable => AudioError::Closed(err.to_string()),
                other => AudioError::Device(other.to_string()),
            };
            forward_stream_error(&error_state, &errors, mapped);
        };

        let shared = Arc::clone(&self.shared);
        let channels = channels as usize;
        let stream = match default_config.sample_format() {
            cpal::SampleFormat::I16 => {
                let mut mono: Vec<i16> = Vec::with_capacity(4096);
                device.build_input_stream(
                    &stream_config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        downmix_into(&mut mono, data, channels, |s| s as f32);
                        push_samples(&shared, &mono);
                    },
                    on_error,
                    None,
                )
            }
            cpal::SampleFormat::F32 => {
                let mut mono: Vec<i16> = Vec::with_capacity(4096);
                device.build_input_stream(
                    &stream_config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        downmix_into(&mut mono, data, channels, |s| s * i16::MAX as f32);
                        push_samples(&shared, &mono);
                    },
                    on_error,
                    None,
                )
            }
            other => {
                return Err(AudioError::UnsupportedConfig(format!(
                    "sample format {other:?}"
                )))
            }
        }
        .map_err(|e| AudioError::StreamBuild(e.to_string()))?;

        Ok(stream)
    }

    /// Closure first, then the oldest queued recoverable error.
    fn pending_error(&self) -> Option<AudioError> {
        if let Some(reason) = self.shared.closed.lock().clone() {
            return Some(AudioError::Closed(reason));
        }
        self.errors_rx.try_recv().ok()
    }
}

impl AudioStream for MicrophoneStream {
    fn start(&mut self) -> Result<(), AudioError> {
        use cpal::traits::StreamTrait;

        if self.stream.is_some() {
            return Ok(());
        }
        self.shared.ring_buffer.lock().reset_read();
        *self.shared.closed.lock() = None;
        while self.errors_rx.try_recv().is_ok() {}

        let stream = self.build_stream()?;
        stream
            .play()
            .map_err(|e| AudioError::StreamStart(e.to_string()))?;
        self.stream = Some(stream);
        info!("audio capture stream started");
        Ok(())
    }

    fn read(&mut self) -> Result<Option<Frame>, AudioError> {
        if self.stream.is_none() {
            return Err(AudioError::NotStarted);
        }
        if let Some(err) = self.pending_error() {
            return Err(err);
        }

        let deadline = Instant::now() + self.read_timeout;
        let mut frame = vec![0i16; self.frame_length];
        let mut ring = self.shared.ring_buffer.lock();
        while !ring.read_exact(&mut frame) {
            if self
                .shared
                .frame_ready
                .wait_until(&mut ring, deadline)
                .timed_out()
            {
                return Ok(None);
            }
            if let Some(reason) = self.shared.closed.lock().clone() {
                return Err(AudioError::Closed(reason));
            }
        }

        let overrun = ring.overrun();
        drop(ring);
        if overrun > self.reported_overrun {
            warn!(
                dropped_samples = overrun - self.reported_overrun,
                "reader fell behind capture; oldest samples dropped"
            );
            self.reported_overrun = overrun;
        }
        Ok(Some(frame))
    }

    fn stop(&mut self) {
        use cpal::traits::StreamTrait;

        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                debug!(error = %e, "pause before close failed");
            }
            drop(stream);
            info!("audio stream closed");
        }
    }
}

impl Drop for MicrophoneStream {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Interleaved device samples → mono i16, averaging channels.
fn downmix_into<T: Copy>(out: &mut Vec<i16>, data: &[T], channels: usize, to_f32: impl Fn(T) -> f32) {
    out.clear();
    for chunk in data.chunks(channels) {
        let sum: f32 = chunk.iter().map(|&s| to_f32(s)).sum();
        let mean = sum / chunk.len() as f32;
        out.push(mean.clamp(i16::MIN as f32, i16::MAX as f32) as i16);
    }
}

/// Error callback body. Closure is recorded in the sticky flag and wakes the
/// reader; other errors go through the bounded queue and may be dropped.
fn forward_stream_error(shared: &SharedAudioState, errors: &cb::Sender<AudioError>, err: AudioError) {
    match err {
        AudioError::Closed(reason) => {
            let mut closed = shared.closed.lock();
            if closed.is_none() {
                *closed = Some(reason);
            }
            drop(closed);
            shared.frame_ready.notify_one();
        }
        other => {
            if errors.try_send(other).is_err() {
                debug!("audio error queue full, error dropped");
            }
        }
    }
}

/// Audio callback body: append to the ring and wake the reader.
fn push_samples(shared: &SharedAudioState, samples: &[i16]) {
    shared.ring_buffer.lock().write(samples);
    shared.frame_ready.notify_one();
}
