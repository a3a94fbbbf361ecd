//! cpal input capture with mono downmix and a bounded hand-off channel.
//!
//! The cpal callback thread is the only producer; it averages each frame's
//! channels to mono and pushes chunks into a bounded channel with `try_send`,
//! so the audio thread never blocks on a slow consumer. `read_frame` is the
//! single synchronization point on the visual-loop side.

use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, SizedSample, StreamConfig};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use rustfft::num_traits::ToPrimitive;
use tracing::debug;

use crate::error::{Error, Result};
use crate::params::AudioConfig;

/// Live capture source backed by the default input device.
pub struct CaptureSource {
    /// Keeps the stream alive; dropping it stops capture
    _stream: cpal::Stream,
    rx: Receiver<Vec<f32>>,
    /// Samples received but not yet assembled into a frame
    pending: Vec<f32>,
    /// Last completed frame; returned again on underrun
    frame: Vec<f32>,
    read_timeout: Duration,
    label: String,
    sample_rate: u32,
    underruns: u64,
}

impl CaptureSource {
    /// Open the default input device. Any failure here is the caller's cue
    /// to fall back to the simulated source.
    pub fn open(config: &AudioConfig) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| Error::DeviceUnavailable("no default input device".into()))?;
        let label = device.name().unwrap_or_else(|_| "unknown".into());

        let default_config = device
            .default_input_config()
            .map_err(|e| Error::DeviceUnavailable(format!("no input config: {e}")))?;
        let sample_format = default_config.sample_format();

        let mut stream_config: StreamConfig = default_config.into();
        stream_config.sample_rate = cpal::SampleRate(config.sample_rate_hz);

        let (tx, rx) = bounded(config.channel_capacity);

        let stream = match sample_format {
            SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, tx),
            SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, tx),
            SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, tx),
            other => {
                return Err(Error::DeviceUnavailable(format!(
                    "unsupported sample format {other:?}"
                )))
            }
        }?;

        stream
            .play()
            .map_err(|e| Error::DeviceUnavailable(format!("failed to start stream: {e}")))?;

        Ok(Self {
            _stream: stream,
            rx,
            pending: Vec::with_capacity(config.frame_size * 2),
            frame: vec![0.0; config.frame_size],
            read_timeout: Duration::from_millis(config.read_timeout_ms),
            label,
            sample_rate: stream_config.sample_rate.0,
            underruns: 0,
        })
    }

    /// Assemble the next frame, blocking up to the read timeout. On timeout
    /// or a dead stream the previous frame is returned unchanged.
    pub fn read_frame(&mut self) -> &[f32] {
        let frame_size = self.frame.len();
        let deadline = Instant::now() + self.read_timeout;

        while self.pending.len() < frame_size {
            let remaining = match deadline.checked_duration_since(Instant::now()) {
                Some(d) if !d.is_zero() => d,
                _ => break,
            };
            match self.rx.recv_timeout(remaining) {
                Ok(chunk) => self.pending.extend_from_slice(&chunk),
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        if self.pending.len() >= frame_size {
            self.frame.copy_from_slice(&self.pending[..frame_size]);
            self.pending.drain(..frame_size);
            // Latency guard: if we fell behind, keep only the newest samples
            if self.pending.len() > frame_size * 4 {
                let excess = self.pending.len() - frame_size * 2;
                self.pending.drain(..excess);
            }
        } else {
            self.underruns += 1;
            if self.underruns == 1 || self.underruns % 64 == 0 {
                let err = Error::CaptureUnderrun {
                    waited_ms: self.read_timeout.as_millis() as u64,
                };
                debug!(underruns = self.underruns, "{err}; repeating previous frame");
            }
        }

        &self.frame
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn device_label(&self) -> &str {
        &self.label
    }

    /// Total underruns observed since open (diagnostics only).
    pub fn underrun_count(&self) -> u64 {
        self.underruns
    }
}

/// Build an input stream for one concrete sample type, downmixing every
/// captured frame to mono by channel averaging.
fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    tx: Sender<Vec<f32>>,
) -> Result<cpal::Stream>
where
    T: SizedSample + ToPrimitive,
{
    let channels = config.channels.max(1) as usize;
    let err_fn = |e| debug!("capture stream error: {e}");

    let stream = device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let mut chunk = Vec::with_capacity(data.len() / channels);
                for frame in data.chunks_exact(channels) {
                    let mut acc = 0.0f32;
                    for s in frame {
                        acc += s.to_f32().unwrap_or(0.0);
                    }
                    chunk.push(acc / channels as f32);
                }
                // Bounded channel: drop the chunk rather than block the
                // audio thread when the consumer is behind
                let _ = tx.try_send(chunk);
            },
            err_fn,
            None,
        )
        .map_err(|e| Error::DeviceUnavailable(format!("failed to build input stream: {e}")))?;

    Ok(stream)
}
