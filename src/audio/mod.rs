//! Audio acquisition: live capture with a deterministic simulated fallback.
//!
//! Exactly two source variants exist, selected once at startup. Both produce
//! mono frames of the same shape and sample rate, so the analyzer never knows
//! which one is live. After `open`, reading can no longer fail: capture
//! underruns repeat the previous frame and the simulated source always has
//! data.

pub mod capture;
pub mod simulated;

pub use capture::CaptureSource;
pub use simulated::SimulatedSource;

use tracing::{info, warn};

use crate::params::{AudioConfig, SimulatedAudioConfig};

/// A mono PCM frame source with fixed frame size and sample rate.
pub enum AudioSource {
    Capture(CaptureSource),
    Simulated(SimulatedSource),
}

impl AudioSource {
    /// Open the default capture device, falling back to the simulated source
    /// on any failure (missing device, permissions, unsupported format).
    /// The fallback decision is made exactly once and logged exactly once.
    pub fn open(audio: &AudioConfig, simulated: &SimulatedAudioConfig) -> Self {
        if audio.force_simulated {
            info!("simulated audio source forced by config");
            return AudioSource::Simulated(SimulatedSource::new(audio, simulated));
        }

        match CaptureSource::open(audio) {
            Ok(source) => {
                info!(
                    device = %source.device_label(),
                    sample_rate_hz = source.sample_rate(),
                    "capture device opened"
                );
                AudioSource::Capture(source)
            }
            Err(err) => {
                warn!("{err}; falling back to simulated audio");
                AudioSource::Simulated(SimulatedSource::new(audio, simulated))
            }
        }
    }

    /// Read the next mono frame, blocking up to the configured timeout.
    pub fn read_frame(&mut self) -> &[f32] {
        match self {
            AudioSource::Capture(s) => s.read_frame(),
            AudioSource::Simulated(s) => s.read_frame(),
        }
    }

    /// Actual sample rate of produced frames (Hz). May differ from the
    /// requested rate when the capture device imposed its own.
    pub fn sample_rate(&self) -> u32 {
        match self {
            AudioSource::Capture(s) => s.sample_rate(),
            AudioSource::Simulated(s) => s.sample_rate(),
        }
    }

    pub fn is_simulated(&self) -> bool {
        matches!(self, AudioSource::Simulated(_))
    }
}
