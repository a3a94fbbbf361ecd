//! Crate-level error taxonomy.
//!
//! Anything that originates in audio acquisition is recovered locally and
//! never interrupts the visual loop; only configuration problems at startup
//! and drawing-surface failures are fatal.

/// Errors produced by the audioflora pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No capture device could be opened. Non-fatal: the caller falls back
    /// to the simulated source and logs this once.
    #[error("capture device unavailable: {0}")]
    DeviceUnavailable(String),

    /// The capture stream produced no samples within the read timeout.
    /// Recovered internally by repeating the previous frame.
    #[error("capture underrun after {waited_ms}ms")]
    CaptureUnderrun { waited_ms: u64 },

    /// A configuration value failed validation. Fatal at startup.
    #[error("invalid config `{name}`: {reason}")]
    InvalidConfig {
        name: &'static str,
        reason: String,
    },

    /// The WAV recording tee could not be created or written.
    #[error("recording failed: {0}")]
    Recording(#[from] hound::Error),

    /// The drawing surface rejected a snapshot. Fatal: terminates the loop.
    #[error("render surface failure: {0}")]
    RenderSurface(String),
}

impl Error {
    /// Helper for validation failures.
    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Error::InvalidConfig {
            name,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
