//! Parameter definitions with physical units and documented semantics.
//!
//! Every tunable in the pipeline lives here with:
//! - Physical units (Hz, seconds, world units)
//! - Documented ranges and meanings
//! - Validation limited to positive/finite checks, since the values are
//!   aesthetic choices, not correctness requirements.

use std::ops::Range;

use crate::error::{Error, Result};

/// Audio capture configuration
#[derive(Debug, Clone)]
pub struct AudioConfig {
    /// Capture sample rate (Hz)
    pub sample_rate_hz: u32,

    /// Samples per frame handed to the analyzer (mono)
    pub frame_size: usize,

    /// Maximum time `read_frame` blocks waiting for capture data (ms).
    /// On timeout the previous frame is repeated; the visual loop never stalls.
    pub read_timeout_ms: u64,

    /// Bounded capacity of the capture-thread hand-off channel (chunks).
    /// The audio callback drops chunks rather than block when full.
    pub channel_capacity: usize,

    /// Skip the capture device entirely and use the simulated source
    pub force_simulated: bool,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 44_100,
            frame_size: 2048,
            read_timeout_ms: 250,
            channel_capacity: 8,
            force_simulated: false,
        }
    }
}

impl AudioConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate_hz == 0 {
            return Err(Error::invalid("sample_rate_hz", "must be > 0"));
        }
        if self.frame_size == 0 {
            return Err(Error::invalid("frame_size", "must be > 0"));
        }
        if self.read_timeout_ms == 0 {
            return Err(Error::invalid("read_timeout_ms", "must be > 0"));
        }
        if self.channel_capacity == 0 {
            return Err(Error::invalid("channel_capacity", "must be > 0"));
        }
        Ok(())
    }
}

/// One oscillator in the simulated-audio bank
#[derive(Debug, Clone)]
pub struct OscillatorParams {
    /// Center frequency (Hz)
    pub base_hz: f32,

    /// Peak frequency excursion around the center (Hz, ±)
    pub drift_depth_hz: f32,

    /// Center amplitude (linear, 0..1)
    pub base_amplitude: f32,

    /// Peak amplitude excursion around the center (linear, ±)
    pub amplitude_drift: f32,
}

impl OscillatorParams {
    pub fn new(base_hz: f32, drift_depth_hz: f32, base_amplitude: f32, amplitude_drift: f32) -> Self {
        Self {
            base_hz,
            drift_depth_hz,
            base_amplitude,
            amplitude_drift,
        }
    }
}

/// Simulated (failsafe) audio source configuration.
///
/// The defaults spread oscillators across all three analysis bands so the
/// scene visibly reacts even without a capture device.
#[derive(Debug, Clone)]
pub struct SimulatedAudioConfig {
    /// Oscillator bank; frequencies/amplitudes drift slowly and independently
    pub oscillators: Vec<OscillatorParams>,

    /// Broadband noise floor amplitude (linear)
    pub noise_amplitude: f32,

    /// How fast oscillator drift evolves (Hz of the drift LFO, not audio Hz)
    pub drift_rate_hz: f32,

    /// Noise/drift seed; same seed reproduces the exact sample stream
    pub seed: u32,
}

impl Default for SimulatedAudioConfig {
    fn default() -> Self {
        Self {
            oscillators: vec![
                // Bass: slow heavy pulse around 55-110 Hz
                OscillatorParams::new(55.0, 12.0, 0.45, 0.35),
                OscillatorParams::new(110.0, 25.0, 0.25, 0.20),
                // Mids: melodic wander
                OscillatorParams::new(440.0, 140.0, 0.22, 0.18),
                OscillatorParams::new(1200.0, 400.0, 0.15, 0.12),
                // Treble: shimmer that comes and goes
                OscillatorParams::new(3200.0, 900.0, 0.12, 0.11),
                OscillatorParams::new(6500.0, 1200.0, 0.08, 0.08),
            ],
            noise_amplitude: 0.015,
            drift_rate_hz: 0.07,
            seed: 42,
        }
    }
}

impl SimulatedAudioConfig {
    pub fn validate(&self) -> Result<()> {
        if self.oscillators.is_empty() {
            return Err(Error::invalid("oscillators", "need at least one"));
        }
        for osc in &self.oscillators {
            if !(osc.base_hz.is_finite() && osc.base_hz > 0.0) {
                return Err(Error::invalid("oscillators.base_hz", "must be finite and > 0"));
            }
            if !(osc.base_amplitude.is_finite() && osc.base_amplitude >= 0.0) {
                return Err(Error::invalid(
                    "oscillators.base_amplitude",
                    "must be finite and >= 0",
                ));
            }
        }
        if !(self.noise_amplitude.is_finite() && self.noise_amplitude >= 0.0) {
            return Err(Error::invalid("noise_amplitude", "must be finite and >= 0"));
        }
        if !(self.drift_rate_hz.is_finite() && self.drift_rate_hz > 0.0) {
            return Err(Error::invalid("drift_rate_hz", "must be finite and > 0"));
        }
        Ok(())
    }
}

/// Spectral analysis configuration with frequency band mappings
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Sample rate of incoming frames (Hz); must match the audio source
    pub sample_rate_hz: u32,

    /// FFT window size (must be power of 2)
    pub fft_size: usize,

    /// Bass frequency range (Hz)
    pub bass_range_hz: (f32, f32),

    /// Mid frequency range (Hz)
    pub mid_range_hz: (f32, f32),

    /// Treble frequency range (Hz)
    pub treble_range_hz: (f32, f32),

    /// Bass smoothing time constant (s): fastest, drives pulse and shake
    pub bass_tau_s: f32,

    /// Mid smoothing time constant (s): moderate, drives growth
    pub mid_tau_s: f32,

    /// Treble smoothing time constant (s): slowest, keeps bloom stable
    pub treble_tau_s: f32,

    /// Running-peak multiplicative decay per analysis call (0..1]
    pub peak_decay: f32,

    /// Minimum normalization denominator; silence never divides by zero
    pub min_peak: f32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 44_100,
            fft_size: 2048,
            bass_range_hz: (20.0, 250.0),
            mid_range_hz: (250.0, 2000.0),
            treble_range_hz: (2000.0, 8000.0),
            bass_tau_s: 0.05,
            mid_tau_s: 0.12,
            treble_tau_s: 0.25,
            peak_decay: 0.999,
            min_peak: 1e-4,
        }
    }
}

impl AnalysisConfig {
    /// Convert frequency (Hz) to FFT bin index
    pub fn hz_to_bin(&self, hz: f32) -> usize {
        ((hz * self.fft_size as f32) / self.sample_rate_hz as f32) as usize
    }

    fn band_bins(&self, range_hz: (f32, f32)) -> Range<usize> {
        let half = (self.fft_size / 2).max(1);
        let start = self.hz_to_bin(range_hz.0).min(half - 1);
        let end = self.hz_to_bin(range_hz.1).clamp(start + 1, half);
        start..end
    }

    /// FFT bin range for the bass band
    pub fn bass_bins(&self) -> Range<usize> {
        self.band_bins(self.bass_range_hz)
    }

    /// FFT bin range for the mid band
    pub fn mid_bins(&self) -> Range<usize> {
        self.band_bins(self.mid_range_hz)
    }

    /// FFT bin range for the treble band
    pub fn treble_bins(&self) -> Range<usize> {
        self.band_bins(self.treble_range_hz)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.fft_size.is_power_of_two() {
            return Err(Error::invalid(
                "fft_size",
                format!("must be power of 2, got {}", self.fft_size),
            ));
        }
        if self.sample_rate_hz == 0 {
            return Err(Error::invalid("sample_rate_hz", "must be > 0"));
        }
        for (name, (lo, hi)) in [
            ("bass_range_hz", self.bass_range_hz),
            ("mid_range_hz", self.mid_range_hz),
            ("treble_range_hz", self.treble_range_hz),
        ] {
            if !(lo.is_finite() && hi.is_finite() && lo >= 0.0 && lo < hi) {
                return Err(Error::invalid(name, format!("invalid range {lo}..{hi}")));
            }
        }
        for (name, tau) in [
            ("bass_tau_s", self.bass_tau_s),
            ("mid_tau_s", self.mid_tau_s),
            ("treble_tau_s", self.treble_tau_s),
        ] {
            if !(tau.is_finite() && tau > 0.0) {
                return Err(Error::invalid(name, "must be finite and > 0"));
            }
        }
        if !(self.peak_decay.is_finite() && self.peak_decay > 0.0 && self.peak_decay <= 1.0) {
            return Err(Error::invalid("peak_decay", "must be in (0, 1]"));
        }
        if !(self.min_peak.is_finite() && self.min_peak > 0.0) {
            return Err(Error::invalid("min_peak", "must be finite and > 0"));
        }
        Ok(())
    }
}

/// Scene model tuning: growth, bloom, particle, and camera dynamics
#[derive(Debug, Clone)]
pub struct SceneTuning {
    // Trunk
    /// Trunk pulse attack time constant (s): fast, percussive rise
    pub pulse_attack_tau_s: f32,

    /// Trunk pulse release time constant (s): slower fall
    pub pulse_release_tau_s: f32,

    /// Trunk sway oscillation rate (Hz)
    pub sway_rate_hz: f32,

    /// Trunk height in world units (root at origin, growing up +Y)
    pub trunk_height: f32,

    /// Trunk base thickness in world units
    pub trunk_thickness: f32,

    // Branches
    /// Mid energy below this contributes no growth
    pub growth_threshold: f32,

    /// Growth per second at full mid energy (units of growth, 0..1 scale)
    pub growth_rate_per_s: f32,

    /// Growth lost per second while mid energy is below threshold
    pub growth_decay_per_s: f32,

    /// Hard cap on total branches in the arena
    pub max_branches: usize,

    /// Maximum children a fully grown branch spawns
    pub max_children_per_branch: usize,

    /// Maximum branch depth (trunk children are depth 1)
    pub max_branch_depth: usize,

    /// Half-angle of the child spread around the parent direction (degrees)
    pub branch_angle_spread_deg: f32,

    /// Child length as a fraction of the parent length (min, max)
    pub branch_length_ratio: (f32, f32),

    // Leaves
    /// Leaf unfurl smoothing time constant (s); unfurl lags branch growth
    pub leaf_lag_tau_s: f32,

    /// Branch growth required before its leaves begin to unfurl
    pub leaf_gate_growth: f32,

    // Flowers
    /// Treble energy that counts as "elevated" for bloom/sparkle logic
    pub bloom_threshold: f32,

    /// Rate limiter: at most this many new flowers per second
    pub flower_spawn_rate_per_s: f32,

    /// Hard cap on live flowers
    pub max_flowers: usize,

    /// Time spent Budding before Blooming (s)
    pub bud_duration_s: f32,

    /// Continuous elevated-treble time required for Blooming -> Sparkling (s)
    pub sparkle_window_s: f32,

    /// Continuous low-treble time before any live flower starts Fading (s)
    pub fade_delay_s: f32,

    /// Time a Fading flower takes to disappear (s)
    pub fade_duration_s: f32,

    // Sparkles
    /// Particles emitted when a flower enters Sparkling (min, max)
    pub sparkle_burst: (usize, usize),

    /// Sustained emission rate per Sparkling flower (particles/s)
    pub sparkle_rate_per_s: f32,

    /// Sparkle lifetime range (s)
    pub sparkle_life_s: (f32, f32),

    /// Initial sparkle speed range (world units/s)
    pub sparkle_speed: (f32, f32),

    /// Velocity damping rate (1/s); higher stops sparkles sooner
    pub sparkle_drag_per_s: f32,

    /// Hard cap on live sparkles
    pub max_sparkles: usize,

    // Camera
    /// Shake magnitude per unit bass energy (world units)
    pub shake_scale: f32,

    /// Bass energy delta that re-randomizes the shake direction
    pub shake_impulse_threshold: f32,

    /// Shake decay time constant (s)
    pub shake_decay_tau_s: f32,

    /// Scene RNG seed; same seed reproduces branch geometry and shake paths
    pub seed: u64,
}

impl Default for SceneTuning {
    fn default() -> Self {
        Self {
            pulse_attack_tau_s: 0.04,
            pulse_release_tau_s: 0.35,
            sway_rate_hz: 0.2,
            trunk_height: 300.0,
            trunk_thickness: 25.0,

            growth_threshold: 0.25,
            growth_rate_per_s: 0.5,
            growth_decay_per_s: 0.05,
            max_branches: 64,
            max_children_per_branch: 3,
            max_branch_depth: 6,
            branch_angle_spread_deg: 35.0,
            branch_length_ratio: (0.6, 0.9),

            leaf_lag_tau_s: 0.2,
            leaf_gate_growth: 0.4,

            bloom_threshold: 0.55,
            flower_spawn_rate_per_s: 2.0,
            max_flowers: 24,
            bud_duration_s: 0.6,
            sparkle_window_s: 0.8,
            fade_delay_s: 1.2,
            fade_duration_s: 1.5,

            sparkle_burst: (4, 8),
            sparkle_rate_per_s: 6.0,
            sparkle_life_s: (0.6, 1.2),
            sparkle_speed: (20.0, 60.0),
            sparkle_drag_per_s: 4.0,
            max_sparkles: 256,

            shake_scale: 8.0,
            shake_impulse_threshold: 0.15,
            shake_decay_tau_s: 0.18,
            seed: 0x5EED_F10A,
        }
    }
}

impl SceneTuning {
    pub fn validate(&self) -> Result<()> {
        for (name, v) in [
            ("pulse_attack_tau_s", self.pulse_attack_tau_s),
            ("pulse_release_tau_s", self.pulse_release_tau_s),
            ("trunk_height", self.trunk_height),
            ("trunk_thickness", self.trunk_thickness),
            ("growth_rate_per_s", self.growth_rate_per_s),
            ("leaf_lag_tau_s", self.leaf_lag_tau_s),
            ("flower_spawn_rate_per_s", self.flower_spawn_rate_per_s),
            ("bud_duration_s", self.bud_duration_s),
            ("sparkle_window_s", self.sparkle_window_s),
            ("fade_delay_s", self.fade_delay_s),
            ("fade_duration_s", self.fade_duration_s),
            ("sparkle_rate_per_s", self.sparkle_rate_per_s),
            ("sparkle_drag_per_s", self.sparkle_drag_per_s),
            ("shake_scale", self.shake_scale),
            ("shake_decay_tau_s", self.shake_decay_tau_s),
        ] {
            if !(v.is_finite() && v > 0.0) {
                return Err(Error::invalid(name, "must be finite and > 0"));
            }
        }
        for (name, v) in [
            ("growth_threshold", self.growth_threshold),
            ("growth_decay_per_s", self.growth_decay_per_s),
            ("leaf_gate_growth", self.leaf_gate_growth),
            ("bloom_threshold", self.bloom_threshold),
            ("shake_impulse_threshold", self.shake_impulse_threshold),
        ] {
            if !(v.is_finite() && v >= 0.0) {
                return Err(Error::invalid(name, "must be finite and >= 0"));
            }
        }
        if self.max_branches == 0 {
            return Err(Error::invalid("max_branches", "must be > 0"));
        }
        if self.sparkle_burst.0 > self.sparkle_burst.1 {
            return Err(Error::invalid("sparkle_burst", "min exceeds max"));
        }
        for (name, (lo, hi)) in [
            ("branch_length_ratio", self.branch_length_ratio),
            ("sparkle_life_s", self.sparkle_life_s),
            ("sparkle_speed", self.sparkle_speed),
        ] {
            if !(lo.is_finite() && hi.is_finite() && lo > 0.0 && lo <= hi) {
                return Err(Error::invalid(name, format!("invalid range {lo}..{hi}")));
            }
        }
        Ok(())
    }
}

/// Frame loop configuration
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Target visual frame rate (frames per second)
    pub target_fps: u32,

    /// Maximum dt fed to the scene per frame (s); long stalls are clamped
    /// rather than teleporting the simulation
    pub max_dt_s: f32,

    /// Optional run length (s); `None` runs until the stop flag is set
    pub duration_s: Option<f32>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            target_fps: 60,
            max_dt_s: 0.1,
            duration_s: None,
        }
    }
}

impl DriverConfig {
    /// Target frame interval
    pub fn target_dt(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(1.0 / self.target_fps.max(1) as f64)
    }

    pub fn validate(&self) -> Result<()> {
        if self.target_fps == 0 {
            return Err(Error::invalid("target_fps", "must be > 0"));
        }
        if !(self.max_dt_s.is_finite() && self.max_dt_s > 0.0) {
            return Err(Error::invalid("max_dt_s", "must be finite and > 0"));
        }
        if let Some(d) = self.duration_s {
            if !(d.is_finite() && d > 0.0) {
                return Err(Error::invalid("duration_s", "must be finite and > 0"));
            }
        }
        Ok(())
    }
}

/// Audio recording tee configuration
#[derive(Debug, Clone)]
pub struct RecordingConfig {
    /// Output WAV path (32-bit float mono at the capture sample rate)
    pub audio_path: String,
}

impl RecordingConfig {
    pub fn new(audio_path: impl Into<String>) -> Self {
        Self {
            audio_path: audio_path.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        AudioConfig::default().validate().unwrap();
        SimulatedAudioConfig::default().validate().unwrap();
        AnalysisConfig::default().validate().unwrap();
        SceneTuning::default().validate().unwrap();
        DriverConfig::default().validate().unwrap();
    }

    #[test]
    fn test_hz_to_bin() {
        let config = AnalysisConfig::default();

        // At 44100 Hz sample rate and 2048 FFT size:
        // Bin resolution = 44100 / 2048 ≈ 21.5 Hz per bin
        assert_eq!(config.hz_to_bin(0.0), 0);
        assert_eq!(config.hz_to_bin(21.6), 1);
        assert_eq!(config.hz_to_bin(250.0), 11);
    }

    #[test]
    fn test_band_bins_ordered_and_bounded() {
        let config = AnalysisConfig::default();

        let bass = config.bass_bins();
        let mid = config.mid_bins();
        let treble = config.treble_bins();

        assert!(!bass.is_empty());
        assert!(mid.start >= bass.end);
        assert!(treble.start >= mid.end);
        assert!(treble.end <= config.fft_size / 2);
    }

    #[test]
    fn test_band_bins_never_empty_at_tiny_fft() {
        // Degenerate but legal: every band still yields at least one bin
        let config = AnalysisConfig {
            fft_size: 64,
            ..Default::default()
        };
        assert!(!config.bass_bins().is_empty());
        assert!(!config.mid_bins().is_empty());
        assert!(!config.treble_bins().is_empty());
    }

    #[test]
    fn test_fft_size_must_be_power_of_two() {
        let config = AnalysisConfig {
            fft_size: 1000,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_scene_rejects_nonfinite() {
        let tuning = SceneTuning {
            fade_duration_s: f32::NAN,
            ..Default::default()
        };
        assert!(tuning.validate().is_err());
    }
}
