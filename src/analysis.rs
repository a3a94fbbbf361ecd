//! Spectral analysis: windowed FFT to smoothed frequency-band energies.
//!
//! Each frame is Hann-windowed, transformed, and reduced to three band
//! magnitudes (bass/mid/treble). Bands are normalized against a running peak
//! and exponentially smoothed with per-band time constants so the scene sees
//! stable values instead of per-frame jitter.

use std::f32::consts::PI;
use std::ops::Range;
use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::params::AnalysisConfig;

/// Normalized, smoothed frequency-band energies, each in [0, 1].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BandEnergies {
    /// Bass (default 20-250 Hz): drives trunk pulse and camera shake
    pub bass: f32,
    /// Mid (default 250-2000 Hz): drives branch growth and leaf unfurl
    pub mid: f32,
    /// Treble (default 2000-8000 Hz): drives flower bloom and sparkles
    pub treble: f32,
}

impl BandEnergies {
    pub fn new(bass: f32, mid: f32, treble: f32) -> Self {
        Self {
            bass: bass.clamp(0.0, 1.0),
            mid: mid.clamp(0.0, 1.0),
            treble: treble.clamp(0.0, 1.0),
        }
    }
}

/// Converts PCM frames into smoothed band energies.
pub struct SpectralAnalyzer {
    config: AnalysisConfig,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    fft_buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    /// Running normalization peaks: [bass, mid, treble]
    peaks: [f32; 3],
    smoothed: BandEnergies,
}

impl SpectralAnalyzer {
    pub fn new(config: AnalysisConfig) -> Self {
        let fft_size = config.fft_size;
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);
        let scratch_len = fft.get_inplace_scratch_len();

        let window: Vec<f32> = (0..fft_size).map(|i| hann_window(i, fft_size)).collect();

        Self {
            peaks: [config.min_peak; 3],
            config,
            fft,
            window,
            fft_buffer: vec![Complex::new(0.0, 0.0); fft_size],
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
            smoothed: BandEnergies::default(),
        }
    }

    /// Analyze one PCM frame. `dt` is the elapsed time since the previous
    /// call and only affects smoothing speed.
    ///
    /// Frames shorter than the FFT size are zero-padded; longer frames use
    /// their most recent `fft_size` samples. Non-finite samples are treated
    /// as silence, so output is always finite and in [0, 1].
    pub fn analyze(&mut self, frame: &[f32], dt: f32) -> BandEnergies {
        let fft_size = self.config.fft_size;
        let take = frame.len().min(fft_size);
        let tail = &frame[frame.len() - take..];
        let pad = fft_size - take;

        // Remove DC before windowing: unsigned capture formats downmix to a
        // large constant offset that would otherwise read as bass energy
        let mean = if take > 0 {
            tail.iter().filter(|s| s.is_finite()).sum::<f32>() / take as f32
        } else {
            0.0
        };
        let mean = if mean.is_finite() { mean } else { 0.0 };

        for slot in &mut self.fft_buffer[..pad] {
            *slot = Complex::new(0.0, 0.0);
        }
        for (i, &sample) in tail.iter().enumerate() {
            let s = if sample.is_finite() { sample - mean } else { 0.0 };
            self.fft_buffer[pad + i] = Complex::new(s * self.window[pad + i], 0.0);
        }

        self.fft
            .process_with_scratch(&mut self.fft_buffer, &mut self.scratch);

        let raw = [
            self.band_mean(self.config.bass_bins()),
            self.band_mean(self.config.mid_bins()),
            self.band_mean(self.config.treble_bins()),
        ];

        // Normalize against a slowly decaying running peak. The peak never
        // drops below min_peak, so silence maps to zero instead of dividing
        // by zero.
        let mut normalized = [0.0f32; 3];
        for i in 0..3 {
            self.peaks[i] = (self.peaks[i] * self.config.peak_decay)
                .max(raw[i])
                .max(self.config.min_peak);
            normalized[i] = raw[i] / self.peaks[i];
        }

        let dt = if dt.is_finite() && dt > 0.0 { dt } else { 0.0 };
        self.smoothed = BandEnergies::new(
            ema(self.smoothed.bass, normalized[0], dt, self.config.bass_tau_s),
            ema(self.smoothed.mid, normalized[1], dt, self.config.mid_tau_s),
            ema(
                self.smoothed.treble,
                normalized[2],
                dt,
                self.config.treble_tau_s,
            ),
        );
        self.smoothed
    }

    /// Mean spectral magnitude over a bin range.
    fn band_mean(&self, bins: Range<usize>) -> f32 {
        let len = bins.len().max(1) as f32;
        let sum: f32 = self.fft_buffer[bins].iter().map(|c| c.norm()).sum();
        if sum.is_finite() {
            sum / len
        } else {
            0.0
        }
    }
}

/// Exponential moving average with a dt-correct time constant.
fn ema(current: f32, target: f32, dt: f32, tau_s: f32) -> f32 {
    let alpha = 1.0 - (-dt / tau_s).exp();
    current + (target - current) * alpha
}

/// Hann window coefficient.
fn hann_window(index: usize, size: usize) -> f32 {
    0.5 * (1.0 - ((2.0 * PI * index as f32) / (size as f32 - 1.0)).cos())
}
