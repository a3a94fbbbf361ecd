//! Command-line argument parsing.

use clap::Parser;

use audioflora::params::{
    AnalysisConfig, AudioConfig, DriverConfig, RecordingConfig, SceneTuning, SimulatedAudioConfig,
};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "audioflora")]
#[command(about = "Audio-reactive plant visualizer", long_about = None)]
pub struct Args {
    /// Use the simulated audio source even if a capture device exists
    #[arg(long)]
    pub simulated: bool,

    /// Capture sample rate (Hz)
    #[arg(long, value_name = "HZ", default_value = "44100")]
    pub sample_rate: u32,

    /// Samples per analysis frame
    #[arg(long, value_name = "SAMPLES", default_value = "2048")]
    pub frame_size: usize,

    /// FFT window size (must be a power of 2)
    #[arg(long, value_name = "SAMPLES", default_value = "2048")]
    pub fft_size: usize,

    /// Target visual frame rate
    #[arg(long, value_name = "FPS", default_value = "60")]
    pub fps: u32,

    /// Stop after this many seconds (runs until killed otherwise)
    #[arg(long, value_name = "SECONDS")]
    pub duration: Option<f32>,

    /// Scene RNG seed, for reproducible runs
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,

    /// Record the audio the analyzer sees to a WAV file
    #[arg(long, value_name = "PATH")]
    pub record_audio: Option<String>,
}

impl Args {
    pub fn audio_config(&self) -> AudioConfig {
        AudioConfig {
            sample_rate_hz: self.sample_rate,
            frame_size: self.frame_size,
            force_simulated: self.simulated,
            ..Default::default()
        }
    }

    pub fn simulated_config(&self) -> SimulatedAudioConfig {
        let mut config = SimulatedAudioConfig::default();
        if let Some(seed) = self.seed {
            config.seed = seed as u32;
        }
        config
    }

    pub fn analysis_config(&self) -> AnalysisConfig {
        AnalysisConfig {
            sample_rate_hz: self.sample_rate,
            fft_size: self.fft_size,
            ..Default::default()
        }
    }

    pub fn scene_tuning(&self) -> SceneTuning {
        let mut tuning = SceneTuning::default();
        if let Some(seed) = self.seed {
            tuning.seed = seed;
        }
        tuning
    }

    pub fn driver_config(&self) -> DriverConfig {
        DriverConfig {
            target_fps: self.fps,
            duration_s: self.duration,
            ..Default::default()
        }
    }

    pub fn recording_config(&self) -> Option<RecordingConfig> {
        self.record_audio.as_deref().map(RecordingConfig::new)
    }
}
