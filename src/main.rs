//! audioflora: a plant that grows to music.
//!
//! Bass pulses through the trunk and shakes the view, mids grow branches and
//! unfurl leaves, treble blooms flowers that shed sparkles. Without a capture
//! device the failsafe synthetic source keeps the plant alive.

mod cli;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use audioflora::analysis::SpectralAnalyzer;
use audioflora::audio::AudioSource;
use audioflora::driver::{FrameDriver, MeterSurface};
use audioflora::scene::SceneModel;

fn main() -> Result<(), audioflora::error::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let args = cli::Args::parse();

    let audio_config = args.audio_config();
    let simulated_config = args.simulated_config();
    audio_config.validate()?;
    simulated_config.validate()?;

    let source = AudioSource::open(&audio_config, &simulated_config);

    // The device may have imposed its own rate; the analyzer must agree
    let mut analysis_config = args.analysis_config();
    analysis_config.sample_rate_hz = source.sample_rate();
    analysis_config.validate()?;

    let tuning = args.scene_tuning();
    tuning.validate()?;
    let driver_config = args.driver_config();
    driver_config.validate()?;

    let analyzer = SpectralAnalyzer::new(analysis_config);
    let scene = SceneModel::new(tuning);
    let sample_rate_hz = source.sample_rate();

    let mut driver = FrameDriver::new(
        source,
        analyzer,
        scene,
        MeterSurface::default(),
        driver_config,
    );
    if let Some(recording) = args.recording_config() {
        driver = driver.with_recording(&recording, sample_rate_hz)?;
    }

    info!("audioflora running (press Ctrl-C to quit)");
    driver.run()
}
