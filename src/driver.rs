//! Per-frame loop: read one audio frame, analyze it, advance the scene,
//! present a snapshot.
//!
//! The driver owns frame pacing (the visual rate is independent of the audio
//! sample rate) and the shutdown signal, checked once per iteration. It never
//! touches scene fields directly; `SceneModel::update` is the only mutation
//! path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::info;

use crate::analysis::SpectralAnalyzer;
use crate::audio::AudioSource;
use crate::error::Result;
use crate::params::{DriverConfig, RecordingConfig};
use crate::scene::{SceneModel, SceneSnapshot};

type WavRecorder = hound::WavWriter<std::io::BufWriter<std::fs::File>>;

/// Drawing surface collaborator: rasterizes translucent layered shapes from
/// snapshot parameters. A surface failure is fatal to the loop.
pub trait RenderSurface {
    fn present(&mut self, snapshot: &SceneSnapshot) -> Result<()>;
}

/// The fixed-cadence frame loop.
pub struct FrameDriver<S: RenderSurface> {
    audio: AudioSource,
    analyzer: SpectralAnalyzer,
    scene: SceneModel,
    surface: S,
    config: DriverConfig,
    stop: Arc<AtomicBool>,
    recorder: Option<WavRecorder>,
    frames: u64,
}

impl<S: RenderSurface> FrameDriver<S> {
    pub fn new(
        audio: AudioSource,
        analyzer: SpectralAnalyzer,
        scene: SceneModel,
        surface: S,
        config: DriverConfig,
    ) -> Self {
        Self {
            audio,
            analyzer,
            scene,
            surface,
            config,
            stop: Arc::new(AtomicBool::new(false)),
            recorder: None,
            frames: 0,
        }
    }

    /// Tee every frame the analyzer sees into a mono float WAV file.
    pub fn with_recording(mut self, config: &RecordingConfig, sample_rate_hz: u32) -> Result<Self> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: sample_rate_hz,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        self.recorder = Some(hound::WavWriter::create(&config.audio_path, spec)?);
        info!(path = %config.audio_path, "recording analyzer input");
        Ok(self)
    }

    /// Shared stop flag; set it from anywhere to end `run` at the next
    /// iteration boundary.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// One tick without pacing: read → analyze → update → present.
    /// Exposed so tests can drive the pipeline deterministically.
    pub fn step(&mut self, dt: f32) -> Result<()> {
        let frame = self.audio.read_frame();
        if let Some(recorder) = &mut self.recorder {
            for &sample in frame {
                // A failed tee write is not worth killing the visuals over
                let _ = recorder.write_sample(sample);
            }
        }
        let energies = self.analyzer.analyze(frame, dt);
        self.scene.update(&energies, dt);
        self.surface.present(&self.scene.snapshot())?;
        self.frames += 1;
        Ok(())
    }

    /// Run until the stop flag is set, the optional duration elapses, or the
    /// surface fails. Audio-side trouble never ends the loop.
    pub fn run(&mut self) -> Result<()> {
        let target_dt = self.config.target_dt();
        let started = Instant::now();
        let mut last = started;

        info!(
            target_fps = self.config.target_fps,
            simulated = self.audio.is_simulated(),
            "frame loop started"
        );

        let mut outcome = Ok(());
        while !self.stop.load(Ordering::Relaxed) {
            if let Some(limit) = self.config.duration_s {
                if started.elapsed().as_secs_f32() >= limit {
                    break;
                }
            }

            let now = Instant::now();
            let dt = now.duration_since(last).as_secs_f32().min(self.config.max_dt_s);
            last = now;

            if let Err(err) = self.step(dt) {
                outcome = Err(err);
                break;
            }

            let spent = last.elapsed();
            if spent < target_dt {
                thread::sleep(target_dt - spent);
            }
        }

        if let Some(recorder) = self.recorder.take() {
            recorder.finalize()?;
        }
        info!(frames = self.frames, "frame loop stopped");
        outcome
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn scene(&self) -> &SceneModel {
        &self.scene
    }
}

/// Diagnostic surface: logs band-driven scene vitals about once a second.
/// Stands in for a real rasterizer in headless runs and never fails.
pub struct MeterSurface {
    last_log: Instant,
    interval: Duration,
}

impl Default for MeterSurface {
    fn default() -> Self {
        Self {
            last_log: Instant::now(),
            interval: Duration::from_secs(1),
        }
    }
}

impl RenderSurface for MeterSurface {
    fn present(&mut self, snapshot: &SceneSnapshot) -> Result<()> {
        if self.last_log.elapsed() >= self.interval {
            self.last_log = Instant::now();
            info!(
                pulse = snapshot.trunk.pulse,
                branches = snapshot.branches.len() + 1,
                leaves = snapshot.leaves.len(),
                flowers = snapshot.flowers.len(),
                sparkles = snapshot.sparkles.len(),
                shake = snapshot.camera_offset.length(),
                "scene"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::SimulatedSource;
    use crate::error::Error;
    use crate::params::{AnalysisConfig, AudioConfig, SceneTuning, SimulatedAudioConfig};

    const DT: f32 = 1.0 / 60.0;

    /// Surface that keeps the last snapshot and counts presents.
    struct CollectingSurface {
        presents: usize,
        last: Option<SceneSnapshot>,
    }

    impl CollectingSurface {
        fn new() -> Self {
            Self {
                presents: 0,
                last: None,
            }
        }
    }

    impl RenderSurface for CollectingSurface {
        fn present(&mut self, snapshot: &SceneSnapshot) -> Result<()> {
            self.presents += 1;
            self.last = Some(snapshot.clone());
            Ok(())
        }
    }

    /// Surface that fails on the nth present.
    struct FailingSurface {
        remaining: usize,
    }

    impl RenderSurface for FailingSurface {
        fn present(&mut self, _snapshot: &SceneSnapshot) -> Result<()> {
            if self.remaining == 0 {
                return Err(Error::RenderSurface("surface gone".into()));
            }
            self.remaining -= 1;
            Ok(())
        }
    }

    fn driver<S: RenderSurface>(surface: S, config: DriverConfig) -> FrameDriver<S> {
        let audio_config = AudioConfig::default();
        let source = SimulatedSource::new(&audio_config, &SimulatedAudioConfig::default());
        FrameDriver::new(
            AudioSource::Simulated(source),
            SpectralAnalyzer::new(AnalysisConfig::default()),
            SceneModel::new(SceneTuning::default()),
            surface,
            config,
        )
    }

    #[test]
    fn test_step_presents_each_tick() {
        let mut driver = driver(CollectingSurface::new(), DriverConfig::default());
        for _ in 0..120 {
            driver.step(DT).unwrap();
        }
        assert_eq!(driver.frames(), 120);
        assert_eq!(driver.surface.presents, 120);
        let last = driver.surface.last.as_ref().unwrap();
        assert!(last.time_s > 1.9 && last.time_s < 2.1);
    }

    #[test]
    fn test_simulated_pipeline_moves_the_scene() {
        let mut driver = driver(CollectingSurface::new(), DriverConfig::default());
        for _ in 0..1200 {
            driver.step(DT).unwrap();
        }
        let last = driver.surface.last.as_ref().unwrap();
        // The failsafe source must visibly drive the plant
        assert!(
            last.trunk.pulse > 0.0 || !last.branches.is_empty(),
            "scene did not react to simulated audio"
        );
    }

    #[test]
    fn test_surface_failure_is_fatal() {
        let config = DriverConfig {
            target_fps: 1000,
            ..Default::default()
        };
        let mut driver = driver(FailingSurface { remaining: 3 }, config);
        let result = driver.run();
        assert!(matches!(result, Err(Error::RenderSurface(_))));
        assert_eq!(driver.frames(), 3);
    }

    #[test]
    fn test_stop_flag_ends_the_run() {
        let mut driver = driver(CollectingSurface::new(), DriverConfig::default());
        driver.stop_handle().store(true, Ordering::Relaxed);
        driver.run().unwrap();
        assert_eq!(driver.frames(), 0);
    }

    #[test]
    fn test_duration_limit_ends_the_run() {
        let config = DriverConfig {
            target_fps: 500,
            duration_s: Some(0.05),
            ..Default::default()
        };
        let mut driver = driver(CollectingSurface::new(), config);
        driver.run().unwrap();
        assert!(driver.frames() > 0);
        assert!(driver.frames() < 500);
    }
}
