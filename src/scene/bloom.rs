//! Flower lifecycle and sparkle particles.
//!
//! The flower phase machine is the principal state machine in the scene:
//!
//! ```text
//! Budding --(age >= bud_duration)--> Blooming
//! Blooming --(treble elevated for sparkle_window)--> Sparkling
//! {Budding, Blooming, Sparkling} --(treble low for fade_delay)--> Fading
//! Fading --(age > fade_duration)--> removed
//! ```
//!
//! Fading can interrupt any live phase (the music can drop at any time); no
//! other transition skips a state.

use glam::Vec2;

use crate::params::SceneTuning;

/// Visual openness smoothing time constant (s)
const BLOOM_TAU_S: f32 = 0.15;

/// Openness target while still a bud
const BUD_OPENNESS: f32 = 0.3;

/// Lifecycle phase of a flower.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowerPhase {
    Budding,
    Blooming,
    Sparkling,
    Fading,
}

/// What a lifecycle step asks the scene to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowerEvent {
    None,
    /// Just entered Sparkling: emit a burst
    StartedSparkling,
    /// Fade completed: remove the flower and release its attachment point
    Expired,
}

/// A flower owned by the scene's flower collection. The owning branch is
/// referenced by arena index for positioning, never owned.
#[derive(Debug, Clone)]
pub struct Flower {
    /// Arena index of the branch this flower sits on
    pub branch: usize,
    /// Index of the occupied attachment point on that branch
    pub point: usize,
    pub phase: FlowerPhase,
    /// Seconds spent in the current phase
    pub age: f32,
    /// Full radius when open (world units)
    pub size: f32,
    pub petal_count: u32,
    /// Visual openness in [0, 1], smoothed toward the phase target
    pub bloom: f32,
    /// Continuous seconds of elevated treble since entering the phase
    elevated_time: f32,
    /// Continuous seconds of low treble
    low_time: f32,
}

impl Flower {
    pub fn new(branch: usize, point: usize, size: f32, petal_count: u32) -> Self {
        Self {
            branch,
            point,
            phase: FlowerPhase::Budding,
            age: 0.0,
            size,
            petal_count,
            bloom: 0.0,
            elevated_time: 0.0,
            low_time: 0.0,
        }
    }

    /// Advance one tick. `treble_elevated` is the thresholded treble signal.
    pub fn step(&mut self, treble_elevated: bool, dt: f32, tuning: &SceneTuning) -> FlowerEvent {
        self.age += dt;
        if treble_elevated {
            self.elevated_time += dt;
            self.low_time = 0.0;
        } else {
            self.low_time += dt;
            self.elevated_time = 0.0;
        }

        let mut event = FlowerEvent::None;

        // Fade interrupts every live phase
        if self.phase != FlowerPhase::Fading && self.low_time >= tuning.fade_delay_s {
            self.enter(FlowerPhase::Fading);
        } else {
            match self.phase {
                FlowerPhase::Budding => {
                    if self.age >= tuning.bud_duration_s {
                        self.enter(FlowerPhase::Blooming);
                    }
                }
                FlowerPhase::Blooming => {
                    if self.elevated_time >= tuning.sparkle_window_s {
                        self.enter(FlowerPhase::Sparkling);
                        event = FlowerEvent::StartedSparkling;
                    }
                }
                FlowerPhase::Sparkling => {}
                FlowerPhase::Fading => {
                    if self.age > tuning.fade_duration_s {
                        event = FlowerEvent::Expired;
                    }
                }
            }
        }

        let target = match self.phase {
            FlowerPhase::Budding => BUD_OPENNESS,
            FlowerPhase::Blooming | FlowerPhase::Sparkling => 1.0,
            FlowerPhase::Fading => 0.0,
        };
        let alpha = 1.0 - (-dt / BLOOM_TAU_S).exp();
        self.bloom = (self.bloom + (target - self.bloom) * alpha).clamp(0.0, 1.0);

        event
    }

    fn enter(&mut self, phase: FlowerPhase) {
        self.phase = phase;
        self.age = 0.0;
        self.elevated_time = 0.0;
        // low_time is deliberately kept: a fading flower stays fading
    }
}

/// Ephemeral particle emitted by sparkling flowers.
#[derive(Debug, Clone)]
pub struct Sparkle {
    pub position: Vec2,
    pub velocity: Vec2,
    pub remaining_life: f32,
    /// Initial lifetime, for fade-out scaling
    pub max_life: f32,
    pub size: f32,
}

impl Sparkle {
    /// Integrate one tick: drift, drag, age. `remaining_life` strictly
    /// decreases for any dt > 0.
    pub fn step(&mut self, dt: f32, drag_per_s: f32) {
        self.position += self.velocity * dt;
        self.velocity *= (-drag_per_s * dt).exp();
        self.remaining_life -= dt;
    }

    pub fn alive(&self) -> bool {
        self.remaining_life > 0.0
    }

    /// Opacity in [0, 1], fading with remaining life.
    pub fn opacity(&self) -> f32 {
        (self.remaining_life / self.max_life).clamp(0.0, 1.0)
    }
}
