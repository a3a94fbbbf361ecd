//! Reactive scene state: the plant, its bloom lifecycle, and camera shake.
//!
//! `SceneModel::update` is the single mutation entry point, called once per
//! frame with the smoothed band energies. Given the same energy sequence, dt
//! sequence, and seed, the scene evolves identically; tests rely on this.

pub mod bloom;
pub mod plant;
pub mod snapshot;

pub use bloom::{Flower, FlowerPhase, Sparkle};
pub use plant::{Branch, Leaf, Trunk};
pub use snapshot::SceneSnapshot;

use glam::Vec2;
use tracing::trace;

use crate::analysis::BandEnergies;
use crate::params::SceneTuning;
use bloom::FlowerEvent;

/// Branch growth required before a flower can attach there
const FLOWER_MIN_GROWTH: f32 = 0.7;

/// Camera shake state. Direction changes only on bass impulses; magnitude
/// decays exponentially between them.
#[derive(Debug, Clone)]
pub struct CameraState {
    /// Unit direction of the current shake
    direction: Vec2,
    /// Shake magnitude (world units)
    magnitude: f32,
    /// Bass energy of the previous frame, for impulse detection
    last_bass: f32,
}

impl Default for CameraState {
    fn default() -> Self {
        Self {
            direction: Vec2::X,
            magnitude: 0.0,
            last_bass: 0.0,
        }
    }
}

impl CameraState {
    fn update(&mut self, bass: f32, dt: f32, rng: &mut SimpleRng, tuning: &SceneTuning) {
        let delta = bass - self.last_bass;
        self.last_bass = bass;

        if delta > tuning.shake_impulse_threshold {
            // New bass impulse: kick in a fresh random direction
            self.direction = rng.unit_vec2();
            self.magnitude = bass * tuning.shake_scale;
        } else {
            self.magnitude *= (-dt / tuning.shake_decay_tau_s).exp();
        }
    }

    /// Current viewport offset.
    pub fn shake_offset(&self) -> Vec2 {
        self.direction * self.magnitude
    }
}

/// Owns every scene entity and advances them from band energies.
pub struct SceneModel {
    tuning: SceneTuning,
    trunk: Trunk,
    /// Branch arena; index 0 is the trunk root, children always follow
    /// their parent (strict tree by construction)
    branches: Vec<Branch>,
    flowers: Vec<Flower>,
    sparkles: Vec<Sparkle>,
    camera: CameraState,
    rng: SimpleRng,
    /// Flower rate limiter: refills at `flower_spawn_rate_per_s`, costs 1
    /// per spawn, caps at a single queued spawn
    spawn_budget: f32,
    /// Elapsed scene time (s)
    time_s: f32,
}

impl SceneModel {
    pub fn new(tuning: SceneTuning) -> Self {
        let rng = SimpleRng::new(tuning.seed);
        let branches = vec![Branch::root(&tuning)];
        Self {
            tuning,
            trunk: Trunk::default(),
            branches,
            flowers: Vec::new(),
            sparkles: Vec::new(),
            camera: CameraState::default(),
            rng,
            spawn_budget: 0.0,
            time_s: 0.0,
        }
    }

    /// Advance the whole scene by one frame. The only mutation entry point.
    pub fn update(&mut self, bands: &BandEnergies, dt: f32) {
        let dt = if dt.is_finite() && dt > 0.0 { dt } else { 0.0 };
        if dt == 0.0 {
            return;
        }
        self.time_s += dt;

        self.trunk.update(bands.bass, dt, &self.tuning);
        self.update_branches(bands.mid, dt);
        self.update_flowers(bands.treble, dt);
        self.update_sparkles(dt);
        self.camera
            .update(bands.bass, dt, &mut self.rng, &self.tuning);

        trace!(
            time_s = self.time_s,
            branches = self.branches.len(),
            flowers = self.flowers.len(),
            sparkles = self.sparkles.len(),
            "scene updated"
        );
    }

    /// Grow/decay branches, reattach children to moving parent tips, unfurl
    /// leaves, and let fully grown branches spawn children.
    fn update_branches(&mut self, mid: f32, dt: f32) {
        // Forward pass: parents always precede children in the arena, so a
        // child's start is current by the time it is visited.
        for i in 0..self.branches.len() {
            if let Some(parent) = self.branches[i].parent {
                let start = self.branches[parent].end();
                self.branches[i].start = start;
            }
            self.branches[i].advance_growth(mid, dt, &self.tuning);
            self.branches[i].update_leaves(mid, dt, &self.tuning);
        }

        // Tree-like growth: fully grown branches fork once
        for i in 0..self.branches.len() {
            if !self.branches[i].ready_to_spawn(&self.tuning) {
                continue;
            }
            let want = 1 + self.rng.range_usize(self.tuning.max_children_per_branch);
            for _ in 0..want {
                if self.branches.len() >= self.tuning.max_branches {
                    break;
                }
                let child = plant::grow_child(&self.branches[i], &mut self.rng, &self.tuning);
                let child_index = self.branches.len();
                self.branches.push(child);
                self.branches[child_index].parent = Some(i);
                self.branches[i].children.push(child_index);
            }
            self.branches[i].mark_spawned();
        }
    }

    /// Spawn rate-limited flowers while treble is elevated, then run every
    /// flower's phase machine and prune the expired ones.
    fn update_flowers(&mut self, treble: f32, dt: f32) {
        let elevated = treble >= self.tuning.bloom_threshold;

        // Budget caps at a single spawn so a treble onset after a quiet
        // stretch cannot burst past the configured rate
        self.spawn_budget =
            (self.spawn_budget + self.tuning.flower_spawn_rate_per_s * dt).min(1.0);
        if elevated {
            while self.spawn_budget >= 1.0 && self.flowers.len() < self.tuning.max_flowers {
                let Some((branch, point)) = self.claim_attach_point() else {
                    break;
                };
                self.spawn_budget -= 1.0;
                let size = self.rng.range(15.0, 28.0);
                let petal_count = 6 + self.rng.range_usize(3) as u32;
                self.flowers.push(Flower::new(branch, point, size, petal_count));
            }
        }

        let mut emitters: Vec<usize> = Vec::new();
        let mut expired: Vec<usize> = Vec::new();
        for (i, flower) in self.flowers.iter_mut().enumerate() {
            match flower.step(elevated, dt, &self.tuning) {
                FlowerEvent::StartedSparkling => emitters.push(i),
                FlowerEvent::Expired => expired.push(i),
                FlowerEvent::None => {}
            }
        }

        for &i in &emitters {
            let (min, max) = self.tuning.sparkle_burst;
            let count = min + self.rng.range_usize(max - min + 1);
            let position = self.flower_position(&self.flowers[i]);
            for _ in 0..count {
                self.emit_sparkle(position);
            }
        }

        // Sustained emission while Sparkling
        for i in 0..self.flowers.len() {
            if self.flowers[i].phase != FlowerPhase::Sparkling {
                continue;
            }
            if self.rng.next_f32() < self.tuning.sparkle_rate_per_s * dt {
                let position = self.flower_position(&self.flowers[i]);
                self.emit_sparkle(position);
            }
        }

        // Remove expired flowers back-to-front, releasing their points
        for &i in expired.iter().rev() {
            let flower = self.flowers.swap_remove(i);
            if let Some(branch) = self.branches.get_mut(flower.branch) {
                if let Some(point) = branch.attach_points.get_mut(flower.point) {
                    point.occupied = false;
                }
            }
        }
    }

    fn update_sparkles(&mut self, dt: f32) {
        let drag = self.tuning.sparkle_drag_per_s;
        for sparkle in &mut self.sparkles {
            sparkle.step(dt, drag);
        }
        self.sparkles.retain(Sparkle::alive);
    }

    /// Find and occupy a free attachment point on a sufficiently grown
    /// branch. Occupied points are never handed out twice.
    fn claim_attach_point(&mut self) -> Option<(usize, usize)> {
        let mut free: Vec<(usize, usize)> = Vec::new();
        for (bi, branch) in self.branches.iter().enumerate() {
            if branch.growth < FLOWER_MIN_GROWTH {
                continue;
            }
            for (pi, point) in branch.attach_points.iter().enumerate() {
                if !point.occupied {
                    free.push((bi, pi));
                }
            }
        }
        if free.is_empty() {
            return None;
        }
        let (bi, pi) = free[self.rng.range_usize(free.len())];
        self.branches[bi].attach_points[pi].occupied = true;
        Some((bi, pi))
    }

    fn flower_position(&self, flower: &Flower) -> Vec2 {
        let branch = &self.branches[flower.branch];
        let t = branch.attach_points[flower.point].t;
        branch.point_at(t)
    }

    fn emit_sparkle(&mut self, position: Vec2) {
        if self.sparkles.len() >= self.tuning.max_sparkles {
            return;
        }
        let (speed_lo, speed_hi) = self.tuning.sparkle_speed;
        let (life_lo, life_hi) = self.tuning.sparkle_life_s;
        let life = self.rng.range(life_lo, life_hi);
        self.sparkles.push(Sparkle {
            position,
            velocity: self.rng.unit_vec2() * self.rng.range(speed_lo, speed_hi),
            remaining_life: life,
            max_life: life,
            size: self.rng.range(1.0, 3.0),
        });
    }

    // Accessors used by the snapshot builder and tests

    pub fn trunk(&self) -> &Trunk {
        &self.trunk
    }

    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    pub fn flowers(&self) -> &[Flower] {
        &self.flowers
    }

    pub fn sparkles(&self) -> &[Sparkle] {
        &self.sparkles
    }

    pub fn camera(&self) -> &CameraState {
        &self.camera
    }

    pub fn tuning(&self) -> &SceneTuning {
        &self.tuning
    }

    pub fn time_s(&self) -> f32 {
        self.time_s
    }
}

/// Small deterministic xorshift generator for scene variation. Seeded once
/// at construction so runs are reproducible.
pub(crate) struct SimpleRng {
    state: u64,
}

impl SimpleRng {
    pub fn new(seed: u64) -> Self {
        Self {
            state: seed.max(1), // xorshift state must be non-zero
        }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    /// Uniform value in [0, 1)
    pub fn next_f32(&mut self) -> f32 {
        (self.next_u64() >> 40) as f32 / (1u64 << 24) as f32
    }

    /// Uniform value in [min, max)
    pub fn range(&mut self, min: f32, max: f32) -> f32 {
        min + self.next_f32() * (max - min)
    }

    /// Uniform index in [0, n)
    pub fn range_usize(&mut self, n: usize) -> usize {
        if n == 0 {
            0
        } else {
            (self.next_u64() % n as u64) as usize
        }
    }

    /// Uniformly distributed unit vector
    pub fn unit_vec2(&mut self) -> Vec2 {
        let angle = self.range(0.0, 2.0 * std::f32::consts::PI);
        Vec2::new(angle.cos(), angle.sin())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    fn bands(bass: f32, mid: f32, treble: f32) -> BandEnergies {
        BandEnergies::new(bass, mid, treble)
    }

    /// Drive the scene until the plant has fully grown flowering branches.
    fn grown_scene() -> SceneModel {
        let mut scene = SceneModel::new(SceneTuning::default());
        for _ in 0..3000 {
            scene.update(&bands(0.2, 0.9, 0.0), DT);
        }
        scene
    }

    #[test]
    fn test_branch_arena_is_acyclic_and_bounded() {
        let scene = grown_scene();
        let max = scene.tuning().max_branches;
        assert!(scene.branches().len() > 1, "plant never forked");
        assert!(scene.branches().len() <= max);

        for (i, branch) in scene.branches().iter().enumerate() {
            if let Some(parent) = branch.parent {
                assert!(parent < i, "child {i} precedes parent {parent}");
            } else {
                assert_eq!(i, 0, "only the root may lack a parent");
            }
            for &child in &branch.children {
                assert!(child > i);
                assert_eq!(scene.branches()[child].parent, Some(i));
            }
        }
    }

    #[test]
    fn test_same_seed_same_scene() {
        let mut a = SceneModel::new(SceneTuning::default());
        let mut b = SceneModel::new(SceneTuning::default());
        let script = [
            bands(0.9, 0.8, 0.1),
            bands(0.1, 0.9, 0.8),
            bands(0.5, 0.5, 0.9),
        ];
        for _ in 0..1200 {
            for e in &script {
                a.update(e, DT);
                b.update(e, DT);
            }
        }
        assert_eq!(a.branches().len(), b.branches().len());
        assert_eq!(a.flowers().len(), b.flowers().len());
        assert_eq!(a.sparkles().len(), b.sparkles().len());
        assert_eq!(a.camera().shake_offset(), b.camera().shake_offset());
    }

    #[test]
    fn test_flower_spawn_rate_capped() {
        // Sustained treble at 0.8 for 3 s at 60 fps; default cap is 2/s
        let mut scene = grown_scene();
        assert_eq!(scene.flowers().len(), 0);

        for _ in 0..180 {
            scene.update(&bands(0.2, 0.9, 0.8), DT);
        }
        let count = scene.flowers().len();
        assert!(count >= 1, "no flowers spawned");
        assert!(count <= 6, "rate cap exceeded: {count} flowers");
    }

    #[test]
    fn test_no_duplicate_attach_points() {
        let mut scene = grown_scene();
        for _ in 0..600 {
            scene.update(&bands(0.2, 0.9, 0.9), DT);
        }
        let mut seen = std::collections::HashSet::new();
        for flower in scene.flowers() {
            assert!(
                seen.insert((flower.branch, flower.point)),
                "two flowers share an attachment point"
            );
        }
    }

    #[test]
    fn test_expired_flowers_release_their_points() {
        let mut scene = grown_scene();
        for _ in 0..120 {
            scene.update(&bands(0.2, 0.9, 0.9), DT);
        }
        let spawned = scene.flowers().len();
        assert!(spawned >= 1);

        // Kill the treble long enough for fade_delay + fade_duration
        let frames = ((scene.tuning().fade_delay_s + scene.tuning().fade_duration_s + 1.0) / DT)
            .ceil() as usize;
        for _ in 0..frames {
            scene.update(&bands(0.2, 0.9, 0.0), DT);
        }
        assert_eq!(scene.flowers().len(), 0, "flowers leaked");
        let occupied = scene
            .branches()
            .iter()
            .flat_map(|b| &b.attach_points)
            .filter(|p| p.occupied)
            .count();
        assert_eq!(occupied, 0, "attachment points leaked");
    }

    #[test]
    fn test_sparkles_appear_and_stay_bounded() {
        let mut scene = grown_scene();
        let mut peak = 0usize;
        for _ in 0..1800 {
            scene.update(&bands(0.2, 0.9, 0.9), DT);
            peak = peak.max(scene.sparkles().len());
            assert!(scene.sparkles().len() <= scene.tuning().max_sparkles);
        }
        assert!(peak > 0, "no sparkles emitted");

        // All sparkles die out once flowers fade
        for _ in 0..600 {
            scene.update(&bands(0.2, 0.9, 0.0), DT);
        }
        assert_eq!(scene.sparkles().len(), 0);
    }

    #[test]
    fn test_shake_decays_after_bass_drops() {
        let mut scene = SceneModel::new(SceneTuning::default());
        scene.update(&bands(0.0, 0.0, 0.0), DT);
        scene.update(&bands(0.9, 0.0, 0.0), DT);
        let kicked = scene.camera().shake_offset().length();
        assert!(kicked > 1.0, "impulse did not kick the camera");

        for _ in 0..120 {
            scene.update(&bands(0.0, 0.0, 0.0), DT);
        }
        assert!(scene.camera().shake_offset().length() < 0.01);
    }

    #[test]
    fn test_shake_direction_stable_without_impulse() {
        let mut scene = SceneModel::new(SceneTuning::default());
        scene.update(&bands(0.9, 0.0, 0.0), DT);
        let dir_before = scene.camera().shake_offset().normalize_or_zero();
        // Sustained identical bass: no new impulse, direction must not change
        for _ in 0..10 {
            scene.update(&bands(0.9, 0.0, 0.0), DT);
        }
        let dir_after = scene.camera().shake_offset().normalize_or_zero();
        assert!((dir_before - dir_after).length() < 1e-5);
    }

    #[test]
    fn test_zero_dt_is_a_no_op() {
        let mut scene = grown_scene();
        let branches = scene.branches().len();
        let time = scene.time_s();
        scene.update(&bands(0.9, 0.9, 0.9), 0.0);
        scene.update(&bands(0.9, 0.9, 0.9), f32::NAN);
        assert_eq!(scene.branches().len(), branches);
        assert_eq!(scene.time_s(), time);
    }

    #[test]
    fn test_rng_is_deterministic() {
        let mut a = SimpleRng::new(99);
        let mut b = SimpleRng::new(99);
        for _ in 0..100 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
        let mut r = SimpleRng::new(7);
        for _ in 0..1000 {
            let v = r.next_f32();
            assert!((0.0..1.0).contains(&v));
            let u = r.unit_vec2();
            assert!((u.length() - 1.0).abs() < 1e-4);
        }
    }
}
