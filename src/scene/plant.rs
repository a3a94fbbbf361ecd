//! Plant structure: trunk dynamics and the branch/leaf arena.
//!
//! Branches live in a flat arena owned by the scene model. Parents store
//! child indices and children are always appended after their parent, so the
//! structure is a strict tree by construction (a child's index is always
//! greater than its parent's) and a single forward pass can recompute start
//! positions before any child reads them.

use glam::Vec2;

use crate::params::SceneTuning;
use crate::scene::SimpleRng;

/// Branch depth at which leaves appear (inclusive range)
const LEAF_DEPTH: std::ops::RangeInclusive<usize> = 1..=4;

/// Minimum branch depth that carries flower attachment points
const FLOWER_MIN_DEPTH: usize = 3;

/// Attachment points offered per flowering branch
const ATTACH_POINTS_PER_BRANCH: usize = 2;

/// Trunk state: bass-driven pulse and a slow sway accumulator.
#[derive(Debug, Clone, Default)]
pub struct Trunk {
    /// Pulse amplitude in [0, 1]; fast attack, slow release
    pub pulse: f32,
    /// Sway phase accumulator (radians)
    pub sway_phase: f32,
}

impl Trunk {
    /// Asymmetric smoothing toward the bass energy: attack fast enough to
    /// look percussive, release slow enough to read as a pulse.
    pub fn update(&mut self, bass: f32, dt: f32, tuning: &SceneTuning) {
        let tau = if bass > self.pulse {
            tuning.pulse_attack_tau_s
        } else {
            tuning.pulse_release_tau_s
        };
        let alpha = 1.0 - (-dt / tau).exp();
        self.pulse = (self.pulse + (bass - self.pulse) * alpha).clamp(0.0, 1.0);
        self.sway_phase += 2.0 * std::f32::consts::PI * tuning.sway_rate_hz * dt;
    }
}

/// A delicate leaf owned by exactly one branch.
#[derive(Debug, Clone)]
pub struct Leaf {
    /// Position along the owning branch (0 = start, 1 = tip)
    pub t: f32,
    /// Angle relative to the branch direction (degrees)
    pub angle_offset_deg: f32,
    /// Full length when unfurled (world units)
    pub length: f32,
    /// Width at full unfurl (world units)
    pub width: f32,
    /// Unfurl progress in [0, 1]; never exceeds the branch's growth
    pub unfurl: f32,
}

/// One slot where a flower may attach. Occupied points are never reused
/// while their flower lives.
#[derive(Debug, Clone)]
pub struct AttachPoint {
    /// Fraction along the branch
    pub t: f32,
    pub occupied: bool,
}

/// A branch in the arena.
#[derive(Debug, Clone)]
pub struct Branch {
    /// Arena index of the parent; `None` only for the trunk root
    pub parent: Option<usize>,
    /// Arena indices of children; always greater than this branch's index
    pub children: Vec<usize>,
    pub depth: usize,
    /// Start position, recomputed from the parent's end each update
    pub start: Vec2,
    /// Absolute direction (degrees, 90 = straight up)
    pub angle_deg: f32,
    /// Full length at growth = 1 (world units)
    pub length: f32,
    /// Base thickness (world units); children taper from the parent
    pub thickness: f32,
    /// Growth in [0, 1]
    pub growth: f32,
    pub leaves: Vec<Leaf>,
    pub attach_points: Vec<AttachPoint>,
    /// Set once this branch has produced its children
    spawned_children: bool,
}

impl Branch {
    /// The trunk root: straight up from the origin.
    pub fn root(tuning: &SceneTuning) -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            depth: 0,
            start: Vec2::ZERO,
            angle_deg: 90.0,
            length: tuning.trunk_height,
            thickness: tuning.trunk_thickness,
            growth: 0.0,
            leaves: Vec::new(),
            attach_points: Vec::new(),
            spawned_children: false,
        }
    }

    /// Current end position given growth.
    pub fn end(&self) -> Vec2 {
        self.start + self.direction() * self.length * self.growth
    }

    /// Unit direction vector.
    pub fn direction(&self) -> Vec2 {
        let rad = self.angle_deg.to_radians();
        Vec2::new(rad.cos(), rad.sin())
    }

    /// World position of a fractional point along the branch.
    pub fn point_at(&self, t: f32) -> Vec2 {
        self.start + self.direction() * self.length * self.growth * t
    }

    /// Advance or decay growth from the mid-band energy. Growth is
    /// non-decreasing while the energy exceeds the threshold.
    pub fn advance_growth(&mut self, mid: f32, dt: f32, tuning: &SceneTuning) {
        if mid > tuning.growth_threshold {
            let headroom = (1.0 - tuning.growth_threshold).max(f32::EPSILON);
            let drive = (mid - tuning.growth_threshold) / headroom;
            self.growth = (self.growth + tuning.growth_rate_per_s * drive * dt).min(1.0);
        } else {
            self.growth = (self.growth - tuning.growth_decay_per_s * dt).max(0.0);
        }
    }

    /// Whether this branch is ready to produce children.
    pub fn ready_to_spawn(&self, tuning: &SceneTuning) -> bool {
        !self.spawned_children && self.growth >= 0.999 && self.depth < tuning.max_branch_depth
    }

    /// Mark this branch as having produced its children.
    pub fn mark_spawned(&mut self) {
        self.spawned_children = true;
    }

    /// Update leaf unfurl: lag behind the mid energy and never exceed the
    /// owning branch's growth. Below the gate the leaf furls back up.
    pub fn update_leaves(&mut self, mid: f32, dt: f32, tuning: &SceneTuning) {
        let alpha = 1.0 - (-dt / tuning.leaf_lag_tau_s).exp();
        let gate_open = self.growth > tuning.leaf_gate_growth;
        let growth_cap = self.growth;
        for leaf in &mut self.leaves {
            let target = if gate_open {
                (mid * 1.5).clamp(0.0, 1.0)
            } else {
                0.0
            };
            leaf.unfurl = (leaf.unfurl + (target - leaf.unfurl) * alpha).clamp(0.0, growth_cap);
        }
    }
}

/// Build one child branch from a fully grown parent. The caller appends it
/// to the arena and records its index in the parent.
pub(crate) fn grow_child(parent: &Branch, rng: &mut SimpleRng, tuning: &SceneTuning) -> Branch {
    let spread = tuning.branch_angle_spread_deg;
    let (ratio_lo, ratio_hi) = tuning.branch_length_ratio;
    let depth = parent.depth + 1;

    let mut leaves = Vec::new();
    if LEAF_DEPTH.contains(&depth) && rng.next_f32() < 0.8 {
        let count = 1 + (rng.next_f32() < 0.4) as usize;
        for _ in 0..count {
            let side = if rng.next_f32() < 0.5 { -55.0 } else { 55.0 };
            leaves.push(Leaf {
                t: rng.range(0.2, 0.8),
                angle_offset_deg: side + rng.range(-10.0, 10.0),
                length: rng.range(35.0, 70.0),
                width: rng.range(8.0, 18.0),
                unfurl: 0.0,
            });
        }
    }

    let mut attach_points = Vec::new();
    if depth >= FLOWER_MIN_DEPTH {
        for _ in 0..ATTACH_POINTS_PER_BRANCH {
            attach_points.push(AttachPoint {
                t: rng.range(0.5, 1.0),
                occupied: false,
            });
        }
    }

    Branch {
        parent: None, // caller fills in the arena indices
        children: Vec::new(),
        depth,
        start: parent.end(),
        angle_deg: parent.angle_deg + rng.range(-spread, spread),
        length: parent.length * rng.range(ratio_lo, ratio_hi),
        thickness: (parent.thickness * 0.7).max(1.0),
        growth: 0.0,
        leaves,
        attach_points,
        spawned_children: false,
    }
}
