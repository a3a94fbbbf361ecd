//! Immutable per-frame scene snapshot.
//!
//! The drawing surface receives geometry and opacity parameters, never
//! pixels and never live references: every snapshot is an owned copy, so the
//! renderer can hold it as long as it likes without racing `update`.

use glam::Vec2;

use crate::scene::{FlowerPhase, SceneModel};

/// How strongly the trunk pulse thickens branches near the root
const PULSE_THICKNESS_GAIN: f32 = 0.4;

/// Trunk geometry for one frame.
#[derive(Debug, Clone)]
pub struct TrunkGeom {
    pub base: Vec2,
    pub tip: Vec2,
    pub thickness: f32,
    /// Current pulse amplitude in [0, 1]
    pub pulse: f32,
    /// Sway phase (radians); the renderer maps this to a lean angle
    pub sway_phase: f32,
}

/// One branch segment.
#[derive(Debug, Clone)]
pub struct BranchGeom {
    pub start: Vec2,
    pub end: Vec2,
    pub thickness: f32,
    pub depth: usize,
}

/// One leaf, described relative to its anchor on the branch.
#[derive(Debug, Clone)]
pub struct LeafGeom {
    pub anchor: Vec2,
    /// Absolute angle (degrees)
    pub angle_deg: f32,
    pub length: f32,
    pub width: f32,
    pub unfurl: f32,
}

/// One flower, with its phase so the renderer can pick petal treatment.
#[derive(Debug, Clone)]
pub struct FlowerGeom {
    pub position: Vec2,
    pub radius: f32,
    pub opacity: f32,
    pub petal_count: u32,
    pub phase: FlowerPhase,
}

/// One sparkle particle.
#[derive(Debug, Clone)]
pub struct SparkleGeom {
    pub position: Vec2,
    pub radius: f32,
    pub opacity: f32,
}

/// Everything the drawing surface needs for one frame.
#[derive(Debug, Clone)]
pub struct SceneSnapshot {
    pub trunk: TrunkGeom,
    pub branches: Vec<BranchGeom>,
    pub leaves: Vec<LeafGeom>,
    pub flowers: Vec<FlowerGeom>,
    pub sparkles: Vec<SparkleGeom>,
    /// Viewport displacement from camera shake
    pub camera_offset: Vec2,
    /// Scene time (s), for renderer-side effects
    pub time_s: f32,
}

impl SceneModel {
    /// Copy the current state into an immutable snapshot.
    pub fn snapshot(&self) -> SceneSnapshot {
        let branches_arena = self.branches();
        let root = &branches_arena[0];
        let pulse = self.trunk().pulse;

        let trunk = TrunkGeom {
            base: root.start,
            tip: root.end(),
            thickness: root.thickness * (1.0 + pulse * PULSE_THICKNESS_GAIN),
            pulse,
            sway_phase: self.trunk().sway_phase,
        };

        let mut branches = Vec::with_capacity(branches_arena.len().saturating_sub(1));
        let mut leaves = Vec::new();
        for branch in branches_arena {
            if branch.depth > 0 {
                // Pulse fades with depth so the beat reads strongest near
                // the trunk
                let pulse_gain = 1.0 + pulse * PULSE_THICKNESS_GAIN / (branch.depth + 1) as f32;
                branches.push(BranchGeom {
                    start: branch.start,
                    end: branch.end(),
                    thickness: branch.thickness * branch.growth * pulse_gain,
                    depth: branch.depth,
                });
            }
            for leaf in &branch.leaves {
                leaves.push(LeafGeom {
                    anchor: branch.point_at(leaf.t),
                    angle_deg: branch.angle_deg + leaf.angle_offset_deg,
                    length: leaf.length * leaf.unfurl,
                    width: leaf.width * leaf.unfurl,
                    unfurl: leaf.unfurl,
                });
            }
        }

        let flowers = self
            .flowers()
            .iter()
            .map(|flower| {
                let branch = &branches_arena[flower.branch];
                let t = branch.attach_points[flower.point].t;
                FlowerGeom {
                    position: branch.point_at(t),
                    radius: flower.size * flower.bloom,
                    opacity: flower.bloom,
                    petal_count: flower.petal_count,
                    phase: flower.phase,
                }
            })
            .collect();

        let sparkles = self
            .sparkles()
            .iter()
            .map(|sparkle| SparkleGeom {
                position: sparkle.position,
                radius: sparkle.size * sparkle.opacity(),
                opacity: sparkle.opacity(),
            })
            .collect();

        SceneSnapshot {
            trunk,
            branches,
            leaves,
            flowers,
            sparkles,
            camera_offset: self.camera().shake_offset(),
            time_s: self.time_s(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::BandEnergies;
    use crate::params::SceneTuning;

    const DT: f32 = 1.0 / 60.0;

    #[test]
    fn test_snapshot_is_detached_from_the_model() {
        let mut scene = SceneModel::new(SceneTuning::default());
        for _ in 0..600 {
            scene.update(&BandEnergies::new(0.5, 0.9, 0.0), DT);
        }
        let snapshot = scene.snapshot();
        let branch_count = snapshot.branches.len();

        // Mutating the model afterwards must not affect the copy
        for _ in 0..600 {
            scene.update(&BandEnergies::new(0.9, 0.9, 0.9), DT);
        }
        assert_eq!(snapshot.branches.len(), branch_count);
    }

    #[test]
    fn test_snapshot_reflects_growth() {
        let mut scene = SceneModel::new(SceneTuning::default());
        let early = scene.snapshot();
        assert!(early.branches.is_empty());
        assert!((early.trunk.tip - early.trunk.base).length() < 1.0);

        for _ in 0..3000 {
            scene.update(&BandEnergies::new(0.2, 0.9, 0.0), DT);
        }
        let grown = scene.snapshot();
        assert!(!grown.branches.is_empty());
        assert!((grown.trunk.tip - grown.trunk.base).length() > 100.0);
        for branch in &grown.branches {
            assert!(branch.thickness >= 0.0);
            assert!(branch.depth >= 1);
        }
    }

    #[test]
    fn test_removed_flowers_absent_from_next_snapshot() {
        let mut scene = SceneModel::new(SceneTuning::default());
        for _ in 0..3000 {
            scene.update(&BandEnergies::new(0.2, 0.9, 0.0), DT);
        }
        for _ in 0..300 {
            scene.update(&BandEnergies::new(0.2, 0.9, 0.9), DT);
        }
        assert!(!scene.snapshot().flowers.is_empty());

        let tuning = scene.tuning().clone();
        let frames = ((tuning.fade_delay_s + tuning.fade_duration_s + 1.0) / DT).ceil() as usize;
        for _ in 0..frames {
            scene.update(&BandEnergies::new(0.2, 0.9, 0.0), DT);
        }
        assert!(scene.snapshot().flowers.is_empty());
    }

    #[test]
    fn test_camera_offset_flows_into_snapshot() {
        let mut scene = SceneModel::new(SceneTuning::default());
        scene.update(&BandEnergies::new(0.0, 0.0, 0.0), DT);
        scene.update(&BandEnergies::new(0.9, 0.0, 0.0), DT);
        let snapshot = scene.snapshot();
        assert!(snapshot.camera_offset.length() > 1.0);
    }
}
