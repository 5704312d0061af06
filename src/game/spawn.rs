//! Spawn placement

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::movement::{CollisionWorld, MovementSettings, Pose, Vec3};

/// Radius of the spawn disk around the origin
pub const DEFAULT_SPAWN_RADIUS: f32 = 6.0;
/// Height spawn points are dropped from; above every default level block
pub const DEFAULT_SPAWN_HEIGHT: f32 = 10.0;

/// Picks spawn poses from a seeded generator so a given seed always yields the same sequence.
pub struct SpawnPlanner {
    rng: ChaCha8Rng,
    radius: f32,
    height: f32,
}

impl SpawnPlanner {
    pub fn new(seed: u64) -> Self {
        Self::with_area(seed, DEFAULT_SPAWN_RADIUS, DEFAULT_SPAWN_HEIGHT)
    }

    pub fn with_area(seed: u64, radius: f32, height: f32) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            radius: radius.max(0.0),
            height,
        }
    }

    /// Next spawn pose, nudged down onto the first walkable surface beneath it.
    ///
    /// Returns the pose and whether ground was found. Without ground (or when the sweep fails)
    /// the avatar is placed at spawn height and falls.
    pub fn next_spawn<W: CollisionWorld + ?Sized>(
        &mut self,
        world: &W,
        settings: &MovementSettings,
    ) -> (Pose, bool) {
        let angle = self.rng.gen_range(0.0..std::f32::consts::TAU);
        // sqrt keeps the points uniform over the disk
        let distance = self.radius * self.rng.gen::<f32>().sqrt();
        let yaw = self.rng.gen_range(0.0..360.0);

        let start = Vec3::new(angle.cos() * distance, self.height, angle.sin() * distance);
        let reach = self.height.abs() + 100.0;

        let landing = world
            .sweep(start, -Vec3::y(), reach)
            .ok()
            .flatten()
            .filter(|hit| hit.normal.y >= settings.min_ground_normal_y);

        match landing {
            Some(hit) => (Pose::new(hit.point, yaw), true),
            None => (Pose::new(start, yaw), false),
        }
    }
}
