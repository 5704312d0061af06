//! Collision queries against the physical world
//!
//! The movement step only ever asks one question of the world: "cast a ray from here, in this
//! direction, up to this far; what did it hit first?". [`CollisionWorld`] is that seam.
//! [`StaticWorld`] answers it analytically for immutable level geometry made of infinite planes
//! and axis-aligned blocks, which is what both the server and the client load.

use serde::{Deserialize, Serialize};

use super::Vec3;

/// Directions shorter than this are rejected as degenerate.
const DIR_EPS: f32 = 1.0e-6;

/// Result of a successful sweep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SweepHit {
    /// Distance from the origin along the (normalized) direction
    pub distance: f32,
    /// World-space surface normal at the hit, facing the caster
    pub normal: Vec3,
    /// World-space hit point
    pub point: Vec3,
}

/// Collision query failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SweepError {
    #[error("collision world unavailable: {0}")]
    Unavailable(String),

    #[error("degenerate sweep direction")]
    DegenerateDirection,
}

/// A world that can answer sweep queries.
pub trait CollisionWorld {
    /// Cast from `origin` along `direction` for at most `max_distance`.
    ///
    /// `direction` need not be normalized. Returns the nearest hit, if any.
    fn sweep(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
    ) -> Result<Option<SweepHit>, SweepError>;
}

impl<W: CollisionWorld + ?Sized> CollisionWorld for &W {
    fn sweep(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
    ) -> Result<Option<SweepHit>, SweepError> {
        (**self).sweep(origin, direction, max_distance)
    }
}

/// Static level geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum Collider {
    /// Infinite plane satisfying `normal · x = offset`. Only its front face collides.
    Plane { normal: Vec3, offset: f32 },
    /// Axis-aligned solid box.
    Block { min: Vec3, max: Vec3 },
}

impl Collider {
    /// Horizontal ground plane at height `y`.
    pub fn ground(y: f32) -> Self {
        Self::Plane {
            normal: Vec3::y(),
            offset: y,
        }
    }

    /// Block resting on `base_y`, centered on `(x, z)`.
    pub fn block(center_x: f32, center_z: f32, base_y: f32, size: Vec3) -> Self {
        let half_x = size.x * 0.5;
        let half_z = size.z * 0.5;
        Self::Block {
            min: Vec3::new(center_x - half_x, base_y, center_z - half_z),
            max: Vec3::new(center_x + half_x, base_y + size.y, center_z + half_z),
        }
    }

    fn ray_cast(&self, origin: Vec3, dir: Vec3, max_distance: f32) -> Option<(f32, Vec3)> {
        match self {
            Collider::Plane { normal, offset } => {
                let len = normal.norm();
                if len <= DIR_EPS {
                    return None;
                }
                let n = normal / len;
                let d = offset / len;
                let denom = n.dot(&dir);
                // Back faces and parallel rays never hit
                if denom > -DIR_EPS {
                    return None;
                }
                let t = (d - n.dot(&origin)) / denom;
                (0.0..=max_distance).contains(&t).then_some((t, n))
            }
            Collider::Block { min, max } => ray_cast_block(*min, *max, origin, dir, max_distance),
        }
    }
}

/// Slab test. Rays starting inside the block report no hit.
fn ray_cast_block(
    min: Vec3,
    max: Vec3,
    origin: Vec3,
    dir: Vec3,
    max_distance: f32,
) -> Option<(f32, Vec3)> {
    let mut t_enter = f32::NEG_INFINITY;
    let mut t_exit = f32::INFINITY;
    let mut normal = Vec3::zeros();

    for axis in 0..3 {
        if dir[axis].abs() < DIR_EPS {
            if origin[axis] < min[axis] || origin[axis] > max[axis] {
                return None;
            }
            continue;
        }

        let t1 = (min[axis] - origin[axis]) / dir[axis];
        let t2 = (max[axis] - origin[axis]) / dir[axis];
        let (near, far) = if t1 <= t2 { (t1, t2) } else { (t2, t1) };

        if near > t_enter {
            t_enter = near;
            normal = Vec3::zeros();
            normal[axis] = if dir[axis] > 0.0 { -1.0 } else { 1.0 };
        }
        t_exit = t_exit.min(far);
    }

    if t_enter > t_exit || t_enter < 0.0 || t_enter > max_distance {
        return None;
    }
    Some((t_enter, normal))
}

/// Immutable level geometry answering sweeps analytically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StaticWorld {
    colliders: Vec<Collider>,
}

impl StaticWorld {
    pub fn new(colliders: Vec<Collider>) -> Self {
        Self { colliders }
    }

    /// Flat ground at y = 0 with a few blocks to walk around and jump onto.
    pub fn default_level() -> Self {
        Self::new(vec![
            Collider::ground(0.0),
            Collider::block(8.0, 8.0, 0.0, Vec3::new(4.0, 1.0, 4.0)),
            Collider::block(-10.0, 4.0, 0.0, Vec3::new(2.0, 0.25, 6.0)),
            Collider::block(0.0, -14.0, 0.0, Vec3::new(12.0, 3.0, 1.0)),
        ])
    }

    pub fn colliders(&self) -> &[Collider] {
        &self.colliders
    }
}

impl CollisionWorld for StaticWorld {
    fn sweep(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
    ) -> Result<Option<SweepHit>, SweepError> {
        let len = direction.norm();
        if !len.is_finite() || len <= DIR_EPS {
            return Err(SweepError::DegenerateDirection);
        }
        let dir = direction / len;
        let max_distance = max_distance.max(0.0);

        let nearest = self
            .colliders
            .iter()
            .filter_map(|collider| collider.ray_cast(origin, dir, max_distance))
            .min_by(|a, b| a.0.total_cmp(&b.0));

        Ok(nearest.map(|(distance, normal)| SweepHit {
            distance,
            normal,
            point: origin + dir * distance,
        }))
    }
}

/// Walkable ground found beneath a point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundContact {
    /// World-space height of the contact point
    pub height: f32,
    /// Distance between the feet and the contact (negative when the feet are below it)
    pub gap: f32,
    pub normal: Vec3,
}

/// Short downward probe for walkable ground under `feet`.
///
/// The ray starts `lift` above the feet so ground the feet have sunk slightly into is still
/// found, and reaches `max_gap` below them.
pub fn probe_ground<W: CollisionWorld + ?Sized>(
    world: &W,
    feet: Vec3,
    lift: f32,
    max_gap: f32,
    min_normal_y: f32,
) -> Result<Option<GroundContact>, SweepError> {
    let lift = lift.max(0.0);
    let origin = feet + Vec3::y() * lift;
    let hit = world.sweep(origin, -Vec3::y(), lift + max_gap.max(0.0))?;

    Ok(hit
        .filter(|hit| hit.normal.y >= min_normal_y)
        .map(|hit| GroundContact {
            height: hit.point.y,
            gap: hit.distance - lift,
            normal: hit.normal,
        }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ground_plane_hit_from_above() {
        let world = StaticWorld::new(vec![Collider::ground(0.0)]);
        let hit = world
            .sweep(Vec3::new(1.0, 2.0, 3.0), -Vec3::y(), 5.0)
            .unwrap()
            .expect("plane below");
        assert!((hit.distance - 2.0).abs() < 1e-6);
        assert!((hit.point - Vec3::new(1.0, 0.0, 3.0)).norm() < 1e-6);
        assert_eq!(hit.normal, Vec3::y());
    }

    #[test]
    fn plane_out_of_range_or_behind_is_missed() {
        let world = StaticWorld::new(vec![Collider::ground(0.0)]);
        assert!(world
            .sweep(Vec3::new(0.0, 2.0, 0.0), -Vec3::y(), 1.0)
            .unwrap()
            .is_none());
        assert!(world
            .sweep(Vec3::new(0.0, -2.0, 0.0), Vec3::y(), 10.0)
            .unwrap()
            .is_none());
    }

    #[test]
    fn block_face_normal_opposes_ray() {
        let world = StaticWorld::new(vec![Collider::Block {
            min: Vec3::new(-1.0, 0.0, 4.0),
            max: Vec3::new(1.0, 2.0, 6.0),
        }]);
        let hit = world
            .sweep(Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, 0.0, 2.0), 10.0)
            .unwrap()
            .expect("block ahead");
        assert!((hit.distance - 4.0).abs() < 1e-5);
        assert_eq!(hit.normal, Vec3::new(0.0, 0.0, -1.0));
    }

    #[test]
    fn nearest_collider_wins() {
        let world = StaticWorld::new(vec![
            Collider::ground(0.0),
            Collider::block(0.0, 0.0, 0.0, Vec3::new(2.0, 1.0, 2.0)),
        ]);
        let hit = world
            .sweep(Vec3::new(0.0, 5.0, 0.0), -Vec3::y(), 10.0)
            .unwrap()
            .unwrap();
        assert!((hit.point.y - 1.0).abs() < 1e-5);
    }

    #[test]
    fn degenerate_direction_is_an_error() {
        let world = StaticWorld::default_level();
        assert_eq!(
            world.sweep(Vec3::zeros(), Vec3::zeros(), 1.0),
            Err(SweepError::DegenerateDirection)
        );
    }

    #[test]
    fn probe_reports_gap_and_rejects_steep_surfaces() {
        let world = StaticWorld::new(vec![Collider::ground(0.0)]);
        let contact = probe_ground(&world, Vec3::new(0.0, 0.1, 0.0), 0.3, 0.15, 0.6)
            .unwrap()
            .expect("ground within probe");
        assert!((contact.gap - 0.1).abs() < 1e-5);
        assert!(contact.height.abs() < 1e-6);

        let steep = StaticWorld::new(vec![Collider::Plane {
            normal: Vec3::new(1.0, 0.2, 0.0),
            offset: 0.0,
        }]);
        assert!(probe_ground(&steep, Vec3::new(0.0, 0.05, 0.0), 0.3, 0.15, 0.6)
            .unwrap()
            .is_none());
    }

    #[test]
    fn level_round_trips_through_json() {
        let level = StaticWorld::default_level();
        let json = serde_json::to_string(&level).unwrap();
        let parsed: StaticWorld = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, level);
    }
}
