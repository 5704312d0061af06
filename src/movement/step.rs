//! The kinematic step
//!
//! One call advances one avatar by `dt`:
//! - yaw from the intent, planar move from the yaw-rotated axes (clamped to the unit circle)
//! - coyote and jump-buffer timers
//! - gravity with a grounded "stick" velocity
//! - edge-triggered jump when both timers are live
//! - horizontal sweep-and-slide, then a vertical landing/ceiling sweep that decides `grounded`
//!
//! The function is pure apart from the world queries it issues, so the server tick and the
//! client prediction produce the same result for the same inputs.

use super::{
    angles::{normalize_yaw, planar_axes},
    collision::{CollisionWorld, SweepHit},
    intent::MoveIntent,
    settings::MovementSettings,
    state::KinematicState,
    Vec3,
};

/// Maximum slide iterations for the horizontal sweep (handles corners).
const MAX_SLIDE_ITERATIONS: u32 = 3;

/// Planar moves shorter than this are ignored.
const MIN_MOVE: f32 = 1.0e-5;

/// Shallowest approach angle (cosine against the wall normal) the wall sweep looks far enough
/// ahead to catch before clearance is violated.
const MIN_APPROACH_COS: f32 = 0.25;

/// Result of one [`step`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutcome {
    pub state: KinematicState,
    /// The jump fired during this step
    pub jumped: bool,
    /// Sweeps that failed and were treated as "no collision"
    pub sweep_faults: u32,
}

/// Advance `state` by `dt` seconds under `intent`.
pub fn step<W: CollisionWorld + ?Sized>(
    state: &KinematicState,
    intent: &MoveIntent,
    dt: f32,
    settings: &MovementSettings,
    world: &W,
) -> StepOutcome {
    let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
    let intent = intent.sanitized();
    let mut sweeper = Sweeper { world, faults: 0 };
    let mut next = *state;

    // 1) Facing
    next.yaw = normalize_yaw(intent.yaw);

    // 2) Planar move direction, no diagonal speed boost
    let (forward, right) = planar_axes(next.yaw);
    let mut wish = forward * intent.vertical + right * intent.horizontal;
    let wish_len = wish.norm();
    if wish_len > 1.0 {
        wish /= wish_len;
    }

    // 3) Speed
    let speed = if intent.sprint {
        settings.move_speed * settings.sprint_multiplier
    } else {
        settings.move_speed
    };

    // 4) Coyote time
    next.coyote_timer = if state.grounded {
        settings.coyote_time
    } else {
        (state.coyote_timer - dt).max(0.0)
    };

    // 5) Jump buffer
    next.jump_buffer_timer = if intent.jump {
        settings.jump_buffer_time
    } else {
        (state.jump_buffer_timer - dt).max(0.0)
    };

    // 6) Gravity
    if state.grounded && next.vertical_velocity < 0.0 {
        next.vertical_velocity = settings.grounded_stick_velocity;
    }
    next.vertical_velocity += settings.gravity * dt;

    // 7) Jump
    let jumped = next.jump_buffer_timer > 0.0 && next.coyote_timer > 0.0;
    if jumped {
        next.vertical_velocity = settings.jump_velocity();
        next.jump_buffer_timer = 0.0;
        next.coyote_timer = 0.0;
    }

    // 8) Integrate and resolve
    let planar = wish * speed * dt;
    let after_planar = sweeper.slide_horizontal(state.position, planar, settings);
    let (position, grounded, bumped_ceiling) =
        sweeper.resolve_vertical(after_planar, next.vertical_velocity * dt, settings);
    next.position = position;
    next.grounded = grounded;
    if bumped_ceiling && next.vertical_velocity > 0.0 {
        next.vertical_velocity = 0.0;
    }

    // 9) No bounce on landing
    if next.grounded && next.vertical_velocity < 0.0 {
        next.vertical_velocity = settings.grounded_stick_velocity;
    }

    StepOutcome {
        state: next,
        jumped,
        sweep_faults: sweeper.faults,
    }
}

/// Wraps world queries so a failing world degrades to "nothing there".
struct Sweeper<'w, W: ?Sized> {
    world: &'w W,
    faults: u32,
}

impl<W: CollisionWorld + ?Sized> Sweeper<'_, W> {
    fn cast(&mut self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<SweepHit> {
        match self.world.sweep(origin, direction, max_distance) {
            Ok(hit) => hit,
            Err(_) => {
                self.faults += 1;
                None
            }
        }
    }

    /// Sweep-and-slide along the ground plane from `start` by `desired`.
    ///
    /// Clearance is measured perpendicular to the blocking face, so approaching a wall at an
    /// angle stops at the same distance as walking straight into it.
    fn slide_horizontal(&mut self, start: Vec3, desired: Vec3, settings: &MovementSettings) -> Vec3 {
        let clearance = settings.avatar_radius + settings.skin;
        let mut pos = start;
        let mut remaining = Vec3::new(desired.x, 0.0, desired.z);

        for _ in 0..MAX_SLIDE_ITERATIONS {
            let len = remaining.norm();
            if len <= MIN_MOVE {
                break;
            }
            let dir = remaining / len;
            let origin = pos + Vec3::y() * settings.step_offset;
            let reach = len + clearance / MIN_APPROACH_COS;

            let blocked = self.cast(origin, dir, reach).and_then(|hit| {
                let flat = Vec3::new(hit.normal.x, 0.0, hit.normal.z);
                let flat_len = flat.norm();
                if flat_len <= MIN_MOVE {
                    return None;
                }
                let n = flat / flat_len;
                let approach = -dir.dot(&n);
                if approach <= MIN_MOVE {
                    return None;
                }
                let allowed = hit.distance - clearance / approach;
                (allowed < len).then_some((allowed.max(0.0), n))
            });

            let Some((travel, n)) = blocked else {
                pos += remaining;
                break;
            };
            pos += dir * travel;

            // Slide: drop the component pushing into the surface
            let leftover = dir * (len - travel);
            remaining = leftover - n * leftover.dot(&n);
        }

        pos
    }

    /// Move vertically by `dy`. Returns `(position, grounded, bumped_ceiling)`.
    fn resolve_vertical(
        &mut self,
        start: Vec3,
        dy: f32,
        settings: &MovementSettings,
    ) -> (Vec3, bool, bool) {
        let mut pos = start;

        if dy > 0.0 {
            let head = pos + Vec3::y() * settings.avatar_height;
            return match self.cast(head, Vec3::y(), dy) {
                Some(hit) => {
                    pos.y += (hit.distance - settings.skin).max(0.0);
                    (pos, false, true)
                }
                None => {
                    pos.y += dy;
                    (pos, false, false)
                }
            };
        }

        // Falling or standing: look from just above the feet down past the move.
        let lift = settings.step_offset.max(0.0);
        let origin = pos + Vec3::y() * lift;
        match self.cast(origin, -Vec3::y(), lift - dy) {
            Some(hit) => {
                pos.y = hit.point.y;
                (pos, hit.normal.y >= settings.min_ground_normal_y, false)
            }
            None => {
                pos.y += dy;
                (pos, false, false)
            }
        }
    }
}
