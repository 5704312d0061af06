//! Local avatar prediction and reconciliation
//!
//! The owning client runs the same [`step`] the server runs, immediately, with the same intent
//! it sends. Authoritative poses arrive later and the predicted pose is blended toward them:
//! hard snap beyond a threshold, exponential blend otherwise. While grounded the vertical
//! correction only ever moves the avatar down, which keeps it from bouncing on the floor.

use serde::{Deserialize, Serialize};

use crate::movement::{
    angles::{normalize_yaw, shortest_delta},
    probe_ground, step, CollisionWorld, GroundContact, KinematicState, MoveIntent,
    MovementSettings, Pose,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileSettings {
    /// Position error (meters) beyond which the prediction snaps
    pub snap_distance: f32,
    /// Yaw error (degrees) beyond which yaw snaps
    pub yaw_snap_degrees: f32,
    /// Position blend rate (1/s)
    pub correction_rate: f32,
    /// Yaw blend rate (1/s)
    pub yaw_correction_rate: f32,
    /// Seconds after a predicted jump during which the ground probe is ignored
    pub takeoff_grace: f32,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            snap_distance: 2.0,
            yaw_snap_degrees: 45.0,
            correction_rate: 10.0,
            yaw_correction_rate: 12.0,
            takeoff_grace: 0.15,
        }
    }
}

/// Client-side mirror of the authoritative kinematic state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictionState {
    pub kinematic: KinematicState,
    /// Remaining seconds of forced airborne after a predicted jump
    pub takeoff_grace: f32,
}

/// How the last frame was corrected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Correction {
    /// No authoritative pose yet
    None,
    Blend,
    Snap,
}

pub struct PredictionEngine {
    state: PredictionState,
    settings: MovementSettings,
    reconcile: ReconcileSettings,
    /// Latest authoritative pose and its server time
    authoritative: Option<(Pose, f64)>,
    last_correction: Correction,
}

impl PredictionEngine {
    /// Start predicting from the spawn pose sent in `Welcome`.
    pub fn new(spawn: Pose, settings: MovementSettings, reconcile: ReconcileSettings) -> Self {
        Self {
            state: PredictionState {
                kinematic: KinematicState::spawned_at(spawn.position, spawn.yaw),
                takeoff_grace: 0.0,
            },
            settings,
            reconcile,
            authoritative: None,
            last_correction: Correction::None,
        }
    }

    /// Record an authoritative pose. Returns false if it is older than the one held.
    pub fn on_authoritative(&mut self, pose: Pose, server_time: f64) -> bool {
        if let Some((_, held)) = self.authoritative {
            if server_time < held {
                return false;
            }
        }
        self.authoritative = Some((pose, server_time));
        true
    }

    /// Predict one client frame and return the pose to render.
    pub fn frame<W: CollisionWorld + ?Sized>(
        &mut self,
        intent: &MoveIntent,
        dt: f32,
        world: &W,
    ) -> Pose {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        let outcome = step(&self.state.kinematic, intent, dt, &self.settings, world);
        let mut kinematic = outcome.state;

        // Grounding from our own probe, not from the step
        let contact = probe_ground(
            world,
            kinematic.position,
            self.settings.step_offset,
            self.settings.ground_probe_distance,
            self.settings.min_ground_normal_y,
        )
        .ok()
        .flatten();
        kinematic.grounded = contact.is_some() && kinematic.vertical_velocity <= 0.0;

        if outcome.jumped {
            self.state.takeoff_grace = self.reconcile.takeoff_grace;
        }
        if self.state.takeoff_grace > 0.0 {
            kinematic.grounded = false;
            self.state.takeoff_grace = (self.state.takeoff_grace - dt).max(0.0);
        }

        self.last_correction = match self.authoritative {
            Some((target, _)) => self.reconcile_toward(&mut kinematic, target, contact, dt),
            None => Correction::None,
        };

        self.state.kinematic = kinematic;
        kinematic.pose()
    }

    fn reconcile_toward(
        &self,
        kinematic: &mut KinematicState,
        target: Pose,
        contact: Option<GroundContact>,
        dt: f32,
    ) -> Correction {
        let error = target.position - kinematic.position;
        let yaw_error = shortest_delta(kinematic.yaw, target.yaw);

        if error.norm() > self.reconcile.snap_distance {
            kinematic.position = target.position;
            kinematic.yaw = normalize_yaw(target.yaw);
            return Correction::Snap;
        }

        let alpha = 1.0 - (-self.reconcile.correction_rate * dt).exp();
        kinematic.position.x += error.x * alpha;
        kinematic.position.z += error.z * alpha;

        if kinematic.grounded {
            // Down only, then settle onto the ground contact if that is not a raise
            if error.y < 0.0 {
                kinematic.position.y += error.y * alpha;
            }
            if let Some(contact) = contact {
                if contact.height <= kinematic.position.y {
                    kinematic.position.y = contact.height;
                }
            }
        } else {
            kinematic.position.y += error.y * alpha;
        }

        kinematic.yaw = if yaw_error.abs() > self.reconcile.yaw_snap_degrees {
            normalize_yaw(target.yaw)
        } else {
            let yaw_alpha = 1.0 - (-self.reconcile.yaw_correction_rate * dt).exp();
            normalize_yaw(kinematic.yaw + yaw_error * yaw_alpha)
        };

        Correction::Blend
    }

    pub fn state(&self) -> &PredictionState {
        &self.state
    }

    pub fn pose(&self) -> Pose {
        self.state.kinematic.pose()
    }

    pub fn last_correction(&self) -> Correction {
        self.last_correction
    }

    pub fn settings(&self) -> &MovementSettings {
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movement::{Collider, StaticWorld, Vec3};

    const DT: f32 = 1.0 / 60.0;

    fn flat() -> StaticWorld {
        StaticWorld::new(vec![Collider::ground(0.0)])
    }

    fn engine_at(position: Vec3) -> PredictionEngine {
        PredictionEngine::new(
            Pose::new(position, 0.0),
            MovementSettings::default(),
            ReconcileSettings::default(),
        )
    }

    #[test]
    fn without_authority_prediction_matches_the_step() {
        let world = flat();
        let mut engine = engine_at(Vec3::zeros());
        let intent = MoveIntent {
            vertical: 1.0,
            ..MoveIntent::default()
        };

        for _ in 0..60 {
            engine.frame(&intent, DT, &world);
        }
        assert!((engine.pose().position.z - 6.0).abs() < 1e-2);
        assert_eq!(engine.last_correction(), Correction::None);
    }

    #[test]
    fn blend_converges_monotonically_below_snap() {
        let world = flat();
        let mut engine = engine_at(Vec3::zeros());
        let target = Pose::new(Vec3::new(1.0, 0.0, 0.5), 0.0);
        engine.on_authoritative(target, 1.0);

        let idle = MoveIntent::idle(0.0);
        let mut previous = (target.position - engine.pose().position).norm();
        for _ in 0..120 {
            let pose = engine.frame(&idle, DT, &world);
            let error = (target.position - pose.position).norm();
            assert!(error <= previous, "error grew: {previous} -> {error}");
            previous = error;
        }
        assert!(previous < 1e-3);
        assert_eq!(engine.last_correction(), Correction::Blend);
    }

    #[test]
    fn grounded_reconciliation_never_raises() {
        let world = flat();
        let mut engine = engine_at(Vec3::zeros());
        engine.on_authoritative(Pose::new(Vec3::new(0.0, 0.5, 0.0), 0.0), 1.0);

        let idle = MoveIntent::idle(0.0);
        for _ in 0..60 {
            let pose = engine.frame(&idle, DT, &world);
            assert!(pose.position.y <= 1e-6, "raised to {}", pose.position.y);
            assert!(engine.state().kinematic.grounded);
        }
    }

    #[test]
    fn large_error_snaps() {
        let world = flat();
        let mut engine = engine_at(Vec3::zeros());
        let target = Pose::new(Vec3::new(10.0, 0.0, 0.0), 200.0);
        engine.on_authoritative(target, 1.0);

        let pose = engine.frame(&MoveIntent::idle(0.0), DT, &world);
        assert_eq!(pose.position, target.position);
        assert_eq!(pose.yaw, 200.0);
        assert_eq!(engine.last_correction(), Correction::Snap);
    }

    #[test]
    fn yaw_blends_the_short_way_across_north() {
        let world = flat();
        let mut engine = engine_at(Vec3::zeros());
        engine.on_authoritative(Pose::new(Vec3::zeros(), 5.0), 1.0);

        // Facing 355 with the server at 5: the correction turns through 0, not back round
        let yaw = engine.frame(&MoveIntent::idle(355.0), DT, &world).yaw;
        assert!(yaw > 355.0 && yaw < 360.0, "yaw = {yaw}");
        assert!(shortest_delta(yaw, 5.0).abs() < 10.0);
        assert_eq!(engine.last_correction(), Correction::Blend);

        let yaw = engine.frame(&MoveIntent::idle(359.0), DT, &world).yaw;
        assert!(yaw > 0.0 && yaw < 5.0, "yaw = {yaw}");
    }

    #[test]
    fn small_yaw_error_blends_without_moving() {
        let world = flat();
        let mut engine = engine_at(Vec3::zeros());
        engine.on_authoritative(Pose::new(Vec3::zeros(), 30.0), 1.0);

        let pose = engine.frame(&MoveIntent::idle(0.0), DT, &world);
        assert!(pose.yaw > 0.0 && pose.yaw < 30.0, "yaw = {}", pose.yaw);
        assert!(pose.position.norm() < 1e-5);
    }

    #[test]
    fn large_yaw_error_snaps_while_position_blends() {
        let world = flat();
        let mut engine = engine_at(Vec3::zeros());
        engine.on_authoritative(Pose::new(Vec3::new(0.1, 0.0, 0.0), 90.0), 1.0);

        let pose = engine.frame(&MoveIntent::idle(0.0), DT, &world);
        assert_eq!(engine.last_correction(), Correction::Blend);
        assert_eq!(pose.yaw, 90.0);
        assert!(pose.position.x > 0.0 && pose.position.x < 0.1, "x = {}", pose.position.x);
    }

    #[test]
    fn older_authoritative_poses_are_ignored() {
        let mut engine = engine_at(Vec3::zeros());
        assert!(engine.on_authoritative(Pose::new(Vec3::x(), 0.0), 2.0));
        assert!(!engine.on_authoritative(Pose::new(Vec3::z(), 0.0), 1.0));
    }

    #[test]
    fn takeoff_grace_keeps_fresh_jump_airborne() {
        let world = flat();
        let mut engine = engine_at(Vec3::zeros());
        let jump = MoveIntent {
            jump: true,
            ..MoveIntent::default()
        };

        engine.frame(&jump, DT, &world);
        // Still within probe range of the floor, but the grace wins
        assert!(engine.pose().position.y < engine.settings().ground_probe_distance);
        assert!(!engine.state().kinematic.grounded);
        assert!(engine.state().kinematic.vertical_velocity > 0.0);

        let idle = MoveIntent::idle(0.0);
        let mut peak: f32 = 0.0;
        for _ in 0..30 {
            peak = peak.max(engine.frame(&idle, DT, &world).position.y);
        }
        assert!(peak > 1.0, "peak = {peak}");
    }
}
