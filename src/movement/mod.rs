//! Shared kinematic movement core
//!
//! Everything in here is used verbatim by both the authoritative server tick and the
//! client-side prediction engine. Nothing in this module touches the network or the clock.

pub mod angles;
pub mod collision;
pub mod intent;
pub mod settings;
pub mod state;
pub mod step;

use nalgebra as na;

/// World-space vector (meters). +Y is up, yaw 0 faces +Z.
pub type Vec3 = na::Vector3<f32>;

pub use collision::{
    probe_ground, Collider, CollisionWorld, GroundContact, StaticWorld, SweepError, SweepHit,
};
pub use intent::MoveIntent;
pub use settings::MovementSettings;
pub use state::{KinematicState, MotionPhase, Pose};
pub use step::{step, StepOutcome};
