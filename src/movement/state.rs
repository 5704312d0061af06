//! Authoritative kinematic state and the replicated pose

use serde::{Deserialize, Serialize};

use super::Vec3;

/// Position and facing, the part of an avatar that is replicated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Feet position
    pub position: Vec3,
    /// Degrees, [0, 360)
    pub yaw: f32,
}

impl Pose {
    pub fn new(position: Vec3, yaw: f32) -> Self {
        Self { position, yaw }
    }
}

/// Full simulation state of one avatar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KinematicState {
    pub position: Vec3,
    pub yaw: f32,
    pub vertical_velocity: f32,
    pub grounded: bool,
    pub coyote_timer: f32,
    pub jump_buffer_timer: f32,
}

/// Grounded/airborne view of a [`KinematicState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionPhase {
    Grounded,
    Airborne,
}

impl KinematicState {
    /// Fresh state at a spawn point. Spawns start grounded.
    pub fn spawned_at(position: Vec3, yaw: f32) -> Self {
        Self {
            position,
            yaw,
            vertical_velocity: 0.0,
            grounded: true,
            coyote_timer: 0.0,
            jump_buffer_timer: 0.0,
        }
    }

    pub fn pose(&self) -> Pose {
        Pose::new(self.position, self.yaw)
    }

    pub fn phase(&self) -> MotionPhase {
        if self.grounded {
            MotionPhase::Grounded
        } else {
            MotionPhase::Airborne
        }
    }
}
