//! Movement tuning shared by server and client
//!
//! Distances are meters, time is seconds, velocities are meters per second.
//! The server sends its settings to every client on join so both sides step identically.

use serde::{Deserialize, Serialize};

/// Tuning for the kinematic step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementSettings {
    /// Base planar speed
    pub move_speed: f32,
    /// Speed multiplier while sprinting
    pub sprint_multiplier: f32,
    /// Vertical acceleration (negative = down)
    pub gravity: f32,
    /// Desired jump apex height above takeoff
    pub jump_height: f32,
    /// Grace period after leaving the ground during which a jump still succeeds
    pub coyote_time: f32,
    /// Grace period a jump press is remembered before landing
    pub jump_buffer_time: f32,
    /// Small downward velocity held while standing, keeps ground contact stable
    pub grounded_stick_velocity: f32,
    /// Horizontal clearance kept from walls
    pub avatar_radius: f32,
    /// Feet to head, used for ceiling sweeps
    pub avatar_height: f32,
    /// Height above the feet where movement sweeps start; lower ledges are stepped onto
    pub step_offset: f32,
    /// How far below the feet the client ground probe looks
    pub ground_probe_distance: f32,
    /// Minimum surface normal Y that counts as walkable ground
    pub min_ground_normal_y: f32,
    /// Separation kept from surfaces when a sweep stops short
    pub skin: f32,
}

impl MovementSettings {
    /// Closed-form takeoff velocity that reaches `jump_height` at the apex.
    pub fn jump_velocity(&self) -> f32 {
        (2.0 * self.gravity.abs() * self.jump_height.max(0.0)).sqrt()
    }
}

impl Default for MovementSettings {
    fn default() -> Self {
        Self {
            move_speed: 6.0,
            sprint_multiplier: 1.6,
            gravity: -9.81,
            jump_height: 1.2,
            coyote_time: 0.12,
            jump_buffer_time: 0.12,
            grounded_stick_velocity: -2.0,
            avatar_radius: 0.4,
            avatar_height: 1.8,
            step_offset: 0.3,
            ground_probe_distance: 0.15,
            // cos(50 degrees)
            min_ground_normal_y: 0.643,
            skin: 0.02,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_jump_velocity_matches_apex_height() {
        let settings = MovementSettings::default();
        assert!((settings.jump_velocity() - 4.852).abs() < 1e-3);
    }

    #[test]
    fn partial_settings_fall_back_to_defaults() {
        let settings: MovementSettings = serde_json::from_str(r#"{"move_speed": 9.0}"#).unwrap();
        assert_eq!(settings.move_speed, 9.0);
        assert_eq!(settings.gravity, MovementSettings::default().gravity);
    }
}
