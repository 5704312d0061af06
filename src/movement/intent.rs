//! Per-frame movement intent produced by the controlling client

use serde::{Deserialize, Serialize};

use super::angles::normalize_yaw;

/// One frame of player movement input.
///
/// `jump` is an edge: it is only true on the frame the jump key went down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MoveIntent {
    /// Strafe axis (-1.0 = left, 1.0 = right)
    pub horizontal: f32,
    /// Forward axis (-1.0 = back, 1.0 = forward)
    pub vertical: f32,
    /// Facing in degrees, [0, 360)
    pub yaw: f32,
    pub sprint: bool,
    pub jump: bool,
}

impl MoveIntent {
    /// No movement, facing `yaw`.
    pub fn idle(yaw: f32) -> Self {
        Self {
            yaw: normalize_yaw(yaw),
            ..Self::default()
        }
    }

    /// Clamp every field into its legal range.
    ///
    /// Non-finite axes become 0, axes are clamped to [-1, 1] and yaw is wrapped into [0, 360).
    /// Never fails: a hostile or corrupted intent degrades to a harmless one.
    pub fn sanitized(self) -> Self {
        Self {
            horizontal: clamp_axis(self.horizontal),
            vertical: clamp_axis(self.vertical),
            yaw: normalize_yaw(self.yaw),
            sprint: self.sprint,
            jump: self.jump,
        }
    }
}

fn clamp_axis(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}
