//! Raw device input to movement intents

use crate::movement::MoveIntent;
use crate::ws::protocol::ClientMsg;

/// Device state for one frame, as levels (key held or not).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RawInput {
    /// Strafe axis, right positive
    pub move_x: f32,
    /// Forward axis, forward positive
    pub move_y: f32,
    /// Camera/character facing (degrees)
    pub yaw: f32,
    pub sprint_held: bool,
    pub jump_held: bool,
}

/// Intent for one frame with its command-channel sequence number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampledIntent {
    pub seq: u32,
    pub intent: MoveIntent,
}

impl SampledIntent {
    pub fn to_message(&self) -> ClientMsg {
        ClientMsg::from_intent(self.seq, &self.intent)
    }
}

/// Turns per-frame device levels into intents with a jump edge and a sequence number.
#[derive(Debug, Default)]
pub struct IntentSampler {
    next_seq: u32,
    jump_was_held: bool,
}

impl IntentSampler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sample(&mut self, raw: &RawInput) -> SampledIntent {
        let jump = raw.jump_held && !self.jump_was_held;
        self.jump_was_held = raw.jump_held;

        self.next_seq = self.next_seq.wrapping_add(1);
        SampledIntent {
            seq: self.next_seq,
            intent: MoveIntent {
                horizontal: raw.move_x,
                vertical: raw.move_y,
                yaw: raw.yaw,
                sprint: raw.sprint_held,
                jump,
            }
            .sanitized(),
        }
    }

    /// Forget held keys, e.g. after a reconnect
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jump_is_an_edge() {
        let mut sampler = IntentSampler::new();
        let held = RawInput {
            jump_held: true,
            ..RawInput::default()
        };

        assert!(sampler.sample(&held).intent.jump);
        assert!(!sampler.sample(&held).intent.jump);
        assert!(!sampler.sample(&RawInput::default()).intent.jump);
        assert!(sampler.sample(&held).intent.jump);
    }

    #[test]
    fn sequence_increases_per_frame() {
        let mut sampler = IntentSampler::new();
        let a = sampler.sample(&RawInput::default());
        let b = sampler.sample(&RawInput::default());
        assert_eq!(a.seq, 1);
        assert_eq!(b.seq, 2);
    }

    #[test]
    fn raw_values_are_clamped_and_wrapped() {
        let mut sampler = IntentSampler::new();
        let sampled = sampler.sample(&RawInput {
            move_x: 3.0,
            move_y: f32::INFINITY,
            yaw: -90.0,
            sprint_held: true,
            jump_held: false,
        });
        assert_eq!(sampled.intent.horizontal, 1.0);
        assert_eq!(sampled.intent.vertical, 0.0);
        assert!((sampled.intent.yaw - 270.0).abs() < 1e-4);
        assert!(sampled.intent.sprint);

        match sampled.to_message() {
            ClientMsg::Move { seq, sprint, .. } => {
                assert_eq!(seq, 1);
                assert!(sprint);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
