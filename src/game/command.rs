//! Server side of the command channel
//!
//! Every avatar owns one [`CommandSlot`]. Incoming intents overwrite it (last write wins) and
//! the tick reads it exactly once. Nothing is queued.

use crate::movement::MoveIntent;

/// Latest intent received for one avatar.
#[derive(Debug, Clone, Default)]
pub struct CommandSlot {
    latest: MoveIntent,
    last_seq: Option<u32>,
    /// Jump edge received since the last tick consumed the slot
    pending_jump: bool,
    received: u64,
    dropped_stale: u64,
}

impl CommandSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer an intent. Returns false when `seq` is not newer than what the slot holds.
    ///
    /// The intent is clamped before it is stored.
    pub fn offer(&mut self, seq: u32, intent: MoveIntent) -> bool {
        if self.last_seq.is_some_and(|last| seq <= last) {
            self.dropped_stale += 1;
            return false;
        }

        let intent = intent.sanitized();
        self.last_seq = Some(seq);
        self.pending_jump |= intent.jump;
        self.latest = intent;
        self.received += 1;
        true
    }

    /// Take the intent for this tick.
    ///
    /// Axes, yaw and sprint repeat until overwritten. A jump edge is delivered once, even
    /// when a later intent in the same tick overwrote the frame that carried it.
    pub fn consume(&mut self) -> MoveIntent {
        let intent = MoveIntent {
            jump: self.pending_jump,
            ..self.latest
        };
        self.pending_jump = false;
        self.latest.jump = false;
        intent
    }

    pub fn last_seq(&self) -> Option<u32> {
        self.last_seq
    }

    pub fn received(&self) -> u64 {
        self.received
    }

    pub fn dropped_stale(&self) -> u64 {
        self.dropped_stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis(vertical: f32) -> MoveIntent {
        MoveIntent {
            vertical,
            ..MoveIntent::default()
        }
    }

    #[test]
    fn last_write_wins_within_a_tick() {
        let mut slot = CommandSlot::new();
        assert!(slot.offer(1, axis(0.2)));
        assert!(slot.offer(2, axis(0.4)));
        assert!(slot.offer(3, axis(1.0)));

        assert_eq!(slot.consume().vertical, 1.0);
        assert_eq!(slot.received(), 3);
    }

    #[test]
    fn stale_sequences_are_dropped() {
        let mut slot = CommandSlot::new();
        assert!(slot.offer(5, axis(1.0)));
        assert!(!slot.offer(4, axis(-1.0)));
        assert!(!slot.offer(5, axis(-1.0)));

        assert_eq!(slot.consume().vertical, 1.0);
        assert_eq!(slot.dropped_stale(), 2);
        assert_eq!(slot.last_seq(), Some(5));
    }

    #[test]
    fn silent_client_repeats_axes_but_not_jump() {
        let mut slot = CommandSlot::new();
        slot.offer(
            1,
            MoveIntent {
                jump: true,
                ..axis(1.0)
            },
        );

        let first = slot.consume();
        assert!(first.jump);
        let second = slot.consume();
        assert!(!second.jump);
        assert_eq!(second.vertical, 1.0);
    }

    #[test]
    fn jump_edge_survives_overwrite_in_same_tick() {
        let mut slot = CommandSlot::new();
        slot.offer(
            1,
            MoveIntent {
                jump: true,
                ..MoveIntent::default()
            },
        );
        slot.offer(2, axis(0.5));

        let intent = slot.consume();
        assert!(intent.jump);
        assert_eq!(intent.vertical, 0.5);
    }

    #[test]
    fn hostile_values_are_clamped_on_receipt() {
        let mut slot = CommandSlot::new();
        slot.offer(
            1,
            MoveIntent {
                horizontal: f32::NAN,
                vertical: 40.0,
                yaw: 720.5,
                ..MoveIntent::default()
            },
        );

        let intent = slot.consume();
        assert_eq!(intent.horizontal, 0.0);
        assert_eq!(intent.vertical, 1.0);
        assert!((intent.yaw - 0.5).abs() < 1e-3);
    }

    #[test]
    fn empty_slot_is_idle() {
        let mut slot = CommandSlot::new();
        assert_eq!(slot.consume(), MoveIntent::default());
    }
}
