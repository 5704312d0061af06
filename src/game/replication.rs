//! Throttled replication of authoritative poses

use std::collections::HashMap;
use uuid::Uuid;

use crate::movement::{angles::shortest_delta, Pose};
use crate::ws::protocol::ServerMsg;

/// Position change (meters) below which a pose counts as unchanged.
pub const POSITION_EPSILON: f32 = 1.0e-4;
/// Yaw change (degrees) below which a pose counts as unchanged.
pub const YAW_EPSILON: f32 = 1.0e-2;

/// Decides when a replication pass is due and which avatars changed since the last one.
pub struct Replicator {
    /// Seconds between passes
    interval: f32,
    /// Time accumulated since the last pass
    accumulator: f32,
    /// Last pose sent per avatar
    last_sent: HashMap<Uuid, Pose>,
}

impl Replicator {
    /// New replicator sending at most `rate_hz` passes per second.
    pub fn new(rate_hz: u32) -> Self {
        let interval = 1.0 / rate_hz.max(1) as f32;
        Self {
            interval,
            // First tick always replicates
            accumulator: interval,
            last_sent: HashMap::new(),
        }
    }

    /// Advance the throttle by one tick of `dt` seconds. Returns true when a pass is due.
    pub fn advance(&mut self, dt: f32) -> bool {
        self.accumulator += dt.max(0.0);
        if self.accumulator + f32::EPSILON >= self.interval {
            // Keep the remainder so the long-run rate holds, but never bank more than one pass
            self.accumulator = (self.accumulator - self.interval).min(self.interval);
            true
        } else {
            false
        }
    }

    /// Force a pass on the next tick (used after joins so newcomers settle quickly)
    pub fn force_next(&mut self) {
        self.accumulator = self.interval;
    }

    /// One `AvatarState` per avatar whose pose changed since it was last sent.
    ///
    /// Sent poses are remembered, so an unchanged avatar produces nothing on later passes.
    pub fn collect_changes<'a>(
        &mut self,
        server_time: f64,
        poses: impl IntoIterator<Item = (Uuid, &'a Pose)>,
    ) -> Vec<ServerMsg> {
        let mut changes = Vec::new();

        for (avatar_id, pose) in poses {
            let changed = match self.last_sent.get(&avatar_id) {
                Some(prev) => pose_changed(prev, pose),
                None => true,
            };
            if !changed {
                continue;
            }

            self.last_sent.insert(avatar_id, *pose);
            changes.push(ServerMsg::AvatarState {
                avatar_id,
                position: pose.position,
                yaw: pose.yaw,
                server_time,
            });
        }

        changes
    }

    /// Record `pose` as already known to every observer (spawn announcements carry it).
    pub fn mark_sent(&mut self, avatar_id: Uuid, pose: Pose) {
        self.last_sent.insert(avatar_id, pose);
    }

    pub fn forget(&mut self, avatar_id: &Uuid) {
        self.last_sent.remove(avatar_id);
    }

    pub fn interval(&self) -> f32 {
        self.interval
    }
}

fn pose_changed(prev: &Pose, next: &Pose) -> bool {
    (next.position - prev.position).norm() > POSITION_EPSILON
        || shortest_delta(prev.yaw, next.yaw).abs() > YAW_EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movement::Vec3;

    fn pose(z: f32, yaw: f32) -> Pose {
        Pose::new(Vec3::new(0.0, 0.0, z), yaw)
    }

    #[test]
    fn throttles_to_configured_rate() {
        // 30 Hz ticks, 20 Hz replication
        let mut replicator = Replicator::new(20);
        let dt = 1.0 / 30.0;
        let passes = (0..30).filter(|_| replicator.advance(dt)).count();
        assert!((19..=21).contains(&passes), "got {passes} passes");
    }

    #[test]
    fn replication_rate_above_tick_rate_sends_every_tick() {
        let mut replicator = Replicator::new(60);
        assert!((0..10).all(|_| replicator.advance(1.0 / 30.0)));
    }

    #[test]
    fn unchanged_poses_are_not_resent() {
        let mut replicator = Replicator::new(20);
        let id = Uuid::new_v4();
        let p = pose(1.0, 90.0);

        assert_eq!(replicator.collect_changes(0.05, [(id, &p)]).len(), 1);
        assert!(replicator.collect_changes(0.10, [(id, &p)]).is_empty());

        let moved = pose(1.5, 90.0);
        let changes = replicator.collect_changes(0.15, [(id, &moved)]);
        assert_eq!(
            changes,
            vec![ServerMsg::AvatarState {
                avatar_id: id,
                position: moved.position,
                yaw: 90.0,
                server_time: 0.15,
            }]
        );
    }

    #[test]
    fn yaw_change_across_wrap_is_detected() {
        let mut replicator = Replicator::new(20);
        let id = Uuid::new_v4();
        replicator.mark_sent(id, pose(0.0, 359.5));

        assert_eq!(replicator.collect_changes(0.1, [(id, &pose(0.0, 0.5))]).len(), 1);
    }

    #[test]
    fn forgotten_avatars_are_sent_again() {
        let mut replicator = Replicator::new(20);
        let id = Uuid::new_v4();
        let p = pose(2.0, 0.0);
        replicator.mark_sent(id, p);
        assert!(replicator.collect_changes(0.1, [(id, &p)]).is_empty());

        replicator.forget(&id);
        assert_eq!(replicator.collect_changes(0.2, [(id, &p)]).len(), 1);
    }
}
