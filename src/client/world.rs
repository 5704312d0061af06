//! Client-side view of the world, driven by server messages

use std::collections::HashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::movement::{Pose, StaticWorld};
use crate::ws::protocol::{ClientMsg, ServerMsg};

use super::clock::ServerClock;
use super::input::{IntentSampler, RawInput};
use super::interpolation::{InterpolationSettings, RemoteAvatar, ReplicatedSnapshot};
use super::prediction::{PredictionEngine, ReconcileSettings};

/// The local avatar, present between `Welcome` and its despawn.
struct LocalAvatar {
    id: Uuid,
    engine: PredictionEngine,
    level: StaticWorld,
}

/// Output of one local frame.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalFrame {
    /// Where to draw the local avatar
    pub pose: Pose,
    /// Message to send to the server
    pub command: ClientMsg,
}

/// Everything one connected client knows about the world.
pub struct ClientWorld {
    local: Option<LocalAvatar>,
    remotes: HashMap<Uuid, RemoteAvatar>,
    names: HashMap<Uuid, String>,
    sampler: IntentSampler,
    clock: ServerClock,
    reconcile: ReconcileSettings,
    interpolation: InterpolationSettings,
}

impl ClientWorld {
    pub fn new(reconcile: ReconcileSettings, interpolation: InterpolationSettings) -> Self {
        Self {
            local: None,
            remotes: HashMap::new(),
            names: HashMap::new(),
            sampler: IntentSampler::new(),
            clock: ServerClock::new(),
            reconcile,
            interpolation,
        }
    }

    /// Apply one server message received at `client_now` (seconds, client clock).
    pub fn apply(&mut self, msg: ServerMsg, client_now: f64) {
        match msg {
            ServerMsg::Welcome {
                avatar_id,
                server_time,
                replication_rate_hz,
                spawn,
                movement,
                level,
                avatars,
                ..
            } => {
                info!(avatar_id = %avatar_id, others = avatars.len(), "Joined world");
                self.clock.sync(server_time, client_now);
                if replication_rate_hz > 0 {
                    self.interpolation.snapshot_interval = 1.0 / f64::from(replication_rate_hz);
                }
                self.sampler.reset();
                self.remotes.clear();
                self.names.clear();

                for avatar in avatars {
                    self.track_remote(avatar.avatar_id, avatar.display_name, avatar.pose);
                }
                self.local = Some(LocalAvatar {
                    id: avatar_id,
                    engine: PredictionEngine::new(spawn, movement, self.reconcile),
                    level: StaticWorld::new(level),
                });
            }
            ServerMsg::AvatarSpawned { avatar, .. } => {
                if self.is_local(&avatar.avatar_id) {
                    return;
                }
                self.track_remote(avatar.avatar_id, avatar.display_name, avatar.pose);
            }
            ServerMsg::AvatarDespawned { avatar_id, reason } => {
                if self.is_local(&avatar_id) {
                    info!(avatar_id = %avatar_id, %reason, "Local avatar despawned");
                    self.local = None;
                    return;
                }
                self.remotes.remove(&avatar_id);
                self.names.remove(&avatar_id);
            }
            ServerMsg::AvatarState {
                avatar_id,
                position,
                yaw,
                server_time,
            } => {
                if let Some(local) = self.local.as_mut().filter(|l| l.id == avatar_id) {
                    local
                        .engine
                        .on_authoritative(Pose::new(position, yaw), server_time);
                    return;
                }
                match self.remotes.get_mut(&avatar_id) {
                    Some(remote) => {
                        if !remote.push(ReplicatedSnapshot::new(position, yaw, server_time)) {
                            debug!(avatar_id = %avatar_id, server_time, "Dropped out-of-order snapshot");
                        }
                    }
                    None => debug!(avatar_id = %avatar_id, "State for unknown avatar"),
                }
            }
            ServerMsg::Pong { t, server_time } => {
                let sent_at = t as f64 / 1000.0;
                self.clock.observe_pong(sent_at, server_time, client_now);
            }
            ServerMsg::Error { code, message } => {
                warn!(%code, %message, "Server error");
            }
        }
    }

    /// Sample input, predict the local avatar and produce the command to send.
    ///
    /// `None` until `Welcome` has been applied.
    pub fn frame(&mut self, raw: &RawInput, dt: f32) -> Option<LocalFrame> {
        let local = self.local.as_mut()?;
        let sampled = self.sampler.sample(raw);
        let pose = local.engine.frame(&sampled.intent, dt, &local.level);
        Some(LocalFrame {
            pose,
            command: sampled.to_message(),
        })
    }

    /// Poses of every remote avatar at `client_now`.
    pub fn render_remotes(&mut self, client_now: f64) -> Vec<(Uuid, Pose)> {
        let Some(server_now) = self.clock.now(client_now) else {
            return Vec::new();
        };
        self.remotes
            .iter_mut()
            .map(|(id, remote)| (*id, remote.render(server_now)))
            .collect()
    }

    /// Ping to send for clock and latency estimation
    pub fn ping(&self, client_now: f64) -> ClientMsg {
        ClientMsg::Ping {
            t: (client_now.max(0.0) * 1000.0) as u64,
        }
    }

    pub fn local_id(&self) -> Option<Uuid> {
        self.local.as_ref().map(|l| l.id)
    }

    pub fn display_name(&self, avatar_id: &Uuid) -> Option<&str> {
        self.names.get(avatar_id).map(String::as_str)
    }

    pub fn remote_count(&self) -> usize {
        self.remotes.len()
    }

    pub fn clock(&self) -> &ServerClock {
        &self.clock
    }

    fn is_local(&self, avatar_id: &Uuid) -> bool {
        self.local.as_ref().is_some_and(|l| l.id == *avatar_id)
    }

    fn track_remote(&mut self, avatar_id: Uuid, display_name: String, pose: Pose) {
        self.names.insert(avatar_id, display_name);
        self.remotes
            .insert(avatar_id, RemoteAvatar::new(pose, &self.interpolation));
    }
}

impl Default for ClientWorld {
    fn default() -> Self {
        Self::new(ReconcileSettings::default(), InterpolationSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movement::{Collider, MovementSettings, Vec3};
    use crate::ws::protocol::AvatarInfo;

    fn welcome(local: Uuid, others: Vec<AvatarInfo>) -> ServerMsg {
        ServerMsg::Welcome {
            avatar_id: local,
            server_time: 10.0,
            tick_rate_hz: 30,
            replication_rate_hz: 20,
            spawn: Pose::new(Vec3::zeros(), 0.0),
            movement: MovementSettings::default(),
            level: vec![Collider::ground(0.0)],
            avatars: others,
        }
    }

    fn state(avatar_id: Uuid, x: f32, server_time: f64) -> ServerMsg {
        ServerMsg::AvatarState {
            avatar_id,
            position: Vec3::new(x, 0.0, 0.0),
            yaw: 0.0,
            server_time,
        }
    }

    #[test]
    fn no_frames_before_welcome() {
        let mut world = ClientWorld::default();
        assert!(world.frame(&RawInput::default(), 1.0 / 60.0).is_none());
        assert!(world.render_remotes(0.0).is_empty());
    }

    #[test]
    fn local_frame_predicts_and_emits_move() {
        let mut world = ClientWorld::default();
        let me = Uuid::new_v4();
        world.apply(welcome(me, Vec::new()), 0.0);

        let raw = RawInput {
            move_y: 1.0,
            ..RawInput::default()
        };
        let frame = world.frame(&raw, 0.5).unwrap();
        assert!((frame.pose.position.z - 3.0).abs() < 1e-3);
        assert!(matches!(frame.command, ClientMsg::Move { seq: 1, vertical, .. } if vertical == 1.0));
    }

    #[test]
    fn remotes_are_interpolated_in_server_time() {
        let mut world = ClientWorld::default();
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        world.apply(
            welcome(
                me,
                vec![AvatarInfo {
                    avatar_id: other,
                    display_name: "other".to_string(),
                    pose: Pose::new(Vec3::zeros(), 0.0),
                }],
            ),
            0.0,
        );
        assert_eq!(world.display_name(&other), Some("other"));

        world.apply(state(other, 0.0, 10.0), 0.0);
        world.apply(state(other, 1.0, 10.05), 0.05);

        // Client 0.125 -> server 10.125, rendered 100 ms behind
        let poses = world.render_remotes(0.125);
        assert_eq!(poses.len(), 1);
        assert!((poses[0].1.position.x - 0.5).abs() < 1e-3);

        // Idle for most of a second, then moving again: the rest is held until one
        // replication interval before the new snapshot
        world.apply(state(other, 2.0, 11.0), 1.0);
        let poses = world.render_remotes(1.0);
        assert!((poses[0].1.position.x - 1.0).abs() < 1e-3);
    }

    #[test]
    fn own_state_feeds_reconciliation_not_remotes() {
        let mut world = ClientWorld::default();
        let me = Uuid::new_v4();
        world.apply(welcome(me, Vec::new()), 0.0);
        world.apply(
            ServerMsg::AvatarSpawned {
                avatar: AvatarInfo {
                    avatar_id: me,
                    display_name: "me".to_string(),
                    pose: Pose::new(Vec3::zeros(), 0.0),
                },
                server_time: 10.0,
            },
            0.0,
        );
        world.apply(state(me, 10.0, 10.1), 0.1);

        assert_eq!(world.remote_count(), 0);
        let frame = world.frame(&RawInput::default(), 1.0 / 60.0).unwrap();
        // Beyond the snap distance
        assert_eq!(frame.pose.position.x, 10.0);
    }

    #[test]
    fn despawns_remove_avatars() {
        let mut world = ClientWorld::default();
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        world.apply(welcome(me, Vec::new()), 0.0);
        world.apply(
            ServerMsg::AvatarSpawned {
                avatar: AvatarInfo {
                    avatar_id: other,
                    display_name: "other".to_string(),
                    pose: Pose::new(Vec3::zeros(), 0.0),
                },
                server_time: 10.0,
            },
            0.0,
        );
        assert_eq!(world.remote_count(), 1);

        world.apply(
            ServerMsg::AvatarDespawned {
                avatar_id: other,
                reason: "left".to_string(),
            },
            1.0,
        );
        assert_eq!(world.remote_count(), 0);

        world.apply(
            ServerMsg::AvatarDespawned {
                avatar_id: me,
                reason: "left".to_string(),
            },
            1.0,
        );
        assert_eq!(world.local_id(), None);
    }

    #[test]
    fn ping_pong_updates_clock() {
        let mut world = ClientWorld::default();
        let ping = world.ping(1.0);
        let ClientMsg::Ping { t } = ping else {
            panic!("expected ping");
        };
        assert_eq!(t, 1000);

        world.apply(ServerMsg::Pong { t, server_time: 20.05 }, 1.1);
        let now = world.clock().now(1.1).unwrap();
        assert!((now - 20.1).abs() < 1e-6);
    }
}
