//! Authoritative world simulation

pub mod command;
pub mod replication;
pub mod spawn;
pub mod world;

pub use command::CommandSlot;
pub use replication::Replicator;
pub use spawn::SpawnPlanner;
pub use world::{AvatarRecord, GameWorld, WorldConfig, WorldHandle, WorldStats};

use tokio::sync::oneshot;
use uuid::Uuid;

use crate::movement::{Collider, MovementSettings, Pose};
use crate::ws::protocol::{AvatarInfo, ClientMsg, ServerMsg};

/// Client message received from a WebSocket session
#[derive(Debug, Clone)]
pub struct WorldInput {
    pub avatar_id: Uuid,
    pub msg: ClientMsg,
    pub received_at: u64,
}

/// Everything a session can ask of the world task
#[derive(Debug)]
pub enum WorldCommand {
    /// Spawn a new avatar; the world answers on `reply`
    Join {
        avatar_id: Uuid,
        display_name: String,
        reply: oneshot::Sender<Result<JoinAck, JoinRejected>>,
    },
    Input(WorldInput),
}

/// Everything a freshly joined session needs to start predicting
#[derive(Debug, Clone)]
pub struct JoinAck {
    pub spawn: Pose,
    pub server_time: f64,
    pub tick_rate_hz: u32,
    pub replication_rate_hz: u32,
    pub movement: MovementSettings,
    pub level: Vec<Collider>,
    /// Avatars already in the world, excluding the new one
    pub others: Vec<AvatarInfo>,
}

impl JoinAck {
    pub fn into_welcome(self, avatar_id: Uuid) -> ServerMsg {
        ServerMsg::Welcome {
            avatar_id,
            server_time: self.server_time,
            tick_rate_hz: self.tick_rate_hz,
            replication_rate_hz: self.replication_rate_hz,
            spawn: self.spawn,
            movement: self.movement,
            level: self.level,
            avatars: self.others,
        }
    }
}

/// Why the world refused a join
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JoinRejected {
    #[error("world is full ({max} avatars)")]
    WorldFull { max: usize },

    #[error("avatar already in world")]
    AlreadyJoined,
}

impl JoinRejected {
    /// Machine-readable code sent to the client
    pub fn code(&self) -> &'static str {
        match self {
            JoinRejected::WorldFull { .. } => "world_full",
            JoinRejected::AlreadyJoined => "already_joined",
        }
    }
}
