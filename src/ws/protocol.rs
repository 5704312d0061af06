//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::movement::{Collider, MoveIntent, MovementSettings, Pose, Vec3};

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Latest movement intent, one per client frame
    Move {
        /// Monotonic per-connection sequence, older sequences are dropped
        seq: u32,
        /// Strafe axis (-1.0 = left, 1.0 = right)
        horizontal: f32,
        /// Forward axis (-1.0 = back, 1.0 = forward)
        vertical: f32,
        /// Facing in degrees
        yaw: f32,
        sprint: bool,
        /// True only on the frame the jump key went down
        jump: bool,
    },

    /// Ping for latency and clock offset measurement
    Ping {
        /// Client timestamp (milliseconds)
        t: u64,
    },

    /// Leave the world
    Leave,
}

impl ClientMsg {
    pub fn from_intent(seq: u32, intent: &MoveIntent) -> Self {
        Self::Move {
            seq,
            horizontal: intent.horizontal,
            vertical: intent.vertical,
            yaw: intent.yaw,
            sprint: intent.sprint,
            jump: intent.jump,
        }
    }
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// First message on a connection, after the avatar has been spawned
    Welcome {
        avatar_id: Uuid,
        /// Server simulation clock (seconds)
        server_time: f64,
        tick_rate_hz: u32,
        /// Replication passes per second; the expected gap between `AvatarState`s
        replication_rate_hz: u32,
        /// The avatar's spawn pose
        spawn: Pose,
        /// Tuning the client must predict with
        movement: MovementSettings,
        /// Static level geometry for local ground probing
        level: Vec<Collider>,
        /// Everyone else already in the world
        avatars: Vec<AvatarInfo>,
    },

    /// An avatar entered the world
    AvatarSpawned {
        avatar: AvatarInfo,
        server_time: f64,
    },

    /// An avatar left the world
    AvatarDespawned {
        avatar_id: Uuid,
        reason: String,
    },

    /// Authoritative pose change
    AvatarState {
        avatar_id: Uuid,
        position: Vec3,
        yaw: f32,
        /// Server simulation clock when this pose was produced (seconds)
        server_time: f64,
    },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
        server_time: f64,
    },

    /// Error message
    Error {
        code: String,
        message: String,
    },
}

/// Avatar info for join/spawn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvatarInfo {
    pub avatar_id: Uuid,
    pub display_name: String,
    pub pose: Pose,
}
