//! WebSocket transport

pub mod handler;
pub mod protocol;

pub use handler::ws_handler;

use crate::game::JoinRejected;

/// Failures while running a WebSocket session
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("world task is not running")]
    WorldUnavailable,

    #[error("join rejected: {0}")]
    JoinRejected(#[from] JoinRejected),

    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("websocket send failed: {0}")]
    Send(String),
}
