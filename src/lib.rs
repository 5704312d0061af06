//! Avatar Sync - authoritative avatar movement with client prediction
//!
//! - `movement`: the kinematic step shared by server and client
//! - `game`: the server world loop, command slots and replication
//! - `client`: prediction, reconciliation and remote interpolation
//! - `ws` / `http`: the network surface of the server binary

pub mod app;
pub mod client;
pub mod config;
pub mod game;
pub mod http;
pub mod movement;
pub mod util;
pub mod ws;
