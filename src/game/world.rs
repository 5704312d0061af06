//! World state and authoritative tick loop

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::interval;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::movement::{step, KinematicState, MoveIntent, MovementSettings, Pose, StaticWorld};
use crate::ws::protocol::{AvatarInfo, ClientMsg, ServerMsg};
use crate::ws::SessionError;

use super::replication::Replicator;
use super::spawn::SpawnPlanner;
use super::{CommandSlot, JoinAck, JoinRejected, WorldCommand, WorldInput};

/// Capacity of the session -> world command channel
const COMMAND_CHANNEL_CAPACITY: usize = 1024;
/// Capacity of the world -> sessions broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Tuning for one world instance
#[derive(Debug, Clone)]
pub struct WorldConfig {
    pub tick_rate_hz: u32,
    pub replication_rate_hz: u32,
    pub max_avatars: usize,
    pub seed: u64,
    pub movement: MovementSettings,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 30,
            replication_rate_hz: 20,
            max_avatars: 64,
            seed: 0x5EED,
            movement: MovementSettings::default(),
        }
    }
}

impl WorldConfig {
    pub fn tick_delta(&self) -> f32 {
        1.0 / self.tick_rate_hz.max(1) as f32
    }

    /// Wall-clock tick period, never shorter than a microsecond
    pub fn tick_duration(&self) -> Duration {
        Duration::from_micros((1_000_000 / u64::from(self.tick_rate_hz.max(1))).max(1))
    }
}

/// One avatar in the world (authoritative)
#[derive(Debug, Clone)]
pub struct AvatarRecord {
    pub id: Uuid,
    pub display_name: String,
    pub kinematic: KinematicState,
    pub command: CommandSlot,
}

impl AvatarRecord {
    pub fn info(&self) -> AvatarInfo {
        AvatarInfo {
            avatar_id: self.id,
            display_name: self.display_name.clone(),
            pose: self.kinematic.pose(),
        }
    }
}

/// Snapshot of world counters, readable from HTTP handlers
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WorldStats {
    pub tick: u64,
    pub server_time: f64,
    pub avatar_count: usize,
    pub sweep_faults: u64,
}

/// Handle to the running world
#[derive(Clone)]
pub struct WorldHandle {
    command_tx: mpsc::Sender<WorldCommand>,
    events_tx: broadcast::Sender<ServerMsg>,
    stats: Arc<RwLock<WorldStats>>,
}

impl WorldHandle {
    /// Receive every broadcast from now on
    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.events_tx.subscribe()
    }

    /// Spawn an avatar and wait for the world to acknowledge it
    pub async fn join(&self, avatar_id: Uuid, display_name: String) -> Result<JoinAck, SessionError> {
        let (reply, ack) = oneshot::channel();
        self.command_tx
            .send(WorldCommand::Join {
                avatar_id,
                display_name,
                reply,
            })
            .await
            .map_err(|_| SessionError::WorldUnavailable)?;

        let ack = ack.await.map_err(|_| SessionError::WorldUnavailable)?;
        Ok(ack?)
    }

    pub async fn send_input(&self, input: WorldInput) -> Result<(), SessionError> {
        self.command_tx
            .send(WorldCommand::Input(input))
            .await
            .map_err(|_| SessionError::WorldUnavailable)
    }

    pub fn stats(&self) -> WorldStats {
        *self.stats.read()
    }
}

/// Mutable world state (owned by the world task)
pub struct WorldState {
    pub tick: u64,
    pub avatars: HashMap<Uuid, AvatarRecord>,
    spawner: SpawnPlanner,
}

/// The authoritative world
pub struct GameWorld {
    config: WorldConfig,
    level: Arc<StaticWorld>,
    state: WorldState,
    command_rx: mpsc::Receiver<WorldCommand>,
    events_tx: broadcast::Sender<ServerMsg>,
    replicator: Replicator,
    stats: Arc<RwLock<WorldStats>>,
}

impl GameWorld {
    /// Create a new world
    pub fn new(config: WorldConfig, level: Arc<StaticWorld>) -> (Self, WorldHandle) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let stats = Arc::new(RwLock::new(WorldStats::default()));

        let handle = WorldHandle {
            command_tx,
            events_tx: events_tx.clone(),
            stats: stats.clone(),
        };

        let world = Self {
            state: WorldState {
                tick: 0,
                avatars: HashMap::new(),
                spawner: SpawnPlanner::new(config.seed),
            },
            replicator: Replicator::new(config.replication_rate_hz),
            config,
            level,
            command_rx,
            events_tx,
            stats,
        };

        (world, handle)
    }

    /// Run the authoritative tick loop until every handle is dropped
    pub async fn run(mut self) {
        info!(
            tick_rate_hz = self.config.tick_rate_hz,
            replication_rate_hz = self.config.replication_rate_hz,
            colliders = self.level.colliders().len(),
            "World started"
        );

        let tick_duration = self.config.tick_duration();
        let mut tick_interval = interval(tick_duration);
        tick_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tick_interval.tick().await;

            // Drain command queue
            if !self.process_commands() {
                info!(tick = self.state.tick, "All world handles dropped, stopping world");
                break;
            }

            self.run_tick();
        }
    }

    /// Apply every pending command. Returns false once no handle can send any more.
    fn process_commands(&mut self) -> bool {
        loop {
            match self.command_rx.try_recv() {
                Ok(command) => self.apply(command),
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Disconnected) => return false,
            }
        }
    }

    fn apply(&mut self, command: WorldCommand) {
        match command {
            WorldCommand::Join {
                avatar_id,
                display_name,
                reply,
            } => {
                let result = self.handle_join(avatar_id, display_name);
                let joined = result.is_ok();
                if reply.send(result).is_err() && joined {
                    debug!(avatar_id = %avatar_id, "Session gone before join ack");
                    self.remove_avatar(avatar_id, "abandoned");
                }
            }
            WorldCommand::Input(input) => self.handle_input(input),
        }
    }

    /// Handle avatar join request
    fn handle_join(&mut self, avatar_id: Uuid, display_name: String) -> Result<JoinAck, JoinRejected> {
        if self.state.avatars.contains_key(&avatar_id) {
            warn!(avatar_id = %avatar_id, "Avatar already in world");
            return Err(JoinRejected::AlreadyJoined);
        }

        if self.state.avatars.len() >= self.config.max_avatars {
            warn!(avatar_id = %avatar_id, max = self.config.max_avatars, "World full, rejecting join");
            return Err(JoinRejected::WorldFull {
                max: self.config.max_avatars,
            });
        }

        let (spawn, on_ground) = self
            .state
            .spawner
            .next_spawn(self.level.as_ref(), &self.config.movement);
        if !on_ground {
            warn!(avatar_id = %avatar_id, "No ground beneath spawn point, avatar will fall");
        }

        let mut kinematic = KinematicState::spawned_at(spawn.position, spawn.yaw);
        kinematic.grounded = on_ground;

        let others: Vec<AvatarInfo> = self.state.avatars.values().map(AvatarRecord::info).collect();

        let record = AvatarRecord {
            id: avatar_id,
            display_name,
            kinematic,
            command: CommandSlot::new(),
        };
        let info = record.info();
        self.state.avatars.insert(avatar_id, record);

        self.replicator.mark_sent(avatar_id, spawn);
        self.replicator.force_next();

        // Notify everyone of the new avatar
        let _ = self.events_tx.send(ServerMsg::AvatarSpawned {
            avatar: info.clone(),
            server_time: self.server_time(),
        });

        info!(
            avatar_id = %avatar_id,
            display_name = %info.display_name,
            x = spawn.position.x,
            y = spawn.position.y,
            z = spawn.position.z,
            avatar_count = self.state.avatars.len(),
            "Avatar joined world"
        );
        self.publish_stats();

        Ok(JoinAck {
            spawn,
            server_time: self.server_time(),
            tick_rate_hz: self.config.tick_rate_hz,
            replication_rate_hz: self.config.replication_rate_hz,
            movement: self.config.movement,
            level: self.level.colliders().to_vec(),
            others,
        })
    }

    /// Handle a forwarded client message
    fn handle_input(&mut self, input: WorldInput) {
        match input.msg {
            ClientMsg::Move {
                seq,
                horizontal,
                vertical,
                yaw,
                sprint,
                jump,
            } => {
                let Some(avatar) = self.state.avatars.get_mut(&input.avatar_id) else {
                    debug!(avatar_id = %input.avatar_id, "Move for unknown avatar");
                    return;
                };

                let intent = MoveIntent {
                    horizontal,
                    vertical,
                    yaw,
                    sprint,
                    jump,
                };
                if !avatar.command.offer(seq, intent) {
                    debug!(avatar_id = %input.avatar_id, seq, "Dropped stale move intent");
                }
            }
            ClientMsg::Ping { .. } => {
                // Sessions answer pings themselves
            }
            ClientMsg::Leave => {
                self.remove_avatar(input.avatar_id, "left");
            }
        }
    }

    fn remove_avatar(&mut self, avatar_id: Uuid, reason: &str) {
        if self.state.avatars.remove(&avatar_id).is_none() {
            return;
        }
        self.replicator.forget(&avatar_id);

        let _ = self.events_tx.send(ServerMsg::AvatarDespawned {
            avatar_id,
            reason: reason.to_string(),
        });

        info!(
            avatar_id = %avatar_id,
            reason,
            avatar_count = self.state.avatars.len(),
            "Avatar left world"
        );
        self.publish_stats();
    }

    /// Run a single simulation tick
    fn run_tick(&mut self) {
        let dt = self.config.tick_delta();
        let settings = &self.config.movement;
        let level = self.level.as_ref();
        let mut faults = 0u64;

        for avatar in self.state.avatars.values_mut() {
            let intent = avatar.command.consume();
            let before = avatar.kinematic.phase();
            let outcome = step(&avatar.kinematic, &intent, dt, settings, level);

            if outcome.sweep_faults > 0 {
                warn!(
                    avatar_id = %avatar.id,
                    tick = self.state.tick,
                    failed_sweeps = outcome.sweep_faults,
                    "Collision sweeps failed, treated as no collision"
                );
                faults += u64::from(outcome.sweep_faults);
            }
            if outcome.jumped {
                debug!(avatar_id = %avatar.id, tick = self.state.tick, "Jump");
            }
            let after = outcome.state.phase();
            if before != after {
                debug!(avatar_id = %avatar.id, tick = self.state.tick, ?before, ?after, "Phase change");
            }

            avatar.kinematic = outcome.state;
        }

        self.state.tick += 1;
        self.stats.write().sweep_faults += faults;

        if self.replicator.advance(dt) {
            self.replicate();
        }
        self.publish_stats();
    }

    /// Broadcast pose changes since the last replication pass
    fn replicate(&mut self) {
        let server_time = self.server_time();
        let poses: Vec<(Uuid, Pose)> = self
            .state
            .avatars
            .values()
            .map(|avatar| (avatar.id, avatar.kinematic.pose()))
            .collect();

        let changes = self
            .replicator
            .collect_changes(server_time, poses.iter().map(|(id, pose)| (*id, pose)));
        for msg in changes {
            // No subscribers is fine
            let _ = self.events_tx.send(msg);
        }
    }

    /// Server simulation clock (seconds)
    fn server_time(&self) -> f64 {
        self.state.tick as f64 / f64::from(self.config.tick_rate_hz.max(1))
    }

    fn publish_stats(&self) {
        let mut stats = self.stats.write();
        stats.tick = self.state.tick;
        stats.server_time = self.server_time();
        stats.avatar_count = self.state.avatars.len();
    }
}
