//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use crate::game::WorldConfig;
use crate::movement::{Collider, MovementSettings, StaticWorld};

/// Highest accepted tick or replication rate
pub const MAX_RATE_HZ: u32 = 1000;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origins for CORS (comma-separated); any origin when unset
    pub client_origin: Option<String>,

    /// Simulation ticks per second
    pub tick_rate_hz: u32,
    /// Replication passes per second
    pub replication_rate_hz: u32,
    /// Max client messages per second per session
    pub input_rate_limit: u32,
    pub max_avatars: usize,
    /// Seed for spawn placement
    pub world_seed: u64,
    /// JSON list of colliders; the built-in level when unset
    pub level_path: Option<PathBuf>,

    pub movement: MovementSettings,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Render provides PORT env var, fall back to SERVER_ADDR or default
        let server_addr = match lookup("PORT") {
            Some(port) => format!("0.0.0.0:{}", port),
            None => lookup("SERVER_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
        };

        let defaults = MovementSettings::default();
        let movement = MovementSettings {
            move_speed: parse_or(&lookup, "MOVE_SPEED", defaults.move_speed)?,
            sprint_multiplier: parse_or(&lookup, "SPRINT_MULTIPLIER", defaults.sprint_multiplier)?,
            gravity: parse_or(&lookup, "GRAVITY", defaults.gravity)?,
            jump_height: parse_or(&lookup, "JUMP_HEIGHT", defaults.jump_height)?,
            coyote_time: parse_or(&lookup, "COYOTE_TIME", defaults.coyote_time)?,
            jump_buffer_time: parse_or(&lookup, "JUMP_BUFFER_TIME", defaults.jump_buffer_time)?,
            grounded_stick_velocity: parse_or(
                &lookup,
                "GROUNDED_STICK_VELOCITY",
                defaults.grounded_stick_velocity,
            )?,
            ..defaults
        };

        let tick_rate_hz = parse_or(&lookup, "TICK_RATE_HZ", 30u32)?;
        if !(1..=MAX_RATE_HZ).contains(&tick_rate_hz) {
            return Err(ConfigError::Invalid("TICK_RATE_HZ"));
        }
        let replication_rate_hz = parse_or(&lookup, "REPLICATION_RATE_HZ", 20u32)?;
        if !(1..=MAX_RATE_HZ).contains(&replication_rate_hz) {
            return Err(ConfigError::Invalid("REPLICATION_RATE_HZ"));
        }

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            client_origin: lookup("CLIENT_ORIGIN").filter(|origins| !origins.trim().is_empty()),
            tick_rate_hz,
            replication_rate_hz,
            input_rate_limit: parse_or(&lookup, "INPUT_RATE_LIMIT", 120u32)?,
            max_avatars: parse_or(&lookup, "MAX_AVATARS", 64usize)?,
            world_seed: parse_seed(lookup("WORLD_SEED"))?,
            level_path: lookup("LEVEL_PATH").map(PathBuf::from),
            movement,
        })
    }

    /// World tuning derived from this configuration
    pub fn world_config(&self) -> WorldConfig {
        WorldConfig {
            tick_rate_hz: self.tick_rate_hz,
            replication_rate_hz: self.replication_rate_hz,
            max_avatars: self.max_avatars,
            seed: self.world_seed,
            movement: self.movement,
        }
    }

    /// Load the level geometry, falling back to the built-in level
    pub fn load_level(&self) -> Result<StaticWorld, ConfigError> {
        let Some(path) = &self.level_path else {
            return Ok(StaticWorld::default_level());
        };

        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::LevelRead {
            path: path.clone(),
            source,
        })?;
        let colliders: Vec<Collider> =
            serde_json::from_str(&raw).map_err(|source| ConfigError::LevelParse {
                path: path.clone(),
                source,
            })?;
        Ok(StaticWorld::new(colliders))
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

/// Decimal or 0x-prefixed hex
fn parse_seed(raw: Option<String>) -> Result<u64, ConfigError> {
    let Some(raw) = raw else {
        return Ok(0x5EED);
    };
    let raw = raw.trim();
    let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => raw.parse(),
    };
    parsed.map_err(|_| ConfigError::Invalid("WORLD_SEED"))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Failed to read level file {path:?}: {source}")]
    LevelRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse level file {path:?}: {source}")]
    LevelParse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.server_addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.log_level, "info");
        assert_eq!(config.client_origin, None);
        assert_eq!(config.tick_rate_hz, 30);
        assert_eq!(config.replication_rate_hz, 20);
        assert_eq!(config.input_rate_limit, 120);
        assert_eq!(config.max_avatars, 64);
        assert_eq!(config.world_seed, 0x5EED);
        assert_eq!(config.movement, MovementSettings::default());
    }

    #[test]
    fn port_wins_over_server_addr() {
        let config = config_from(&[("PORT", "9000"), ("SERVER_ADDR", "127.0.0.1:1")]).unwrap();
        assert_eq!(config.server_addr.port(), 9000);
    }

    #[test]
    fn movement_overrides_apply() {
        let config = config_from(&[("MOVE_SPEED", "8.5"), ("GRAVITY", "-20"), ("WORLD_SEED", "0xff")])
            .unwrap();
        assert_eq!(config.movement.move_speed, 8.5);
        assert_eq!(config.movement.gravity, -20.0);
        assert_eq!(config.movement.jump_height, 1.2);
        assert_eq!(config.world_seed, 255);
    }

    #[test]
    fn bad_values_are_reported_by_key() {
        assert!(matches!(
            config_from(&[("TICK_RATE_HZ", "fast")]),
            Err(ConfigError::Invalid("TICK_RATE_HZ"))
        ));
        assert!(matches!(
            config_from(&[("TICK_RATE_HZ", "0")]),
            Err(ConfigError::Invalid("TICK_RATE_HZ"))
        ));
        assert!(matches!(
            config_from(&[("TICK_RATE_HZ", "2000000")]),
            Err(ConfigError::Invalid("TICK_RATE_HZ"))
        ));
        assert!(matches!(
            config_from(&[("REPLICATION_RATE_HZ", "1001")]),
            Err(ConfigError::Invalid("REPLICATION_RATE_HZ"))
        ));
        assert_eq!(
            config_from(&[("TICK_RATE_HZ", "1000")]).unwrap().tick_rate_hz,
            MAX_RATE_HZ
        );
        assert!(matches!(
            config_from(&[("SERVER_ADDR", "nowhere")]),
            Err(ConfigError::InvalidAddress)
        ));
    }

    #[test]
    fn missing_level_file_is_an_error() {
        let config = config_from(&[("LEVEL_PATH", "/definitely/not/here.json")]).unwrap();
        assert!(matches!(config.load_level(), Err(ConfigError::LevelRead { .. })));
    }

    #[test]
    fn default_level_without_path() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.load_level().unwrap(), StaticWorld::default_level());
    }
}
