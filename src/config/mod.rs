//! Configuration module - environment variable parsing and gameplay tuning

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::game::bot::BotStrategyKind;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Tile map document (ground + decal grids)
    pub map_path: PathBuf,
    /// Persisted bot skill profiles
    pub skill_store_path: PathBuf,
    /// How often the skill store is written to disk
    pub skill_flush_interval: Duration,

    /// Number of bots spawned at startup
    pub bot_count: usize,
    /// Decision engine driving every bot
    pub bot_strategy: BotStrategyKind,
    /// Fixed simulation seed for reproducible runs
    pub world_seed: Option<u64>,

    /// Allowed client origins for CORS (empty = any)
    pub client_origins: Vec<String>,

    /// Gameplay constants
    pub tuning: GameTuning,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Hosted platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:9000".to_string())
        };

        let client_origins = env::var("CLIENT_ORIGIN")
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            map_path: env::var("MAP_PATH")
                .unwrap_or_else(|_| "assets/map.json".to_string())
                .into(),
            skill_store_path: env::var("SKILL_STORE_PATH")
                .unwrap_or_else(|_| "data/bot_learning.json".to_string())
                .into(),
            skill_flush_interval: flush_interval(parse_var("SKILL_FLUSH_SECS", 30)?)?,

            bot_count: parse_var("BOT_COUNT", 10)?,
            bot_strategy: parse_var("BOT_STRATEGY", BotStrategyKind::Basic)?,
            world_seed: env::var("WORLD_SEED")
                .ok()
                .map(|raw| raw.trim().parse().map_err(|_| ConfigError::Invalid("WORLD_SEED")))
                .transpose()?,

            client_origins,
            tuning: GameTuning::default(),
        })
    }
}

/// Parse an optional environment variable, falling back to `default` when unset
fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

/// Skill store flush period; zero would flush on every scheduler wakeup
fn flush_interval(secs: u64) -> Result<Duration, ConfigError> {
    if secs == 0 {
        return Err(ConfigError::Invalid("SKILL_FLUSH_SECS"));
    }
    Ok(Duration::from_secs(secs))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}

/// Gameplay constants shared by the simulation, the bots and the gateway.
///
/// Distances are world pixels, durations are milliseconds.
#[derive(Debug, Clone, Copy)]
pub struct GameTuning {
    /// Width and height of the square world
    pub map_size: f32,
    /// Edge length of one map tile
    pub tile_size: f32,
    /// Edge length of the square player hitbox
    pub player_size: f32,
    /// Simulation ticks per second
    pub tick_rate: u32,
    /// Distance moved per active direction per tick
    pub move_step: f32,

    /// Snowball displacement per nominal tick
    pub snowball_speed: f32,
    /// Snowball time-to-live at spawn
    pub snowball_lifetime_ms: f32,

    /// Bots only notice targets closer than this
    pub vision_radius: f32,
    /// Bots start winding up a throw inside this distance
    pub attack_radius: f32,
    /// Bots back away inside this distance
    pub evasion_radius: f32,
    /// Skill-gated bots circle their target inside this distance
    pub strafe_radius: f32,

    /// Pause between two throws of a basic bot
    pub bot_attack_cooldown_ms: f32,
    /// Aggression added per qualifying tick
    pub aggression_step: f32,
    /// Aggression needed before a basic bot throws
    pub aggression_threshold: f32,
    /// Evasion added per evading tick
    pub evasion_step: f32,
    /// Randomized wander re-heading window (min, max)
    pub wander_cooldown_ms: (f32, f32),
    /// Skill-gated bots re-pick their wander heading this often
    pub wander_period_ms: f32,

    /// Tries before giving up on finding a free spawn cell
    pub spawn_attempts: u32,
}

impl GameTuning {
    /// Nominal tick length; projectile displacement is normalized against it
    pub fn tick_ms(&self) -> f32 {
        1000.0 / self.tick_rate as f32
    }

    /// Fixed tick interval for the scheduler
    pub fn tick_interval(&self) -> Duration {
        Duration::from_micros(1_000_000 / self.tick_rate.max(1) as u64)
    }

    /// Largest coordinate an entity's top-left corner may take
    pub fn max_coord(&self) -> f32 {
        self.map_size - self.player_size
    }
}

impl Default for GameTuning {
    fn default() -> Self {
        Self {
            map_size: 3200.0,
            tile_size: 32.0,
            player_size: 32.0,
            tick_rate: 32,
            move_step: 10.0,
            snowball_speed: 11.0,
            snowball_lifetime_ms: 1000.0,
            vision_radius: 500.0,
            attack_radius: 350.0,
            evasion_radius: 200.0,
            strafe_radius: 400.0,
            bot_attack_cooldown_ms: 100.0,
            aggression_step: 0.1,
            aggression_threshold: 0.7,
            evasion_step: 0.05,
            wander_cooldown_ms: (500.0, 1500.0),
            wander_period_ms: 2000.0,
            spawn_attempts: 64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tuning_matches_arena() {
        let tuning = GameTuning::default();
        assert_eq!(tuning.max_coord(), 3168.0);
        assert!((tuning.tick_ms() - 31.25).abs() < f32::EPSILON);
        assert_eq!(tuning.tick_interval(), Duration::from_micros(31_250));
    }

    #[test]
    fn bot_strategy_parses_from_env_spelling() {
        assert_eq!(
            "skill_gated".parse::<BotStrategyKind>().ok(),
            Some(BotStrategyKind::SkillGated)
        );
        assert_eq!("basic".parse::<BotStrategyKind>().ok(), Some(BotStrategyKind::Basic));
        assert!("aggressive".parse::<BotStrategyKind>().is_err());
    }

    #[test]
    fn zero_flush_interval_is_rejected() {
        assert!(matches!(
            flush_interval(0),
            Err(ConfigError::Invalid("SKILL_FLUSH_SECS"))
        ));
        assert_eq!(flush_interval(30).unwrap(), Duration::from_secs(30));
    }
}
