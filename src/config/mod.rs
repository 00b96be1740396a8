//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::game::GameTuning;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Chat channel the overlay runs in (its owner is the broadcaster)
    pub channel: String,
    /// Shared secret the chat bridge must present on /ws (unset = open)
    pub bridge_token: Option<String>,
    /// Allowed CORS origins, comma-separated (unset = any)
    pub client_origin: Option<String>,

    /// File holding the persisted scoreboard
    pub scores_path: PathBuf,
    /// Directory the character sprites live under
    pub asset_root: PathBuf,
    /// Item catalog describing the available characters
    pub catalog_path: PathBuf,
    /// Theme used to pick pads, parachutes and characters
    pub theme: String,

    /// Per-user per-command cooldown for unprivileged chatters
    pub command_cooldown: Duration,

    /// Gameplay tuning (gravity, play area, round timeout, ...)
    pub tuning: GameTuning,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let asset_root =
            PathBuf::from(env::var("ASSET_ROOT").unwrap_or_else(|_| "./assets".to_string()));
        let catalog_path = env::var("CATALOG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| asset_root.join("catalog.json"));

        let defaults = GameTuning::default();
        let tuning = GameTuning {
            screen_width: parse_or("SCREEN_WIDTH", defaults.screen_width)?,
            screen_height: parse_or("SCREEN_HEIGHT", defaults.screen_height)?,
            gravity: parse_or("GRAVITY", defaults.gravity)?,
            chute_gravity: parse_or("GRAVITY_CHUTE", defaults.chute_gravity)?,
            max_velocity: parse_or("MAX_VELOCITY", defaults.max_velocity)?,
            end_wait: Duration::from_secs(parse_or("WAIT_FOR_RESET", defaults.end_wait.as_secs())?),
            character_chance: parse_or("CHARACTER_CHANCE", defaults.character_chance)?,
            ..defaults
        };
        validate_tuning(&tuning)?;

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),

            channel: env::var("CHANNEL").map_err(|_| ConfigError::Missing("CHANNEL"))?,
            bridge_token: env::var("BRIDGE_TOKEN").ok().filter(|t| !t.is_empty()),
            client_origin: env::var("CLIENT_ORIGIN").ok().filter(|o| !o.trim().is_empty()),

            scores_path: PathBuf::from(
                env::var("SCORES_PATH").unwrap_or_else(|_| "scores.json".to_string()),
            ),
            asset_root,
            catalog_path,
            theme: env::var("THEME")
                .map(|t| t.trim().to_lowercase())
                .unwrap_or_else(|_| "base".to_string()),

            command_cooldown: Duration::from_millis(parse_or("COMMAND_COOLDOWN_MS", 3000u64)?),

            tuning,
        })
    }
}

/// Read an optional numeric variable, keeping the default when it is unset
fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

/// Longest quiet period a round may wait before ending itself
const MAX_END_WAIT: Duration = Duration::from_secs(24 * 60 * 60);

/// Reject tuning values the round cannot run with
fn validate_tuning(tuning: &GameTuning) -> Result<(), ConfigError> {
    let positive = [
        ("SCREEN_WIDTH", tuning.screen_width),
        ("SCREEN_HEIGHT", tuning.screen_height),
    ];
    for (name, value) in positive {
        if !value.is_finite() || value <= 0.0 {
            return Err(ConfigError::Invalid(name));
        }
    }

    let non_negative = [
        ("GRAVITY", tuning.gravity),
        ("GRAVITY_CHUTE", tuning.chute_gravity),
        ("MAX_VELOCITY", tuning.max_velocity),
    ];
    for (name, value) in non_negative {
        if !value.is_finite() || value < 0.0 {
            return Err(ConfigError::Invalid(name));
        }
    }

    if !(0.0..=1.0).contains(&tuning.character_chance) {
        return Err(ConfigError::Invalid("CHARACTER_CHANCE"));
    }
    if tuning.end_wait > MAX_END_WAIT {
        return Err(ConfigError::Invalid("WAIT_FOR_RESET"));
    }
    Ok(())
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_or_keeps_the_default_when_unset() {
        env::remove_var("DROP_TEST_UNSET");
        assert_eq!(parse_or("DROP_TEST_UNSET", 42u64).unwrap(), 42);
    }

    #[test]
    fn parse_or_reads_and_trims() {
        env::set_var("DROP_TEST_NUMBER", " 1280 ");
        assert_eq!(parse_or("DROP_TEST_NUMBER", 0.0f32).unwrap(), 1280.0);
    }

    #[test]
    fn parse_or_names_the_bad_variable() {
        env::set_var("DROP_TEST_GARBAGE", "fast");
        assert!(matches!(
            parse_or("DROP_TEST_GARBAGE", 600.0f32),
            Err(ConfigError::Invalid("DROP_TEST_GARBAGE"))
        ));
    }

    #[test]
    fn default_tuning_is_valid() {
        assert!(validate_tuning(&GameTuning::default()).is_ok());
    }

    #[test]
    fn unusable_tuning_is_rejected() {
        let defaults = GameTuning::default();
        let cases = [
            (GameTuning { max_velocity: -5.0, ..defaults }, "MAX_VELOCITY"),
            (GameTuning { gravity: f32::NAN, ..defaults }, "GRAVITY"),
            (GameTuning { chute_gravity: f32::INFINITY, ..defaults }, "GRAVITY_CHUTE"),
            (GameTuning { screen_width: 0.0, ..defaults }, "SCREEN_WIDTH"),
            (GameTuning { screen_height: -1080.0, ..defaults }, "SCREEN_HEIGHT"),
            (GameTuning { character_chance: 1.5, ..defaults }, "CHARACTER_CHANCE"),
            (GameTuning { character_chance: f64::NAN, ..defaults }, "CHARACTER_CHANCE"),
            (
                GameTuning {
                    end_wait: Duration::from_secs(u64::MAX),
                    ..defaults
                },
                "WAIT_FOR_RESET",
            ),
        ];

        for (tuning, name) in cases {
            match validate_tuning(&tuning) {
                Err(ConfigError::Invalid(bad)) => assert_eq!(bad, name),
                other => panic!("{name}: expected Invalid, got {:?}", other),
            }
        }
    }
}
