//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::util::rate_limit::DEFAULT_INPUT_RATE_LIMIT;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit logs as JSON lines instead of the human-readable format
    pub log_json: bool,
    /// Allowed client origins for CORS (empty = any origin)
    pub client_origins: Vec<String>,
    /// Max inbound WebSocket messages per connection per second
    pub input_rate_limit: u32,
    /// Rules for the authoritative session
    pub session: SessionConfig,
}

/// Tunables for the authoritative game session
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Players idle longer than this are evicted
    pub inactivity_timeout_ms: u64,
    /// How often the inactivity sweep runs
    pub sweep_interval_ms: u64,
    /// How often the scoreboard snapshot is broadcast
    pub snapshot_interval_ms: u64,
    /// Max distance a single movement update may cover (0 disables the check)
    pub max_move_delta: f32,
    /// Accept the legacy direct `damage` message
    pub legacy_damage_enabled: bool,
    /// Hit-test against rewound target poses
    pub lag_compensation_enabled: bool,
    /// How far back targets are rewound when lag compensation is on
    pub lag_rewind_ms: u64,
    /// Team kills needed to win a team match
    pub team_score_limit: u32,
    /// Team match length, measured from the first counted kill
    pub team_time_limit_secs: u64,
    /// Fixed RNG seed for reproducible sessions
    pub rng_seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            inactivity_timeout_ms: 300_000,
            sweep_interval_ms: 5_000,
            snapshot_interval_ms: 5_000,
            max_move_delta: 250.0,
            legacy_damage_enabled: true,
            lag_compensation_enabled: false,
            lag_rewind_ms: 100,
            team_score_limit: 50,
            team_time_limit_secs: 600,
            rng_seed: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Hosting platforms provide PORT, fall back to SERVER_ADDR or default
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let defaults = SessionConfig::default();
        let session = SessionConfig {
            inactivity_timeout_ms: parse_or("INACTIVITY_TIMEOUT_MS", defaults.inactivity_timeout_ms)?,
            sweep_interval_ms: parse_or("SWEEP_INTERVAL_MS", defaults.sweep_interval_ms)?,
            snapshot_interval_ms: parse_or("SNAPSHOT_INTERVAL_MS", defaults.snapshot_interval_ms)?,
            max_move_delta: parse_or("MAX_MOVE_DELTA", defaults.max_move_delta)?,
            legacy_damage_enabled: parse_or("LEGACY_DAMAGE_ENABLED", defaults.legacy_damage_enabled)?,
            lag_compensation_enabled: parse_or(
                "LAG_COMPENSATION_ENABLED",
                defaults.lag_compensation_enabled,
            )?,
            lag_rewind_ms: parse_or("LAG_REWIND_MS", defaults.lag_rewind_ms)?,
            team_score_limit: parse_or("TEAM_SCORE_LIMIT", defaults.team_score_limit)?,
            team_time_limit_secs: parse_or("TEAM_TIME_LIMIT_SECS", defaults.team_time_limit_secs)?,
            rng_seed: parse_opt("RNG_SEED")?,
        };

        if session.sweep_interval_ms == 0 {
            return Err(ConfigError::Invalid("SWEEP_INTERVAL_MS"));
        }
        if session.snapshot_interval_ms == 0 {
            return Err(ConfigError::Invalid("SNAPSHOT_INTERVAL_MS"));
        }

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_json: env::var("LOG_FORMAT")
                .map(|f| f.eq_ignore_ascii_case("json"))
                .unwrap_or(false),

            client_origins: env::var("CLIENT_ORIGIN")
                .map(|v| split_origins(&v))
                .unwrap_or_default(),

            input_rate_limit: parse_or("INPUT_RATE_LIMIT", DEFAULT_INPUT_RATE_LIMIT)?,
            session,
        })
    }
}

/// Parse an optional variable, falling back to `default` when unset
fn parse_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    Ok(parse_opt(key)?.unwrap_or(default))
}

fn parse_opt<T: FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid(key)),
        Err(_) => Ok(None),
    }
}

/// Comma-separated origin list; blank entries are dropped
fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_list_skips_blanks() {
        let origins = split_origins("https://a.example, ,https://b.example,");
        assert_eq!(origins, vec!["https://a.example", "https://b.example"]);
    }

    #[test]
    fn session_defaults_follow_reference_cadence() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.inactivity_timeout_ms, 300_000);
        assert_eq!(cfg.sweep_interval_ms, 5_000);
        assert_eq!(cfg.snapshot_interval_ms, 5_000);
        assert!(cfg.legacy_damage_enabled);
        assert!(!cfg.lag_compensation_enabled);
    }

    #[test]
    fn unparsable_value_names_the_variable() {
        env::set_var("ARENA_TEST_BAD_NUMBER", "twelve");
        let err = parse_or::<u64>("ARENA_TEST_BAD_NUMBER", 5).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid("ARENA_TEST_BAD_NUMBER")));
        env::remove_var("ARENA_TEST_BAD_NUMBER");
    }

    #[test]
    fn unset_value_uses_default() {
        let value = parse_or::<u32>("ARENA_TEST_UNSET_VALUE", 42).unwrap();
        assert_eq!(value, 42);
    }
}
