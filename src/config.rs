use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub enable_file_logs: bool,
    pub log_dir: String,
    pub cors_origin: String,
    pub lessons_path: Option<String>,
    pub max_sessions: usize,
    /// Sessions untouched for this long are evicted.
    pub session_idle_secs: u64,
    pub engine: EngineEnvConfig,
}

/// Engine settings from the environment. Unset values leave the file or default config alone.
#[derive(Debug, Clone, Default)]
pub struct EngineEnvConfig {
    pub config_path: Option<String>,
    pub rng_seed: Option<u64>,
    pub event_capacity: Option<usize>,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            host: env_or_parse("HOST", IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))),
            port: env_or_parse("PORT", 3000_u16),
            log_level: env_or("RUST_LOG", "info"),
            enable_file_logs: env_or_bool("ENABLE_FILE_LOGS", false),
            log_dir: env_or("LOG_DIR", "./logs"),
            cors_origin: env_or("CORS_ORIGIN", "http://localhost:5173"),
            lessons_path: env_opt("LESSONS_PATH"),
            max_sessions: env_or_parse("MAX_SESSIONS", 1000_usize),
            session_idle_secs: env_or_parse("SESSION_IDLE_SECS", 1800_u64),
            engine: EngineEnvConfig {
                config_path: env_opt("ENGINE_CONFIG_PATH"),
                rng_seed: env_opt_parse("ENGINE_RNG_SEED"),
                event_capacity: env_opt_parse("EVENT_CHANNEL_CAPACITY"),
            },
        }
    }
}

pub fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Unset or blank variables are `None`.
pub fn env_opt(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Like [`env_opt`], but parsed. Unparseable values are ignored with a warning.
pub fn env_opt_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = env_opt(key)?;
    match raw.parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Failed to parse env var, ignoring it");
            None
        }
    }
}

pub fn env_or_parse<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy,
{
    match env::var(key) {
        Ok(raw) => match raw.parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(
                    key,
                    value = %raw,
                    "Failed to parse env var, using default"
                );
                default
            }
        },
        Err(_) => default,
    }
}

pub fn env_or_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}
