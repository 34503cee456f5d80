/// Configuration management for the Nodeweave engine
///
/// Handles server binding, optional SQLite persistence, engine loop timings and
/// backend credentials. Every value can be overridden through `NODEWEAVE_*`
/// environment variables.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Engine loop timings and limits
    pub engine: EngineConfig,
    /// Credentials handed to the connector catalog
    pub credentials: CredentialsConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Server port number
    pub port: u16,
}

/// Optional persistence
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite connection URL (e.g. "sqlite://data/nodeweave.db").
    /// When absent the engine runs purely in memory.
    pub url: Option<String>,
}

/// Engine timings and limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Trigger evaluation period
    pub trigger_check_interval_secs: u64,
    /// Execution queue drain period
    pub queue_tick_ms: u64,
    /// System status broadcast period
    pub monitoring_interval_secs: u64,
    /// How many executions a status snapshot carries
    pub recent_executions: usize,
    /// Finished executions kept in memory before the oldest are pruned
    pub max_execution_history: usize,
    /// Evaluate schedules against UTC instead of the host's local clock
    pub schedule_in_utc: bool,
    /// JSON file with workflows to seed at start-up
    pub seed_file: Option<String>,
}

/// Backend credentials
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialsConfig {
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub openai_model: Option<String>,
    pub telegram_bot_token: Option<String>,
}

/// Longest trigger check period that still observes every wall-clock minute
pub const MAX_TRIGGER_CHECK_SECS: u64 = 30;

impl EngineConfig {
    pub fn trigger_check_interval(&self) -> Duration {
        let secs = self.trigger_check_interval_secs.clamp(1, MAX_TRIGGER_CHECK_SECS);
        if secs != self.trigger_check_interval_secs {
            tracing::warn!(
                "⚠️ Trigger check interval {}s out of range, using {}s",
                self.trigger_check_interval_secs,
                secs
            );
        }
        Duration::from_secs(secs)
    }

    pub fn queue_tick(&self) -> Duration {
        Duration::from_millis(self.queue_tick_ms.max(1))
    }

    pub fn monitoring_interval(&self) -> Duration {
        Duration::from_secs(self.monitoring_interval_secs.max(1))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            trigger_check_interval_secs: env_parse("NODEWEAVE_TRIGGER_CHECK_SECS", 30),
            queue_tick_ms: env_parse("NODEWEAVE_QUEUE_TICK_MS", 1000),
            monitoring_interval_secs: env_parse("NODEWEAVE_MONITOR_SECS", 5),
            recent_executions: env_parse("NODEWEAVE_RECENT_EXECUTIONS", 5),
            max_execution_history: env_parse("NODEWEAVE_MAX_EXECUTION_HISTORY", 500),
            schedule_in_utc: env_parse("NODEWEAVE_SCHEDULE_UTC", false),
            seed_file: env_opt("NODEWEAVE_SEED_FILE"),
        }
    }
}

impl Default for Config {
    /// Default configuration with ENV_VAR support for k8s/container deployment
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: std::env::var("NODEWEAVE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env_parse("NODEWEAVE_PORT", 3004),
            },
            database: DatabaseConfig {
                url: env_opt("NODEWEAVE_DATABASE_URL"),
            },
            engine: EngineConfig::default(),
            credentials: CredentialsConfig {
                openai_api_key: env_opt("NODEWEAVE_OPENAI_API_KEY"),
                openai_base_url: env_opt("NODEWEAVE_OPENAI_BASE_URL"),
                openai_model: env_opt("NODEWEAVE_OPENAI_MODEL"),
                telegram_bot_token: env_opt("NODEWEAVE_TELEGRAM_BOT_TOKEN"),
            },
        }
    }
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str, fallback: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intervals_never_collapse_to_zero() {
        let engine = EngineConfig {
            trigger_check_interval_secs: 0,
            queue_tick_ms: 0,
            monitoring_interval_secs: 0,
            recent_executions: 5,
            max_execution_history: 10,
            schedule_in_utc: true,
            seed_file: None,
        };
        assert_eq!(engine.trigger_check_interval(), Duration::from_secs(1));
        assert_eq!(engine.queue_tick(), Duration::from_millis(1));
        assert_eq!(engine.monitoring_interval(), Duration::from_secs(1));
    }

    #[test]
    fn trigger_checks_never_skip_a_minute() {
        let engine = EngineConfig {
            trigger_check_interval_secs: 90,
            ..EngineConfig::default()
        };
        assert_eq!(engine.trigger_check_interval(), Duration::from_secs(MAX_TRIGGER_CHECK_SECS));

        let engine = EngineConfig {
            trigger_check_interval_secs: 20,
            ..EngineConfig::default()
        };
        assert_eq!(engine.trigger_check_interval(), Duration::from_secs(20));
    }

    #[test]
    fn env_parse_falls_back_on_garbage() {
        std::env::set_var("NODEWEAVE_TEST_GARBAGE", "not-a-number");
        assert_eq!(env_parse("NODEWEAVE_TEST_GARBAGE", 42u64), 42);
        assert_eq!(env_parse("NODEWEAVE_TEST_UNSET_KEY", 7u16), 7);
    }
}
