//! Application configuration loaded from environment variables.

use std::time::Duration;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `8081`)
/// - `DATABASE_URL` — PostgreSQL URL; unset runs fully in memory
/// - `DB_MAX_CONNECTIONS` — pool size (default: `10`)
/// - `STREAM_PARTITIONS` — partitions per topic (default: `3`)
/// - `STREAM_POLL_INTERVAL_MS` — idle partition poll delay (default: `500`)
/// - `STREAM_SESSION_TIMEOUT_SECS` — partition lease length (default: `30`)
/// - `CONSUMER_RETRY_BACKOFF_MS` — delay between join attempts (default: `1000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT` — `text` or `json` (default: `text`)
///
/// Unparsable numbers fall back to their defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub stream_partitions: i32,
    pub stream_poll_interval: Duration,
    pub stream_session_timeout: Duration,
    pub consumer_retry_backoff: Duration,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|value| !value.is_empty());
        let number = |key: &str| var(key).and_then(|value| value.parse::<u64>().ok());

        Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: var("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            database_url: var("DATABASE_URL"),
            db_max_connections: var("DB_MAX_CONNECTIONS")
                .and_then(|n| n.parse().ok())
                .unwrap_or(defaults.db_max_connections),
            stream_partitions: var("STREAM_PARTITIONS")
                .and_then(|n| n.parse().ok())
                .filter(|n: &i32| *n > 0)
                .unwrap_or(defaults.stream_partitions),
            stream_poll_interval: number("STREAM_POLL_INTERVAL_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.stream_poll_interval),
            stream_session_timeout: number("STREAM_SESSION_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.stream_session_timeout),
            consumer_retry_backoff: number("CONSUMER_RETRY_BACKOFF_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.consumer_retry_backoff),
            log_level: var("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: var("LOG_FORMAT")
                .map(|f| LogFormat::parse(&f))
                .unwrap_or_default(),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8081,
            database_url: None,
            db_max_connections: 10,
            stream_partitions: 3,
            stream_poll_interval: Duration::from_millis(500),
            stream_session_timeout: Duration::from_secs(30),
            consumer_retry_backoff: Duration::from_millis(1000),
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8081);
        assert_eq!(config.database_url, None);
        assert_eq!(config.stream_partitions, 3);
        assert_eq!(config.consumer_retry_backoff, Duration::from_secs(1));
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn test_empty_environment_uses_defaults() {
        let config = from_pairs(&[]);
        assert_eq!(config.addr(), "0.0.0.0:8081");
        assert_eq!(config.db_max_connections, 10);
        assert_eq!(config.stream_session_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_overrides() {
        let config = from_pairs(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "9000"),
            ("DATABASE_URL", "postgres://localhost/query"),
            ("STREAM_PARTITIONS", "6"),
            ("STREAM_POLL_INTERVAL_MS", "50"),
            ("CONSUMER_RETRY_BACKOFF_MS", "250"),
            ("LOG_FORMAT", "JSON"),
        ]);
        assert_eq!(config.addr(), "127.0.0.1:9000");
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/query")
        );
        assert_eq!(config.stream_partitions, 6);
        assert_eq!(config.stream_poll_interval, Duration::from_millis(50));
        assert_eq!(config.consumer_retry_backoff, Duration::from_millis(250));
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_numbers_fall_back() {
        let config = from_pairs(&[
            ("PORT", "eighty"),
            ("STREAM_PARTITIONS", "0"),
            ("DB_MAX_CONNECTIONS", "-1"),
            ("DATABASE_URL", ""),
        ]);
        assert_eq!(config.port, 8081);
        assert_eq!(config.stream_partitions, 3);
        assert_eq!(config.db_max_connections, 10);
        assert_eq!(config.database_url, None);
    }
}
