//! Server configuration loaded from environment variables.

use std::net::SocketAddr;
use std::time::Duration;

/// Settings the live session needs at runtime
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Display name the presenter joins under; excluded from participant counts
    pub presenter_name: String,
    /// Auto-advance stays quiet this long after a poll becomes active
    pub advance_grace: Duration,
    /// How often the auto-advance watcher checks the active poll
    pub advance_interval: Duration,
    /// Depth of the fan-out channel before slow clients start lagging
    pub broadcast_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            presenter_name: "Teacher (Host)".to_string(),
            advance_grace: Duration::from_secs(5),
            advance_interval: Duration::from_millis(1000),
            broadcast_capacity: 256,
        }
    }
}

/// Process-level settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// SQLite database path, or `:memory:`
    pub database_path: String,
    pub session: SessionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            database_path: "polling.db".to_string(),
            session: SessionConfig::default(),
        }
    }
}

/// Trimmed, non-empty value of an environment variable
fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

/// Parse an environment variable, warning and falling back on bad input
fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = env_string(key)?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring invalid {}={:?}, using default", key, raw);
            None
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let session = SessionConfig {
            presenter_name: env_string("LIVEPOLL_PRESENTER_NAME")
                .unwrap_or(defaults.session.presenter_name),
            advance_grace: env_parse("LIVEPOLL_ADVANCE_GRACE_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.session.advance_grace),
            advance_interval: env_parse::<u64>("LIVEPOLL_ADVANCE_INTERVAL_MS")
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.session.advance_interval),
            broadcast_capacity: env_parse::<usize>("LIVEPOLL_BROADCAST_CAPACITY")
                .filter(|cap| *cap > 0)
                .unwrap_or(defaults.session.broadcast_capacity),
        };

        Self {
            bind_addr: env_parse("LIVEPOLL_BIND").unwrap_or(defaults.bind_addr),
            database_path: env_string("LIVEPOLL_DATABASE").unwrap_or(defaults.database_path),
            session,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const KEYS: &[&str] = &[
        "LIVEPOLL_BIND",
        "LIVEPOLL_DATABASE",
        "LIVEPOLL_PRESENTER_NAME",
        "LIVEPOLL_ADVANCE_GRACE_SECS",
        "LIVEPOLL_ADVANCE_INTERVAL_MS",
        "LIVEPOLL_BROADCAST_CAPACITY",
    ];

    fn clear_env() {
        for key in KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_defaults_without_env() {
        clear_env();
        let config = ServerConfig::from_env();

        assert_eq!(config.bind_addr.port(), 3000);
        assert_eq!(config.database_path, "polling.db");
        assert_eq!(config.session.presenter_name, "Teacher (Host)");
        assert_eq!(config.session.advance_grace, Duration::from_secs(5));
        assert_eq!(config.session.broadcast_capacity, 256);
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_env();
        std::env::set_var("LIVEPOLL_BIND", "127.0.0.1:4000");
        std::env::set_var("LIVEPOLL_DATABASE", " :memory: ");
        std::env::set_var("LIVEPOLL_PRESENTER_NAME", "Prof");
        std::env::set_var("LIVEPOLL_ADVANCE_GRACE_SECS", "2");
        std::env::set_var("LIVEPOLL_ADVANCE_INTERVAL_MS", "250");

        let config = ServerConfig::from_env();
        clear_env();

        assert_eq!(config.bind_addr, "127.0.0.1:4000".parse().unwrap());
        assert_eq!(config.database_path, ":memory:");
        assert_eq!(config.session.presenter_name, "Prof");
        assert_eq!(config.session.advance_grace, Duration::from_secs(2));
        assert_eq!(config.session.advance_interval, Duration::from_millis(250));
    }

    #[test]
    #[serial]
    fn test_invalid_values_fall_back() {
        clear_env();
        std::env::set_var("LIVEPOLL_BIND", "not an address");
        std::env::set_var("LIVEPOLL_ADVANCE_INTERVAL_MS", "0");
        std::env::set_var("LIVEPOLL_BROADCAST_CAPACITY", "lots");
        std::env::set_var("LIVEPOLL_PRESENTER_NAME", "   ");

        let config = ServerConfig::from_env();
        clear_env();

        assert_eq!(config.bind_addr.port(), 3000);
        assert_eq!(config.session.advance_interval, Duration::from_millis(1000));
        assert_eq!(config.session.broadcast_capacity, 256);
        assert_eq!(config.session.presenter_name, "Teacher (Host)");
    }
}
