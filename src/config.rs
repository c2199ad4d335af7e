use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, SwitcherError};
use crate::models::{DefaultPolicy, Retention};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// API server configuration
    pub api: ApiServerConfig,
    /// Routing engine configuration
    pub routing: RoutingConfig,
    /// Connection history retention
    pub retention: RetentionConfig,
    /// Persistence configuration
    pub storage: StorageConfig,
    /// Logging configuration
    pub log: LogConfig,
}

#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Port for the API server (default: 8001)
    pub port: u16,
    /// Host to bind to (default: 0.0.0.0)
    pub host: String,
    /// Allowed CORS origins (comma-separated, empty = localhost only)
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RoutingConfig {
    /// Outcome when no rule matches (default: allow)
    pub default_policy: DefaultPolicy,
}

#[derive(Debug, Clone)]
pub struct RetentionConfig {
    /// Maximum idle age of historical connection records in seconds (0 = unbounded)
    pub max_age_secs: u64,
    /// Maximum number of historical connection records (0 = unbounded)
    pub max_records: usize,
    /// How often the eviction service runs, in seconds
    pub eviction_interval_secs: u64,
}

impl RetentionConfig {
    pub fn retention(&self) -> Retention {
        Retention {
            max_age: (self.max_age_secs > 0).then(|| Duration::from_secs(self.max_age_secs)),
            max_records: (self.max_records > 0).then_some(self.max_records),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// JSON state file; None keeps configs and rules in memory only
    pub state_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level (debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let default_policy_raw = get_env_or("ROUTING_DEFAULT_POLICY", "allow");
        let default_policy = DefaultPolicy::from_str(&default_policy_raw).ok_or_else(|| {
            SwitcherError::InvalidConfig(format!(
                "ROUTING_DEFAULT_POLICY must be allow or deny, got {}",
                default_policy_raw
            ))
        })?;

        let eviction_interval_secs: u64 = parse_env("EVICTION_INTERVAL_SECS", "60")?;
        if eviction_interval_secs == 0 {
            return Err(SwitcherError::InvalidConfig(
                "EVICTION_INTERVAL_SECS must be greater than zero".into(),
            ));
        }

        let log_format = get_env_or("LOG_FORMAT", "json").to_lowercase();
        if !matches!(log_format.as_str(), "json" | "pretty") {
            return Err(SwitcherError::InvalidConfig(format!(
                "LOG_FORMAT must be json or pretty, got {}",
                log_format
            )));
        }

        Ok(Config {
            api: ApiServerConfig {
                port: get_env_or("API_PORT", "8001").parse().map_err(|_| {
                    SwitcherError::InvalidConfig("API_PORT must be a valid port number".into())
                })?,
                host: get_env_or("API_HOST", "0.0.0.0"),
                cors_origins: get_env_or("CORS_ORIGINS", "")
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
            routing: RoutingConfig { default_policy },
            retention: RetentionConfig {
                max_age_secs: parse_env("CONNECTION_RETENTION_SECS", "3600")?,
                max_records: parse_env("CONNECTION_RETENTION_MAX", "1000")?,
                eviction_interval_secs,
            },
            storage: StorageConfig {
                state_file: env::var("STATE_FILE")
                    .ok()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .map(PathBuf::from),
            },
            log: LogConfig {
                level: get_env_or("LOG_LEVEL", "info"),
                format: log_format,
            },
        })
    }

    /// Get the API server address
    pub fn api_addr(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: &str) -> Result<T> {
    get_env_or(key, default)
        .trim()
        .parse()
        .map_err(|_| SwitcherError::InvalidConfig(format!("{} must be a valid number", key)))
}

/// Get environment variable with a default value
fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const CONFIG_ENV_KEYS: &[&str] = &[
        "API_PORT",
        "API_HOST",
        "CORS_ORIGINS",
        "ROUTING_DEFAULT_POLICY",
        "STATE_FILE",
        "CONNECTION_RETENTION_SECS",
        "CONNECTION_RETENTION_MAX",
        "EVICTION_INTERVAL_SECS",
        "LOG_LEVEL",
        "LOG_FORMAT",
    ];

    struct EnvGuard {
        saved: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn new(keys: &[&str]) -> Self {
            let saved = keys
                .iter()
                .map(|&key| {
                    let old = env::var(key).ok();
                    env::remove_var(key);
                    (key.to_string(), old)
                })
                .collect();

            Self { saved }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, value) in self.saved.drain(..) {
                match value {
                    Some(v) => env::set_var(key, v),
                    None => env::remove_var(key),
                }
            }
        }
    }

    #[test]
    fn test_config_from_env_defaults() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvGuard::new(CONFIG_ENV_KEYS);

        let config = Config::from_env().unwrap();

        assert_eq!(config.api.port, 8001);
        assert_eq!(config.api.host, "0.0.0.0");
        assert!(config.api.cors_origins.is_empty());
        assert_eq!(config.routing.default_policy, DefaultPolicy::Allow);
        assert!(config.storage.state_file.is_none());
        assert_eq!(config.retention.max_age_secs, 3600);
        assert_eq!(config.retention.max_records, 1000);
        assert_eq!(config.retention.eviction_interval_secs, 60);
        assert_eq!(config.log.format, "json");
    }

    #[test]
    fn test_config_from_env_overrides() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvGuard::new(CONFIG_ENV_KEYS);

        env::set_var("API_PORT", "9001");
        env::set_var("API_HOST", "127.0.0.1");
        env::set_var("CORS_ORIGINS", "https://a.example, https://b.example");
        env::set_var("ROUTING_DEFAULT_POLICY", "DENY");
        env::set_var("STATE_FILE", "/var/lib/proxy-switcher/state.json");
        env::set_var("CONNECTION_RETENTION_SECS", "0");
        env::set_var("CONNECTION_RETENTION_MAX", "50");
        env::set_var("LOG_FORMAT", "pretty");

        let config = Config::from_env().unwrap();

        assert_eq!(config.api_addr(), "127.0.0.1:9001");
        assert_eq!(
            config.api.cors_origins,
            vec![
                "https://a.example".to_string(),
                "https://b.example".to_string()
            ]
        );
        assert_eq!(config.routing.default_policy, DefaultPolicy::Deny);
        assert_eq!(
            config.storage.state_file,
            Some(PathBuf::from("/var/lib/proxy-switcher/state.json"))
        );
        assert_eq!(
            config.retention.retention(),
            Retention {
                max_age: None,
                max_records: Some(50),
            }
        );
        assert_eq!(config.log.format, "pretty");
    }

    #[test]
    fn test_config_from_env_invalid_values() {
        let _lock = ENV_LOCK.lock().unwrap();
        let _guard = EnvGuard::new(CONFIG_ENV_KEYS);

        env::set_var("API_PORT", "not-a-port");
        assert!(matches!(
            Config::from_env().unwrap_err(),
            SwitcherError::InvalidConfig(_)
        ));
        env::remove_var("API_PORT");

        env::set_var("ROUTING_DEFAULT_POLICY", "maybe");
        assert!(matches!(
            Config::from_env().unwrap_err(),
            SwitcherError::InvalidConfig(_)
        ));
        env::remove_var("ROUTING_DEFAULT_POLICY");

        env::set_var("EVICTION_INTERVAL_SECS", "0");
        assert!(matches!(
            Config::from_env().unwrap_err(),
            SwitcherError::InvalidConfig(_)
        ));
        env::remove_var("EVICTION_INTERVAL_SECS");

        env::set_var("CONNECTION_RETENTION_MAX", "-3");
        assert!(matches!(
            Config::from_env().unwrap_err(),
            SwitcherError::InvalidConfig(_)
        ));
    }

    #[test]
    fn test_default_retention() {
        let retention = RetentionConfig {
            max_age_secs: 3600,
            max_records: 1000,
            eviction_interval_secs: 60,
        }
        .retention();
        assert_eq!(retention.max_age, Some(Duration::from_secs(3600)));
        assert_eq!(retention.max_records, Some(1000));
    }
}
