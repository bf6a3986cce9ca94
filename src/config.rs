use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::entity::naming::NamingStrategy;
use crate::sql::dialect::Dialect;

/// How a batch operation reacts to a failing entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BatchErrorPolicy {
    /// Run the batch as one atomic statement; the first failure aborts it.
    #[default]
    FailFast,
    /// Apply each entity in its own transaction, collecting per-index
    /// failures.
    CollectErrors,
}

/// Manager-wide settings, loaded once and shared by every session.
#[derive(Debug, Clone, Deserialize)]
pub struct ManagerConfig {
    #[serde(default)]
    pub naming: NamingStrategy,
    #[serde(default)]
    pub dialect: Dialect,
    /// LIMIT applied to entity selects that set neither limit nor offset.
    /// Zero disables the cap.
    #[serde(default = "default_fetch_size")]
    pub default_fetch_size: u64,
    #[serde(default = "default_statement_timeout_ms")]
    pub statement_timeout_ms: u64,
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
    #[serde(default)]
    pub batch_error_policy: BatchErrorPolicy,
}

fn default_fetch_size() -> u64 {
    1000
}

fn default_statement_timeout_ms() -> u64 {
    30_000
}

fn default_acquire_timeout_ms() -> u64 {
    5_000
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            naming: NamingStrategy::default(),
            dialect: Dialect::default(),
            default_fetch_size: default_fetch_size(),
            statement_timeout_ms: default_statement_timeout_ms(),
            acquire_timeout_ms: default_acquire_timeout_ms(),
            batch_error_policy: BatchErrorPolicy::default(),
        }
    }
}

impl ManagerConfig {
    /// Load the manager configuration from `config/config.toml`, falling back to env vars.
    pub fn load() -> Result<Self, ConfigError> {
        // Build configuration by reading the TOML file (optional) and environment variables
        let builder = Config::builder()
            .add_source(File::with_name("config/config.toml").required(false))
            .add_source(Environment::with_prefix("FLUENTDB").separator("__"));

        let settings = match builder.build() {
            Ok(cfg) => cfg,
            Err(err) => {
                // If the file existed but was unreadable, log a warning and retry with env only
                if std::path::Path::new("config/config.toml").exists() {
                    log::warn!("failed to load config file, falling back to env: {err}");
                }
                Config::builder()
                    .add_source(Environment::with_prefix("FLUENTDB").separator("__"))
                    .build()
                    .map_err(|env_err| {
                        ConfigError::Message(format!(
                            "Failed to load configuration from file and env: {}, then env-only error: {}",
                            err, env_err
                        ))
                    })?
            }
        };

        match settings.get::<ManagerConfig>("manager") {
            Ok(cfg) => Ok(cfg),
            // A missing section means defaults, not a startup failure.
            Err(ConfigError::NotFound(_)) => Ok(ManagerConfig::default()),
            Err(e) => Err(ConfigError::Message(format!(
                "Manager configuration could not be loaded from file or environment: {}",
                e
            ))),
        }
    }

    pub fn statement_timeout(&self) -> Option<Duration> {
        if self.statement_timeout_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.statement_timeout_ms))
        }
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = ManagerConfig::default();
        assert_eq!(cfg.naming, NamingStrategy::SnakeCase);
        assert_eq!(cfg.dialect, Dialect::Postgres);
        assert_eq!(cfg.default_fetch_size, 1000);
        assert_eq!(cfg.batch_error_policy, BatchErrorPolicy::FailFast);
    }

    #[test]
    fn test_zero_statement_timeout_means_unbounded() {
        let cfg = ManagerConfig {
            statement_timeout_ms: 0,
            ..ManagerConfig::default()
        };
        assert_eq!(cfg.statement_timeout(), None);

        let cfg = ManagerConfig::default();
        assert_eq!(cfg.statement_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_deserialize_from_toml_section() {
        let cfg: ManagerConfig = Config::builder()
            .add_source(config::File::from_str(
                r#"
                [manager]
                naming = "verbatim"
                dialect = "my_sql"
                default_fetch_size = 50
                batch_error_policy = "collect_errors"
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .get("manager")
            .unwrap();
        assert_eq!(cfg.naming, NamingStrategy::Verbatim);
        assert_eq!(cfg.dialect, Dialect::MySql);
        assert_eq!(cfg.default_fetch_size, 50);
        assert_eq!(cfg.batch_error_policy, BatchErrorPolicy::CollectErrors);
    }
}
