//! Layered configuration for the trove binaries.
//!
//! Values merge lowest to highest precedence: built-in defaults, then a
//! `trove.toml` file (working directory, or wherever `TROVE_CONFIG`
//! points), then `TROVE_*` environment variables. Nested keys use a
//! double underscore in the environment, e.g. `TROVE_QUEUE__URL`.

pub mod error;

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable naming the configuration file to load instead
/// of `trove.toml`.
const CONFIG_PATH_VAR: &str = "TROVE_CONFIG";
const ENV_PREFIX: &str = "TROVE_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub database: DatabaseConfig,
    pub queue: QueueConfig,
    /// Directive string for the log subscriber, e.g. `info` or
    /// `trove_ingest=debug,info`.
    pub log_filter: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// Location of the SQLite catalog file. Created on first connect.
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueueConfig {
    /// Redis connection URL for the scan-job stream.
    pub url: String,
    /// Consumers spawned by `trove worker`.
    pub concurrency: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            queue: QueueConfig::default(),
            log_filter: "info".to_string(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        let path = directories::ProjectDirs::from("", "", "trove")
            .map(|dirs| dirs.data_local_dir().join("catalog.db"))
            .unwrap_or_else(|| PathBuf::from("trove.db"));
        Self { path }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { url: "redis://127.0.0.1:6379".to_string(), concurrency: 10 }
    }
}

impl Config {
    /// Merge all configuration sources and validate the result.
    pub fn load() -> Result<Self> {
        let file = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| "trove.toml".to_string());
        let config: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(&file))
            .merge(Env::prefixed(ENV_PREFIX).ignore(&["config"]).split("__"))
            .extract()
            .or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        tracing::debug!(
            database = %config.database.path.display(),
            queue = config.queue.url,
            "configuration loaded",
        );
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.queue.concurrency == 0 {
            exn::bail!(ErrorKind::Invalid("queue.concurrency must be at least 1"));
        }
        if self.queue.url.is_empty() {
            exn::bail!(ErrorKind::Invalid("queue.url must not be empty"));
        }
        if self.database.path.as_os_str().is_empty() {
            exn::bail!(ErrorKind::Invalid("database.path must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.queue.concurrency, 10);
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn test_file_overrides_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "trove.toml",
                r#"
                log_filter = "debug"

                [database]
                path = "/var/lib/trove/catalog.db"

                [queue]
                concurrency = 4
                "#,
            )?;
            let config = Config::load().expect("load");
            assert_eq!(config.log_filter, "debug");
            assert_eq!(config.database.path, PathBuf::from("/var/lib/trove/catalog.db"));
            assert_eq!(config.queue.concurrency, 4);
            assert_eq!(config.queue.url, "redis://127.0.0.1:6379");
            Ok(())
        });
    }

    #[test]
    fn test_environment_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("trove.toml", "[queue]\nurl = \"redis://file:6379\"\n")?;
            jail.set_env("TROVE_QUEUE__URL", "redis://env:6379");
            jail.set_env("TROVE_LOG_FILTER", "warn");
            let config = Config::load().expect("load");
            assert_eq!(config.queue.url, "redis://env:6379");
            assert_eq!(config.log_filter, "warn");
            Ok(())
        });
    }

    #[test]
    fn test_zero_concurrency_is_rejected() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("TROVE_QUEUE__CONCURRENCY", "0");
            let error = Config::load().expect_err("zero consumers");
            assert!(matches!(&*error, ErrorKind::Invalid(_)));
            Ok(())
        });
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("trove.toml", "databse = { path = \"typo.db\" }\n")?;
            let error = Config::load().expect_err("typoed section");
            assert!(matches!(&*error, ErrorKind::Load));
            Ok(())
        });
    }
}
