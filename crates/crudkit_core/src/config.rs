//! Runtime configuration.
//!
//! # Invariants
//! - Defaults are merged first; `CRUDKIT_*` environment variables win.
//! - An absent `db_path` means an in-memory database.

use crate::logging::default_log_level;
use figment::providers::{Env, Serialized};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const ENV_PREFIX: &str = "CRUDKIT_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// SQLite file; `None` opens an in-memory database.
    pub db_path: Option<PathBuf>,
    pub log_level: String,
    /// File logging is disabled when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            log_level: default_log_level().to_string(),
            log_dir: None,
        }
    }
}

impl AppConfig {
    /// Defaults merged with `CRUDKIT_*` environment variables.
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default())).merge(Env::prefixed(ENV_PREFIX))
    }

    pub fn load() -> Result<Self, figment::Error> {
        Self::from_figment(Self::figment())
    }

    pub fn from_figment(figment: Figment) -> Result<Self, figment::Error> {
        figment.extract()
    }
}

#[cfg(test)]
mod tests {
    use super::AppConfig;
    use figment::Jail;
    use std::path::PathBuf;

    #[test]
    fn defaults_apply_without_environment() {
        Jail::expect_with(|_jail| {
            let config = AppConfig::load()?;
            assert_eq!(config, AppConfig::default());
            assert!(config.db_path.is_none());
            Ok(())
        });
    }

    #[test]
    fn prefixed_environment_overrides_defaults() {
        Jail::expect_with(|jail| {
            jail.set_env("CRUDKIT_DB_PATH", "/var/lib/crudkit/app.sqlite3");
            jail.set_env("CRUDKIT_LOG_LEVEL", "warn");
            jail.set_env("CRUDKIT_LOG_DIR", "/var/log/crudkit");

            let config = AppConfig::load()?;
            assert_eq!(
                config.db_path,
                Some(PathBuf::from("/var/lib/crudkit/app.sqlite3"))
            );
            assert_eq!(config.log_level, "warn");
            assert_eq!(config.log_dir, Some(PathBuf::from("/var/log/crudkit")));
            Ok(())
        });
    }
}
