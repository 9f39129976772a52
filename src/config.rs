use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, Result};
use config::Config;
use serde::Serialize;
use tracing::{info, warn};

use crate::database::core::Backend;
use crate::error::{StoreError, StoreResult};

/// Default SQLite database file, relative to the working directory
pub const DEFAULT_SQLITE_PATH: &str = "data/townstore.db";

/// Default MySQL port
pub const DEFAULT_MYSQL_PORT: u16 = 3306;

const EMPTY_CONFIG: &str = r#"### townstore configuration file

[database]
### backend: "sqlite" or "mysql"
# type = "sqlite"
### table used by the economy integration
# economytable = "economy"

[database.sqlite]
# path = "data/townstore.db"

[database.mysql]
# host = "localhost"
# port = 3306
# database = "townstore"
# username = "root"
# password = ""
"#;

/// Source of typed scalar settings
///
/// Keys are dotted paths such as `database.mysql.port`. A missing key
/// returns `None`; callers apply their own defaults.
pub trait ConfigProvider {
    fn get_string(&self, key: &str) -> Option<String>;

    fn get_int(&self, key: &str) -> Option<i64>;
}

impl ConfigProvider for Config {
    fn get_string(&self, key: &str) -> Option<String> {
        Config::get_string(self, key).ok()
    }

    fn get_int(&self, key: &str) -> Option<i64> {
        Config::get_int(self, key).ok()
    }
}

impl ConfigProvider for HashMap<String, String> {
    fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }

    fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|v| v.trim().parse().ok())
    }
}

/// Connection parameters for the networked backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MysqlSettings {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
}

impl Default for MysqlSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_MYSQL_PORT,
            database: "townstore".to_string(),
            username: "root".to_string(),
            password: String::new(),
        }
    }
}

/// Database settings, read once from a [`ConfigProvider`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseSettings {
    pub backend: Backend,
    pub sqlite_path: String,
    pub mysql: MysqlSettings,
    /// Consumed by the economy integration, not by the store itself
    pub economy_table: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            backend: Backend::Sqlite,
            sqlite_path: DEFAULT_SQLITE_PATH.to_string(),
            mysql: MysqlSettings::default(),
            economy_table: "economy".to_string(),
        }
    }
}

impl DatabaseSettings {
    /// Settings for a SQLite database at `path`
    pub fn sqlite(path: &str) -> Self {
        Self {
            sqlite_path: path.to_string(),
            ..Default::default()
        }
    }

    /// Read the `database.*` keys from a provider
    ///
    /// Fails with [`StoreError::ConfigurationMissing`] when no provider is
    /// given. Every key is optional and falls back to its default.
    pub fn from_provider(provider: Option<&dyn ConfigProvider>) -> StoreResult<Self> {
        let provider = provider.ok_or_else(|| {
            StoreError::ConfigurationMissing("no configuration provider available".to_string())
        })?;
        let defaults = DatabaseSettings::default();

        let backend = match provider.get_string("database.type") {
            Some(kind) => match kind.to_lowercase().parse::<Backend>() {
                Ok(backend) => backend,
                Err(_) => {
                    warn!(
                        "Unknown database type '{}', falling back to {}",
                        kind, defaults.backend
                    );
                    defaults.backend
                }
            },
            None => defaults.backend,
        };

        let raw_port = provider
            .get_int("database.mysql.port")
            .map(|p| p.to_string())
            .or_else(|| provider.get_string("database.mysql.port"));
        let port = match raw_port {
            Some(raw) => match raw.trim().parse::<u16>() {
                Ok(port) => port,
                Err(_) => {
                    warn!(
                        "Invalid MySQL port '{}', falling back to {}",
                        raw, DEFAULT_MYSQL_PORT
                    );
                    DEFAULT_MYSQL_PORT
                }
            },
            None => DEFAULT_MYSQL_PORT,
        };

        let string_or = |key: &str, default: String| provider.get_string(key).unwrap_or(default);

        let settings = DatabaseSettings {
            backend,
            sqlite_path: string_or("database.sqlite.path", defaults.sqlite_path),
            mysql: MysqlSettings {
                host: string_or("database.mysql.host", defaults.mysql.host),
                port,
                database: string_or("database.mysql.database", defaults.mysql.database),
                username: string_or("database.mysql.username", defaults.mysql.username),
                password: string_or("database.mysql.password", defaults.mysql.password),
            },
            economy_table: string_or("database.economytable", defaults.economy_table),
        };

        info!("Using database type: {}", settings.backend);
        Ok(settings)
    }

    /// One-line description of the target database, without credentials
    pub fn target(&self) -> String {
        match self.backend {
            Backend::Sqlite => format!("sqlite:{}", self.sqlite_path),
            Backend::Mysql => format!(
                "mysql://{}@{}:{}/{}",
                self.mysql.username, self.mysql.host, self.mysql.port, self.mysql.database
            ),
        }
    }
}

pub struct StoreConfig {
    /// Path of the configuration file that was read or created
    pub config_file: String,

    /// Database settings derived from the file and environment
    pub database: DatabaseSettings,
}

impl StoreConfig {
    /// Build the configuration from a TOML file and the environment
    ///
    /// By default `$HOME/.townstore/townstore.toml` is used; a commented
    /// template is written when the file does not exist. Environment
    /// variables prefixed with `TOWNSTORE_` override file values, using `__`
    /// as the nesting separator (`TOWNSTORE_DATABASE__TYPE=mysql`).
    pub fn new(path: &Option<String>) -> Result<StoreConfig> {
        // a missing .env is fine
        let _ = dotenvy::dotenv();

        let mut builder = Config::builder();

        let config_file = match path {
            Some(p) => p.clone(),
            None => {
                let dir = Self::default_dir()?;
                std::fs::create_dir_all(dir.as_str())
                    .map_err(|e| anyhow!("Unable to create townstore directory: {}", e))?;
                format!("{}/townstore.toml", dir)
            }
        };

        if Path::new(config_file.as_str()).exists() {
            builder = builder.add_source(config::File::with_name(config_file.as_str()));
        } else {
            std::fs::write(config_file.as_str(), EMPTY_CONFIG).map_err(|e| {
                anyhow!("Unable to create config file {}: {}", config_file.as_str(), e)
            })?;
        }

        builder = builder.add_source(
            config::Environment::with_prefix("TOWNSTORE")
                .prefix_separator("_")
                .separator("__"),
        );

        let settings = builder
            .build()
            .map_err(|e| anyhow!("Failed to build configuration: {}", e))?;

        let database = DatabaseSettings::from_provider(Some(&settings))?;

        Ok(StoreConfig {
            config_file,
            database,
        })
    }

    fn default_dir() -> Result<String> {
        let home_dir = dirs::home_dir()
            .ok_or_else(|| anyhow!("Could not find home directory"))?
            .to_str()
            .ok_or_else(|| anyhow!("Could not convert home directory path to string"))?
            .to_owned();
        Ok(format!("{}/.townstore", home_dir))
    }

    /// Display configuration summary
    pub fn summary(&self) -> String {
        let db = &self.database;
        let mut lines = vec![
            format!("Config File:        {}", self.config_file),
            format!("Backend:            {}", db.backend),
            format!("Target:             {}", db.target()),
            format!("Economy Table:      {}", db.economy_table),
        ];
        if db.backend == Backend::Mysql {
            let masked = if db.mysql.password.is_empty() {
                "(empty)"
            } else {
                "********"
            };
            lines.push(format!("MySQL Password:     {}", masked));
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_missing_provider_fails_fast() {
        let result = DatabaseSettings::from_provider(None);
        assert!(matches!(result, Err(StoreError::ConfigurationMissing(_))));
    }

    #[test]
    fn test_defaults() {
        let empty = provider(&[]);
        let settings = DatabaseSettings::from_provider(Some(&empty)).unwrap();
        assert_eq!(settings, DatabaseSettings::default());
        assert_eq!(settings.backend, Backend::Sqlite);
        assert_eq!(settings.mysql.port, 3306);
    }

    #[test]
    fn test_mysql_settings() {
        let map = provider(&[
            ("database.type", "MySQL"),
            ("database.mysql.host", "db.internal"),
            ("database.mysql.port", "3307"),
            ("database.mysql.database", "towns"),
            ("database.mysql.username", "mc"),
            ("database.mysql.password", "hunter2"),
            ("database.economytable", "balances"),
        ]);
        let settings = DatabaseSettings::from_provider(Some(&map)).unwrap();
        assert_eq!(settings.backend, Backend::Mysql);
        assert_eq!(settings.mysql.host, "db.internal");
        assert_eq!(settings.mysql.port, 3307);
        assert_eq!(settings.economy_table, "balances");
        assert_eq!(settings.target(), "mysql://mc@db.internal:3307/towns");
    }

    #[test]
    fn test_unknown_backend_falls_back_to_sqlite() {
        let map = provider(&[("database.type", "postgres")]);
        let settings = DatabaseSettings::from_provider(Some(&map)).unwrap();
        assert_eq!(settings.backend, Backend::Sqlite);
    }

    #[test]
    fn test_invalid_port_falls_back() {
        for raw in ["70000", "not-a-port"] {
            let map = provider(&[("database.mysql.port", raw)]);
            let settings = DatabaseSettings::from_provider(Some(&map)).unwrap();
            assert_eq!(settings.backend, Backend::Sqlite);
            assert_eq!(settings.mysql.port, DEFAULT_MYSQL_PORT);
        }

        let map = provider(&[("database.type", "mysql"), ("database.mysql.port", "abc")]);
        let settings = DatabaseSettings::from_provider(Some(&map)).unwrap();
        assert_eq!(settings.backend, Backend::Mysql);
        assert_eq!(settings.mysql.port, DEFAULT_MYSQL_PORT);
    }

    #[test]
    fn test_config_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("townstore.toml");
        std::fs::write(
            &path,
            "[database]\ntype = \"sqlite\"\n\n[database.sqlite]\npath = \"/tmp/towns.db\"\n",
        )
        .unwrap();

        let config = StoreConfig::new(&Some(path.to_string_lossy().to_string())).unwrap();
        assert_eq!(config.database.backend, Backend::Sqlite);
        assert_eq!(config.database.sqlite_path, "/tmp/towns.db");
        assert!(config.summary().contains("sqlite:/tmp/towns.db"));
    }

    #[test]
    fn test_missing_config_file_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fresh.toml");
        let config = StoreConfig::new(&Some(path.to_string_lossy().to_string())).unwrap();
        assert!(path.exists());
        assert_eq!(config.database.sqlite_path, DEFAULT_SQLITE_PATH);
    }
}
