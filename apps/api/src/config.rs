//! API server configuration.
//!
//! ## Sources (lowest → highest priority)
//! ```text
//! built-in defaults
//!      │
//!      ▼
//! medstore.toml  (or the file named by MEDSTORE_CONFIG)
//!      │
//!      ▼
//! MEDSTORE_* environment variables, `__` between sections:
//!   MEDSTORE_SERVER__PORT=8080
//!   MEDSTORE_AUTH__JWT_SECRET=...
//!   MEDSTORE_ENVIRONMENT=production
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Secret used when none is configured. Refused in production.
pub const DEV_JWT_SECRET: &str = "medstore-dev-secret-change-in-production";

/// Default config file, looked up next to the working directory.
const DEFAULT_CONFIG_FILE: &str = "medstore";

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Full API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub notifications: NotificationConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory of static pages served at `/`.
    #[serde(default)]
    pub static_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file; created on first start.
    pub path: PathBuf,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 signing key.
    pub jwt_secret: String,
    /// Access token lifetime in seconds.
    pub token_lifetime_secs: i64,
    /// When set and no users exist, an `admin` account is created with it.
    #[serde(default)]
    pub bootstrap_admin_password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Low-stock events are POSTed here; logged only when unset.
    #[serde(default)]
    pub webhook_url: Option<String>,
    /// Pending events before new ones are dropped.
    pub channel_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub format: LogFormat,
}

impl AppConfig {
    /// Loads configuration from `MEDSTORE_CONFIG` (or `medstore.toml`) and
    /// the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let file = env::var("MEDSTORE_CONFIG").ok();
        Self::load_from(file.as_deref())
    }

    /// Loads configuration with an explicit file. A named file must exist;
    /// the default `medstore.toml` is optional.
    pub fn load_from(file: Option<&str>) -> Result<Self, ConfigError> {
        let file_source = match file {
            Some(path) => config::File::from(PathBuf::from(path)).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings = config::Config::builder()
            .set_default("environment", "development")?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("database.path", "medstore.db")?
            .set_default("database.max_connections", 5)?
            .set_default("auth.jwt_secret", DEV_JWT_SECRET)?
            .set_default("auth.token_lifetime_secs", 8 * 60 * 60)?
            .set_default("notifications.channel_capacity", 256)?
            .set_default("logging.format", "pretty")?
            .add_source(file_source)
            .add_source(
                config::Environment::with_prefix("MEDSTORE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: AppConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values the type system can't.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.trim().is_empty() {
            return Err(ConfigError::InvalidValue("auth.jwt_secret".to_string()));
        }
        if self.environment == Environment::Production && self.auth.jwt_secret == DEV_JWT_SECRET {
            return Err(ConfigError::InsecureSecret);
        }
        if self.auth.token_lifetime_secs <= 0 {
            return Err(ConfigError::InvalidValue("auth.token_lifetime_secs".to_string()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::InvalidValue("database.max_connections".to_string()));
        }
        if self.notifications.channel_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "notifications.channel_capacity".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }

    /// `host:port` to bind.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Development settings with an in-memory database, for tests.
    pub fn for_tests() -> Self {
        AppConfig {
            environment: Environment::Development,
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                static_dir: None,
            },
            database: DatabaseConfig {
                path: PathBuf::from(":memory:"),
                max_connections: 1,
            },
            auth: AuthConfig {
                jwt_secret: "test-secret".to_string(),
                token_lifetime_secs: 3600,
                bootstrap_admin_password: None,
            },
            notifications: NotificationConfig {
                webhook_url: None,
                channel_capacity: 16,
            },
            logging: LoggingConfig {
                format: LogFormat::Pretty,
            },
        }
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("auth.jwt_secret must be set to a private value in production")]
    InsecureSecret,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_config(name: &str, body: &str) -> PathBuf {
        let path = env::temp_dir().join(format!("{}-{}.toml", name, uuid::Uuid::new_v4()));
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_file_overrides_defaults() {
        let path = write_config(
            "medstore-config",
            r#"
            [server]
            port = 8088

            [notifications]
            webhook_url = "https://hooks.example/low-stock"
            "#,
        );

        let config = AppConfig::load_from(path.to_str()).unwrap();
        assert_eq!(config.server.port, 8088);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(
            config.notifications.webhook_url.as_deref(),
            Some("https://hooks.example/low-stock")
        );
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.is_development());
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_production_refuses_dev_secret() {
        let path = write_config("medstore-prod", "environment = \"production\"\n");
        let err = AppConfig::load_from(path.to_str()).unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_missing_named_file_is_an_error() {
        assert!(AppConfig::load_from(Some("/nonexistent/medstore.toml")).is_err());
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let mut config = AppConfig::for_tests();
        config.notifications.channel_capacity = 0;
        assert!(config.validate().is_err());
        assert!(AppConfig::for_tests().validate().is_ok());
    }
}
