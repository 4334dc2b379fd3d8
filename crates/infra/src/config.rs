//! Layered service configuration.
//!
//! Sources, highest priority first:
//! 1. Environment variables prefixed `PROCURA_` (`PROCURA_JWT_SECRET` -> `jwt_secret`)
//! 2. `procura.toml` in the working directory, or the file named by `PROCURA_CONFIG`
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration error: {0}")]
    Figment(#[from] Box<figment::Error>),

    #[error("invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

impl From<figment::Error> for ConfigError {
    fn from(value: figment::Error) -> Self {
        ConfigError::Figment(Box::new(value))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub bind_addr: String,
    /// HS256 secret for bearer tokens.
    pub jwt_secret: String,
    /// Postgres URL; unset selects the in-memory store.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    /// Query-cache TTL; 0 disables caching.
    pub cache_ttl_secs: u64,
    /// Timeout for SMTP delivery and mail-server connection tests.
    pub smtp_timeout_secs: u64,
    /// `smtp` relays through the tenant's provider; `log` only logs.
    pub mail_transport: String,
    /// `json` or `pretty`.
    pub log_format: String,
    pub notifications_enabled: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            jwt_secret: String::new(),
            database_url: None,
            database_max_connections: 10,
            cache_ttl_secs: 30,
            smtp_timeout_secs: 5,
            mail_transport: "smtp".to_string(),
            log_format: "json".to_string(),
            notifications_enabled: true,
        }
    }
}

impl AppConfig {
    /// Load from all sources and validate.
    pub fn load() -> Result<Self, ConfigError> {
        let config: Self = Self::figment().extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Load `.env` (if present) into the process environment first.
    pub fn load_with_dotenv() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::load()
    }

    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        let file = std::env::var("PROCURA_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("procura.toml"));
        if file.exists() {
            figment = figment.merge(Toml::file(file));
        }

        figment.merge(Env::prefixed("PROCURA_").ignore(&["config"]))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.len() < 16 {
            return Err(ConfigError::InvalidValue {
                field: "jwt_secret".to_string(),
                reason: "must be at least 16 bytes".to_string(),
            });
        }
        if self.database_url.as_deref().is_some_and(|url| url.trim().is_empty()) {
            return Err(ConfigError::InvalidValue {
                field: "database_url".to_string(),
                reason: "must not be blank when set".to_string(),
            });
        }
        if self.smtp_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "smtp_timeout_secs".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if !matches!(self.mail_transport.as_str(), "smtp" | "log") {
            return Err(ConfigError::InvalidValue {
                field: "mail_transport".to_string(),
                reason: "must be `smtp` or `log`".to_string(),
            });
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn smtp_timeout(&self) -> Duration {
        Duration::from_secs(self.smtp_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_the_in_memory_store() {
        figment::Jail::expect_with(|_jail| {
            let config: AppConfig = AppConfig::figment().extract()?;
            assert_eq!(config.database_url, None);
            assert_eq!(config.smtp_timeout(), Duration::from_secs(5));
            assert_eq!(config.bind_addr, "0.0.0.0:8080");
            assert_eq!(config.mail_transport, "smtp");
            Ok(())
        });
    }

    #[test]
    fn env_overrides_file_overrides_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "procura.toml",
                r#"
                bind_addr = "127.0.0.1:9000"
                cache_ttl_secs = 0
                jwt_secret = "from-file-secret-0000"
                "#,
            )?;
            jail.set_env("PROCURA_JWT_SECRET", "from-env-secret-0000");
            jail.set_env("PROCURA_DATABASE_URL", "postgres://localhost/procura");

            let config = AppConfig::load().map_err(|e| e.to_string())?;
            assert_eq!(config.bind_addr, "127.0.0.1:9000");
            assert_eq!(config.cache_ttl(), Duration::ZERO);
            assert_eq!(config.jwt_secret, "from-env-secret-0000");
            assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/procura"));
            Ok(())
        });
    }

    #[test]
    fn short_secrets_are_rejected() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("PROCURA_JWT_SECRET", "short");
            assert!(matches!(
                AppConfig::load(),
                Err(ConfigError::InvalidValue { field, .. }) if field == "jwt_secret"
            ));
            Ok(())
        });
    }

    #[test]
    fn unknown_mail_transports_are_rejected() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("PROCURA_JWT_SECRET", "long-enough-secret-0000");
            jail.set_env("PROCURA_MAIL_TRANSPORT", "log");
            assert_eq!(AppConfig::load().map_err(|e| e.to_string())?.mail_transport, "log");

            jail.set_env("PROCURA_MAIL_TRANSPORT", "sendmail");
            assert!(matches!(
                AppConfig::load(),
                Err(ConfigError::InvalidValue { field, .. }) if field == "mail_transport"
            ));
            Ok(())
        });
    }
}
