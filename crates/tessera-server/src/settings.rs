//! Layered process settings: built-in defaults, optional config files,
//! then `TESSERA_`-prefixed environment variables.

use std::env;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use serde::Deserialize;
use tessera_auth::AuthConfig;
use tessera_auth::config::{LifetimeParseError, parse_lifetime};
use tessera_db::DbConfig;
use thiserror::Error;

/// Signing secret used when none is configured. Local development only.
pub const DEV_JWT_SECRET: &str = "tessera-development-secret-change-me";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("auth.{field}: {source}")]
    Lifetime {
        field: &'static str,
        source: LifetimeParseError,
    },
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthSettings {
    pub jwt_secret: String,
    pub issuer: String,
    /// Duration string, e.g. `15m`.
    pub access_token_ttl: String,
    /// Duration string, e.g. `7d`.
    pub refresh_token_ttl: String,
    /// Password hashing work factor.
    pub hash_cost: u32,
    pub hash_memory_kib: u32,
    pub min_password_length: usize,
    #[serde(default)]
    pub pepper: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Surrealdb,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageSettings {
    pub backend: StorageBackend,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub namespace: String,
    pub database: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub environment: String,
    pub server: ServerSettings,
    pub auth: AuthSettings,
    pub storage: StorageSettings,
    pub database: DatabaseSettings,
}

impl Settings {
    /// Load settings for the current `RUN_MODE` (default `development`).
    pub fn load() -> Result<Self, SettingsError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let config = Self::defaults()?
            .set_override("environment", run_mode.as_str())?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            // E.g. `TESSERA_AUTH__ACCESS_TOKEN_TTL=30m` sets `auth.access_token_ttl`.
            .add_source(
                Environment::with_prefix("TESSERA")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Self::from_config(config)
    }

    /// Builder preloaded with every default value.
    pub fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        let auth = AuthConfig::default();
        let db = DbConfig::default();

        Config::builder()
            .set_default("environment", "development")?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8081)?
            .set_default("auth.jwt_secret", DEV_JWT_SECRET)?
            .set_default("auth.issuer", auth.jwt_issuer)?
            .set_default("auth.access_token_ttl", "15m")?
            .set_default("auth.refresh_token_ttl", "7d")?
            .set_default("auth.hash_cost", auth.hash_cost)?
            .set_default("auth.hash_memory_kib", auth.hash_memory_kib)?
            .set_default("auth.min_password_length", auth.min_password_length as u64)?
            .set_default("storage.backend", "memory")?
            .set_default("database.url", db.url)?
            .set_default("database.namespace", db.namespace)?
            .set_default("database.database", db.database)
    }

    pub fn from_config(config: Config) -> Result<Self, SettingsError> {
        Ok(config.try_deserialize()?)
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.auth.jwt_secret == DEV_JWT_SECRET
    }

    pub fn auth_config(&self) -> Result<AuthConfig, SettingsError> {
        let lifetime = |field: &'static str, value: &str| {
            parse_lifetime(value).map_err(|source| SettingsError::Lifetime { field, source })
        };

        Ok(AuthConfig {
            jwt_secret: self.auth.jwt_secret.clone(),
            jwt_issuer: self.auth.issuer.clone(),
            access_token_lifetime_secs: lifetime("access_token_ttl", &self.auth.access_token_ttl)?,
            refresh_token_lifetime_secs: lifetime(
                "refresh_token_ttl",
                &self.auth.refresh_token_ttl,
            )?,
            min_password_length: self.auth.min_password_length,
            hash_cost: self.auth.hash_cost,
            hash_memory_kib: self.auth.hash_memory_kib,
            pepper: self.auth.pepper.clone().filter(|p| !p.is_empty()),
        })
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig {
            url: self.database.url.clone(),
            namespace: self.database.namespace.clone(),
            database: self.database.database.clone(),
            username: self.database.username.clone(),
            password: self.database.password.clone(),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_with(overrides: &[(&str, &str)]) -> Result<Settings, SettingsError> {
        let mut builder = Settings::defaults()?;
        for (key, value) in overrides {
            builder = builder.set_override(*key, *value)?;
        }
        Settings::from_config(builder.build()?)
    }

    #[test]
    fn defaults_match_documented_values() {
        let settings = settings_with(&[]).unwrap();
        assert_eq!(settings.server.port, 8081);
        assert_eq!(settings.storage.backend, StorageBackend::Memory);
        assert!(settings.uses_dev_secret());

        let auth = settings.auth_config().unwrap();
        assert_eq!(auth.access_token_lifetime_secs, 900);
        assert_eq!(auth.refresh_token_lifetime_secs, 604_800);
        assert_eq!(auth.hash_cost, 10);
        assert_eq!(auth.min_password_length, 8);
        assert_eq!(auth.jwt_issuer, "tessera");
        assert!(auth.pepper.is_none());
    }

    #[test]
    fn overrides_are_applied() {
        let settings = settings_with(&[
            ("auth.jwt_secret", "production-secret"),
            ("auth.access_token_ttl", "30m"),
            ("auth.refresh_token_ttl", "12h"),
            ("storage.backend", "surrealdb"),
            ("database.url", "mem://"),
        ])
        .unwrap();

        assert!(!settings.uses_dev_secret());
        assert_eq!(settings.storage.backend, StorageBackend::Surrealdb);
        assert_eq!(settings.db_config().url, "mem://");

        let auth = settings.auth_config().unwrap();
        assert_eq!(auth.access_token_lifetime_secs, 1800);
        assert_eq!(auth.refresh_token_lifetime_secs, 43_200);
    }

    #[test]
    fn database_defaults_come_from_db_config() {
        let db = settings_with(&[]).unwrap().db_config();
        let expected = DbConfig::default();
        assert_eq!(db.url, expected.url);
        assert_eq!(db.namespace, expected.namespace);
        assert_eq!(db.database, expected.database);
        assert_eq!(db.username, expected.username);
        assert_eq!(db.password, expected.password);
    }

    #[test]
    fn database_credentials_can_be_supplied() {
        let db = settings_with(&[
            ("database.username", "root"),
            ("database.password", "secret"),
        ])
        .unwrap()
        .db_config();
        assert_eq!(db.username.as_deref(), Some("root"));
        assert_eq!(db.password.as_deref(), Some("secret"));
    }

    #[test]
    fn malformed_ttl_is_rejected() {
        let settings = settings_with(&[("auth.access_token_ttl", "fifteen minutes")]).unwrap();
        let err = settings.auth_config().unwrap_err();
        assert!(err.to_string().contains("access_token_ttl"));
    }

    #[test]
    fn unknown_backend_is_rejected() {
        assert!(settings_with(&[("storage.backend", "postgres")]).is_err());
    }

    #[test]
    fn empty_pepper_means_none() {
        let settings = settings_with(&[("auth.pepper", "")]).unwrap();
        assert!(settings.auth_config().unwrap().pepper.is_none());
    }
}
