//! # Service Configuration
//!
//! Loaded once at startup from TOML. Every section and every field has a
//! default, so an empty file is a valid (local development) config.
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:8080"
//! production = false
//!
//! [database]
//! url = "postgres://localhost/orrery"
//! max_connections = 10
//!
//! [auth]
//! admin_token = "change-me"
//! client_url = "http://localhost:3000"
//! error_url = "http://localhost:3000/login"
//! strict_fingerprint = false
//!
//! [auth.providers.github]
//! client_id = "..."
//!
//! [generation]
//! max_players = 8
//! turn_interval_hours = 24
//! run_name = "Orrery"
//! ```
//!
//! `ORRERY_DATABASE_URL` and `ORRERY_ADMIN_TOKEN` override the file.

use std::collections::BTreeMap;
use std::path::Path;

use orrery_security::ProviderConfig;
use orrery_shared::{Error, Result};
use serde::{Deserialize, Serialize};

/// Environment variable overriding `database.url`.
pub const ENV_DATABASE_URL: &str = "ORRERY_DATABASE_URL";

/// Environment variable overriding `auth.admin_token`.
pub const ENV_ADMIN_TOKEN: &str = "ORRERY_ADMIN_TOKEN";

/// Root of the config file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrreryConfig {
    /// HTTP listener.
    pub server: ServerConfig,
    /// Postgres pool.
    pub database: DatabaseConfig,
    /// Admin guard and OAuth login.
    pub auth: AuthConfig,
    /// Defaults for fields a create request leaves out.
    pub generation: GenerationDefaults,
}

/// `[server]`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address.
    pub bind: String,
    /// Production mode: session cookies get `Secure`.
    pub production: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
            production: false,
        }
    }
}

/// `[database]`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection URL.
    pub url: String,
    /// Pool size.
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/orrery".to_string(),
            max_connections: 10,
        }
    }
}

/// `[auth]`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Value expected in `X-Admin-Token`. Empty disables the admin routes.
    pub admin_token: String,
    /// Where a successful login lands.
    pub client_url: String,
    /// Where a failed login lands.
    pub error_url: String,
    /// Reject callbacks whose fingerprint differs from the one at issue time.
    pub strict_fingerprint: bool,
    /// OAuth providers by name (`github`, `google`, ...).
    pub providers: BTreeMap<String, ProviderConfig>,
}

/// `[generation]`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationDefaults {
    /// Player cap of a new run.
    pub max_players: i32,
    /// Hours between turns of a new run.
    pub turn_interval_hours: i32,
    /// Name of a new run (and of its universe).
    pub run_name: String,
}

impl Default for GenerationDefaults {
    fn default() -> Self {
        Self {
            max_players: 8,
            turn_interval_hours: 24,
            run_name: "Orrery".to_string(),
        }
    }
}

impl OrreryConfig {
    /// Parses a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::validation("invalid configuration").with_cause(e))
    }

    /// Reads and parses a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::internal(format!("cannot read config file {}", path.display())).with_cause(e)
        })?;
        Self::from_toml_str(&text)
            .map_err(|e| e.context(format!("invalid configuration in {}", path.display())))
    }

    /// Config from `path` (or defaults), then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_toml_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Applies overrides from `lookup` (the process environment in `load`).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(ENV_DATABASE_URL).filter(|v| !v.is_empty()) {
            self.database.url = url;
        }
        if let Some(token) = lookup(ENV_ADMIN_TOKEN).filter(|v| !v.is_empty()) {
            self.auth.admin_token = token;
        }
    }

    /// Provider section by name.
    #[must_use]
    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.auth.providers.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orrery_shared::ErrorKind;

    #[test]
    fn test_empty_document_is_all_defaults() {
        let config = OrreryConfig::from_toml_str("").unwrap();
        assert_eq!(config, OrreryConfig::default());
        assert_eq!(config.server.bind, "0.0.0.0:8080");
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.generation.max_players, 8);
        assert_eq!(config.generation.turn_interval_hours, 24);
        assert!(config.auth.providers.is_empty());
    }

    #[test]
    fn test_full_document() {
        let config = OrreryConfig::from_toml_str(
            r#"
            [server]
            bind = "127.0.0.1:9000"
            production = true

            [auth]
            admin_token = "s3cret"
            client_url = "https://play.example.com"
            error_url = "https://play.example.com/login"
            strict_fingerprint = true

            [auth.providers.github]
            client_id = "abc"
            client_secret = "xyz"
            authorize_url = "https://github.com/login/oauth/authorize"
            token_url = "https://github.com/login/oauth/access_token"
            userinfo_url = "https://api.github.com/user"
            emails_url = "https://api.github.com/user/emails"
            redirect_url = "https://play.example.com/auth/github/callback"
            scopes = ["read:user", "user:email"]

            [generation]
            run_name = "Season 3"
            "#,
        )
        .unwrap();

        assert!(config.server.production);
        assert_eq!(config.auth.admin_token, "s3cret");
        assert!(config.auth.strict_fingerprint);
        let github = config.provider("github").unwrap();
        assert_eq!(github.client_id, "abc");
        assert_eq!(github.scopes.len(), 2);
        assert!(config.provider("google").is_none());
        assert_eq!(config.generation.run_name, "Season 3");
        assert_eq!(config.generation.max_players, 8);
    }

    #[test]
    fn test_malformed_document() {
        let err = OrreryConfig::from_toml_str("[server\nbind = 1").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_environment_overrides() {
        let mut config = OrreryConfig::default();
        config.apply_overrides(|key| match key {
            ENV_DATABASE_URL => Some("postgres://db/prod".to_string()),
            ENV_ADMIN_TOKEN => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.database.url, "postgres://db/prod");
        assert_eq!(config.auth.admin_token, "");
    }

    #[test]
    fn test_shipped_example_parses() {
        let config =
            OrreryConfig::from_toml_str(include_str!("../config/orrery.example.toml")).unwrap();
        assert_eq!(config.auth.providers.len(), 2);
        assert!(config.provider("google").unwrap().emails_url.is_none());
        assert_eq!(config.generation, GenerationDefaults::default());
    }

    #[test]
    fn test_missing_file() {
        let err = OrreryConfig::from_toml_file("/nonexistent/orrery.toml").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }
}
