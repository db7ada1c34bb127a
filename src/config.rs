use std::{env, path::PathBuf};
use thiserror::Error;

/// Secret used to sign and validate session tokens when none is configured locally.
pub const LOCAL_JWT_SECRET: &str = "super-secure-test-secret-value-local";

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

/// AppConfig
///
/// The application's configuration, loaded once at startup and immutable
/// afterwards. Handlers and extractors pull it out of the application state
/// via `FromRef`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls the local developer bypass and cookie hardening.
    pub env: Env,
    // Postgres connection string for the profile directory. Optional in local runs.
    pub db_url: Option<String>,
    // Base URL of the hosted identity provider (e.g. https://<project>.supabase.co).
    pub auth_url: Option<String>,
    // Public API key sent with every identity-provider request.
    pub auth_anon_key: Option<String>,
    // Secret the identity provider signs session tokens with.
    pub jwt_secret: String,
    // Address the HTTP server listens on.
    pub bind_addr: String,
    // Directory holding per-page HTML content modules.
    pub content_dir: Option<PathBuf>,
}

/// Env
///
/// The runtime context: `Local` enables developer conveniences, `Production`
/// demands every secret explicitly.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set in production")]
    Missing(&'static str),
}

impl Default for AppConfig {
    /// A local configuration with no external services, used by tests.
    fn default() -> Self {
        Self {
            env: Env::Local,
            db_url: None,
            auth_url: None,
            auth_anon_key: None,
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            content_dir: None,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from the environment. Production refuses to
    /// start without its database, identity provider and token secret; local
    /// runs fall back to in-memory services and a fixed secret.
    pub fn load() -> Result<Self, ConfigError> {
        let env = match var("APP_ENV").as_deref() {
            Some("production") => Env::Production,
            _ => Env::Local,
        };

        let bind_addr = var("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let content_dir = var("CONTENT_DIR").map(PathBuf::from);

        match env {
            Env::Local => Ok(Self {
                env: Env::Local,
                db_url: var("DATABASE_URL"),
                auth_url: var("AUTH_URL"),
                auth_anon_key: var("AUTH_ANON_KEY"),
                jwt_secret: var("AUTH_JWT_SECRET").unwrap_or_else(|| LOCAL_JWT_SECRET.to_string()),
                bind_addr,
                content_dir,
            }),
            Env::Production => Ok(Self {
                env: Env::Production,
                db_url: Some(required("DATABASE_URL")?),
                auth_url: Some(required("AUTH_URL")?),
                auth_anon_key: Some(required("AUTH_ANON_KEY")?),
                jwt_secret: required("AUTH_JWT_SECRET")?,
                bind_addr,
                content_dir,
            }),
        }
    }
}

// Unset and blank are treated alike.
fn var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    var(name).ok_or(ConfigError::Missing(name))
}
