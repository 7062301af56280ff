//! Service configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `JWT_SECRET` - Token signing secret (min 32 chars)
//! - `DATABASE_URL` - `PostgreSQL` connection string (unless `POS_STORE=memory`)
//!
//! ## Optional
//! - `POS_HOST` - Bind address (default: 0.0.0.0)
//! - `PORT` - Listen port (default: 8083)
//! - `POS_STORE` - `postgres` or `memory` (default: postgres)
//! - `DATABASE_MAX_CONNECTIONS` - Pool size (default: 10)
//! - `TOKEN_TTL_MINUTES` - Access token lifetime (default: 720)
//! - `REPORT_TOP_N` - Entries in the top products chart (default: 5)
//! - `NATS_URL` - Event broker; events are only logged when unset
//! - `BOOTSTRAP_ADMIN_EMAIL` - First admin account (default: admin@cafe.com)
//! - `BOOTSTRAP_ADMIN_PASSWORD` - Creates the first admin when no user exists

use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use secrecy::SecretString;
use thiserror::Error;

use crate::domain::reporting::DEFAULT_TOP_N;

const MIN_JWT_SECRET_LENGTH: usize = 32;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreKind {
    Postgres,
    Memory,
}

impl FromStr for StoreKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => Err(format!("expected `postgres` or `memory`, got `{other}`")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: SecretString,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub store: StoreKind,
    /// Present whenever `store` is `Postgres`.
    pub database_url: Option<SecretString>,
    pub max_connections: u32,
    pub jwt_secret: SecretString,
    pub token_ttl_minutes: i64,
    pub report_top_n: usize,
    pub nats_url: Option<String>,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

impl Config {
    /// # Errors
    ///
    /// Returns `ConfigError` if a required variable is missing or a value
    /// cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key/value source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let store: StoreKind = parse_or(&get, "POS_STORE", StoreKind::Postgres)?;
        let database_url = match store {
            StoreKind::Postgres => Some(SecretString::from(
                get("DATABASE_URL").ok_or_else(|| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?,
            )),
            StoreKind::Memory => get("DATABASE_URL").map(SecretString::from),
        };

        let jwt_secret = get("JWT_SECRET").ok_or_else(|| ConfigError::MissingEnvVar("JWT_SECRET".to_string()))?;
        if jwt_secret.len() < MIN_JWT_SECRET_LENGTH {
            return Err(ConfigError::InsecureSecret(
                "JWT_SECRET".to_string(),
                format!("must be at least {MIN_JWT_SECRET_LENGTH} characters"),
            ));
        }

        let token_ttl_minutes: i64 = parse_or(&get, "TOKEN_TTL_MINUTES", 720)?;
        if token_ttl_minutes <= 0 {
            return Err(ConfigError::InvalidEnvVar("TOKEN_TTL_MINUTES".to_string(), "must be positive".to_string()));
        }
        let report_top_n: usize = parse_or(&get, "REPORT_TOP_N", DEFAULT_TOP_N)?;
        if report_top_n == 0 {
            return Err(ConfigError::InvalidEnvVar("REPORT_TOP_N".to_string(), "must be positive".to_string()));
        }

        let bootstrap_admin = get("BOOTSTRAP_ADMIN_PASSWORD").map(|password| BootstrapAdmin {
            email: get("BOOTSTRAP_ADMIN_EMAIL").unwrap_or_else(|| "admin@cafe.com".to_string()),
            password: SecretString::from(password),
        });

        Ok(Self {
            host: parse_or(&get, "POS_HOST", IpAddr::from([0, 0, 0, 0]))?,
            port: parse_or(&get, "PORT", 8083)?,
            store,
            database_url,
            max_connections: parse_or(&get, "DATABASE_MAX_CONNECTIONS", 10)?,
            jwt_secret: SecretString::from(jwt_secret),
            token_ttl_minutes,
            report_top_n,
            nats_url: get("NATS_URL"),
            bootstrap_admin,
        })
    }

    pub fn socket_addr(&self) -> SocketAddr { SocketAddr::new(self.host, self.port) }
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
    }
}
