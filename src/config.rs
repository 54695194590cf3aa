use chrono::Duration;
use std::env;
use std::str::FromStr;
use thiserror::Error;

use crate::auth::TokenConfig;

pub const MIN_SECRET_BYTES: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} has an invalid value '{value}'")]
    Invalid { key: &'static str, value: String },
    #[error("JWT_SECRET must be at least 32 bytes")]
    WeakSecret,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    /// Postgres is used when set; otherwise the in-memory repositories.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_hours: i64,
    pub token_clock_skew_seconds: u64,
    pub bcrypt_cost: u32,
    pub revocation_cleanup_interval_seconds: u64,
    pub shutdown_timeout_seconds: u64,
    pub app_name: String,
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

impl Config {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let jwt_secret = lookup("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;
        if jwt_secret.len() < MIN_SECRET_BYTES {
            return Err(ConfigError::WeakSecret);
        }

        let bcrypt_cost: u32 = parse_or(&lookup, "BCRYPT_COST", bcrypt::DEFAULT_COST)?;
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(ConfigError::Invalid {
                key: "BCRYPT_COST",
                value: bcrypt_cost.to_string(),
            });
        }

        let access_token_ttl_minutes = parse_or(&lookup, "ACCESS_TOKEN_TTL_MINUTES", 15)?;
        if access_token_ttl_minutes <= 0 {
            return Err(ConfigError::Invalid {
                key: "ACCESS_TOKEN_TTL_MINUTES",
                value: access_token_ttl_minutes.to_string(),
            });
        }
        let refresh_token_ttl_hours = parse_or(&lookup, "REFRESH_TOKEN_TTL_HOURS", 168)?;
        if refresh_token_ttl_hours <= 0 {
            return Err(ConfigError::Invalid {
                key: "REFRESH_TOKEN_TTL_HOURS",
                value: refresh_token_ttl_hours.to_string(),
            });
        }

        Ok(Self {
            server_host: lookup("SERVER_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            server_port: parse_or(&lookup, "SERVER_PORT", 8080)?,
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            database_max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
            jwt_secret,
            jwt_issuer: lookup("JWT_ISSUER").unwrap_or_else(|| "todoforge".to_string()),
            access_token_ttl_minutes,
            refresh_token_ttl_hours,
            token_clock_skew_seconds: parse_or(&lookup, "TOKEN_CLOCK_SKEW_SECONDS", 0)?,
            bcrypt_cost,
            revocation_cleanup_interval_seconds: parse_or(
                &lookup,
                "REVOCATION_CLEANUP_INTERVAL_SECONDS",
                300,
            )?,
            shutdown_timeout_seconds: parse_or(&lookup, "SHUTDOWN_TIMEOUT_SECONDS", 30)?,
            app_name: lookup("APP_NAME").unwrap_or_else(|| "todoforge".to_string()),
        })
    }

    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.server_host, self.server_port)
    }

    pub fn token_config(&self) -> TokenConfig {
        TokenConfig {
            access_ttl: Duration::minutes(self.access_token_ttl_minutes),
            refresh_ttl: Duration::hours(self.refresh_token_ttl_hours),
            leeway_seconds: self.token_clock_skew_seconds,
            ..TokenConfig::new(self.jwt_secret.clone())
        }
    }
}
