//! Server configuration from the environment.
//!
//! `JWT_SECRET` is the only required variable. Everything else has a
//! default from [`leadforge_core::defaults`]; a variable that is set but
//! unparsable aborts startup instead of silently falling back.

use std::env;
use std::str::FromStr;

use thiserror::Error;

use leadforge_core::defaults::{
    ACCESS_TOKEN_TTL_SECS, JWT_ISSUER, JWT_SECRET_MIN_BYTES, RATE_LIMIT_PERIOD_SECS,
    RATE_LIMIT_REQUESTS, REFRESH_TOKEN_TTL_DAYS, SERVER_HOST, SERVER_PORT,
};
use leadforge_relay::RelayConfig;

const DEFAULT_DATABASE_URL: &str = "postgres://localhost/leadforge";
const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("Invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error(transparent)]
    Relay(#[from] leadforge_relay::ConfigError),
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_days: i64,
    pub allowed_origins: Vec<String>,
    pub rate_limit_enabled: bool,
    pub rate_limit_requests: u32,
    pub rate_limit_period_secs: u64,
    /// When false, workflows are stored but never called.
    pub relay_enabled: bool,
    pub relay: RelayConfig,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("jwt_secret", &"[REDACTED]")
            .field("jwt_issuer", &self.jwt_issuer)
            .field("access_token_ttl_secs", &self.access_token_ttl_secs)
            .field("refresh_token_ttl_days", &self.refresh_token_ttl_days)
            .field("allowed_origins", &self.allowed_origins)
            .field("rate_limit_enabled", &self.rate_limit_enabled)
            .field("relay_enabled", &self.relay_enabled)
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let jwt_secret = non_empty("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;
        if jwt_secret.len() < JWT_SECRET_MIN_BYTES {
            return Err(ConfigError::Invalid {
                var: "JWT_SECRET",
                reason: format!("must be at least {JWT_SECRET_MIN_BYTES} bytes"),
            });
        }

        let access_token_ttl_secs = parse_or("ACCESS_TOKEN_TTL_SECS", ACCESS_TOKEN_TTL_SECS)?;
        let refresh_token_ttl_days = parse_or("REFRESH_TOKEN_TTL_DAYS", REFRESH_TOKEN_TTL_DAYS)?;
        if access_token_ttl_secs <= 0 {
            return Err(positive("ACCESS_TOKEN_TTL_SECS"));
        }
        if refresh_token_ttl_days <= 0 {
            return Err(positive("REFRESH_TOKEN_TTL_DAYS"));
        }

        let rate_limit_requests = parse_or("RATE_LIMIT_REQUESTS", RATE_LIMIT_REQUESTS as u32)?;
        let rate_limit_period_secs = parse_or("RATE_LIMIT_PERIOD_SECS", RATE_LIMIT_PERIOD_SECS)?;
        if rate_limit_requests == 0 {
            return Err(positive("RATE_LIMIT_REQUESTS"));
        }
        if rate_limit_period_secs == 0 {
            return Err(positive("RATE_LIMIT_PERIOD_SECS"));
        }

        Ok(Self {
            database_url: non_empty("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.into()),
            host: non_empty("HOST").unwrap_or_else(|| SERVER_HOST.into()),
            port: parse_or("PORT", SERVER_PORT)?,
            jwt_secret,
            jwt_issuer: non_empty("JWT_ISSUER").unwrap_or_else(|| JWT_ISSUER.into()),
            access_token_ttl_secs,
            refresh_token_ttl_days,
            allowed_origins: parse_origins(
                &non_empty("ALLOWED_ORIGINS").unwrap_or_else(|| DEFAULT_ALLOWED_ORIGINS.into()),
            ),
            rate_limit_enabled: flag_or("RATE_LIMIT_ENABLED", true),
            rate_limit_requests,
            rate_limit_period_secs,
            relay_enabled: flag_or("RELAY_ENABLED", true),
            relay: RelayConfig::from_env()?,
        })
    }

    /// Settings for tests and local tooling. Never used by the binary.
    pub fn for_tests(jwt_secret: &str) -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.into(),
            host: SERVER_HOST.into(),
            port: SERVER_PORT,
            jwt_secret: jwt_secret.into(),
            jwt_issuer: JWT_ISSUER.into(),
            access_token_ttl_secs: ACCESS_TOKEN_TTL_SECS,
            refresh_token_ttl_days: REFRESH_TOKEN_TTL_DAYS,
            allowed_origins: parse_origins(DEFAULT_ALLOWED_ORIGINS),
            rate_limit_enabled: false,
            rate_limit_requests: RATE_LIMIT_REQUESTS as u32,
            rate_limit_period_secs: RATE_LIMIT_PERIOD_SECS,
            relay_enabled: false,
            relay: RelayConfig::default(),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Split a comma-separated origin list, dropping blanks.
pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn non_empty(var: &str) -> Option<String> {
    env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or<T>(var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match non_empty(var) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: format!("{raw:?}: {e}"),
        }),
        None => Ok(default),
    }
}

fn flag_or(var: &str, default: bool) -> bool {
    non_empty(var)
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(default)
}

fn positive(var: &'static str) -> ConfigError {
    ConfigError::Invalid {
        var,
        reason: "must be greater than zero".into(),
    }
}
