//! Configuration loading and representation.
//!
//! Everything is read from `WARDEN_*` environment variables. Parsing goes
//! through [`AuthConfig::from_lookup`] so tests never touch the process
//! environment.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_ISSUER: &str = "warden";
pub const DEFAULT_ACCESS_TOKEN_TTL_MINUTES: i64 = 15;
pub const DEFAULT_REFRESH_TOKEN_TTL_DAYS: i64 = 7;
pub const DEFAULT_JWKS_TTL: Duration = Duration::from_secs(3600);
pub const DEFAULT_PERMISSION_CACHE_TTL: Duration = Duration::from_secs(300);
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

pub const MAX_ACCESS_TOKEN_TTL_MINUTES: i64 = 24 * 60;
pub const MAX_REFRESH_TOKEN_TTL_DAYS: i64 = 365;
/// Upper bound for the second-granularity cache TTLs (one week).
pub const MAX_CACHE_TTL_SECS: i64 = 7 * 24 * 3600;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be an integer between 1 and {max}, got '{value}'")]
    InvalidNumber {
        var: &'static str,
        value: String,
        max: i64,
    },

    #[error("{0} is required")]
    Missing(&'static str),
}

/// Runtime configuration for the trust core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthConfig {
    pub issuer: String,
    /// `kid` stamped on locally issued tokens.
    pub key_id: Option<String>,
    pub private_key_path: PathBuf,
    pub public_key_path: PathBuf,
    /// Shared secret for the legacy HS256 scheme; the fallback is disabled when unset.
    pub legacy_secret: Option<String>,
    /// Remote JWKS endpoint; rotating keys are disabled when unset.
    pub jwks_url: Option<String>,
    /// Expected `aud` of externally issued tokens; unchecked when unset.
    pub audience: Option<String>,
    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_days: i64,
    pub jwks_ttl: Duration,
    pub permission_cache_ttl: Duration,
    pub redis_url: Option<String>,
    pub bind_addr: String,
}

impl AuthConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let number = |var: &'static str, default: i64, max: i64| -> Result<i64, ConfigError> {
            match get(var) {
                None => Ok(default),
                Some(raw) => match raw.parse::<i64>() {
                    Ok(n) if (1..=max).contains(&n) => Ok(n),
                    _ => Err(ConfigError::InvalidNumber { var, value: raw, max }),
                },
            }
        };

        let secs = |var: &'static str, default: Duration| -> Result<Duration, ConfigError> {
            let default_secs = i64::try_from(default.as_secs()).unwrap_or(MAX_CACHE_TTL_SECS);
            number(var, default_secs, MAX_CACHE_TTL_SECS).map(|n| Duration::from_secs(n.unsigned_abs()))
        };

        Ok(Self {
            issuer: get("WARDEN_ISSUER").unwrap_or_else(|| DEFAULT_ISSUER.to_string()),
            key_id: get("WARDEN_KEY_ID"),
            private_key_path: get("WARDEN_PRIVATE_KEY_PATH")
                .map(PathBuf::from)
                .ok_or(ConfigError::Missing("WARDEN_PRIVATE_KEY_PATH"))?,
            public_key_path: get("WARDEN_PUBLIC_KEY_PATH")
                .map(PathBuf::from)
                .ok_or(ConfigError::Missing("WARDEN_PUBLIC_KEY_PATH"))?,
            legacy_secret: get("WARDEN_JWT_SECRET"),
            jwks_url: get("WARDEN_JWKS_URL"),
            audience: get("WARDEN_AUDIENCE"),
            access_token_ttl_minutes: number(
                "WARDEN_ACCESS_TOKEN_TTL_MINUTES",
                DEFAULT_ACCESS_TOKEN_TTL_MINUTES,
                MAX_ACCESS_TOKEN_TTL_MINUTES,
            )?,
            refresh_token_ttl_days: number(
                "WARDEN_REFRESH_TOKEN_TTL_DAYS",
                DEFAULT_REFRESH_TOKEN_TTL_DAYS,
                MAX_REFRESH_TOKEN_TTL_DAYS,
            )?,
            jwks_ttl: secs("WARDEN_JWKS_TTL_SECS", DEFAULT_JWKS_TTL)?,
            permission_cache_ttl: secs(
                "WARDEN_PERMISSION_CACHE_TTL_SECS",
                DEFAULT_PERMISSION_CACHE_TTL,
            )?,
            redis_url: get("WARDEN_REDIS_URL"),
            bind_addr: get("WARDEN_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
        })
    }
}
