use std::env;

use thiserror::Error;

use crate::rate_limit::RateLimitConfig;

const LOCAL_JWT_SECRET: &str = "redline-local-development-secret";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

/// ConfigError
///
/// Startup configuration failures. `main` reports these and exits instead of serving
/// with a half-configured process.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set in production")]
    MissingProductionVar(&'static str),

    #[error("invalid value for {var}: {value}")]
    InvalidValue { var: &'static str, value: String },
}

/// Env
///
/// Runtime context. `Local` enables the `x-user-id` auth bypass, the in-memory
/// repository fallback and bucket auto-provisioning; `Production` disables all three.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Env {
    Local,
    Production,
}

/// AppConfig
///
/// Immutable configuration loaded once at startup and pulled into handlers via
/// `FromRef`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub env: Env,
    /// Postgres connection string. `None` (local only) selects the in-memory repository.
    pub db_url: Option<String>,
    pub bind_addr: String,
    // S3-compatible object storage (MinIO locally).
    pub s3_endpoint: String,
    pub s3_region: String,
    pub s3_key: String,
    pub s3_secret: String,
    pub s3_bucket: String,
    /// HS256 secret shared with the identity provider.
    pub jwt_secret: String,
    pub rate_limit: RateLimitConfig,
}

impl Default for AppConfig {
    /// Local settings with dummy credentials, used to build test state without
    /// touching the process environment.
    fn default() -> Self {
        Self {
            env: Env::Local,
            db_url: None,
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            s3_endpoint: "http://localhost:9000".to_string(),
            s3_region: "us-east-1".to_string(),
            s3_key: "admin".to_string(),
            s3_secret: "password".to_string(),
            s3_bucket: "redline-test".to_string(),
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from the environment. Local mode fills every gap with a
    /// development default; production requires `DATABASE_URL`, `AUTH_JWT_SECRET`,
    /// `S3_ENDPOINT`, `S3_ACCESS_KEY` and `S3_SECRET_KEY`.
    pub fn load() -> Result<Self, ConfigError> {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            Ok("local") | Err(_) => Env::Local,
            Ok(other) => {
                return Err(ConfigError::InvalidValue {
                    var: "APP_ENV",
                    value: other.to_string(),
                });
            }
        };

        let rate_limit = RateLimitConfig {
            enabled: parse_bool("RATE_LIMIT_ENABLED", true)?,
            ..RateLimitConfig::default()
        };
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());

        match env {
            Env::Local => {
                let defaults = Self::default();
                Ok(Self {
                    env,
                    db_url: optional("DATABASE_URL"),
                    bind_addr,
                    s3_endpoint: optional("S3_ENDPOINT").unwrap_or(defaults.s3_endpoint),
                    s3_region: optional("S3_REGION").unwrap_or(defaults.s3_region),
                    s3_key: optional("S3_ACCESS_KEY").unwrap_or(defaults.s3_key),
                    s3_secret: optional("S3_SECRET_KEY").unwrap_or(defaults.s3_secret),
                    s3_bucket: optional("S3_BUCKET_NAME")
                        .unwrap_or_else(|| "redline-uploads".to_string()),
                    jwt_secret: optional("AUTH_JWT_SECRET").unwrap_or(defaults.jwt_secret),
                    rate_limit,
                })
            }
            Env::Production => Ok(Self {
                env,
                db_url: Some(required("DATABASE_URL")?),
                bind_addr,
                s3_endpoint: required("S3_ENDPOINT")?,
                s3_region: optional("S3_REGION").unwrap_or_else(|| "us-east-1".to_string()),
                s3_key: required("S3_ACCESS_KEY")?,
                s3_secret: required("S3_SECRET_KEY")?,
                s3_bucket: optional("S3_BUCKET_NAME")
                    .unwrap_or_else(|| "redline-uploads".to_string()),
                jwt_secret: required("AUTH_JWT_SECRET")?,
                rate_limit,
            }),
        }
    }
}

/// Non-empty value of `var`, if set.
fn optional(var: &str) -> Option<String> {
    env::var(var).ok().filter(|v| !v.trim().is_empty())
}

fn required(var: &'static str) -> Result<String, ConfigError> {
    optional(var).ok_or(ConfigError::MissingProductionVar(var))
}

fn parse_bool(var: &'static str, default: bool) -> Result<bool, ConfigError> {
    match optional(var) {
        None => Ok(default),
        Some(value) => match value.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue { var, value }),
        },
    }
}
