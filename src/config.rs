/// Configuration management for Event Koi
use crate::error::{KoiError, KoiResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub authentication: AuthConfig,
    pub rate_limit: RateLimitConfig,
    pub moderation: ModerationConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    pub version: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub database: PathBuf,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// Lifetime of issued session tokens
    pub session_ttl_hours: i64,
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub requests_per_second: u32,
}

/// Moderation tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationConfig {
    /// Active warnings older than this are expired by the background job
    pub warning_ttl_days: i64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

/// Upper bound for the warning TTL
pub const MAX_WARNING_TTL_DAYS: i64 = 3650;

/// Upper bound for session lifetime
pub const MAX_SESSION_TTL_HOURS: i64 = 24 * 365;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> KoiResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("KOI_HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        let port = env::var("KOI_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|_| KoiError::Validation("Invalid port number".to_string()))?;
        let version =
            env::var("KOI_VERSION").unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string());

        let data_directory: PathBuf = env::var("KOI_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let database = env::var("KOI_DB_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("event_koi.sqlite"));

        let jwt_secret = env::var("KOI_JWT_SECRET")
            .map_err(|_| KoiError::Validation("JWT secret required".to_string()))?;
        let session_ttl_hours = env_or("KOI_SESSION_TTL_HOURS", 24);

        let rate_limit_enabled = env_or("KOI_RATE_LIMITS_ENABLED", true);
        let requests_per_second = env_or("KOI_RATE_LIMIT_REQUESTS_PER_SECOND", 50);

        let warning_ttl_days = env_or("KOI_WARNING_TTL_DAYS", 90);

        let log_level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                version,
            },
            storage: StorageConfig {
                data_directory,
                database,
            },
            authentication: AuthConfig {
                jwt_secret,
                session_ttl_hours,
            },
            rate_limit: RateLimitConfig {
                enabled: rate_limit_enabled,
                requests_per_second,
            },
            moderation: ModerationConfig { warning_ttl_days },
            logging: LoggingConfig { level: log_level },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> KoiResult<()> {
        if self.service.hostname.is_empty() {
            return Err(KoiError::Validation("Hostname cannot be empty".to_string()));
        }

        if self.authentication.jwt_secret.len() < 32 {
            return Err(KoiError::Validation(
                "JWT secret must be at least 32 characters".to_string(),
            ));
        }

        let session_ttl = self.authentication.session_ttl_hours;
        if session_ttl <= 0 || session_ttl > MAX_SESSION_TTL_HOURS {
            return Err(KoiError::Validation(format!(
                "Session TTL must be between 1 and {} hours",
                MAX_SESSION_TTL_HOURS
            )));
        }

        let warning_ttl = self.moderation.warning_ttl_days;
        if warning_ttl <= 0 || warning_ttl > MAX_WARNING_TTL_DAYS {
            return Err(KoiError::Validation(format!(
                "Warning TTL must be between 1 and {} days",
                MAX_WARNING_TTL_DAYS
            )));
        }

        Ok(())
    }
}
