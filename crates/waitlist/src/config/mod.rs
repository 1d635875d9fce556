use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::rate_limit::Quota;
use crate::storage::ReconnectPolicy;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the waitlist service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub storage: StorageConfig,
    pub rate_limit: RateLimitConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = parse_var::<u16>("APP_PORT", 5000)?;
        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let uri = env::var("MONGO_URI")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        let database =
            env::var("MONGO_DATABASE").unwrap_or_else(|_| DEFAULT_DATABASE.to_string());
        let reconnect = ReconnectPolicy {
            attempts: parse_var("STORAGE_RECONNECT_ATTEMPTS", 1)?,
            backoff: Duration::from_millis(parse_var("STORAGE_RECONNECT_BACKOFF_MS", 0)?),
        };

        let rate_limit = RateLimitConfig {
            waitlist_per_minute: parse_var("RATE_LIMIT_WAITLIST_PER_MINUTE", 5)?,
            per_hour: parse_var("RATE_LIMIT_PER_HOUR", 50)?,
            per_day: parse_var("RATE_LIMIT_PER_DAY", 200)?,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            storage: StorageConfig {
                uri,
                database,
                reconnect,
            },
            rate_limit,
        })
    }
}

pub const DEFAULT_DATABASE: &str = "linkedin_jobs";

fn parse_var<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidNumber { key, value: raw }),
        Err(_) => Ok(default),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Log filter used when `RUST_LOG` is not set.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Document store connection settings.
#[derive(Clone)]
pub struct StorageConfig {
    pub uri: Option<String>,
    pub database: String,
    pub reconnect: ReconnectPolicy,
}

impl fmt::Debug for StorageConfig {
    // The URI carries credentials.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("uri", &self.uri.as_ref().map(|_| "<redacted>"))
            .field("database", &self.database)
            .field("reconnect", &self.reconnect)
            .finish()
    }
}

/// Per-client request quotas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub waitlist_per_minute: u32,
    pub per_hour: u32,
    pub per_day: u32,
}

impl RateLimitConfig {
    /// Quotas applied to every endpoint.
    pub fn default_quotas(&self) -> Vec<Quota> {
        vec![Quota::per_day(self.per_day), Quota::per_hour(self.per_hour)]
    }

    /// Quotas applied to waitlist submissions on top of the defaults.
    pub fn waitlist_quotas(&self) -> Vec<Quota> {
        vec![Quota::per_minute(self.waitlist_per_minute)]
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            waitlist_per_minute: 5,
            per_hour: 50,
            per_day: 200,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidNumber { key: &'static str, value: String },
    InvalidHost { source: std::net::AddrParseError },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidNumber { key, value } => {
                write!(f, "{key} must be a non-negative integer (got '{value}')")
            }
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidNumber { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
