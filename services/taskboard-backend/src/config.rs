//! Type-Safe Configuration with Validation
//!
//! Loads service configuration from environment variables (optionally from a
//! `.env` file) and validates it once at startup.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::observability::sampler::SamplerIntervals;
use crate::observability::telemetry::TelemetryConfig;
use crate::storage::PoolOptions;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid URL format
    #[error("Invalid URL for {field}: {reason}")]
    InvalidUrl {
        /// Environment variable holding the URL
        field: String,
        /// Why the URL was rejected
        reason: String,
    },

    /// Invalid port number
    #[error("Invalid port: must be between 1 and 65535")]
    InvalidPort,

    /// Invalid interval value
    #[error("Invalid interval for {0}: must be greater than 0")]
    InvalidInterval(String),

    /// Invalid connection pool limits
    #[error("Invalid connection pool: {0}")]
    InvalidPool(String),

    /// Missing required field
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    /// Environment variable parse error
    #[error("Failed to parse environment variable {name}: {reason}")]
    ParseError {
        /// Variable name
        name: String,
        /// Parser message
        reason: String,
    },
}

/// Service configuration with validation.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address
    pub host: String,
    /// Server port (1-65535)
    pub port: u16,
    /// OTLP/gRPC collector endpoint
    pub otlp_endpoint: Url,
    /// Collector reachability probe timeout in seconds
    pub otlp_connect_timeout_secs: u64,
    /// Periodic metric export interval in seconds
    pub metrics_export_interval_secs: u64,
    /// Resource `service.name`
    pub service_name: String,
    /// Resource `service.version`
    pub service_version: String,
    /// Resource `deployment.environment`
    pub deployment_environment: String,
    /// SQLite database file
    pub database_path: PathBuf,
    /// Maximum open connections in the pool
    pub db_max_open_conns: usize,
    /// Maximum idle connections kept by the pool
    pub db_max_idle_conns: usize,
    /// Connection max lifetime in seconds
    pub db_conn_max_lifetime_secs: u64,
    /// Process sampler interval in seconds
    pub process_sample_interval_secs: u64,
    /// Connection pool sampler interval in seconds
    pub pool_sample_interval_secs: u64,
    /// Task count sampler timer in seconds
    pub task_sample_interval_secs: u64,
    /// Allowed CORS origin
    pub frontend_origin: String,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
    /// Default log filter when `RUST_LOG` is unset
    pub log_level: String,
    /// Emit JSON log lines
    pub log_json: bool,
}

impl Config {
    /// Loads configuration from environment variables with validation.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: parse_env("PORT", 8080)?,
            otlp_endpoint: parse_endpoint_env(
                "OTEL_EXPORTER_OTLP_ENDPOINT",
                "http://otel-collector:4317",
            )?,
            otlp_connect_timeout_secs: parse_env("OTEL_CONNECT_TIMEOUT_SECS", 5)?,
            metrics_export_interval_secs: parse_env("METRICS_EXPORT_INTERVAL_SECS", 10)?,
            service_name: env::var("SERVICE_NAME")
                .unwrap_or_else(|_| "taskboard-backend".to_string()),
            service_version: env::var("SERVICE_VERSION").unwrap_or_else(|_| "1.0.0".to_string()),
            deployment_environment: env::var("DEPLOYMENT_ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string()),
            database_path: env::var("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("taskboard.db")),
            db_max_open_conns: parse_env("DB_MAX_OPEN_CONNS", 20)?,
            db_max_idle_conns: parse_env("DB_MAX_IDLE_CONNS", 5)?,
            db_conn_max_lifetime_secs: parse_env("DB_CONN_MAX_LIFETIME_SECS", 3600)?,
            process_sample_interval_secs: parse_env("PROCESS_SAMPLE_INTERVAL_SECS", 15)?,
            pool_sample_interval_secs: parse_env("POOL_SAMPLE_INTERVAL_SECS", 10)?,
            task_sample_interval_secs: parse_env("TASK_SAMPLE_INTERVAL_SECS", 30)?,
            frontend_origin: env::var("FRONTEND_ORIGIN")
                .ok()
                .filter(|origin| !origin.is_empty())
                .unwrap_or_else(|| "http://localhost".to_string()),
            shutdown_timeout_seconds: parse_env("SHUTDOWN_TIMEOUT", 30)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_json: parse_env("LOG_JSON", true)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        for (name, value) in [
            ("OTEL_CONNECT_TIMEOUT_SECS", self.otlp_connect_timeout_secs),
            ("METRICS_EXPORT_INTERVAL_SECS", self.metrics_export_interval_secs),
            ("PROCESS_SAMPLE_INTERVAL_SECS", self.process_sample_interval_secs),
            ("POOL_SAMPLE_INTERVAL_SECS", self.pool_sample_interval_secs),
            ("TASK_SAMPLE_INTERVAL_SECS", self.task_sample_interval_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidInterval(name.to_string()));
            }
        }
        if self.db_max_open_conns == 0 {
            return Err(ConfigError::InvalidPool(
                "DB_MAX_OPEN_CONNS must be greater than 0".to_string(),
            ));
        }
        if self.db_max_idle_conns > self.db_max_open_conns {
            return Err(ConfigError::InvalidPool(
                "DB_MAX_IDLE_CONNS must not exceed DB_MAX_OPEN_CONNS".to_string(),
            ));
        }
        if self.service_name.is_empty() {
            return Err(ConfigError::MissingRequired("service_name".to_string()));
        }
        Ok(())
    }

    /// Builds the telemetry lifecycle configuration.
    #[must_use]
    pub fn telemetry_config(&self) -> TelemetryConfig {
        TelemetryConfig {
            service_name: self.service_name.clone(),
            service_version: self.service_version.clone(),
            deployment_environment: self.deployment_environment.clone(),
            otlp_endpoint: self.otlp_endpoint.clone(),
            connect_timeout: Duration::from_secs(self.otlp_connect_timeout_secs),
            export_interval: Duration::from_secs(self.metrics_export_interval_secs),
            log_level: self.log_level.clone(),
            log_json: self.log_json,
        }
    }

    /// Builds the connection pool limits.
    #[must_use]
    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions {
            max_open: self.db_max_open_conns,
            max_idle: self.db_max_idle_conns,
            max_lifetime: Duration::from_secs(self.db_conn_max_lifetime_secs),
        }
    }

    /// Builds the sampler schedule.
    #[must_use]
    pub fn sampler_intervals(&self) -> SamplerIntervals {
        SamplerIntervals {
            process: Duration::from_secs(self.process_sample_interval_secs),
            pool: Duration::from_secs(self.pool_sample_interval_secs),
            tasks: Duration::from_secs(self.task_sample_interval_secs),
        }
    }

    /// Host and port for the listener; the host may be a name or a bare IP.
    #[must_use]
    pub fn bind_address(&self) -> (&str, u16) {
        (self.host.as_str(), self.port)
    }

    /// Gets the graceful shutdown timeout.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_seconds)
    }
}

/// Parse an environment variable with a default value.
fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(val) => val.parse().map_err(|e: T::Err| ConfigError::ParseError {
            name: name.to_string(),
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

/// Parse a collector endpoint, accepting a bare `host:port`.
fn parse_endpoint_env(name: &str, default: &str) -> Result<Url, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    parse_endpoint(name, &raw)
}

fn parse_endpoint(name: &str, raw: &str) -> Result<Url, ConfigError> {
    let with_scheme = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("http://{raw}")
    };

    let url = Url::parse(&with_scheme).map_err(|e| ConfigError::InvalidUrl {
        field: name.to_string(),
        reason: e.to_string(),
    })?;

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl {
            field: name.to_string(),
            reason: "missing host".to_string(),
        });
    }
    Ok(url)
}
