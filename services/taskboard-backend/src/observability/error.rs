//! Telemetry and sampler error types.

use thiserror::Error;

/// Fatal telemetry errors raised while bringing the subsystem up.
///
/// Every variant aborts startup; there is no degraded mode without
/// telemetry.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// The collector endpoint did not accept a connection
    #[error("Collector unreachable at {endpoint}: {reason}")]
    CollectorUnreachable {
        /// `host:port` that was probed
        endpoint: String,
        /// Connect failure or timeout description
        reason: String,
    },

    /// An exporter or provider could not be built
    #[error("Exporter setup failed for {signal}: {reason}")]
    Exporter {
        /// `traces` or `metrics`
        signal: &'static str,
        /// Underlying error message
        reason: String,
    },

    /// An instrument declaration violates naming or unit rules
    #[error("Invalid instrument {name}: {reason}")]
    InvalidInstrument {
        /// Offending instrument name
        name: String,
        /// Rule that was violated
        reason: String,
    },

    /// An instrument name was declared twice
    #[error("Duplicate instrument: {0}")]
    DuplicateInstrument(String),

    /// The global tracing subscriber could not be installed
    #[error("Tracing subscriber setup failed: {0}")]
    Subscriber(String),

    /// A provider failed to flush or close during shutdown
    #[error("Shutdown of {provider} provider failed: {reason}")]
    Shutdown {
        /// Provider label
        provider: &'static str,
        /// Underlying error message
        reason: String,
    },
}

/// Non-fatal sampler read failures.
///
/// A failed read skips the tick and leaves the previous value exported.
#[derive(Error, Debug)]
pub enum SamplerError {
    /// Reading process statistics failed
    #[error("Process statistics unavailable: {0}")]
    Process(String),

    /// Querying the task store failed
    #[error("Task store query failed: {0}")]
    Store(#[from] crate::storage::StoreError),
}
