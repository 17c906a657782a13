//! Instrument registry and the service's metric catalog.
//!
//! Every instrument is declared once at startup through an
//! [`InstrumentRegistry`]. A malformed or duplicated declaration fails the
//! whole registration, so a process never runs with a partial catalog.

use std::collections::BTreeMap;
use std::fmt;

use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter, UpDownCounter};
use tracing::info;

use super::error::TelemetryError;

const MAX_NAME_LEN: usize = 255;
const MAX_UNIT_LEN: usize = 63;

/// Kind of measurement channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrumentKind {
    /// Monotonic counter
    Counter,
    /// Distribution of observations
    Histogram,
    /// Bidirectional counter with paired increments and decrements
    UpDownCounter,
    /// Absolute value; each record supersedes the previous one
    Gauge,
}

impl fmt::Display for InstrumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Counter => "counter",
            Self::Histogram => "histogram",
            Self::UpDownCounter => "up_down_counter",
            Self::Gauge => "gauge",
        };
        f.write_str(name)
    }
}

/// Static declaration of one instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstrumentSpec {
    /// Exported metric name
    pub name: &'static str,
    /// Instrument kind
    pub kind: InstrumentKind,
    /// UCUM unit string
    pub unit: &'static str,
    /// Human-readable description
    pub description: &'static str,
}

impl InstrumentSpec {
    const fn new(
        name: &'static str,
        kind: InstrumentKind,
        unit: &'static str,
        description: &'static str,
    ) -> Self {
        Self {
            name,
            kind,
            unit,
            description,
        }
    }
}

/// Read-only metadata for a registered instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstrumentHandle {
    spec: InstrumentSpec,
}

impl InstrumentHandle {
    /// Exported metric name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.spec.name
    }

    /// Instrument kind.
    #[must_use]
    pub const fn kind(&self) -> InstrumentKind {
        self.spec.kind
    }

    /// Unit string.
    #[must_use]
    pub const fn unit(&self) -> &'static str {
        self.spec.unit
    }

    /// Description.
    #[must_use]
    pub const fn description(&self) -> &'static str {
        self.spec.description
    }
}

// ============================================================================
// Metric catalog
// ============================================================================

/// Names, kinds and units exported by the service.
pub mod catalog {
    use super::{InstrumentKind, InstrumentSpec};

    /// `http_requests_total`
    pub const HTTP_REQUESTS_TOTAL: InstrumentSpec = InstrumentSpec::new(
        "http_requests_total",
        InstrumentKind::Counter,
        "{request}",
        "Total number of HTTP requests",
    );
    /// `http_request_duration_seconds`
    pub const HTTP_REQUEST_DURATION_SECONDS: InstrumentSpec = InstrumentSpec::new(
        "http_request_duration_seconds",
        InstrumentKind::Histogram,
        "s",
        "HTTP request duration in seconds",
    );
    /// `http_request_size_bytes`
    pub const HTTP_REQUEST_SIZE_BYTES: InstrumentSpec = InstrumentSpec::new(
        "http_request_size_bytes",
        InstrumentKind::Histogram,
        "By",
        "HTTP request size in bytes",
    );
    /// `http_response_size_bytes`
    pub const HTTP_RESPONSE_SIZE_BYTES: InstrumentSpec = InstrumentSpec::new(
        "http_response_size_bytes",
        InstrumentKind::Histogram,
        "By",
        "HTTP response size in bytes",
    );
    /// `http_active_requests`
    pub const HTTP_ACTIVE_REQUESTS: InstrumentSpec = InstrumentSpec::new(
        "http_active_requests",
        InstrumentKind::UpDownCounter,
        "{request}",
        "Number of active HTTP requests",
    );
    /// `db_operations_total`
    pub const DB_OPERATIONS_TOTAL: InstrumentSpec = InstrumentSpec::new(
        "db_operations_total",
        InstrumentKind::Counter,
        "{operation}",
        "Total number of database operations",
    );
    /// `db_operation_duration_seconds`
    pub const DB_OPERATION_DURATION_SECONDS: InstrumentSpec = InstrumentSpec::new(
        "db_operation_duration_seconds",
        InstrumentKind::Histogram,
        "s",
        "Duration of database operations in seconds",
    );
    /// `db_connections_open`
    pub const DB_CONNECTIONS_OPEN: InstrumentSpec = InstrumentSpec::new(
        "db_connections_open",
        InstrumentKind::Gauge,
        "{connection}",
        "Number of open database connections",
    );
    /// `tasks_total`
    pub const TASKS_TOTAL: InstrumentSpec = InstrumentSpec::new(
        "tasks_total",
        InstrumentKind::Gauge,
        "{task}",
        "Total number of tasks in the system",
    );
    /// `tasks_completed_total`
    pub const TASKS_COMPLETED_TOTAL: InstrumentSpec = InstrumentSpec::new(
        "tasks_completed_total",
        InstrumentKind::Gauge,
        "{task}",
        "Number of completed tasks",
    );
    /// `memory_usage_bytes`
    pub const MEMORY_USAGE_BYTES: InstrumentSpec = InstrumentSpec::new(
        "memory_usage_bytes",
        InstrumentKind::Gauge,
        "By",
        "Memory usage of the application in bytes",
    );
    /// `goroutine_count`
    pub const GOROUTINE_COUNT: InstrumentSpec = InstrumentSpec::new(
        "goroutine_count",
        InstrumentKind::Gauge,
        "{goroutine}",
        "Number of live runtime tasks and OS threads",
    );

    /// Every instrument, in registration order.
    pub const ALL: [InstrumentSpec; 12] = [
        HTTP_REQUESTS_TOTAL,
        HTTP_REQUEST_DURATION_SECONDS,
        HTTP_REQUEST_SIZE_BYTES,
        HTTP_RESPONSE_SIZE_BYTES,
        HTTP_ACTIVE_REQUESTS,
        DB_OPERATIONS_TOTAL,
        DB_OPERATION_DURATION_SECONDS,
        DB_CONNECTIONS_OPEN,
        TASKS_TOTAL,
        TASKS_COMPLETED_TOTAL,
        MEMORY_USAGE_BYTES,
        GOROUTINE_COUNT,
    ];
}

// ============================================================================
// Registry
// ============================================================================

/// Declares instruments against a meter, rejecting invalid or duplicate names.
pub struct InstrumentRegistry {
    meter: Meter,
    handles: BTreeMap<&'static str, InstrumentHandle>,
}

impl InstrumentRegistry {
    /// Creates an empty registry bound to `meter`.
    #[must_use]
    pub fn new(meter: Meter) -> Self {
        Self {
            meter,
            handles: BTreeMap::new(),
        }
    }

    /// Validates and records one instrument declaration.
    pub fn register(
        &mut self,
        name: &'static str,
        kind: InstrumentKind,
        unit: &'static str,
        description: &'static str,
    ) -> Result<InstrumentHandle, TelemetryError> {
        validate_name(name).map_err(|reason| TelemetryError::InvalidInstrument {
            name: name.to_string(),
            reason,
        })?;
        validate_unit(unit).map_err(|reason| TelemetryError::InvalidInstrument {
            name: name.to_string(),
            reason,
        })?;
        if self.handles.contains_key(name) {
            return Err(TelemetryError::DuplicateInstrument(name.to_string()));
        }

        let handle = InstrumentHandle {
            spec: InstrumentSpec::new(name, kind, unit, description),
        };
        self.handles.insert(name, handle);
        Ok(handle)
    }

    /// Registered instruments, sorted by name.
    pub fn handles(&self) -> impl Iterator<Item = &InstrumentHandle> {
        self.handles.values()
    }

    /// Looks up a registered instrument by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&InstrumentHandle> {
        self.handles.get(name)
    }

    /// Registers and builds a monotonic `u64` counter.
    pub fn counter(&mut self, spec: InstrumentSpec) -> Result<Counter<u64>, TelemetryError> {
        self.declare(spec, InstrumentKind::Counter)?;
        Ok(self
            .meter
            .u64_counter(spec.name)
            .with_description(spec.description)
            .with_unit(spec.unit)
            .build())
    }

    /// Registers and builds an `f64` histogram.
    pub fn f64_histogram(&mut self, spec: InstrumentSpec) -> Result<Histogram<f64>, TelemetryError> {
        self.declare(spec, InstrumentKind::Histogram)?;
        Ok(self
            .meter
            .f64_histogram(spec.name)
            .with_description(spec.description)
            .with_unit(spec.unit)
            .build())
    }

    /// Registers and builds a `u64` histogram.
    pub fn u64_histogram(&mut self, spec: InstrumentSpec) -> Result<Histogram<u64>, TelemetryError> {
        self.declare(spec, InstrumentKind::Histogram)?;
        Ok(self
            .meter
            .u64_histogram(spec.name)
            .with_description(spec.description)
            .with_unit(spec.unit)
            .build())
    }

    /// Registers and builds an `i64` up/down counter.
    pub fn up_down_counter(
        &mut self,
        spec: InstrumentSpec,
    ) -> Result<UpDownCounter<i64>, TelemetryError> {
        self.declare(spec, InstrumentKind::UpDownCounter)?;
        Ok(self
            .meter
            .i64_up_down_counter(spec.name)
            .with_description(spec.description)
            .with_unit(spec.unit)
            .build())
    }

    /// Registers and builds an absolute `u64` gauge.
    pub fn gauge(&mut self, spec: InstrumentSpec) -> Result<Gauge<u64>, TelemetryError> {
        self.declare(spec, InstrumentKind::Gauge)?;
        Ok(self
            .meter
            .u64_gauge(spec.name)
            .with_description(spec.description)
            .with_unit(spec.unit)
            .build())
    }

    fn declare(
        &mut self,
        spec: InstrumentSpec,
        built_as: InstrumentKind,
    ) -> Result<InstrumentHandle, TelemetryError> {
        if spec.kind != built_as {
            return Err(TelemetryError::InvalidInstrument {
                name: spec.name.to_string(),
                reason: format!("declared as {} but built as {built_as}", spec.kind),
            });
        }
        self.register(spec.name, spec.kind, spec.unit, spec.description)
    }
}

/// Checks the instrument name syntax: a letter followed by up to 254
/// characters from `[A-Za-z0-9_.-/]`.
pub fn validate_name(name: &str) -> Result<(), String> {
    let mut chars = name.chars();
    match chars.next() {
        None => return Err("name is empty".to_string()),
        Some(first) if !first.is_ascii_alphabetic() => {
            return Err("name must start with an ASCII letter".to_string());
        }
        Some(_) => {}
    }
    if name.len() > MAX_NAME_LEN {
        return Err(format!("name exceeds {MAX_NAME_LEN} characters"));
    }
    if let Some(bad) = chars.find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-' | '/'))) {
        return Err(format!("name contains invalid character {bad:?}"));
    }
    Ok(())
}

/// Checks the unit: printable ASCII, at most 63 characters.
pub fn validate_unit(unit: &str) -> Result<(), String> {
    if unit.len() > MAX_UNIT_LEN {
        return Err(format!("unit exceeds {MAX_UNIT_LEN} characters"));
    }
    if !unit.chars().all(|c| c.is_ascii_graphic()) {
        return Err("unit must be printable ASCII without spaces".to_string());
    }
    Ok(())
}

// ============================================================================
// Instrument bundles
// ============================================================================

/// Instruments fed by the request middleware.
#[derive(Clone)]
pub struct HttpInstruments {
    /// `http_requests_total`
    pub requests: Counter<u64>,
    /// `http_request_duration_seconds`
    pub duration: Histogram<f64>,
    /// `http_request_size_bytes`
    pub request_size: Histogram<u64>,
    /// `http_response_size_bytes`
    pub response_size: Histogram<u64>,
    /// `http_active_requests`
    pub active: UpDownCounter<i64>,
}

/// Instruments fed by the operation tracker and the pool sampler.
#[derive(Clone)]
pub struct DbInstruments {
    /// `db_operations_total`
    pub operations: Counter<u64>,
    /// `db_operation_duration_seconds`
    pub duration: Histogram<f64>,
    /// `db_connections_open`
    pub connections_open: Gauge<u64>,
}

/// Domain count gauges.
#[derive(Clone)]
pub struct TaskInstruments {
    /// `tasks_total`
    pub total: Gauge<u64>,
    /// `tasks_completed_total`
    pub completed: Gauge<u64>,
}

/// Process-level gauges.
#[derive(Clone)]
pub struct ProcessInstruments {
    /// `memory_usage_bytes`
    pub memory: Gauge<u64>,
    /// `goroutine_count`
    pub goroutines: Gauge<u64>,
}

/// The complete, immutable instrument set shared by every component.
#[derive(Clone)]
pub struct Instruments {
    /// HTTP request instruments
    pub http: HttpInstruments,
    /// Storage operation and pool instruments
    pub db: DbInstruments,
    /// Task count gauges
    pub tasks: TaskInstruments,
    /// Process gauges
    pub process: ProcessInstruments,
}

impl Instruments {
    /// Registers the full catalog against `meter`.
    pub fn register(meter: &Meter) -> Result<Self, TelemetryError> {
        let mut registry = InstrumentRegistry::new(meter.clone());

        let instruments = Self {
            http: HttpInstruments {
                requests: registry.counter(catalog::HTTP_REQUESTS_TOTAL)?,
                duration: registry.f64_histogram(catalog::HTTP_REQUEST_DURATION_SECONDS)?,
                request_size: registry.u64_histogram(catalog::HTTP_REQUEST_SIZE_BYTES)?,
                response_size: registry.u64_histogram(catalog::HTTP_RESPONSE_SIZE_BYTES)?,
                active: registry.up_down_counter(catalog::HTTP_ACTIVE_REQUESTS)?,
            },
            db: DbInstruments {
                operations: registry.counter(catalog::DB_OPERATIONS_TOTAL)?,
                duration: registry.f64_histogram(catalog::DB_OPERATION_DURATION_SECONDS)?,
                connections_open: registry.gauge(catalog::DB_CONNECTIONS_OPEN)?,
            },
            tasks: TaskInstruments {
                total: registry.gauge(catalog::TASKS_TOTAL)?,
                completed: registry.gauge(catalog::TASKS_COMPLETED_TOTAL)?,
            },
            process: ProcessInstruments {
                memory: registry.gauge(catalog::MEMORY_USAGE_BYTES)?,
                goroutines: registry.gauge(catalog::GOROUTINE_COUNT)?,
            },
        };

        info!(count = registry.handles().count(), "All metrics instruments created");
        Ok(instruments)
    }
}
