//! OpenTelemetry Telemetry Lifecycle
//!
//! Type-state wrapper around the trace and metric providers:
//! `Telemetry<Uninitialized>` becomes `Telemetry<Active>` once the collector
//! is reachable and both OTLP pipelines are installed, and
//! `Telemetry<ShutDown>` after the providers are closed in order. Using a
//! provider before initialization or after shutdown does not compile.

use std::time::Duration;

use opentelemetry::metrics::{Meter, MeterProvider as _};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::{MetricExporter, SpanExporter, WithExportConfig};
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::{Config as TraceConfig, TracerProvider as SdkTracerProvider};
use opentelemetry_sdk::{runtime, Resource};
use tokio::net::TcpStream;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};
use url::Url;

use super::error::TelemetryError;
use super::sampler::{run_sampler, ScheduledSampler};
use crate::shutdown::ShutdownCoordinator;

/// Instrumentation scope for the service's own tracer and meter.
pub const INSTRUMENTATION_SCOPE: &str = env!("CARGO_PKG_NAME");

/// Telemetry configuration.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Resource `service.name`
    pub service_name: String,
    /// Resource `service.version`
    pub service_version: String,
    /// Resource `deployment.environment`
    pub deployment_environment: String,
    /// OTLP/gRPC collector endpoint
    pub otlp_endpoint: Url,
    /// Reachability probe and export timeout
    pub connect_timeout: Duration,
    /// Periodic metric export interval
    pub export_interval: Duration,
    /// Default log filter when `RUST_LOG` is unset
    pub log_level: String,
    /// Emit JSON log lines
    pub log_json: bool,
}

impl TelemetryConfig {
    /// Resource attributes attached to every exported span and series.
    #[must_use]
    pub fn resource(&self) -> Resource {
        Resource::new(vec![
            KeyValue::new("service.name", self.service_name.clone()),
            KeyValue::new("service.version", self.service_version.clone()),
            KeyValue::new("deployment.environment", self.deployment_environment.clone()),
        ])
    }

    /// `host:port` of the collector.
    pub fn collector_address(&self) -> Result<String, TelemetryError> {
        let endpoint = &self.otlp_endpoint;
        let host = endpoint.host_str().ok_or_else(|| TelemetryError::CollectorUnreachable {
            endpoint: endpoint.to_string(),
            reason: "endpoint has no host".to_string(),
        })?;
        let port = endpoint
            .port_or_known_default()
            .ok_or_else(|| TelemetryError::CollectorUnreachable {
                endpoint: endpoint.to_string(),
                reason: "endpoint has no port".to_string(),
            })?;
        Ok(format!("{host}:{port}"))
    }

    fn exporter_endpoint(&self) -> String {
        self.otlp_endpoint.as_str().trim_end_matches('/').to_string()
    }
}

// ============================================================================
// Sealed Trait Pattern for Lifecycle States
// ============================================================================

mod private {
    /// Sealed trait to prevent external implementations
    pub trait Sealed {}
}

/// Marker trait for lifecycle states.
pub trait TelemetryState: private::Sealed {
    /// Human-readable state name for logs
    fn state_name() -> &'static str;
}

/// No exporter or provider exists yet.
pub struct Uninitialized;
impl private::Sealed for Uninitialized {}
impl TelemetryState for Uninitialized {
    fn state_name() -> &'static str {
        "Uninitialized"
    }
}

/// Providers are installed and exporting.
pub struct Active {
    tracer_provider: SdkTracerProvider,
    meter_provider: SdkMeterProvider,
}
impl private::Sealed for Active {}
impl TelemetryState for Active {
    fn state_name() -> &'static str {
        "Active"
    }
}

/// Providers are closed. Terminal.
pub struct ShutDown {
    report: ShutdownReport,
}
impl private::Sealed for ShutDown {}
impl TelemetryState for ShutDown {
    fn state_name() -> &'static str {
        "ShutDown"
    }
}

// ============================================================================
// Type-State Lifecycle
// ============================================================================

/// Telemetry subsystem in lifecycle state `S`.
pub struct Telemetry<S: TelemetryState> {
    config: TelemetryConfig,
    state: S,
}

impl<S: TelemetryState> Telemetry<S> {
    /// Current state name.
    #[must_use]
    pub fn state_name(&self) -> &'static str {
        S::state_name()
    }

    /// Configuration the subsystem was built from.
    #[must_use]
    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }
}

impl Telemetry<Uninitialized> {
    /// Prepares the lifecycle without touching the network.
    #[must_use]
    pub fn new(config: TelemetryConfig) -> Self {
        Self {
            config,
            state: Uninitialized,
        }
    }

    /// Connects to the collector and installs the process-wide providers and
    /// tracing subscriber.
    ///
    /// Any failure is fatal; there is no telemetry-disabled mode.
    pub async fn init(self) -> Result<Telemetry<Active>, TelemetryError> {
        let config = self.config;
        let address = config.collector_address()?;
        probe_collector(&address, config.connect_timeout).await?;

        let resource = config.resource();
        let tracer_provider = build_tracer_provider(&config, resource.clone())?;
        let meter_provider = build_meter_provider(&config, resource)?;

        global::set_text_map_propagator(TraceContextPropagator::new());
        global::set_tracer_provider(tracer_provider.clone());
        global::set_meter_provider(meter_provider.clone());

        install_subscriber(&config, &tracer_provider)?;

        info!(
            service = %config.service_name,
            version = %config.service_version,
            environment = %config.deployment_environment,
            collector = %address,
            "OpenTelemetry initialized"
        );

        Ok(Telemetry {
            config,
            state: Active {
                tracer_provider,
                meter_provider,
            },
        })
    }
}

impl Telemetry<Active> {
    /// The service meter, for instrument registration.
    #[must_use]
    pub fn meter(&self) -> Meter {
        self.state.meter_provider.meter(INSTRUMENTATION_SCOPE)
    }

    /// Spawns every sampler loop on the coordinator.
    pub fn start_samplers(
        &self,
        coordinator: &mut ShutdownCoordinator,
        samplers: impl IntoIterator<Item = ScheduledSampler>,
    ) {
        for scheduled in samplers {
            let name = scheduled.name();
            let signal = coordinator.subscribe();
            coordinator.spawn(name, run_sampler(scheduled, signal));
            info!(sampler = name, "Sampler scheduled");
        }
    }

    /// Flushes and closes the trace provider, then the meter provider.
    ///
    /// Failures are logged and reported, never returned.
    pub async fn shutdown(self) -> Telemetry<ShutDown> {
        let Active {
            tracer_provider,
            meter_provider,
        } = self.state;

        let sequence = ShutdownSequence::ordered(tracer_provider, meter_provider);
        let report = match tokio::task::spawn_blocking(move || sequence.run()).await {
            Ok(report) => report,
            Err(e) => {
                error!(error = %e, "Telemetry shutdown task failed");
                ShutdownReport::default()
            }
        };

        Telemetry {
            config: self.config,
            state: ShutDown { report },
        }
    }
}

impl Telemetry<ShutDown> {
    /// Outcome of the shutdown sequence.
    #[must_use]
    pub fn report(&self) -> &ShutdownReport {
        &self.state.report
    }
}

// ============================================================================
// Ordered Shutdown
// ============================================================================

/// A provider that can be flushed and closed.
pub trait ProviderShutdown: Send {
    /// Label used in logs and reports.
    fn label(&self) -> &'static str;

    /// Flushes pending data and closes the provider.
    fn close(&self) -> Result<(), String>;
}

impl ProviderShutdown for SdkTracerProvider {
    fn label(&self) -> &'static str {
        "trace"
    }

    fn close(&self) -> Result<(), String> {
        self.shutdown().map_err(|e| e.to_string())
    }
}

impl ProviderShutdown for SdkMeterProvider {
    fn label(&self) -> &'static str {
        "metrics"
    }

    fn close(&self) -> Result<(), String> {
        self.shutdown().map_err(|e| e.to_string())
    }
}

/// Closes providers in a fixed order: traces first, metrics second.
pub struct ShutdownSequence {
    steps: Vec<Box<dyn ProviderShutdown>>,
}

impl ShutdownSequence {
    /// Builds the sequence. Spans still buffered in the trace provider are
    /// exported before metric export is torn down.
    pub fn ordered(
        trace: impl ProviderShutdown + 'static,
        metrics: impl ProviderShutdown + 'static,
    ) -> Self {
        Self {
            steps: vec![Box::new(trace), Box::new(metrics)],
        }
    }

    /// Runs every step, continuing past failures.
    pub fn run(self) -> ShutdownReport {
        let mut report = ShutdownReport::default();
        for step in self.steps {
            let provider = step.label();
            match step.close() {
                Ok(()) => {
                    info!(provider, "Telemetry provider shut down");
                    report.closed.push(provider);
                }
                Err(reason) => {
                    warn!(provider, error = %reason, "Telemetry provider shutdown failed");
                    report
                        .failures
                        .push(TelemetryError::Shutdown { provider, reason });
                }
            }
        }
        report
    }
}

/// Outcome of a [`ShutdownSequence`].
#[derive(Debug, Default)]
pub struct ShutdownReport {
    /// Providers closed cleanly, in order
    pub closed: Vec<&'static str>,
    /// Providers whose close failed
    pub failures: Vec<TelemetryError>,
}

impl ShutdownReport {
    /// True when every provider closed cleanly.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

// ============================================================================
// Pipeline construction
// ============================================================================

/// Fails unless a TCP connection to `address` opens within `timeout`.
pub async fn probe_collector(address: &str, timeout: Duration) -> Result<(), TelemetryError> {
    match tokio::time::timeout(timeout, TcpStream::connect(address)).await {
        Ok(Ok(_stream)) => Ok(()),
        Ok(Err(e)) => Err(TelemetryError::CollectorUnreachable {
            endpoint: address.to_string(),
            reason: e.to_string(),
        }),
        Err(_) => Err(TelemetryError::CollectorUnreachable {
            endpoint: address.to_string(),
            reason: format!("no connection within {}ms", timeout.as_millis()),
        }),
    }
}

fn build_tracer_provider(
    config: &TelemetryConfig,
    resource: Resource,
) -> Result<SdkTracerProvider, TelemetryError> {
    let exporter = SpanExporter::builder()
        .with_tonic()
        .with_endpoint(config.exporter_endpoint())
        .with_timeout(config.connect_timeout)
        .build()
        .map_err(|e| TelemetryError::Exporter {
            signal: "traces",
            reason: e.to_string(),
        })?;

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_config(TraceConfig::default().with_resource(resource))
        .build())
}

fn build_meter_provider(
    config: &TelemetryConfig,
    resource: Resource,
) -> Result<SdkMeterProvider, TelemetryError> {
    let exporter = MetricExporter::builder()
        .with_tonic()
        .with_endpoint(config.exporter_endpoint())
        .with_timeout(config.connect_timeout)
        .build()
        .map_err(|e| TelemetryError::Exporter {
            signal: "metrics",
            reason: e.to_string(),
        })?;

    let reader = PeriodicReader::builder(exporter, runtime::Tokio)
        .with_interval(config.export_interval)
        .build();

    Ok(SdkMeterProvider::builder()
        .with_reader(reader)
        .with_resource(resource)
        .build())
}

fn install_subscriber(
    config: &TelemetryConfig,
    tracer_provider: &SdkTracerProvider,
) -> Result<(), TelemetryError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| TelemetryError::Subscriber(e.to_string()))?;

    let otel_layer =
        tracing_opentelemetry::layer().with_tracer(tracer_provider.tracer(INSTRUMENTATION_SCOPE));

    let fmt_layer = if config.log_json {
        fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true)
            .boxed()
    } else {
        fmt::layer().with_target(true).boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(otel_layer)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| TelemetryError::Subscriber(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(endpoint: &str) -> TelemetryConfig {
        TelemetryConfig {
            service_name: "taskboard-backend".to_string(),
            service_version: "1.0.0".to_string(),
            deployment_environment: "test".to_string(),
            otlp_endpoint: Url::parse(endpoint).unwrap(),
            connect_timeout: Duration::from_millis(500),
            export_interval: Duration::from_secs(10),
            log_level: "info".to_string(),
            log_json: false,
        }
    }

    #[test]
    fn test_collector_address_from_endpoint() {
        let cfg = config("http://otel-collector:4317");
        assert_eq!(cfg.collector_address().unwrap(), "otel-collector:4317");
        assert_eq!(cfg.exporter_endpoint(), "http://otel-collector:4317");
    }

    #[test]
    fn test_resource_carries_service_identity() {
        let resource = config("http://localhost:4317").resource();
        let get = |key: &'static str| resource.get(opentelemetry::Key::from_static_str(key));
        assert_eq!(get("service.name").map(|v| v.to_string()), Some("taskboard-backend".to_string()));
        assert_eq!(get("service.version").map(|v| v.to_string()), Some("1.0.0".to_string()));
        assert_eq!(get("deployment.environment").map(|v| v.to_string()), Some("test".to_string()));
    }

    #[test]
    fn test_state_names() {
        let telemetry = Telemetry::new(config("http://localhost:4317"));
        assert_eq!(telemetry.state_name(), "Uninitialized");
    }

    #[tokio::test]
    async fn test_unreachable_collector_is_fatal() {
        let telemetry = Telemetry::new(config("http://127.0.0.1:1"));
        let err = telemetry.init().await.err().unwrap();
        assert!(matches!(err, TelemetryError::CollectorUnreachable { .. }));
    }
}
