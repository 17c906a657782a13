//! Telemetry provider shutdown ordering and failure handling.

use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::TracerProvider as SdkTracerProvider;
use test_utils::{FailureSwitch, ShutdownLog};

use taskboard_backend::observability::{ProviderShutdown, ShutdownSequence, TelemetryError};

/// Provider double that records its close into a shared log.
struct RecordingProvider {
    label: &'static str,
    log: ShutdownLog,
    switch: FailureSwitch,
}

impl RecordingProvider {
    fn new(label: &'static str, log: &ShutdownLog) -> Self {
        Self {
            label,
            log: log.clone(),
            switch: FailureSwitch::new(),
        }
    }
}

impl ProviderShutdown for RecordingProvider {
    fn label(&self) -> &'static str {
        self.label
    }

    fn close(&self) -> Result<(), String> {
        self.log.record(self.label);
        if self.switch.hit() {
            Err(format!("{} exporter timed out", self.label))
        } else {
            Ok(())
        }
    }
}

#[test]
fn test_trace_closes_before_metrics() {
    let log = ShutdownLog::new();
    let report = ShutdownSequence::ordered(
        RecordingProvider::new("trace", &log),
        RecordingProvider::new("metrics", &log),
    )
    .run();

    assert_eq!(log.events(), vec!["trace", "metrics"]);
    assert_eq!(report.closed, vec!["trace", "metrics"]);
    assert!(report.is_clean());
}

#[test]
fn test_trace_failure_still_closes_metrics() {
    let log = ShutdownLog::new();
    let trace = RecordingProvider::new("trace", &log);
    trace.switch.fail();
    let metrics = RecordingProvider::new("metrics", &log);
    let metrics_switch = metrics.switch.clone();

    let report = ShutdownSequence::ordered(trace, metrics).run();

    assert_eq!(log.events(), vec!["trace", "metrics"]);
    assert_eq!(metrics_switch.calls(), 1);
    assert_eq!(report.closed, vec!["metrics"]);
    assert!(!report.is_clean());
    assert!(matches!(
        report.failures.as_slice(),
        [TelemetryError::Shutdown { provider: "trace", .. }]
    ));
}

#[test]
fn test_both_failures_reported_in_order() {
    let log = ShutdownLog::new();
    let trace = RecordingProvider::new("trace", &log);
    let metrics = RecordingProvider::new("metrics", &log);
    trace.switch.fail();
    metrics.switch.fail();

    let report = ShutdownSequence::ordered(trace, metrics).run();

    assert!(report.closed.is_empty());
    let failed: Vec<_> = report
        .failures
        .iter()
        .map(|e| match e {
            TelemetryError::Shutdown { provider, .. } => *provider,
            other => panic!("unexpected error: {other}"),
        })
        .collect();
    assert_eq!(failed, vec!["trace", "metrics"]);
}

#[test]
fn test_sdk_providers_close_cleanly() {
    let tracer_provider = SdkTracerProvider::builder().build();
    let meter_provider = SdkMeterProvider::builder().build();

    let report = ShutdownSequence::ordered(tracer_provider, meter_provider).run();

    assert!(report.is_clean(), "unexpected failures: {:?}", report.failures);
    assert_eq!(report.closed, vec!["trace", "metrics"]);
}

#[test]
fn test_already_closed_provider_is_reported() {
    let tracer_provider = SdkTracerProvider::builder().build();
    assert!(tracer_provider.close().is_ok());

    let report =
        ShutdownSequence::ordered(tracer_provider, SdkMeterProvider::builder().build()).run();

    assert_eq!(report.closed, vec!["metrics"]);
    assert_eq!(report.failures.len(), 1);
}
