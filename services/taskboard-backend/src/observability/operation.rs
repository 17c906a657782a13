//! Storage operation tracking.
//!
//! Wraps a unit of storage work with one `db_operations_total` increment and
//! one `db_operation_duration_seconds` observation. The increment happens
//! before the work starts; the observation is recorded by a drop guard, so a
//! panic or a cancelled future still yields exactly one latency point with
//! `success=false`.

use std::future::Future;
use std::time::Instant;

use opentelemetry::metrics::{Counter, Histogram};
use tracing::{field, info_span, Instrument, Span};

use super::attributes;
use super::instruments::DbInstruments;

/// Counts and times storage operations.
#[derive(Clone)]
pub struct OperationTracker {
    operations: Counter<u64>,
    latency: Histogram<f64>,
}

impl OperationTracker {
    /// Creates a tracker over the storage instruments.
    #[must_use]
    pub fn new(db: &DbInstruments) -> Self {
        Self {
            operations: db.operations.clone(),
            latency: db.duration.clone(),
        }
    }

    /// Runs synchronous work as the named operation.
    pub fn track<T, E, F>(&self, operation: &'static str, work: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let span = operation_span(operation);
        let mut completion = self.begin(operation);
        let result = span.in_scope(work);
        completion.finish(&span, result.is_ok());
        result
    }

    /// Runs asynchronous work as the named operation.
    pub async fn track_async<T, E, F>(&self, operation: &'static str, work: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
    {
        let span = operation_span(operation);
        let mut completion = self.begin(operation);
        let result = work.instrument(span.clone()).await;
        completion.finish(&span, result.is_ok());
        result
    }

    fn begin(&self, operation: &'static str) -> Completion<'_> {
        self.operations.add(1, &attributes::operation(operation));
        Completion {
            latency: &self.latency,
            operation,
            started: Instant::now(),
            success: false,
        }
    }
}

fn operation_span(operation: &'static str) -> Span {
    info_span!(
        "db.operation",
        db.operation = operation,
        otel.kind = "client",
        otel.status_code = field::Empty,
    )
}

/// Records the latency observation exactly once, on drop.
struct Completion<'a> {
    latency: &'a Histogram<f64>,
    operation: &'static str,
    started: Instant,
    success: bool,
}

impl Completion<'_> {
    fn finish(&mut self, span: &Span, success: bool) {
        self.success = success;
        if !success {
            span.record("otel.status_code", "ERROR");
        }
    }
}

impl Drop for Completion<'_> {
    fn drop(&mut self) {
        let elapsed = self.started.elapsed().as_secs_f64();
        self.latency.record(
            elapsed,
            &attributes::operation_outcome(self.operation, self.success),
        );
    }
}
