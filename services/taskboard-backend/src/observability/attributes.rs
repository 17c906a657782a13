//! Attribute keys shared by every instrument.
//!
//! Keeping the key set in one place keeps series cardinality bounded:
//! `path` is always a route template, never a raw URI.

use opentelemetry::KeyValue;

/// HTTP method
pub const METHOD: &str = "method";
/// Route template
pub const PATH: &str = "path";
/// Numeric HTTP status code
pub const STATUS: &str = "status";
/// Storage operation name
pub const OPERATION: &str = "operation";
/// Whether a storage operation succeeded
pub const SUCCESS: &str = "success";
/// Sub-category of a process gauge
pub const TYPE: &str = "type";
/// Idle pool connections
pub const IDLE: &str = "idle";
/// Pool connections checked out
pub const IN_USE: &str = "in_use";
/// Pool capacity
pub const MAX_OPEN: &str = "max_open";

/// `path` value for requests that matched no route.
pub const UNMATCHED_ROUTE: &str = "unmatched";

/// Attributes for the active request gauge.
#[must_use]
pub fn route(method: &str, path: &str) -> [KeyValue; 2] {
    [
        KeyValue::new(METHOD, method.to_string()),
        KeyValue::new(PATH, path.to_string()),
    ]
}

/// Attributes for completed request measurements.
#[must_use]
pub fn route_status(method: &str, path: &str, status: u16) -> [KeyValue; 3] {
    [
        KeyValue::new(METHOD, method.to_string()),
        KeyValue::new(PATH, path.to_string()),
        KeyValue::new(STATUS, i64::from(status)),
    ]
}

/// Attributes for the operation counter.
#[must_use]
pub fn operation(name: &str) -> [KeyValue; 1] {
    [KeyValue::new(OPERATION, name.to_string())]
}

/// Attributes for the operation latency histogram.
#[must_use]
pub fn operation_outcome(name: &str, success: bool) -> [KeyValue; 2] {
    [
        KeyValue::new(OPERATION, name.to_string()),
        KeyValue::new(SUCCESS, success),
    ]
}

/// Attribute for a process gauge sub-category.
#[must_use]
pub fn kind(value: &'static str) -> [KeyValue; 1] {
    [KeyValue::new(TYPE, value)]
}
