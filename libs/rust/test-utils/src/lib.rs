//! Shared test utilities for taskboard Rust crates.
//!
//! This crate provides:
//! - An in-memory metrics harness over the OpenTelemetry SDK
//! - Recording doubles for shutdown ordering and injected failures
//! - Proptest generators for instrument names, titles and outcomes
//! - Test fixtures with sample request bodies and process data

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod harness;
pub mod mocks;

pub use generators::*;
pub use harness::{MetricsHarness, MetricsSnapshot, Point, PointValue};
pub use mocks::{FailureSwitch, ShutdownLog};
