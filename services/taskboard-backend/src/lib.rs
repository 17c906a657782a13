//! Taskboard Backend - task records over HTTP with OpenTelemetry instrumentation.
//!
//! This crate provides the service library behind the `taskboard-backend`
//! binary: the telemetry lifecycle and instrument catalog, request and
//! operation instrumentation, periodic background samplers, the SQLite task
//! store and the axum HTTP API.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod config;
pub mod error;
pub mod middleware;
pub mod observability;
pub mod shutdown;
pub mod storage;

pub use config::{Config, ConfigError};
pub use error::{ApiError, ErrorCode};
