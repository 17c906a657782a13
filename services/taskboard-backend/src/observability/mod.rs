//! OpenTelemetry Observability Module
//!
//! Telemetry lifecycle, the instrument catalog, operation tracking and the
//! periodic background samplers.

pub mod attributes;
pub mod error;
pub mod instruments;
pub mod operation;
pub mod sampler;
pub mod telemetry;

pub use error::{SamplerError, TelemetryError};
pub use instruments::{InstrumentHandle, InstrumentKind, InstrumentRegistry, Instruments};
pub use operation::OperationTracker;
pub use sampler::{RefreshTrigger, Sampler, SamplerIntervals};
pub use telemetry::{
    Active, ProviderShutdown, ShutDown, ShutdownReport, ShutdownSequence, Telemetry,
    TelemetryConfig, Uninitialized,
};
