//! Tower Middleware Stack
//!
//! Request instrumentation, request span construction and the layer
//! ordering applied to the router.

pub mod metrics;
pub mod stack;
pub mod trace_context;

pub use metrics::{RequestMetricsLayer, RequestMetricsService};
pub use stack::build_service_stack;
pub use trace_context::{request_span, HeaderExtractor};
