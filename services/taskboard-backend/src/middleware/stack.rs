//! Service Stack Builder
//!
//! Composes the router's middleware layers in a fixed order.

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, HeaderValue, Method, Response};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn, Span};

use crate::middleware::metrics::RequestMetricsLayer;
use crate::middleware::trace_context::request_span;
use crate::observability::instruments::HttpInstruments;

const DEFAULT_ORIGIN: &str = "http://localhost";
const PREFLIGHT_MAX_AGE: Duration = Duration::from_secs(12 * 60 * 60);

/// Wraps the routes with the complete middleware stack.
///
/// Layer order (outermost to innermost):
/// 1. CORS - answers preflight requests before anything is measured
/// 2. Trace - one server span per request, joined to the caller's trace
/// 3. Request metrics - gauge, sizes, latency, completion counter
/// 4. Catch panic - turns handler panics into `500` so they are counted
/// 5. Routes
///
/// Each `Router::layer` call wraps the previous ones, so they are applied
/// innermost first.
pub fn build_service_stack(routes: Router, http: HttpInstruments, frontend_origin: &str) -> Router {
    routes
        .layer(CatchPanicLayer::new())
        .layer(RequestMetricsLayer::new(http))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(request_span)
                .on_response(record_response),
        )
        .layer(cors_layer(frontend_origin))
}

fn record_response(response: &Response<Body>, latency: Duration, span: &Span) {
    let status = response.status();
    span.record("http.response.status_code", status.as_u16());
    if status.is_server_error() {
        span.record("otel.status_code", "ERROR");
    }
    info!(
        status = status.as_u16(),
        latency_ms = latency.as_millis() as u64,
        "Request completed"
    );
}

fn cors_layer(frontend_origin: &str) -> CorsLayer {
    let origin = HeaderValue::from_str(frontend_origin).unwrap_or_else(|e| {
        warn!(origin = frontend_origin, error = %e, "Invalid FRONTEND_ORIGIN, using default");
        HeaderValue::from_static(DEFAULT_ORIGIN)
    });

    CorsLayer::new()
        .allow_origin(AllowOrigin::exact(origin))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::ORIGIN, header::CONTENT_TYPE])
        .expose_headers([header::CONTENT_LENGTH])
        .allow_credentials(true)
        .max_age(PREFLIGHT_MAX_AGE)
}
