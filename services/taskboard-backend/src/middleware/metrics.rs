//! Request Metrics Tower Layer
//!
//! Records the active-request gauge, request and response sizes, request
//! latency and the completion counter for every request that reaches the
//! router. The active-request decrement lives in a drop guard, so it runs on
//! every exit path: normal completion, inner error, or the request future
//! being dropped mid-flight.

use std::task::{Context, Poll};
use std::time::Instant;

use axum::extract::MatchedPath;
use futures::future::BoxFuture;
use http::{header, HeaderMap, Request, Response};
use http_body::Body;
use opentelemetry::metrics::UpDownCounter;
use tower::{Layer, Service};

use crate::observability::attributes;
use crate::observability::instruments::HttpInstruments;

/// Metrics layer for Tower.
#[derive(Clone)]
pub struct RequestMetricsLayer {
    instruments: HttpInstruments,
}

impl RequestMetricsLayer {
    /// Creates a new metrics layer over the HTTP instruments.
    #[must_use]
    pub fn new(instruments: HttpInstruments) -> Self {
        Self { instruments }
    }
}

impl<S> Layer<S> for RequestMetricsLayer {
    type Service = RequestMetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestMetricsService {
            inner,
            instruments: self.instruments.clone(),
        }
    }
}

/// Metrics service wrapper.
#[derive(Clone)]
pub struct RequestMetricsService<S> {
    inner: S,
    instruments: HttpInstruments,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for RequestMetricsService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    ReqBody: Send + 'static,
    ResBody: Body + Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let method = req.method().as_str().to_owned();
        let path = req
            .extensions()
            .get::<MatchedPath>()
            .map_or_else(|| attributes::UNMATCHED_ROUTE.to_owned(), |p| p.as_str().to_owned());

        let route = attributes::route(&method, &path);
        let guard = ActiveRequestGuard::acquire(self.instruments.active.clone());

        if let Some(size) = content_length(req.headers()).filter(|size| *size > 0) {
            self.instruments.request_size.record(size, &route);
        }

        let instruments = self.instruments.clone();
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let started = Instant::now();

        Box::pin(async move {
            let _guard = guard;
            let result = inner.call(req).await;

            if let Ok(response) = &result {
                let attrs = attributes::route_status(&method, &path, response.status().as_u16());
                let response_size = response
                    .body()
                    .size_hint()
                    .exact()
                    .or_else(|| content_length(response.headers()))
                    .unwrap_or(0);

                instruments.requests.add(1, &attrs);
                instruments
                    .duration
                    .record(started.elapsed().as_secs_f64(), &attrs);
                instruments.response_size.record(response_size, &attrs);
            }

            result
        })
    }
}

/// Holds one unit of `http_active_requests` for its lifetime.
///
/// The gauge is a single untagged series.
struct ActiveRequestGuard {
    active: UpDownCounter<i64>,
}

impl ActiveRequestGuard {
    fn acquire(active: UpDownCounter<i64>) -> Self {
        active.add(1, &[]);
        Self { active }
    }
}

impl Drop for ActiveRequestGuard {
    fn drop(&mut self) {
        self.active.add(-1, &[]);
    }
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}
