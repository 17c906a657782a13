//! Storage connection pool sampler.

use std::sync::Arc;

use async_trait::async_trait;
use opentelemetry::metrics::Gauge;
use opentelemetry::KeyValue;

use super::Sampler;
use crate::observability::attributes;
use crate::observability::error::SamplerError;
use crate::storage::PoolStatsSource;

/// Publishes `db_connections_open`.
///
/// The open count is recorded without attributes. Idle, in-use and capacity
/// ride on a zero-valued observation so summing every series still yields the
/// open count.
pub struct PoolSampler {
    source: Arc<dyn PoolStatsSource>,
    connections_open: Gauge<u64>,
}

impl PoolSampler {
    /// Creates a sampler over `source`.
    pub fn new(source: Arc<dyn PoolStatsSource>, connections_open: Gauge<u64>) -> Self {
        Self {
            source,
            connections_open,
        }
    }
}

#[async_trait]
impl Sampler for PoolSampler {
    fn name(&self) -> &'static str {
        "pool_sampler"
    }

    async fn sample(&self) -> Result<(), SamplerError> {
        let stats = self.source.pool_stats();

        self.connections_open.record(stats.open as u64, &[]);
        self.connections_open.record(
            0,
            &[
                KeyValue::new(attributes::IDLE, stats.idle as i64),
                KeyValue::new(attributes::IN_USE, stats.in_use as i64),
                KeyValue::new(attributes::MAX_OPEN, stats.max_open as i64),
            ],
        );
        Ok(())
    }
}
