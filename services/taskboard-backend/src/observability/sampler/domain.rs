//! Domain-state sampler for task counts.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{sample_once, Sampler};
use crate::observability::error::SamplerError;
use crate::observability::instruments::TaskInstruments;
use crate::storage::{TaskCounter, TaskFilter};

/// Publishes `tasks_total` and `tasks_completed_total`.
#[derive(Clone)]
pub struct DomainSampler {
    counter: Arc<dyn TaskCounter>,
    instruments: TaskInstruments,
}

impl DomainSampler {
    /// Creates a sampler over `counter`.
    pub fn new(counter: Arc<dyn TaskCounter>, instruments: TaskInstruments) -> Self {
        Self {
            counter,
            instruments,
        }
    }

    /// Samples immediately, outside any schedule.
    pub async fn refresh_now(&self) -> bool {
        sample_once(self).await
    }
}

#[async_trait]
impl Sampler for DomainSampler {
    fn name(&self) -> &'static str {
        "task_sampler"
    }

    async fn sample(&self) -> Result<(), SamplerError> {
        // Both reads must succeed before either gauge moves.
        let total = self.counter.count(TaskFilter::All).await?;
        let completed = self.counter.count(TaskFilter::Completed).await?;

        self.instruments.total.record(total, &[]);
        self.instruments.completed.record(completed, &[]);
        debug!(total, completed, "Task metrics updated");
        Ok(())
    }
}
