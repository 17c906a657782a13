//! Periodic Background Samplers
//!
//! Each sampler is an independent loop that re-reads an external source of
//! truth on a fixed interval and publishes absolute gauge values. A failed
//! read is logged and skipped; the previously exported value stays in place
//! until the next successful tick.

mod domain;
mod pool;
mod process;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use super::error::SamplerError;
use crate::shutdown::ShutdownSignal;

pub use domain::DomainSampler;
pub use pool::PoolSampler;
pub use process::{parse_proc_status, ProcFsProbe, ProcessProbe, ProcessSampler, ProcessStats};

/// A source that can be re-read and published on demand.
#[async_trait]
pub trait Sampler: Send + Sync {
    /// Stable name used in logs and task names.
    fn name(&self) -> &'static str;

    /// Reads the source and publishes fresh values.
    ///
    /// Must not publish anything when the read fails.
    async fn sample(&self) -> Result<(), SamplerError>;
}

/// Tick intervals for the built-in samplers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerIntervals {
    /// Process sampler
    pub process: Duration,
    /// Connection pool sampler
    pub pool: Duration,
    /// Domain-state sampler timer
    pub tasks: Duration,
}

impl Default for SamplerIntervals {
    fn default() -> Self {
        Self {
            process: Duration::from_secs(15),
            pool: Duration::from_secs(10),
            tasks: Duration::from_secs(30),
        }
    }
}

/// Out-of-band wake-up for a sampler loop.
///
/// Firing while a refresh is already pending coalesces into one extra sample.
#[derive(Clone, Default)]
pub struct RefreshTrigger {
    notify: Arc<Notify>,
}

impl RefreshTrigger {
    /// Creates an unfired trigger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a sample as soon as the loop is free.
    pub fn fire(&self) {
        self.notify.notify_one();
    }

    async fn fired(&self) {
        self.notify.notified().await;
    }
}

/// A sampler with its schedule.
pub struct ScheduledSampler {
    sampler: Arc<dyn Sampler>,
    interval: Duration,
    refresh: Option<RefreshTrigger>,
}

impl ScheduledSampler {
    /// Runs `sampler` every `interval`.
    pub fn every(sampler: Arc<dyn Sampler>, interval: Duration) -> Self {
        Self {
            sampler,
            interval,
            refresh: None,
        }
    }

    /// Also runs the sampler whenever `trigger` fires.
    #[must_use]
    pub fn with_refresh(mut self, trigger: RefreshTrigger) -> Self {
        self.refresh = Some(trigger);
        self
    }

    /// Sampler name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.sampler.name()
    }
}

/// Runs one sample, logging a read failure.
///
/// Returns whether fresh values were published.
pub async fn sample_once(sampler: &dyn Sampler) -> bool {
    match sampler.sample().await {
        Ok(()) => true,
        Err(e) => {
            warn!(sampler = sampler.name(), error = %e, "Sampler read failed, keeping previous values");
            false
        }
    }
}

/// Drives a sampler until `shutdown` fires.
///
/// The first timed sample happens one interval after start. Missed ticks are
/// delayed rather than bursted.
pub async fn run_sampler(scheduled: ScheduledSampler, shutdown: ShutdownSignal) {
    let ScheduledSampler {
        sampler,
        interval,
        refresh,
    } = scheduled;

    let mut ticker = interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let stop = shutdown.recv();
    tokio::pin!(stop);

    debug!(sampler = sampler.name(), interval_ms = interval.as_millis() as u64, "Sampler started");

    loop {
        tokio::select! {
            biased;
            () = &mut stop => {
                debug!(sampler = sampler.name(), "Sampler stopped");
                return;
            }
            _ = ticker.tick() => {}
            () = wait_for_refresh(refresh.as_ref()) => {
                debug!(sampler = sampler.name(), "Refresh requested");
            }
        }

        sample_once(sampler.as_ref()).await;
    }
}

async fn wait_for_refresh(trigger: Option<&RefreshTrigger>) {
    match trigger {
        Some(trigger) => trigger.fired().await,
        None => std::future::pending().await,
    }
}
