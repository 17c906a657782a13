//! Background sampler behavior: publishing, failed reads, refresh and
//! cancellation.

mod common;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use test_utils::{FailureSwitch, MetricsHarness};

use taskboard_backend::observability::sampler::{
    parse_proc_status, run_sampler, DomainSampler, PoolSampler, ProcessProbe, ProcessSampler,
    ProcessStats, RefreshTrigger, Sampler, ScheduledSampler,
};
use taskboard_backend::observability::{Instruments, SamplerError};
use taskboard_backend::shutdown::ShutdownCoordinator;
use taskboard_backend::storage::{PoolStats, PoolStatsSource, StoreError, TaskCounter, TaskFilter};

use common::kv;
use opentelemetry::KeyValue;

/// Task counter whose `Completed` query can be made to fail.
#[derive(Default)]
struct FakeCounter {
    total: AtomicU64,
    completed: AtomicU64,
    completed_query: FailureSwitch,
}

impl FakeCounter {
    fn set(&self, total: u64, completed: u64) {
        self.total.store(total, Ordering::SeqCst);
        self.completed.store(completed, Ordering::SeqCst);
    }
}

#[async_trait]
impl TaskCounter for FakeCounter {
    async fn count(&self, filter: TaskFilter) -> Result<u64, StoreError> {
        match filter {
            TaskFilter::All => Ok(self.total.load(Ordering::SeqCst)),
            TaskFilter::Completed => {
                if self.completed_query.hit() {
                    Err(StoreError::Pool("injected failure".to_string()))
                } else {
                    Ok(self.completed.load(Ordering::SeqCst))
                }
            }
        }
    }
}

struct FixedPool(PoolStats);

impl PoolStatsSource for FixedPool {
    fn pool_stats(&self) -> PoolStats {
        self.0
    }
}

struct SwitchableProbe {
    stats: ProcessStats,
    switch: FailureSwitch,
}

impl ProcessProbe for SwitchableProbe {
    fn read(&self) -> Result<ProcessStats, SamplerError> {
        if self.switch.hit() {
            Err(SamplerError::Process("unavailable".to_string()))
        } else {
            Ok(self.stats)
        }
    }
}

fn task_gauges(harness: &MetricsHarness) -> (Option<u64>, Option<u64>) {
    let snapshot = harness.snapshot();
    (
        snapshot.gauge_u64("tasks_total", &[]),
        snapshot.gauge_u64("tasks_completed_total", &[]),
    )
}

#[tokio::test]
async fn test_domain_sampler_publishes_both_counts() {
    let harness = MetricsHarness::new();
    let instruments = Instruments::register(&harness.meter()).unwrap();
    let counter = Arc::new(FakeCounter::default());
    counter.set(3, 1);

    let sampler = DomainSampler::new(counter.clone(), instruments.tasks.clone());
    assert!(sampler.refresh_now().await);
    assert_eq!(task_gauges(&harness), (Some(3), Some(1)));

    counter.set(0, 0);
    assert!(sampler.refresh_now().await);
    assert_eq!(task_gauges(&harness), (Some(0), Some(0)));
}

#[tokio::test]
async fn test_failed_read_keeps_previous_values() {
    let harness = MetricsHarness::new();
    let instruments = Instruments::register(&harness.meter()).unwrap();
    let counter = Arc::new(FakeCounter::default());
    counter.set(3, 1);

    let sampler = DomainSampler::new(counter.clone(), instruments.tasks.clone());
    assert!(sampler.refresh_now().await);

    counter.set(5, 2);
    counter.completed_query.fail();
    assert!(matches!(sampler.sample().await, Err(SamplerError::Store(_))));
    assert!(!sampler.refresh_now().await);

    // The total read succeeded but must not be published alone.
    assert_eq!(task_gauges(&harness), (Some(3), Some(1)));

    counter.completed_query.pass();
    assert!(sampler.refresh_now().await);
    assert_eq!(task_gauges(&harness), (Some(5), Some(2)));
}

#[tokio::test]
async fn test_pool_sampler_auxiliary_observation() {
    let harness = MetricsHarness::new();
    let instruments = Instruments::register(&harness.meter()).unwrap();
    let source = Arc::new(FixedPool(PoolStats {
        open: 4,
        idle: 3,
        in_use: 1,
        max_open: 20,
    }));

    let sampler = PoolSampler::new(source, instruments.db.connections_open.clone());
    sampler.sample().await.unwrap();

    let snapshot = harness.snapshot();
    assert_eq!(snapshot.gauge_u64("db_connections_open", &[]), Some(4));
    assert_eq!(
        snapshot.gauge_u64(
            "db_connections_open",
            &[
                KeyValue::new("idle", 3_i64),
                KeyValue::new("in_use", 1_i64),
                KeyValue::new("max_open", 20_i64),
            ]
        ),
        Some(0)
    );
    assert_eq!(snapshot.sum_u64("db_connections_open", &[]), 4);
}

#[tokio::test]
async fn test_process_sampler_publishes_by_type() {
    let harness = MetricsHarness::new();
    let instruments = Instruments::register(&harness.meter()).unwrap();
    let mut stats = parse_proc_status(test_utils::fixtures::PROC_STATUS_SAMPLE).unwrap();
    stats.tasks = 12;
    let switch = FailureSwitch::new();

    let sampler = ProcessSampler::new(
        SwitchableProbe {
            stats,
            switch: switch.clone(),
        },
        instruments.process.clone(),
    );
    sampler.sample().await.unwrap();

    let snapshot = harness.snapshot();
    assert_eq!(
        snapshot.gauge_u64("memory_usage_bytes", &[kv("type", "resident")]),
        Some(20480 * 1024)
    );
    assert_eq!(
        snapshot.gauge_u64("memory_usage_bytes", &[kv("type", "heap")]),
        Some(40960 * 1024)
    );
    assert_eq!(snapshot.gauge_u64("goroutine_count", &[kv("type", "thread")]), Some(9));
    assert_eq!(snapshot.gauge_u64("goroutine_count", &[kv("type", "task")]), Some(12));

    switch.fail();
    assert!(sampler.sample().await.is_err());
    assert_eq!(
        harness.snapshot().gauge_u64("goroutine_count", &[kv("type", "thread")]),
        Some(9)
    );
}

#[tokio::test]
async fn test_refresh_trigger_wakes_loop() {
    let harness = MetricsHarness::new();
    let instruments = Instruments::register(&harness.meter()).unwrap();
    let counter = Arc::new(FakeCounter::default());
    counter.set(2, 0);
    let refresh = RefreshTrigger::new();

    let mut coordinator = ShutdownCoordinator::new();
    let signal = coordinator.subscribe();
    coordinator.spawn(
        "task_sampler",
        run_sampler(
            ScheduledSampler::every(
                Arc::new(DomainSampler::new(counter.clone(), instruments.tasks.clone())),
                Duration::from_secs(3600),
            )
            .with_refresh(refresh.clone()),
            signal,
        ),
    );

    refresh.fire();
    common::eventually(&harness, common::task_gauges_are(2, 0)).await;

    counter.set(7, 3);
    refresh.fire();
    common::eventually(&harness, common::task_gauges_are(7, 3)).await;

    coordinator.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_interval_drives_samples() {
    let harness = MetricsHarness::new();
    let instruments = Instruments::register(&harness.meter()).unwrap();
    let counter = Arc::new(FakeCounter::default());
    counter.set(1, 1);

    let mut coordinator = ShutdownCoordinator::new();
    let signal = coordinator.subscribe();
    coordinator.spawn(
        "task_sampler",
        run_sampler(
            ScheduledSampler::every(
                Arc::new(DomainSampler::new(counter.clone(), instruments.tasks.clone())),
                Duration::from_millis(20),
            ),
            signal,
        ),
    );

    common::eventually(&harness, common::task_gauges_are(1, 1)).await;
    counter.set(4, 2);
    common::eventually(&harness, common::task_gauges_are(4, 2)).await;

    coordinator.shutdown(Duration::from_secs(1)).await;
}

#[tokio::test]
async fn test_cancelled_sampler_stops_publishing() {
    let harness = MetricsHarness::new();
    let instruments = Instruments::register(&harness.meter()).unwrap();
    let counter = Arc::new(FakeCounter::default());
    counter.set(1, 0);

    let mut coordinator = ShutdownCoordinator::new();
    let signal = coordinator.subscribe();
    coordinator.spawn(
        "task_sampler",
        run_sampler(
            ScheduledSampler::every(
                Arc::new(DomainSampler::new(counter.clone(), instruments.tasks.clone())),
                Duration::from_millis(10),
            ),
            signal,
        ),
    );

    common::eventually(&harness, common::task_gauges_are(1, 0)).await;
    coordinator.shutdown(Duration::from_secs(1)).await;

    let calls_at_shutdown = counter.completed_query.calls();
    counter.set(9, 9);
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(counter.completed_query.calls(), calls_at_shutdown);
    assert_eq!(task_gauges(&harness), (Some(1), Some(0)));
}

#[tokio::test]
async fn test_failing_loop_keeps_running() {
    let harness = MetricsHarness::new();
    let instruments = Instruments::register(&harness.meter()).unwrap();
    let counter = Arc::new(FakeCounter::default());
    counter.set(6, 1);
    counter.completed_query.fail();

    let mut coordinator = ShutdownCoordinator::new();
    let signal = coordinator.subscribe();
    coordinator.spawn(
        "task_sampler",
        run_sampler(
            ScheduledSampler::every(
                Arc::new(DomainSampler::new(counter.clone(), instruments.tasks.clone())),
                Duration::from_millis(10),
            ),
            signal,
        ),
    );

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(counter.completed_query.calls() >= 2);
    assert_eq!(task_gauges(&harness), (None, None));

    counter.completed_query.pass();
    common::eventually(&harness, common::task_gauges_are(6, 1)).await;

    coordinator.shutdown(Duration::from_secs(1)).await;
}
