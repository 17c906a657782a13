//! Property tests for operation tracking and instrument naming.

use opentelemetry::metrics::MeterProvider;
use opentelemetry::KeyValue;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use proptest::prelude::*;
use test_utils::{
    invalid_instrument_name_strategy, operation_name_strategy, outcome_sequence_strategy,
    valid_instrument_name_strategy, MetricsHarness,
};

use taskboard_backend::observability::instruments::{validate_name, InstrumentKind, InstrumentRegistry};
use taskboard_backend::observability::{Instruments, OperationTracker, TelemetryError};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// One count and one latency point per call, tagged with the real outcome.
    #[test]
    fn prop_tracker_emits_once_per_call(
        operation in operation_name_strategy(),
        outcomes in outcome_sequence_strategy(),
    ) {
        let harness = MetricsHarness::new();
        let instruments = Instruments::register(&harness.meter()).unwrap();
        let tracker = OperationTracker::new(&instruments.db);

        for ok in &outcomes {
            let result: Result<(), ()> = tracker.track(operation, || if *ok { Ok(()) } else { Err(()) });
            prop_assert_eq!(result.is_ok(), *ok);
        }

        let successes = outcomes.iter().filter(|ok| **ok).count() as u64;
        let failures = outcomes.len() as u64 - successes;
        let snapshot = harness.snapshot();
        let op = KeyValue::new("operation", operation);

        prop_assert_eq!(snapshot.sum_u64("db_operations_total", &[op.clone()]), outcomes.len() as u64);
        prop_assert_eq!(
            snapshot.histogram_count("db_operation_duration_seconds", &[op.clone(), KeyValue::new("success", true)]),
            successes
        );
        prop_assert_eq!(
            snapshot.histogram_count("db_operation_duration_seconds", &[op, KeyValue::new("success", false)]),
            failures
        );
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_valid_names_accepted(name in valid_instrument_name_strategy()) {
        prop_assert!(validate_name(&name).is_ok());
    }

    #[test]
    fn prop_invalid_names_rejected(name in invalid_instrument_name_strategy()) {
        prop_assert!(validate_name(&name).is_err());
    }

    /// A second declaration of any name fails, whatever its kind.
    #[test]
    fn prop_duplicates_rejected(name in valid_instrument_name_strategy()) {
        let provider = SdkMeterProvider::default();
        let mut registry = InstrumentRegistry::new(provider.meter("property"));
        let leaked: &'static str = Box::leak(name.into_boxed_str());

        prop_assert!(registry.register(leaked, InstrumentKind::Counter, "1", "first").is_ok());
        let second = registry.register(leaked, InstrumentKind::Gauge, "1", "second");
        prop_assert!(matches!(second, Err(TelemetryError::DuplicateInstrument(_))));
    }
}
