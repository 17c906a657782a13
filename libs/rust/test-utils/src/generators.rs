//! Shared proptest generators.
//!
//! Strategies for instrument names, task titles and operation outcomes.

use proptest::prelude::*;

/// Names accepted by the instrument registry.
pub fn valid_instrument_name_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9_./-]{0,254}"
}

/// Names the instrument registry must reject.
pub fn invalid_instrument_name_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        "[0-9_./-][A-Za-z0-9_]{0,20}",
        "[a-z]{1,10}[ {}!@#$%^&*()+=][a-z]{0,10}",
        "[a-z]{256,300}",
    ]
}

/// Titles accepted by the task API (1 to 200 characters).
pub fn valid_title_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z0-9 ]{1,200}"
}

/// Titles the task API must reject.
pub fn invalid_title_strategy() -> impl Strategy<Value = String> {
    prop_oneof![Just(String::new()), "[a-z]{201,240}"]
}

/// Sequences of success/failure outcomes for tracked operations.
pub fn outcome_sequence_strategy() -> impl Strategy<Value = Vec<bool>> {
    prop::collection::vec(any::<bool>(), 1..50)
}

/// Operation names used by the task handlers.
pub fn operation_name_strategy() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("query_all_tasks"),
        Just("create_task"),
        Just("find_task"),
        Just("update_task"),
        Just("delete_task"),
        Just("delete_all_tasks"),
    ]
}
