//! Test fixtures with sample data.
//!
//! Request bodies for the task API and a sample `/proc/self/status` body.

use serde_json::{json, Value};

/// Body for `POST /api/tasks`.
#[must_use]
pub fn create_task_body(title: &str) -> Value {
    json!({ "title": title })
}

/// Body for `PUT /api/tasks/:id` marking a task completed.
#[must_use]
pub fn complete_task_body() -> Value {
    json!({ "completed": true })
}

/// Body for `PUT /api/tasks/:id` renaming a task.
#[must_use]
pub fn rename_task_body(title: &str) -> Value {
    json!({ "title": title })
}

/// A Linux `/proc/self/status` excerpt: 20 MiB resident, 40 MiB data, 9 threads.
pub const PROC_STATUS_SAMPLE: &str = "Name:\ttaskboard-backend\n\
State:\tS (sleeping)\n\
VmPeak:\t  131072 kB\n\
VmSize:\t  131072 kB\n\
VmRSS:\t   20480 kB\n\
VmData:\t   40960 kB\n\
Threads:\t9\n";
