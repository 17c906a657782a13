//! Domain gauges follow the store across arbitrary request sequences.

mod common;

use axum::http::{Method, StatusCode};
use proptest::prelude::*;
use test_utils::fixtures::{complete_task_body, create_task_body, rename_task_body};
use test_utils::{invalid_title_strategy, valid_title_strategy};

use taskboard_backend::storage::{TaskCounter, TaskFilter};

use common::{task_gauges_are, TestApp};

/// One request against the task API. Indices pick among tasks created so
/// far, deleted ones included.
#[derive(Debug, Clone)]
enum Step {
    Create(String),
    CreateInvalid(String),
    Complete(usize),
    Rename(usize, String),
    Delete(usize),
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        3 => valid_title_strategy().prop_map(Step::Create),
        1 => invalid_title_strategy().prop_map(Step::CreateInvalid),
        2 => any::<usize>().prop_map(Step::Complete),
        1 => (any::<usize>(), valid_title_strategy()).prop_map(|(i, t)| Step::Rename(i, t)),
        2 => any::<usize>().prop_map(Step::Delete),
    ]
}

fn pick(ids: &[i64], index: usize) -> Option<i64> {
    (!ids.is_empty()).then(|| ids[index % ids.len()])
}

async fn run_steps(steps: Vec<Step>) -> Result<(), TestCaseError> {
    let app = TestApp::spawn().await;
    let mut ids = Vec::new();

    for step in steps {
        match step {
            Step::Create(title) => {
                let (status, task) = app
                    .request(Method::POST, "/api/tasks", Some(create_task_body(&title)))
                    .await;
                prop_assert_eq!(status, StatusCode::CREATED);
                ids.push(task["id"].as_i64().unwrap());
            }
            Step::CreateInvalid(title) => {
                let (status, body) = app
                    .request(Method::POST, "/api/tasks", Some(create_task_body(&title)))
                    .await;
                prop_assert_eq!(status, StatusCode::BAD_REQUEST);
                prop_assert_eq!(&body["error"], "invalid input");
            }
            Step::Complete(index) => {
                if let Some(id) = pick(&ids, index) {
                    let (status, _) = app
                        .request(Method::PUT, &format!("/api/tasks/{id}"), Some(complete_task_body()))
                        .await;
                    prop_assert!(status == StatusCode::OK || status == StatusCode::NOT_FOUND);
                }
            }
            Step::Rename(index, title) => {
                if let Some(id) = pick(&ids, index) {
                    let (status, _) = app
                        .request(Method::PUT, &format!("/api/tasks/{id}"), Some(rename_task_body(&title)))
                        .await;
                    prop_assert!(status == StatusCode::OK || status == StatusCode::NOT_FOUND);
                }
            }
            Step::Delete(index) => {
                if let Some(id) = pick(&ids, index) {
                    let (status, _) = app
                        .request(Method::DELETE, &format!("/api/tasks/{id}"), None)
                        .await;
                    prop_assert_eq!(status, StatusCode::NO_CONTENT);
                }
            }
        }
    }

    let total = app.store.count(TaskFilter::All).await.unwrap();
    let completed = app.store.count(TaskFilter::Completed).await.unwrap();
    prop_assert!(completed <= total);
    app.eventually(task_gauges_are(total, completed)).await;
    prop_assert_eq!(
        app.harness.snapshot().sum_i64("http_active_requests", &[]),
        0
    );
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn prop_domain_gauges_match_store(steps in prop::collection::vec(step_strategy(), 1..20)) {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(run_steps(steps))?;
    }
}
