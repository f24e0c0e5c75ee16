//! Server-side lifecycle guards exercised straight through the endpoint
//! registry with the in-process transport.

use std::sync::Arc;

use rds_core::models::{
    GetOneRequest, HealthResponse, Job, JobCreate, JobStatus, JobUpdate, RuntimeUpdate,
};
use rds_core::{DatasiteConfig, RdsError};
use rds_rpc::{call_typed, endpoint, MockTransport, RpcTransport, HEALTH_ENDPOINT};
use rds_server::create_app;
use uuid::Uuid;

const DO_EMAIL: &str = "do@x";
const DS_EMAIL: &str = "ds@x";

struct Stack {
    _root: tempfile::TempDir,
    do_transport: MockTransport,
    ds_transport: MockTransport,
}

fn setup() -> Stack {
    let root = tempfile::tempdir().unwrap();
    let config = DatasiteConfig::new(DO_EMAIL, root.path());
    let (_app, registry) = create_app(config);
    Stack {
        _root: root,
        do_transport: MockTransport::new(registry.clone(), DO_EMAIL),
        ds_transport: MockTransport::new(registry, DS_EMAIL),
    }
}

async fn submit_job(transport: &MockTransport) -> Job {
    let create = JobCreate {
        name: Some("test job".to_string()),
        description: None,
        tags: vec!["test".to_string()],
        dataset_name: "test".to_string(),
        user_code_id: Uuid::new_v4(),
        runtime_id: None,
    };
    call_typed(transport, &endpoint("job", "create"), &create)
        .await
        .unwrap()
}

async fn update_job(
    transport: &MockTransport,
    update: &JobUpdate,
) -> Result<Job, RdsError> {
    call_typed(transport, &endpoint("job", "update"), update).await
}

#[tokio::test]
async fn health_reports_the_app() {
    let stack = setup();
    let health: HealthResponse = call_typed(
        &stack.ds_transport,
        HEALTH_ENDPOINT,
        &serde_json::json!({}),
    )
    .await
    .unwrap();
    assert_eq!(health.app_name, "rds");
}

#[tokio::test]
async fn job_crud_round_trip() {
    let stack = setup();
    let job = submit_job(&stack.do_transport).await;
    assert_eq!(job.status, JobStatus::PendingCodeReview);

    let fetched: Job = call_typed(
        &stack.do_transport,
        &endpoint("job", "get_one"),
        &GetOneRequest::by_uid(job.uid),
    )
    .await
    .unwrap();
    assert_eq!(fetched.uid, job.uid);

    let updated = update_job(
        &stack.do_transport,
        &JobUpdate::with_status(job.uid, JobStatus::Rejected),
    )
    .await
    .unwrap();
    assert_eq!(updated.status, JobStatus::Rejected);
}

#[tokio::test]
async fn illegal_transitions_are_refused() {
    let stack = setup();
    let job = submit_job(&stack.do_transport).await;

    // pending_code_review cannot jump to shared.
    let err = update_job(
        &stack.do_transport,
        &JobUpdate::with_status(job.uid, JobStatus::Shared),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, RdsError::InvalidUpdate(_)));

    // Terminal states accept nothing.
    update_job(
        &stack.do_transport,
        &JobUpdate::with_status(job.uid, JobStatus::Rejected),
    )
    .await
    .unwrap();
    let err = update_job(
        &stack.do_transport,
        &JobUpdate::with_status(job.uid, JobStatus::Approved),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, RdsError::InvalidUpdate(_)));
}

#[tokio::test]
async fn second_run_is_refused_by_the_state_machine() {
    let stack = setup();
    let job = submit_job(&stack.do_transport).await;

    update_job(
        &stack.do_transport,
        &JobUpdate::with_status(job.uid, JobStatus::Approved),
    )
    .await
    .unwrap();
    update_job(
        &stack.do_transport,
        &JobUpdate::with_status(job.uid, JobStatus::JobInProgress),
    )
    .await
    .unwrap();
    update_job(
        &stack.do_transport,
        &JobUpdate::with_status(job.uid, JobStatus::JobRunFinished),
    )
    .await
    .unwrap();

    // A finished job cannot re-enter execution.
    let err = update_job(
        &stack.do_transport,
        &JobUpdate::with_status(job.uid, JobStatus::JobInProgress),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, RdsError::InvalidUpdate(_)));
}

#[tokio::test]
async fn wrong_kind_update_body_is_invalid() {
    let stack = setup();
    let job = submit_job(&stack.do_transport).await;

    // A runtime update aimed at the job endpoint decodes into a JobUpdate
    // with no recognised fields only if shapes overlap; send something that
    // cannot fit at all.
    let bogus = serde_json::json!({ "uid": job.uid, "status": "no_such_status" });
    let err: Result<Job, _> = call_typed(
        &stack.do_transport,
        &endpoint("job", "update"),
        &bogus,
    )
    .await;
    assert!(matches!(err.unwrap_err(), RdsError::InvalidUpdate(_)));

    // And a well-formed update for a different record is a uid mismatch at
    // the store layer.
    let foreign = RuntimeUpdate {
        uid: Uuid::new_v4(),
        name: None,
        description: None,
        tags: None,
        cmd: None,
        config: None,
    };
    let err: Result<Job, _> = call_typed(
        &stack.do_transport,
        &endpoint("job", "update"),
        &foreign,
    )
    .await;
    assert!(err.is_err());
}

#[tokio::test]
async fn guest_cannot_touch_execution_fields() {
    let stack = setup();
    let job = submit_job(&stack.ds_transport).await;

    let err = update_job(
        &stack.ds_transport,
        &JobUpdate::with_status(job.uid, JobStatus::Approved),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, RdsError::Permission(_)));

    let mut update = JobUpdate::new(job.uid);
    update.return_code = Some(0);
    let err = update_job(&stack.ds_transport, &update).await.unwrap_err();
    assert!(matches!(err, RdsError::Permission(_)));

    // Cosmetic fields on their own job stay open to the creator.
    let mut rename = JobUpdate::new(job.uid);
    rename.name = Some("renamed".to_string());
    let renamed = update_job(&stack.ds_transport, &rename).await.unwrap();
    assert_eq!(renamed.name.as_deref(), Some("renamed"));
}

#[tokio::test]
async fn job_create_validates_runtime_reference() {
    let stack = setup();
    let create = JobCreate {
        name: None,
        description: None,
        tags: vec![],
        dataset_name: "test".to_string(),
        user_code_id: Uuid::new_v4(),
        runtime_id: Some(Uuid::new_v4()),
    };
    let err: Result<Job, _> =
        call_typed(&stack.do_transport, &endpoint("job", "create"), &create).await;
    assert!(matches!(err.unwrap_err(), RdsError::NotFound(_)));
}
