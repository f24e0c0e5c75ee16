//! Deletion semantics: orphaned user-code cleanup and bulk deletes.

mod common;

use std::collections::HashMap;

use common::*;
use rds_client::SubmitParams;
use rds_core::models::JobCreate;
use rds_core::{JobStatus, RdsError};
use serde_json::Value;
use uuid::Uuid;

#[tokio::test]
async fn delete_removes_job_and_orphaned_usercode() {
    let stack = setup_stack();
    create_dataset(&stack, "dummy").await;

    let code_dir = write_code(stack.root.path(), "ds_code", SUM_SCRIPT);
    let job = stack
        .ds_client
        .job()
        .submit(SubmitParams::new(&code_dir, "dummy").entrypoint("entry.sh"))
        .await
        .unwrap();
    let user_code_id = job.user_code_id;

    assert!(stack.do_client.user_code().get(user_code_id).await.is_ok());

    let deleted = stack.do_client.job().delete(job.uid, true).await.unwrap();
    assert!(deleted);

    assert!(matches!(
        stack.do_client.job().get(job.uid).await.unwrap_err(),
        RdsError::NotFound(_)
    ));
    assert!(matches!(
        stack.do_client.user_code().get(user_code_id).await.unwrap_err(),
        RdsError::NotFound(_)
    ));
}

#[tokio::test]
async fn shared_usercode_survives_until_last_reference() {
    let stack = setup_stack();
    create_dataset(&stack, "dummy").await;

    let code_dir = write_code(stack.root.path(), "ds_code", SUM_SCRIPT);
    let user_code = stack
        .do_client
        .user_code()
        .create(&code_dir, Some("entry.sh"), None)
        .await
        .unwrap();

    let job1 = stack
        .do_client
        .job()
        .create(JobCreate {
            name: Some("job 1".to_string()),
            description: None,
            tags: vec![],
            dataset_name: "dummy".to_string(),
            user_code_id: user_code.uid,
            runtime_id: None,
        })
        .await
        .unwrap();
    let job2 = stack
        .do_client
        .job()
        .create(JobCreate {
            name: Some("job 2".to_string()),
            description: None,
            tags: vec![],
            dataset_name: "dummy".to_string(),
            user_code_id: user_code.uid,
            runtime_id: None,
        })
        .await
        .unwrap();

    // First delete: the code is still referenced by job2.
    assert!(stack.do_client.job().delete(job1.uid, true).await.unwrap());
    assert!(stack.do_client.user_code().get(user_code.uid).await.is_ok());
    assert!(stack.do_client.job().get(job2.uid).await.is_ok());

    // Second delete orphans it.
    assert!(stack.do_client.job().delete(job2.uid, true).await.unwrap());
    assert!(matches!(
        stack.do_client.user_code().get(user_code.uid).await.unwrap_err(),
        RdsError::NotFound(_)
    ));
}

#[tokio::test]
async fn delete_without_cleanup_keeps_usercode() {
    let stack = setup_stack();
    create_dataset(&stack, "dummy").await;

    let code_dir = write_code(stack.root.path(), "ds_code", SUM_SCRIPT);
    let job = stack
        .ds_client
        .job()
        .submit(SubmitParams::new(&code_dir, "dummy").entrypoint("entry.sh"))
        .await
        .unwrap();

    assert!(stack.do_client.job().delete(job.uid, false).await.unwrap());
    assert!(stack.do_client.user_code().get(job.user_code_id).await.is_ok());
}

#[tokio::test]
async fn delete_nonexistent_job_returns_false() {
    let stack = setup_stack();
    let deleted = stack.do_client.job().delete(Uuid::new_v4(), false).await.unwrap();
    assert!(!deleted);
}

#[tokio::test]
async fn delete_all_with_filter_counts_matches() {
    let stack = setup_stack();
    create_dataset(&stack, "dummy").await;

    let code_dir = write_code(stack.root.path(), "ds_code", SUM_SCRIPT);
    let mut uids = Vec::new();
    for _ in 0..3 {
        let job = stack
            .ds_client
            .job()
            .submit(SubmitParams::new(&code_dir, "dummy").entrypoint("entry.sh"))
            .await
            .unwrap();
        uids.push(job.uid);
    }
    // Reject one; it drops out of the pending filter.
    let job = stack.do_client.job().get(uids[0]).await.unwrap();
    stack.do_client.job().reject(&job).await.unwrap();

    let mut filters = HashMap::new();
    filters.insert(
        "status".to_string(),
        Value::String(JobStatus::PendingCodeReview.as_str().to_string()),
    );
    let deleted = stack.do_client.job().delete_all(filters).await.unwrap();
    assert_eq!(deleted, 2);

    let remaining = stack.do_client.job().get_all().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].status, JobStatus::Rejected);
}
