//! Dataset placement, search, coercion behavior, and deletion of both trees.

mod common;

use std::collections::HashMap;

use common::*;
use rds_core::store::GetAllQuery;
use rds_core::RdsError;
use serde_json::Value;

#[tokio::test]
async fn private_tree_lives_outside_the_synced_datasite() {
    let stack = setup_stack();
    let dataset = create_dataset(&stack, "paths").await;

    let private = stack.do_client.dataset().private_path(&dataset).unwrap();
    let mock = stack.do_client.dataset().mock_path(&dataset).unwrap();

    assert_ne!(private, mock);
    assert!(private.exists());
    assert!(mock.exists());

    let datasites = stack.root.path().join("datasites");
    assert!(!private.starts_with(&datasites));
    assert!(mock.starts_with(&datasites));

    let private_str = private.display().to_string();
    assert!(private_str.contains(".syftbox"));
    assert!(private_str.contains("private_datasets"));
    assert!(private_str.contains(DO_EMAIL));
}

#[tokio::test]
async fn duplicate_name_is_refused() {
    let stack = setup_stack();
    create_dataset(&stack, "dupe").await;

    let assets = stack.root.path().join("assets").join("dupe");
    let result = stack
        .do_client
        .dataset()
        .create(rds_client::DatasetCreateParams {
            name: "dupe".to_string(),
            private_path: assets.join("private"),
            mock_path: assets.join("mock"),
            summary: None,
            description_path: None,
            tags: vec![],
            runtime_id: None,
        })
        .await;
    assert!(matches!(result, Err(RdsError::AlreadyExists(_))));
}

#[tokio::test]
async fn delete_removes_record_and_both_trees() {
    let stack = setup_stack();
    let dataset = create_dataset(&stack, "gone").await;

    let private = stack.do_client.dataset().private_path(&dataset).unwrap();
    let mock = stack.do_client.dataset().mock_path(&dataset).unwrap();
    assert!(private.exists() && mock.exists());

    assert!(stack.do_client.dataset().delete("gone").await.unwrap());

    assert!(!private.exists());
    assert!(!mock.exists());
    assert!(matches!(
        stack.do_client.dataset().get_by_name("gone").await.unwrap_err(),
        RdsError::NotFound(_)
    ));
}

#[tokio::test]
async fn readme_lands_next_to_the_mock_tree() {
    let stack = setup_stack();
    let dataset = create_dataset(&stack, "documented").await;

    assert_eq!(dataset.readme_filename.as_deref(), Some("README.md"));
    let mock = stack.do_client.dataset().mock_path(&dataset).unwrap();
    assert!(mock.join("README.md").exists());
}

#[tokio::test]
async fn filters_with_uncoercible_values_match_nothing() {
    let stack = setup_stack();
    create_dataset(&stack, "coercion").await;

    // A filter value of the wrong shape is passed through and matches no
    // record; the store never errors on it.
    let mut filters = HashMap::new();
    filters.insert("runtime_id".to_string(), Value::from(1234));
    let hits = stack
        .do_client
        .dataset()
        .get_all_with(
            &GetAllQuery {
                filters,
                ..Default::default()
            },
            rds_client::FetchMode::Rpc,
        )
        .await
        .unwrap();
    assert!(hits.is_empty());

    let mut filters = HashMap::new();
    filters.insert("name".to_string(), Value::String("coercion".to_string()));
    let hits = stack
        .do_client
        .dataset()
        .get_all_with(
            &GetAllQuery {
                filters,
                ..Default::default()
            },
            rds_client::FetchMode::Rpc,
        )
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
}

#[tokio::test]
async fn local_mode_reads_the_store_snapshot() {
    let stack = setup_stack();
    create_dataset(&stack, "local-read").await;

    let via_local = stack
        .ds_client
        .dataset()
        .get_with_mode(
            rds_core::models::GetOneRequest::by_name("local-read"),
            rds_client::FetchMode::Local,
        )
        .await
        .unwrap();
    assert_eq!(via_local.name, "local-read");

    let via_search = stack.do_client.dataset().text_search("LOCAL-").await.unwrap();
    assert_eq!(via_search.len(), 1);
}
