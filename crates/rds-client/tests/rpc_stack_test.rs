//! Same flows, but over the real file-backed mailbox instead of the
//! in-process transport: a server watcher task answers request files.

mod common;

use common::{DO_EMAIL, DS_EMAIL};
use rds_core::models::RuntimeCreate;
use rds_core::DatasiteConfig;
use rds_rpc::RpcServer;

struct FileStack {
    _root: tempfile::TempDir,
    server: tokio::task::JoinHandle<()>,
    do_client: rds_client::RdsClient,
    ds_client: rds_client::RdsClient,
}

impl Drop for FileStack {
    fn drop(&mut self) {
        self.server.abort();
    }
}

fn setup_file_stack() -> FileStack {
    let root = tempfile::tempdir().unwrap();
    let do_config = DatasiteConfig::new(DO_EMAIL, root.path());
    let ds_config = DatasiteConfig::new(DS_EMAIL, root.path());

    let (app, registry) = rds_server::create_app(do_config.clone());
    let watcher = RpcServer::new(registry, app.paths.clone());
    let server = tokio::spawn(async move {
        let _ = watcher.run().await;
    });

    FileStack {
        _root: root,
        server,
        do_client: rds_client::init_session(DO_EMAIL, do_config),
        ds_client: rds_client::init_session(DO_EMAIL, ds_config),
    }
}

#[tokio::test]
async fn health_over_request_files() {
    let stack = setup_file_stack();

    let health = stack.ds_client.health().await.unwrap();
    assert_eq!(health.app_name, "rds");

    let health = stack.do_client.health().await.unwrap();
    assert_eq!(health.app_name, "rds");
}

#[tokio::test]
async fn crud_over_request_files() {
    let stack = setup_file_stack();

    let runtime = stack
        .do_client
        .runtime()
        .create(RuntimeCreate {
            name: Some("file-rpc".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();

    let fetched = stack.ds_client.runtime().get_by_name("file-rpc").await.unwrap();
    assert_eq!(fetched.uid, runtime.uid);

    // The mailbox leaves no unanswered requests behind.
    let rpc_root = stack
        .do_client
        .config()
        .paths_for(DO_EMAIL)
        .rpc_root();
    let mut leftover_requests = 0;
    for entry in walkdir::WalkDir::new(rpc_root).into_iter().filter_map(|e| e.ok()) {
        if entry.path().extension().and_then(|e| e.to_str()) == Some("request") {
            leftover_requests += 1;
        }
    }
    assert_eq!(leftover_requests, 0);
}
