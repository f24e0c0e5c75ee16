//! Shared fixtures: an in-memory stack with two identities (`do@x` owns the
//! datasite, `ds@x` is a guest) over one shared workspace root, wired to the
//! server through the in-process transport.
#![allow(dead_code)]

use std::path::{Path, PathBuf};

use rds_client::{init_mock_session, DatasetCreateParams, RdsClient};
use rds_core::models::{Dataset, PythonRuntimeConfig, Runtime, RuntimeConfig, RuntimeCreate};
use rds_core::DatasiteConfig;

pub const DO_EMAIL: &str = "do@x";
pub const DS_EMAIL: &str = "ds@x";

pub struct TestStack {
    pub root: tempfile::TempDir,
    pub do_client: RdsClient,
    pub ds_client: RdsClient,
}

pub fn setup_stack() -> TestStack {
    let root = tempfile::tempdir().unwrap();
    let do_config = DatasiteConfig::new(DO_EMAIL, root.path());
    let ds_config = DatasiteConfig::new(DS_EMAIL, root.path());

    let (_app, registry) = rds_server::create_app(do_config.clone());
    let do_client = init_mock_session(DO_EMAIL, do_config, registry.clone());
    let ds_client = init_mock_session(DO_EMAIL, ds_config, registry);

    TestStack {
        root,
        do_client,
        ds_client,
    }
}

/// Publish a dataset whose private CSV sums to 9 on the first row while the
/// mock copy holds different numbers.
pub async fn create_dataset(stack: &TestStack, name: &str) -> Dataset {
    let assets = stack.root.path().join("assets").join(name);
    let private = assets.join("private");
    let mock = assets.join("mock");
    std::fs::create_dir_all(&private).unwrap();
    std::fs::create_dir_all(&mock).unwrap();
    std::fs::write(private.join("data.csv"), "A,B,C\n2,3,4\n10,20,30\n").unwrap();
    std::fs::write(mock.join("data.csv"), "A,B,C\n0,0,0\n").unwrap();
    let readme = assets.join("README.md");
    std::fs::write(&readme, "# test data\n").unwrap();

    stack
        .do_client
        .dataset()
        .create(DatasetCreateParams {
            name: name.to_string(),
            private_path: private,
            mock_path: mock,
            summary: Some("Test data".to_string()),
            description_path: Some(readme),
            tags: vec!["test".to_string()],
            runtime_id: None,
        })
        .await
        .unwrap()
}

/// Register a runtime whose interpreter is `sh`, so tests only need a POSIX
/// shell. It rides the local-subprocess runner.
pub async fn create_sh_runtime(stack: &TestStack, name: &str) -> Runtime {
    stack
        .do_client
        .runtime()
        .create(RuntimeCreate {
            name: Some(name.to_string()),
            cmd: Some(vec!["sh".to_string()]),
            config: Some(RuntimeConfig::Python(PythonRuntimeConfig {
                version: None,
                use_uv: false,
            })),
            ..Default::default()
        })
        .await
        .unwrap()
}

/// Write a shell entrypoint into its own folder and return the folder.
pub fn write_code(root: &Path, dir_name: &str, script: &str) -> PathBuf {
    let code_dir = root.join("assets").join(dir_name);
    std::fs::create_dir_all(&code_dir).unwrap();
    std::fs::write(code_dir.join("entry.sh"), script).unwrap();
    code_dir
}

/// Entrypoint computing per-row sums into `result.csv`.
pub const SUM_SCRIPT: &str = "#!/bin/sh\n\
    awk -F, 'NR==1 {print $0\",sum\"} NR>1 {print $0\",\"$1+$2+$3}' \"$DATA_DIR/data.csv\" > \"$OUTPUT_DIR/result.csv\"\n\
    echo \"wrote $OUTPUT_DIR/result.csv\"\n";
