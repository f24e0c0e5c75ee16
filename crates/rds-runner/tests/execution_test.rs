//! End-to-end runner tests against real subprocesses. The scripts use `sh`
//! as the interpreter so nothing beyond a POSIX shell is required.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rds_core::models::runtime::PythonRuntimeConfig;
use rds_core::{Job, JobCreate, JobStatus, JobUpdate, Runtime, RuntimeConfig};
use rds_runner::{
    default_handlers, runner_for, JobConfig, ProcessHandle, RunOutcome,
};
use uuid::Uuid;

fn sh_runtime() -> Runtime {
    let mut runtime = Runtime::ephemeral("do@x");
    runtime.cmd = vec!["sh".to_string()];
    runtime.config = RuntimeConfig::Python(PythonRuntimeConfig {
        version: None,
        use_uv: false,
    });
    runtime
}

fn job() -> Job {
    JobCreate {
        name: Some("runner test".into()),
        description: None,
        tags: vec![],
        dataset_name: "dummy".into(),
        user_code_id: Uuid::new_v4(),
        runtime_id: None,
    }
    .into_job("ds@x")
}

fn setup(root: &Path, script: &str) -> JobConfig {
    let code_dir = root.join("code");
    let data_dir = root.join("data");
    std::fs::create_dir_all(&code_dir).unwrap();
    std::fs::create_dir_all(&data_dir).unwrap();
    std::fs::write(code_dir.join("entry.sh"), script).unwrap();
    std::fs::write(data_dir.join("data.csv"), "A,B,C\n2,3,4\n").unwrap();

    JobConfig {
        function_folder: code_dir,
        data_path: data_dir,
        job_path: root.join("job"),
        args: vec!["entry.sh".to_string()],
        runtime: sh_runtime(),
        timeout_secs: 300,
        extra_env: HashMap::new(),
        blocking: true,
        data_mount_dir: String::new(),
    }
}

fn updates_sink() -> (Arc<Mutex<Vec<JobUpdate>>>, rds_runner::StatusSink) {
    let updates: Arc<Mutex<Vec<JobUpdate>>> = Arc::new(Mutex::new(Vec::new()));
    let sink_updates = updates.clone();
    let sink: rds_runner::StatusSink = Arc::new(move |update| {
        sink_updates.lock().unwrap().push(update);
    });
    (updates, sink)
}

fn run_blocking(config: &JobConfig) -> (i32, Option<String>, Arc<Mutex<Vec<JobUpdate>>>) {
    let job = job();
    let (updates, sink) = updates_sink();
    let runner = runner_for(config.runtime.kind, default_handlers(), sink).unwrap();
    match runner.run(&job, config).unwrap() {
        RunOutcome::Completed {
            return_code,
            error_message,
        } => (return_code, error_message, updates),
        RunOutcome::Detached(_) => panic!("blocking run returned a handle"),
    }
}

#[test]
fn happy_path_writes_output_and_logs() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup(
        dir.path(),
        "#!/bin/sh\n\
         echo \"processing $DATA_DIR/data.csv\"\n\
         awk -F, 'NR==1 {print $0\",sum\"} NR>1 {print $0\",\"$1+$2+$3}' \"$DATA_DIR/data.csv\" > \"$OUTPUT_DIR/result.csv\"\n",
    );

    let (return_code, error_message, updates) = run_blocking(&config);
    assert_eq!(return_code, 0);
    assert_eq!(error_message, None);

    let result = std::fs::read_to_string(config.output_dir().join("result.csv")).unwrap();
    let mut lines = result.lines();
    assert_eq!(lines.next(), Some("A,B,C,sum"));
    assert_eq!(lines.next(), Some("2,3,4,9"));

    let stdout = std::fs::read_to_string(config.logs_dir().join("stdout.log")).unwrap();
    assert!(stdout.contains("processing"));

    let updates = updates.lock().unwrap();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].status, Some(JobStatus::JobInProgress));
}

#[test]
fn nonzero_exit_collects_stderr() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup(
        dir.path(),
        "#!/bin/sh\necho \"stage one failed\" 1>&2\nexit 3\n",
    );

    let (return_code, error_message, _) = run_blocking(&config);
    assert_eq!(return_code, 3);
    assert_eq!(error_message.as_deref(), Some("stage one failed\n"));
}

#[test]
fn error_log_demotes_zero_exit() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup(
        dir.path(),
        "#!/bin/sh\necho \"all good on stdout\"\necho \"ERROR: boom\" 1>&2\nexit 0\n",
    );

    let (return_code, error_message, _) = run_blocking(&config);
    assert_eq!(return_code, 1);
    assert_eq!(error_message.as_deref(), Some("ERROR: boom\n"));
}

#[test]
fn warning_logs_do_not_demote() {
    let dir = tempfile::tempdir().unwrap();
    let config = setup(
        dir.path(),
        "#!/bin/sh\necho \"WARNING: just a warning\" 1>&2\nexit 0\n",
    );

    let (return_code, error_message, _) = run_blocking(&config);
    assert_eq!(return_code, 0);
    assert_eq!(error_message, None);
}

#[test]
fn missing_function_folder_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = setup(dir.path(), "#!/bin/sh\n");
    config.function_folder = dir.path().join("does-not-exist");

    let (_, sink) = updates_sink();
    let runner = runner_for(config.runtime.kind, default_handlers(), sink).unwrap();
    assert!(runner.run(&job(), &config).is_err());
}

#[test]
fn non_blocking_reports_terminal_status_through_sink() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = setup(dir.path(), "#!/bin/sh\nsleep 0.2\necho done\n");
    config.blocking = false;

    let job = job();
    let (updates, sink) = updates_sink();
    let runner = runner_for(config.runtime.kind, default_handlers(), sink).unwrap();
    let handle: ProcessHandle = match runner.run(&job, &config).unwrap() {
        RunOutcome::Detached(handle) => handle,
        RunOutcome::Completed { .. } => panic!("non-blocking run completed inline"),
    };

    assert_eq!(handle.wait().unwrap(), 0);

    // The monitor thread flushes the terminal update shortly after exit.
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        {
            let updates = updates.lock().unwrap();
            if updates
                .iter()
                .any(|u| u.status == Some(JobStatus::JobRunFinished))
            {
                break;
            }
        }
        assert!(Instant::now() < deadline, "no terminal update observed");
        std::thread::sleep(Duration::from_millis(20));
    }
}

#[test]
fn kill_stops_a_detached_process() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = setup(dir.path(), "#!/bin/sh\nsleep 30\n");
    config.blocking = false;

    let (_, sink) = updates_sink();
    let runner = runner_for(config.runtime.kind, default_handlers(), sink).unwrap();
    let handle = match runner.run(&job(), &config).unwrap() {
        RunOutcome::Detached(handle) => handle,
        RunOutcome::Completed { .. } => panic!("non-blocking run completed inline"),
    };

    handle.kill().unwrap();
    let code = handle.wait().unwrap();
    assert_ne!(code, 0);
}
