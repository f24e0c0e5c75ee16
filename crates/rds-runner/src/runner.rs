use std::collections::HashMap;
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};

use tracing::info;

use rds_core::{Job, JobUpdate, RdsError, Result, RuntimeKind};

use crate::config::JobConfig;
use crate::docker::DockerRunner;
use crate::handlers::OutputHandler;
use crate::process::{drive, ProcessHandle};
use crate::python::PythonRunner;

/// Receives job status updates as execution progresses. The sink must be
/// cheap and non-blocking; the caller owns ordering and persistence.
pub type StatusSink = Arc<dyn Fn(JobUpdate) + Send + Sync>;

pub enum RunOutcome {
    /// Blocking mode: the process ran to completion.
    Completed {
        return_code: i32,
        error_message: Option<String>,
    },
    /// Non-blocking mode: the process is still running; a monitor thread
    /// will push the terminal status update through the sink.
    Detached(ProcessHandle),
}

/// A concrete runner executes one job under one runtime kind.
pub trait JobRunner: Send {
    fn run(self: Box<Self>, job: &Job, config: &JobConfig) -> Result<RunOutcome>;
}

/// Pick the runner for a runtime kind. Kubernetes is representable in the
/// model but has no host-side runner.
pub fn runner_for(
    kind: RuntimeKind,
    handlers: Vec<Box<dyn OutputHandler>>,
    status: StatusSink,
) -> Result<Box<dyn JobRunner>> {
    match kind {
        RuntimeKind::Python => Ok(Box::new(PythonRunner::new(handlers, status))),
        RuntimeKind::Docker => Ok(Box::new(DockerRunner::new(handlers, status))),
        RuntimeKind::Kubernetes => Err(RdsError::RuntimeUnavailable(
            "no host-side runner for kubernetes runtimes".into(),
        )),
    }
}

pub(crate) fn validate_paths(config: &JobConfig) -> Result<()> {
    if !config.function_folder.exists() {
        return Err(RdsError::Validation(format!(
            "function folder {} does not exist",
            config.function_folder.display()
        )));
    }
    if !config.data_path.exists() {
        return Err(RdsError::Validation(format!(
            "dataset folder {} does not exist",
            config.data_path.display()
        )));
    }
    Ok(())
}

/// Create the job working tree. The output directory is opened up so a
/// sandboxed container user can write into it.
pub(crate) fn prepare_job_folders(config: &JobConfig) -> Result<()> {
    std::fs::create_dir_all(&config.job_path)?;
    std::fs::create_dir_all(config.logs_dir())?;
    std::fs::create_dir_all(config.output_dir())?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(
            config.output_dir(),
            std::fs::Permissions::from_mode(0o777),
        )?;
    }
    Ok(())
}

/// Shared execution path: emit `job_in_progress`, start the handlers, spawn
/// the process and either drive it inline or hand it to a monitor thread.
pub(crate) fn run_subprocess(
    mut command: Command,
    extra_env: &HashMap<String, String>,
    job: &Job,
    config: &JobConfig,
    mut handlers: Vec<Box<dyn OutputHandler>>,
    status: StatusSink,
) -> Result<RunOutcome> {
    status(JobUpdate::in_progress(job.uid));
    for handler in handlers.iter_mut() {
        handler.on_job_start(config);
    }

    command
        .envs(extra_env)
        .env("PYTHONUNBUFFERED", "1")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let child = command.spawn()?;
    let pid = child.id();
    let child = Arc::new(Mutex::new(child));

    if config.blocking {
        info!(pid, "running job in blocking mode");
        let result = drive(&child, &mut handlers)?;
        Ok(RunOutcome::Completed {
            return_code: result.return_code,
            error_message: result.error_message,
        })
    } else {
        info!(pid, "running job in non-blocking mode");
        let handle = ProcessHandle::new(child.clone(), pid);
        let job_uid = job.uid;
        std::thread::spawn(move || {
            match drive(&child, &mut handlers) {
                Ok(result) => status(JobUpdate::for_return_code(
                    job_uid,
                    result.return_code,
                    result.error_message,
                )),
                // Never let a monitor failure escape; record it on the job.
                Err(e) => status(JobUpdate::for_return_code(
                    job_uid,
                    -1,
                    Some(format!("monitor failed: {e}")),
                )),
            }
        });
        Ok(RunOutcome::Detached(handle))
    }
}
