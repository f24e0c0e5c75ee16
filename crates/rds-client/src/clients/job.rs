use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use rds_core::models::{
    DeleteAllRequest, DeleteAllResponse, GetOneRequest, Job, JobCreate, JobDeleteRequest,
    JobStatus, JobUpdate, Runtime, RuntimeKind,
};
use rds_core::store::GetAllQuery;
use rds_core::{RdsError, Result};
use rds_rpc::{endpoint, VERB_DELETE, VERB_DELETE_ALL};
use rds_runner::config::CONTAINER_DATA_DIR;
use rds_runner::{
    default_handlers, runner_for, JobConfig, ProcessHandle, StatusSink, DEFAULT_TIMEOUT_SECS,
};

use crate::clients::user_code::build_create;
use crate::clients::{FetchMode, KindClient};
use crate::local_store::copy_into;
use crate::ClientCtx;

/// Parameters for `job.submit`.
#[derive(Debug, Clone)]
pub struct SubmitParams {
    pub name: Option<String>,
    pub description: Option<String>,
    pub user_code_path: PathBuf,
    /// Required when `user_code_path` is a folder.
    pub entrypoint: Option<String>,
    pub dataset_name: String,
    pub runtime_name: Option<String>,
    pub tags: Vec<String>,
    /// `None` uses the default ignore set, `Some(vec![])` packs everything.
    pub ignore_patterns: Option<Vec<String>>,
}

impl SubmitParams {
    pub fn new(user_code_path: impl Into<PathBuf>, dataset_name: impl Into<String>) -> Self {
        Self {
            name: None,
            description: None,
            user_code_path: user_code_path.into(),
            entrypoint: None,
            dataset_name: dataset_name.into(),
            runtime_name: None,
            tags: Vec::new(),
            ignore_patterns: None,
        }
    }

    pub fn entrypoint(mut self, entrypoint: impl Into<String>) -> Self {
        self.entrypoint = Some(entrypoint.into());
        self
    }

    pub fn runtime_name(mut self, runtime_name: impl Into<String>) -> Self {
        self.runtime_name = Some(runtime_name.into());
        self
    }

    pub fn ignore_patterns(mut self, patterns: Vec<String>) -> Self {
        self.ignore_patterns = Some(patterns);
        self
    }
}

/// Options for `run_private`.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub blocking: bool,
    /// Permit the legacy direct path from `pending_code_review`.
    pub force: bool,
    pub timeout_secs: u64,
    pub extra_env: HashMap<String, String>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            blocking: true,
            force: false,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            extra_env: HashMap::new(),
        }
    }
}

/// What `run_private` hands back: the job as last fetched, plus the process
/// handle when running detached.
#[derive(Debug)]
pub struct RunOutcome {
    pub job: Job,
    pub handle: Option<ProcessHandle>,
}

pub struct JobClient {
    inner: KindClient<Job>,
}

impl JobClient {
    pub(crate) fn new(ctx: Arc<ClientCtx>) -> Self {
        Self {
            inner: KindClient::new(ctx),
        }
    }

    fn ctx(&self) -> &ClientCtx {
        &self.inner.ctx
    }

    /// Submit user code against a dataset. Creates the UserCode and the Job
    /// as one step; a referenced runtime is resolved up front so nothing is
    /// created when it does not exist.
    pub async fn submit(&self, params: SubmitParams) -> Result<Job> {
        let ctx = self.ctx();

        // Fail fast on both references before anything exists.
        let dataset = self
            .inner
            .ctx
            .call::<_, rds_core::Dataset>(
                &endpoint("dataset", rds_rpc::VERB_GET_ONE),
                &GetOneRequest::by_name(&params.dataset_name),
            )
            .await
            .map_err(|_| {
                RdsError::NotFound(format!("dataset '{}' does not exist", params.dataset_name))
            })?;

        let runtime_id = match &params.runtime_name {
            Some(runtime_name) => {
                let runtime: Runtime = ctx
                    .call(
                        &endpoint("runtime", rds_rpc::VERB_GET_ONE),
                        &GetOneRequest::by_name(runtime_name),
                    )
                    .await
                    .map_err(|_| {
                        RdsError::NotFound(format!("runtime '{runtime_name}' does not exist"))
                    })?;
                Some(runtime.uid)
            }
            None => None,
        };

        let (user_code_create, bytes) = build_create(
            &params.user_code_path,
            params.entrypoint.as_deref(),
            params.ignore_patterns.clone(),
        )?;
        let user_code: rds_core::UserCode = ctx
            .call(&endpoint("user_code", rds_rpc::VERB_CREATE), &user_code_create)
            .await?;

        let local_dir = ctx.host_paths.user_code_dir(&user_code.uid);
        if !local_dir.exists() {
            rds_core::bundle::unpack(&bytes, &local_dir)?;
        }

        let job_create = JobCreate {
            name: params.name,
            description: params.description,
            tags: params.tags,
            dataset_name: dataset.name,
            user_code_id: user_code.uid,
            runtime_id,
        };
        match self.inner.create(&job_create).await {
            Ok(job) => {
                info!(uid = %job.uid, dataset = job.dataset_name, "job submitted");
                Ok(job)
            }
            Err(e) => {
                // Submit is atomic: do not leave the code bundle behind.
                let delete = rds_core::models::DeleteRequest { uid: user_code.uid };
                if let Err(cleanup) = ctx
                    .call::<_, bool>(&endpoint("user_code", VERB_DELETE), &delete)
                    .await
                {
                    warn!(uid = %user_code.uid, "could not clean up user code: {cleanup}");
                }
                Err(e)
            }
        }
    }

    /// Register a job against already-registered user code.
    pub async fn create(&self, create: JobCreate) -> Result<Job> {
        self.inner.create(&create).await
    }

    pub async fn get(&self, uid: Uuid) -> Result<Job> {
        self.inner.get(GetOneRequest::by_uid(uid), FetchMode::Rpc).await
    }

    pub async fn get_with_mode(&self, uid: Uuid, mode: FetchMode) -> Result<Job> {
        self.inner.get(GetOneRequest::by_uid(uid), mode).await
    }

    pub async fn get_all(&self) -> Result<Vec<Job>> {
        self.inner.get_all(&GetAllQuery::default(), FetchMode::Rpc).await
    }

    pub async fn get_all_with(&self, query: &GetAllQuery, mode: FetchMode) -> Result<Vec<Job>> {
        self.inner.get_all(query, mode).await
    }

    pub async fn update(&self, update: &JobUpdate) -> Result<Job> {
        self.inner.update(update).await
    }

    pub async fn approve(&self, job: &Job) -> Result<Job> {
        self.update(&JobUpdate::with_status(job.uid, JobStatus::Approved)).await
    }

    pub async fn reject(&self, job: &Job) -> Result<Job> {
        self.update(&JobUpdate::with_status(job.uid, JobStatus::Rejected)).await
    }

    pub async fn delete(&self, uid: Uuid, delete_orphaned_usercode: bool) -> Result<bool> {
        self.ctx()
            .call(
                &endpoint("job", VERB_DELETE),
                &JobDeleteRequest {
                    uid,
                    delete_orphaned_usercode,
                },
            )
            .await
    }

    pub async fn delete_all(&self, filters: HashMap<String, Value>) -> Result<usize> {
        let response: DeleteAllResponse = self
            .ctx()
            .call(&endpoint("job", VERB_DELETE_ALL), &DeleteAllRequest { filters })
            .await?;
        Ok(response.deleted)
    }

    /// Execute an approved job against the private data. Owner-side only:
    /// the runner needs the private tree and the extracted code bundle.
    pub async fn run_private(&self, job: &Job, options: RunOptions) -> Result<RunOutcome> {
        let ctx = self.ctx();
        if !ctx.is_admin() {
            return Err(RdsError::Permission(format!(
                "{} must be the datasite admin to run jobs",
                ctx.email()
            )));
        }

        let job = self.get(job.uid).await?;
        match job.status {
            JobStatus::Approved => {}
            JobStatus::PendingCodeReview if options.force => {}
            JobStatus::PendingCodeReview => {
                return Err(RdsError::InvalidUpdate(format!(
                    "job {} is awaiting code review; approve it or pass force",
                    job.uid
                )));
            }
            other => {
                return Err(RdsError::InvalidUpdate(format!(
                    "job {} cannot run from status {}",
                    job.uid,
                    other.as_str()
                )));
            }
        }

        let config = self.build_job_config(&job, &options).await?;

        // Updates flow through one channel so they land in order; the
        // blocking path pushes its terminal update into the same queue.
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<JobUpdate>();
        let sink_tx = tx.clone();
        let sink: StatusSink = Arc::new(move |update| {
            let _ = sink_tx.send(update);
        });
        let updater = self.inner.ctx.clone();
        let apply_task = tokio::spawn(async move {
            while let Some(update) = rx.recv().await {
                let result: Result<Job> = updater
                    .call(&endpoint("job", rds_rpc::VERB_UPDATE), &update)
                    .await;
                if let Err(e) = result {
                    warn!(uid = %update.uid, "could not apply job update: {e}");
                }
            }
        });

        let runner = match runner_for(config.runtime.kind, default_handlers(), sink) {
            Ok(runner) => runner,
            Err(e) => {
                // The runner rejected execution outright; nothing started,
                // so the job stays approved.
                drop(tx);
                let _ = apply_task.await;
                return Err(e);
            }
        };

        let run_job = job.clone();
        let run_config = config.clone();
        let outcome =
            tokio::task::spawn_blocking(move || runner.run(&run_job, &run_config))
                .await
                .map_err(|e| RdsError::JobFailed(format!("runner panicked: {e}")))?;

        match outcome {
            Ok(rds_runner::RunOutcome::Completed {
                return_code,
                error_message,
            }) => {
                let _ = tx.send(JobUpdate::for_return_code(job.uid, return_code, error_message));
                drop(tx);
                let _ = apply_task.await;
                let job = self.get(job.uid).await?;
                Ok(RunOutcome { job, handle: None })
            }
            Ok(rds_runner::RunOutcome::Detached(handle)) => {
                // The runner's monitor thread owns the sink now; the apply
                // task drains until it drops.
                drop(tx);
                let job = self.get(job.uid).await?;
                Ok(RunOutcome {
                    job,
                    handle: Some(handle),
                })
            }
            Err(e) => {
                // The runner began the run and failed before completion
                // (bad paths, docker daemon down, image build failure);
                // record it on the job as a failed run.
                let _ = tx.send(JobUpdate::in_progress(job.uid));
                let _ = tx.send(JobUpdate::for_return_code(job.uid, 1, Some(e.to_string())));
                drop(tx);
                let _ = apply_task.await;
                Err(e)
            }
        }
    }

    async fn build_job_config(&self, job: &Job, options: &RunOptions) -> Result<JobConfig> {
        let ctx = self.ctx();

        let user_code: rds_core::UserCode = ctx
            .call(
                &endpoint("user_code", rds_rpc::VERB_GET_ONE),
                &GetOneRequest::by_uid(job.user_code_id),
            )
            .await?;
        let function_folder = ctx.host_paths.user_code_dir(&user_code.uid);

        let dataset: rds_core::Dataset = ctx
            .call(
                &endpoint("dataset", rds_rpc::VERB_GET_ONE),
                &GetOneRequest::by_name(&job.dataset_name),
            )
            .await?;
        let private_url = dataset.private_url.as_ref().ok_or_else(|| {
            RdsError::Permission(format!(
                "private data of '{}' is not accessible",
                dataset.name
            ))
        })?;
        let data_path = ctx.host_paths.resolve_url(private_url)?;

        let runtime = match job.runtime_id {
            Some(runtime_id) => {
                ctx.call(
                    &endpoint("runtime", rds_rpc::VERB_GET_ONE),
                    &GetOneRequest::by_uid(runtime_id),
                )
                .await?
            }
            // Ephemeral default when the job references no runtime.
            None => Runtime::ephemeral(ctx.email()),
        };

        let data_mount_dir = match runtime.kind {
            RuntimeKind::Docker => CONTAINER_DATA_DIR.to_string(),
            _ => data_path.display().to_string(),
        };

        Ok(JobConfig {
            function_folder,
            data_path,
            job_path: ctx.host_paths.job_dir(&job.uid),
            args: vec![user_code.entrypoint.clone()],
            runtime,
            timeout_secs: options.timeout_secs,
            extra_env: options.extra_env.clone(),
            blocking: options.blocking,
            data_mount_dir,
        })
    }

    /// Copy the finished job's artifacts into the DS-readable tree and mark
    /// the job shared.
    pub async fn share_results(&self, job: &Job) -> Result<(PathBuf, Job)> {
        let ctx = self.ctx();
        if !ctx.is_admin() {
            return Err(RdsError::Permission(format!(
                "{} must be the datasite admin to share results",
                ctx.email()
            )));
        }

        let job = self.get(job.uid).await?;
        if job.status != JobStatus::JobRunFinished {
            return Err(RdsError::InvalidUpdate(format!(
                "job {} is {}, only finished jobs can be shared",
                job.uid,
                job.status.as_str()
            )));
        }

        let job_dir = ctx.host_paths.job_dir(&job.uid);
        let shared_dir = ctx.host_paths.job_output_dir(&job.uid);
        for sub in ["output", "logs"] {
            let src = job_dir.join(sub);
            if src.exists() {
                copy_into(&src, &shared_dir.join(sub))?;
            }
        }

        let output_url = ctx.host_paths.job_output_url(&job.uid);
        let update = JobUpdate {
            status: Some(JobStatus::Shared),
            output_url: Some(output_url),
            ..JobUpdate::new(job.uid)
        };
        let job = self.update(&update).await?;
        info!(uid = %job.uid, path = %shared_dir.display(), "job results shared");
        Ok((shared_dir, job))
    }

    /// Resolve the shared artifact tree of a job. Set only once shared.
    pub fn output_path(&self, job: &Job) -> Result<PathBuf> {
        let output_url = job.output_url.as_ref().ok_or_else(|| {
            RdsError::NotFound(format!("job {} has no shared output", job.uid))
        })?;
        self.ctx().host_paths.resolve_url(output_url)
    }

    /// Read both captured streams. The owner reads the runner's working
    /// tree; everyone else reads the shared copy once it exists.
    pub async fn get_logs(&self, job: &Job) -> Result<(String, String)> {
        let ctx = self.ctx();
        let logs_dir = if ctx.is_admin() {
            ctx.host_paths.job_dir(&job.uid).join("logs")
        } else {
            self.output_path(job)?.join("logs")
        };
        if !logs_dir.is_dir() {
            return Err(RdsError::NotFound(format!(
                "logs for job {} are not ready",
                job.uid
            )));
        }
        let read = |name: &str| -> Result<String> {
            match std::fs::read_to_string(logs_dir.join(name)) {
                Ok(contents) => Ok(contents),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
                Err(e) => Err(e.into()),
            }
        };
        Ok((read("stdout.log")?, read("stderr.log")?))
    }
}
