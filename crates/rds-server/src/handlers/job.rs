use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use rds_core::models::{
    DeleteAllRequest, DeleteAllResponse, GetOneRequest, Job, JobCreate, JobDeleteRequest,
    JobUpdate,
};
use rds_core::store::{GetAllQuery, StoreItem};
use rds_core::{RdsError, Result};
use rds_rpc::{
    endpoint, EndpointRegistry, RpcRequest, VERB_CREATE, VERB_DELETE, VERB_DELETE_ALL,
    VERB_GET_ALL, VERB_GET_ONE, VERB_UPDATE,
};

use crate::app::RdsApp;
use crate::handlers::{get_one_from, parse_body, parse_update, to_body};
use crate::policy::{require_admin, role_for, Role};

pub fn register(registry: &mut EndpointRegistry, app: Arc<RdsApp>) {
    let kind = Job::kind();

    let create_app = app.clone();
    registry.register(endpoint(kind, VERB_CREATE), move |req| {
        create(create_app.clone(), req)
    });
    let get_one_app = app.clone();
    registry.register(endpoint(kind, VERB_GET_ONE), move |req| {
        get_one(get_one_app.clone(), req)
    });
    let get_all_app = app.clone();
    registry.register(endpoint(kind, VERB_GET_ALL), move |req| {
        get_all(get_all_app.clone(), req)
    });
    let update_app = app.clone();
    registry.register(endpoint(kind, VERB_UPDATE), move |req| {
        update(update_app.clone(), req)
    });
    let delete_app = app.clone();
    registry.register(endpoint(kind, VERB_DELETE), move |req| {
        delete(delete_app.clone(), req)
    });
    registry.register(endpoint(kind, VERB_DELETE_ALL), move |req| {
        delete_all(app.clone(), req)
    });
}

/// Job creation is open to guests; a referenced runtime must exist.
async fn create(app: Arc<RdsApp>, request: RpcRequest) -> Result<Value> {
    let create: JobCreate = parse_body(&request)?;

    if let Some(runtime_id) = create.runtime_id {
        if app.runtimes.get_by_uid(&runtime_id).await?.is_none() {
            return Err(RdsError::NotFound(format!("runtime {runtime_id}")));
        }
    }

    let job = create.into_job(&request.sender_email);
    let job = app.jobs.create(&job).await?;
    info!(uid = %job.uid, dataset = job.dataset_name, by = job.created_by, "job submitted");
    to_body(&job)
}

/// Reads are restricted to the creator and the admin.
async fn get_one(app: Arc<RdsApp>, request: RpcRequest) -> Result<Value> {
    let query: GetOneRequest = parse_body(&request)?;
    let job = get_one_from(&app.jobs, query).await?;
    if role_for(&request.sender_email, app.owner_email()) != Role::Admin
        && job.created_by != request.sender_email
    {
        return Err(RdsError::NotFound(format!("no job found for uid {}", job.uid)));
    }
    to_body(&job)
}

async fn get_all(app: Arc<RdsApp>, request: RpcRequest) -> Result<Value> {
    let mut query: GetAllQuery = parse_body(&request)?;
    if role_for(&request.sender_email, app.owner_email()) != Role::Admin {
        query.filters.insert(
            "created_by".to_string(),
            Value::String(request.sender_email.clone()),
        );
    }
    to_body(&app.jobs.get_all(&query).await?)
}

/// Execution fields (status, output, error, return code) are admin-only;
/// a status change must follow the lifecycle.
async fn update(app: Arc<RdsApp>, request: RpcRequest) -> Result<Value> {
    let update: JobUpdate = parse_update(&request)?;
    let job = app
        .jobs
        .get_by_uid(&update.uid)
        .await?
        .ok_or_else(|| RdsError::NotFound(format!("job {}", update.uid)))?;

    let touches_execution = update.status.is_some()
        || update.output_url.is_some()
        || update.error_message.is_some()
        || update.return_code.is_some();
    if touches_execution {
        require_admin(&request, app.owner_email(), "mutate job status")?;
    } else if role_for(&request.sender_email, app.owner_email()) != Role::Admin
        && job.created_by != request.sender_email
    {
        return Err(RdsError::Permission(format!(
            "{} may not update this job",
            request.sender_email
        )));
    }

    if let Some(next) = update.status {
        if next != job.status && !job.status.can_transition_to(next) {
            return Err(RdsError::InvalidUpdate(format!(
                "job {} cannot transition from {} to {}",
                job.uid,
                job.status.as_str(),
                next.as_str()
            )));
        }
    }

    let updated = app.jobs.update(update.uid, &update).await?;
    if let Some(status) = update.status {
        info!(uid = %updated.uid, status = status.as_str(), "job status changed");
    }
    to_body(&updated)
}

async fn delete(app: Arc<RdsApp>, request: RpcRequest) -> Result<Value> {
    require_admin(&request, app.owner_email(), "delete jobs")?;
    let params: JobDeleteRequest = parse_body(&request)?;
    to_body(&delete_job(&app, params.uid, params.delete_orphaned_usercode).await?)
}

async fn delete_all(app: Arc<RdsApp>, request: RpcRequest) -> Result<Value> {
    require_admin(&request, app.owner_email(), "delete jobs")?;
    let params: DeleteAllRequest = parse_body(&request)?;

    let query = GetAllQuery {
        filters: params.filters,
        ..Default::default()
    };
    let mut deleted = 0;
    for job in app.jobs.get_all(&query).await? {
        if delete_job(&app, job.uid, false).await? {
            deleted += 1;
        }
    }
    to_body(&DeleteAllResponse { deleted })
}

async fn delete_job(app: &RdsApp, uid: Uuid, delete_orphaned_usercode: bool) -> Result<bool> {
    let Some(job) = app.jobs.get_by_uid(&uid).await? else {
        return Ok(false);
    };

    if delete_orphaned_usercode {
        let mut filters = HashMap::new();
        filters.insert(
            "user_code_id".to_string(),
            Value::String(job.user_code_id.to_string()),
        );
        let references = app
            .jobs
            .get_all(&GetAllQuery {
                filters,
                ..Default::default()
            })
            .await?
            .len();
        // This job is still in the count; anything above one means shared.
        if references <= 1 {
            delete_user_code(app, &job.user_code_id).await?;
        }
    }

    let deleted = app.jobs.delete(&uid).await?;

    // Artifact trees go best-effort; a failed cleanup must not resurrect
    // the record.
    remove_dir_logged(app.paths.job_dir(&uid)).await;
    remove_dir_logged(app.paths.job_output_dir(&uid)).await;

    info!(%uid, "job deleted");
    Ok(deleted)
}

async fn delete_user_code(app: &RdsApp, uid: &Uuid) -> Result<()> {
    if app.user_code.delete(uid).await? {
        info!(%uid, "orphaned user code deleted");
    }
    remove_dir_logged(app.paths.user_code_dir(uid)).await;
    Ok(())
}

async fn remove_dir_logged(path: std::path::PathBuf) {
    if let Err(e) = tokio::fs::remove_dir_all(&path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), "could not remove directory: {e}");
        }
    }
}
