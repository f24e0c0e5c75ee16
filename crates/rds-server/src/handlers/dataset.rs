use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use rds_core::models::{Dataset, DatasetCreate, DatasetUpdate, DeleteRequest, GetOneRequest};
use rds_core::store::{GetAllQuery, StoreItem};
use rds_core::{RdsError, Result};
use rds_rpc::{
    endpoint, EndpointRegistry, RpcRequest, VERB_CREATE, VERB_DELETE, VERB_GET_ALL, VERB_GET_ONE,
    VERB_UPDATE,
};

use crate::app::RdsApp;
use crate::handlers::{get_one_from, parse_body, parse_update, to_body};
use crate::policy::{require_admin, role_for, Role};

pub fn register(registry: &mut EndpointRegistry, app: Arc<RdsApp>) {
    let kind = Dataset::kind();

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
    registry.register(endpoint(kind, VERB_DELETE), move |req| {
        delete(app.clone(), req)
    });
}

/// Guests may see dataset records, but never the private location.
fn redact_for(dataset: Dataset, role: Role) -> Dataset {
    match role {
        Role::Admin => dataset,
        Role::Guest => dataset.redacted(),
    }
}

async fn create(app: Arc<RdsApp>, request: RpcRequest) -> Result<Value> {
    require_admin(&request, app.owner_email(), "create datasets")?;
    let create: DatasetCreate = parse_body(&request)?;

    let existing = get_one_from(&app.datasets, GetOneRequest::by_name(&create.name)).await;
    if existing.is_ok() {
        return Err(RdsError::AlreadyExists(format!("dataset '{}'", create.name)));
    }

    let dataset = create.into_dataset(&request.sender_email);
    let dataset = app.datasets.create(&dataset).await?;
    info!(name = dataset.name, uid = %dataset.uid, "dataset created");
    to_body(&dataset)
}

async fn get_one(app: Arc<RdsApp>, request: RpcRequest) -> Result<Value> {
    let role = role_for(&request.sender_email, app.owner_email());
    let query: GetOneRequest = parse_body(&request)?;
    let dataset = get_one_from(&app.datasets, query).await?;
    to_body(&redact_for(dataset, role))
}

async fn get_all(app: Arc<RdsApp>, request: RpcRequest) -> Result<Value> {
    let role = role_for(&request.sender_email, app.owner_email());
    let query: GetAllQuery = parse_body(&request)?;
    let datasets: Vec<Dataset> = app
        .datasets
        .get_all(&query)
        .await?
        .into_iter()
        .map(|dataset| redact_for(dataset, role))
        .collect();
    to_body(&datasets)
}

async fn update(app: Arc<RdsApp>, request: RpcRequest) -> Result<Value> {
    require_admin(&request, app.owner_email(), "update datasets")?;
    let update: DatasetUpdate = parse_update(&request)?;
    let dataset = app.datasets.update(update.uid, &update).await?;
    to_body(&dataset)
}

/// Deleting a dataset removes the record and both content trees.
async fn delete(app: Arc<RdsApp>, request: RpcRequest) -> Result<Value> {
    require_admin(&request, app.owner_email(), "delete datasets")?;
    let DeleteRequest { uid } = parse_body(&request)?;

    let Some(dataset) = app.datasets.get_by_uid(&uid).await? else {
        return to_body(&false);
    };

    remove_tree(&app, &dataset.mock_url).await;
    if let Some(private_url) = &dataset.private_url {
        remove_tree(&app, private_url).await;
    }

    let deleted = app.datasets.delete(&uid).await?;
    info!(name = dataset.name, %uid, "dataset deleted");
    to_body(&deleted)
}

async fn remove_tree(app: &RdsApp, url: &str) {
    match app.paths.resolve_url(url) {
        Ok(path) => {
            if let Err(e) = tokio::fs::remove_dir_all(&path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), "could not remove dataset tree: {e}");
                }
            }
        }
        Err(e) => warn!(url, "unresolvable dataset url: {e}"),
    }
}
