use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use rds_core::models::{DeleteRequest, GetOneRequest, Runtime, RuntimeCreate, RuntimeUpdate};
use rds_core::store::{GetAllQuery, StoreItem};
use rds_core::{RdsError, Result};
use rds_rpc::{
    endpoint, EndpointRegistry, RpcRequest, VERB_CREATE, VERB_DELETE, VERB_GET_ALL, VERB_GET_ONE,
    VERB_UPDATE,
};

use crate::app::RdsApp;
use crate::handlers::{get_one_from, parse_body, parse_update, to_body};
use crate::policy::require_admin;

pub fn register(registry: &mut EndpointRegistry, app: Arc<RdsApp>) {
    let kind = Runtime::kind();

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

/// Create is idempotent on name: re-registering the same name returns the
/// stored runtime as long as the kind agrees.
async fn create(app: Arc<RdsApp>, request: RpcRequest) -> Result<Value> {
    require_admin(&request, app.owner_email(), "create runtimes")?;
    let create: RuntimeCreate = parse_body(&request)?;

    let runtime = create.into_runtime(&request.sender_email)?;
    if let Ok(existing) = get_one_from(&app.runtimes, GetOneRequest::by_name(&runtime.name)).await {
        if existing.kind != runtime.kind {
            return Err(RdsError::AlreadyExists(format!(
                "runtime '{}' already exists with kind {}",
                existing.name,
                existing.kind.as_str()
            )));
        }
        return to_body(&existing);
    }

    let runtime = app.runtimes.create(&runtime).await?;
    info!(name = runtime.name, kind = runtime.kind.as_str(), "runtime created");
    to_body(&runtime)
}

async fn get_one(app: Arc<RdsApp>, request: RpcRequest) -> Result<Value> {
    let query: GetOneRequest = parse_body(&request)?;
    let runtime = get_one_from(&app.runtimes, query).await?;
    to_body(&runtime)
}

async fn get_all(app: Arc<RdsApp>, request: RpcRequest) -> Result<Value> {
    let query: GetAllQuery = parse_body(&request)?;
    to_body(&app.runtimes.get_all(&query).await?)
}

async fn update(app: Arc<RdsApp>, request: RpcRequest) -> Result<Value> {
    require_admin(&request, app.owner_email(), "update runtimes")?;
    let update: RuntimeUpdate = parse_update(&request)?;
    let runtime = app.runtimes.update(update.uid, &update).await?;
    to_body(&runtime)
}

async fn delete(app: Arc<RdsApp>, request: RpcRequest) -> Result<Value> {
    require_admin(&request, app.owner_email(), "delete runtimes")?;
    let DeleteRequest { uid } = parse_body(&request)?;
    to_body(&app.runtimes.delete(&uid).await?)
}
