use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use rds_core::bundle;
use rds_core::models::{
    CustomFunction, CustomFunctionCreate, CustomFunctionUpdate, DeleteRequest, GetOneRequest,
};
use rds_core::store::{GetAllQuery, StoreItem};
use rds_core::Result;
use rds_rpc::{
    endpoint, EndpointRegistry, RpcRequest, VERB_CREATE, VERB_DELETE, VERB_GET_ALL, VERB_GET_ONE,
    VERB_UPDATE,
};

use crate::app::RdsApp;
use crate::handlers::{get_one_from, parse_body, parse_update, to_body};
use crate::policy::require_admin;

pub fn register(registry: &mut EndpointRegistry, app: Arc<RdsApp>) {
    let kind = CustomFunction::kind();

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

async fn create(app: Arc<RdsApp>, request: RpcRequest) -> Result<Value> {
    let create: CustomFunctionCreate = parse_body(&request)?;
    let mut function = create.into_custom_function(&request.sender_email);

    if let Some(files_zipped) = function.files_zipped.take() {
        let dest = app.paths.custom_function_dir(&function.uid);
        bundle::unpack(&files_zipped, &dest)?;
        info!(uid = %function.uid, "custom function extracted");
    }

    to_body(&app.custom_functions.create(&function).await?)
}

async fn get_one(app: Arc<RdsApp>, request: RpcRequest) -> Result<Value> {
    let query: GetOneRequest = parse_body(&request)?;
    to_body(&get_one_from(&app.custom_functions, query).await?)
}

async fn get_all(app: Arc<RdsApp>, request: RpcRequest) -> Result<Value> {
    let query: GetAllQuery = parse_body(&request)?;
    to_body(&app.custom_functions.get_all(&query).await?)
}

async fn update(app: Arc<RdsApp>, request: RpcRequest) -> Result<Value> {
    require_admin(&request, app.owner_email(), "update custom functions")?;
    let update: CustomFunctionUpdate = parse_update(&request)?;
    to_body(&app.custom_functions.update(update.uid, &update).await?)
}

async fn delete(app: Arc<RdsApp>, request: RpcRequest) -> Result<Value> {
    require_admin(&request, app.owner_email(), "delete custom functions")?;
    let DeleteRequest { uid } = parse_body(&request)?;
    let deleted = app.custom_functions.delete(&uid).await?;
    if deleted {
        let _ = tokio::fs::remove_dir_all(app.paths.custom_function_dir(&uid)).await;
    }
    to_body(&deleted)
}
