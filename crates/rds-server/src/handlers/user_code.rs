use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use rds_core::bundle;
use rds_core::models::{DeleteRequest, GetOneRequest, UserCode, UserCodeCreate, UserCodeUpdate};
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
    let kind = UserCode::kind();

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

/// Open to guests: this is how a DS ships code. The bundle is extracted
/// next to the store and stripped from the persisted record.
async fn create(app: Arc<RdsApp>, request: RpcRequest) -> Result<Value> {
    let create: UserCodeCreate = parse_body(&request)?;
    let mut user_code = create.into_user_code(&request.sender_email);

    if let Some(files_zipped) = user_code.files_zipped.take() {
        let dest = app.paths.user_code_dir(&user_code.uid);
        bundle::unpack(&files_zipped, &dest)?;
        info!(uid = %user_code.uid, dest = %dest.display(), "user code extracted");
    }

    let user_code = app.user_code.create(&user_code).await?;
    to_body(&user_code)
}

async fn get_one(app: Arc<RdsApp>, request: RpcRequest) -> Result<Value> {
    let query: GetOneRequest = parse_body(&request)?;
    to_body(&get_one_from(&app.user_code, query).await?)
}

async fn get_all(app: Arc<RdsApp>, request: RpcRequest) -> Result<Value> {
    let query: GetAllQuery = parse_body(&request)?;
    to_body(&app.user_code.get_all(&query).await?)
}

async fn update(app: Arc<RdsApp>, request: RpcRequest) -> Result<Value> {
    require_admin(&request, app.owner_email(), "update user code")?;
    let update: UserCodeUpdate = parse_update(&request)?;
    to_body(&app.user_code.update(update.uid, &update).await?)
}

async fn delete(app: Arc<RdsApp>, request: RpcRequest) -> Result<Value> {
    require_admin(&request, app.owner_email(), "delete user code")?;
    let DeleteRequest { uid } = parse_body(&request)?;
    let deleted = app.user_code.delete(&uid).await?;
    if deleted {
        let _ = tokio::fs::remove_dir_all(app.paths.user_code_dir(&uid)).await;
    }
    to_body(&deleted)
}
