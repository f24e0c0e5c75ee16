pub mod custom_function;
pub mod dataset;
pub mod health;
pub mod job;
pub mod runtime;
pub mod user_code;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use rds_core::store::{GetAllQuery, StoreItem, YamlStore};
use rds_core::models::GetOneRequest;
use rds_core::{RdsError, Result};
use rds_rpc::{EndpointRegistry, RpcRequest};

use crate::app::RdsApp;

pub fn register_all(registry: &mut EndpointRegistry, app: Arc<RdsApp>) {
    health::register(registry, app.clone());
    dataset::register(registry, app.clone());
    runtime::register(registry, app.clone());
    job::register(registry, app.clone());
    user_code::register(registry, app.clone());
    custom_function::register(registry, app);
}

/// Decode a request body into the endpoint's expected shape.
pub(crate) fn parse_body<T: DeserializeOwned>(request: &RpcRequest) -> Result<T> {
    serde_json::from_value(request.body.clone())
        .map_err(|e| RdsError::Validation(format!("bad request body: {e}")))
}

/// Decode an update body. A body that does not fit the endpoint kind's
/// update shape is an invalid update, not a validation error.
pub(crate) fn parse_update<T: DeserializeOwned>(request: &RpcRequest) -> Result<T> {
    serde_json::from_value(request.body.clone())
        .map_err(|e| RdsError::InvalidUpdate(format!("update does not fit this kind: {e}")))
}

/// Shared `get_one` semantics: by uid, by name, or by filters; zero matches
/// is `NotFound`, with multiple matches the newest wins.
pub(crate) async fn get_one_from<T: StoreItem>(
    store: &YamlStore<T>,
    mut request: GetOneRequest,
) -> Result<T> {
    if let Some(uid) = request.uid {
        return store
            .get_by_uid(&uid)
            .await?
            .ok_or_else(|| RdsError::NotFound(format!("no {} found for uid {uid}", T::kind())));
    }
    if let Some(name) = request.name.take() {
        request
            .filters
            .insert("name".to_string(), Value::String(name));
    }
    let query = GetAllQuery {
        limit: Some(1),
        order_by: Some("created_at".to_string()),
        filters: request.filters,
        ..Default::default()
    };
    store
        .get_all(&query)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| RdsError::NotFound(format!("no {} found matching request", T::kind())))
}

pub(crate) fn to_body<T: serde::Serialize>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}
