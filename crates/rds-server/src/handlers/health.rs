use std::sync::Arc;

use serde_json::Value;

use rds_core::models::HealthResponse;
use rds_core::{Result, APP_NAME};
use rds_rpc::{EndpointRegistry, RpcRequest, HEALTH_ENDPOINT};

use crate::app::RdsApp;

pub fn register(registry: &mut EndpointRegistry, _app: Arc<RdsApp>) {
    registry.register(HEALTH_ENDPOINT, handle);
}

async fn handle(_request: RpcRequest) -> Result<Value> {
    Ok(serde_json::to_value(HealthResponse {
        app_name: APP_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })?)
}
