use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use rds_core::Result;

use crate::protocol::RpcRequest;
use crate::registry::EndpointRegistry;

pub const DEFAULT_EXPIRY: Duration = Duration::from_secs(30);

/// A synchronous request/response channel to one datasite's RDS server.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn call(&self, endpoint: &str, body: Value) -> Result<Value>;

    fn sender_email(&self) -> &str;
}

/// Typed convenience wrapper over [`RpcTransport::call`].
pub async fn call_typed<Req, Res>(
    transport: &dyn RpcTransport,
    endpoint: &str,
    request: &Req,
) -> Result<Res>
where
    Req: Serialize + Sync,
    Res: DeserializeOwned,
{
    let body = serde_json::to_value(request)?;
    let response = transport.call(endpoint, body).await?;
    Ok(serde_json::from_value(response)?)
}

/// In-process transport: dispatches straight into the endpoint registry.
/// Used for tests and for clients co-located with the server.
pub struct MockTransport {
    registry: Arc<EndpointRegistry>,
    sender_email: String,
    expiry: Duration,
}

impl MockTransport {
    pub fn new(registry: Arc<EndpointRegistry>, sender_email: impl Into<String>) -> Self {
        Self {
            registry,
            sender_email: sender_email.into(),
            expiry: DEFAULT_EXPIRY,
        }
    }
}

#[async_trait]
impl RpcTransport for MockTransport {
    async fn call(&self, endpoint: &str, body: Value) -> Result<Value> {
        let now = Utc::now();
        let request = RpcRequest {
            uid: Uuid::new_v4(),
            endpoint: endpoint.to_string(),
            body,
            sender_email: self.sender_email.clone(),
            sent_at: now,
            expires_at: now + chrono::Duration::from_std(self.expiry).expect("expiry fits"),
        };
        self.registry.dispatch(request).await.into_result()
    }

    fn sender_email(&self) -> &str {
        &self.sender_email
    }
}
