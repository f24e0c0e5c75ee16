use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use rds_core::{RdsError, Result};

use crate::protocol::{RpcRequest, RpcResponse};

pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Value>> + Send>>;
pub type EndpointHandler = Arc<dyn Fn(RpcRequest) -> HandlerFuture + Send + Sync>;

/// Maps endpoint names to handlers. Built once at startup by the server app
/// and shared by both transports: the file watcher and the in-process mock.
#[derive(Default)]
pub struct EndpointRegistry {
    handlers: HashMap<String, EndpointHandler>,
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F, Fut>(&mut self, endpoint: impl Into<String>, handler: F)
    where
        F: Fn(RpcRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let endpoint = endpoint.into();
        debug!(endpoint, "registered endpoint");
        self.handlers
            .insert(endpoint, Arc::new(move |req| Box::pin(handler(req))));
    }

    pub fn endpoints(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    /// Dispatch a request to its handler and fold the outcome into a
    /// response. Handler errors become wire errors, never panics upward.
    pub async fn dispatch(&self, request: RpcRequest) -> RpcResponse {
        let uid = request.uid;
        let endpoint = request.endpoint.clone();
        let sender = request.sender_email.clone();

        let Some(handler) = self.handlers.get(&endpoint) else {
            warn!(endpoint, "request for unknown endpoint");
            return RpcResponse::err(uid, &RdsError::NotFound(format!("endpoint {endpoint}")));
        };

        debug!(%uid, endpoint, sender, "dispatching request");
        match handler(request).await {
            Ok(body) => RpcResponse::ok(uid, body),
            Err(e) => {
                debug!(%uid, endpoint, "handler error: {e}");
                RpcResponse::err(uid, &e)
            }
        }
    }
}
