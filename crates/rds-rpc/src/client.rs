use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::fs;
use tokio::time::sleep;
use tracing::debug;
use uuid::Uuid;

use rds_core::{DatasitePaths, RdsError, Result};

use crate::mailbox;
use crate::protocol::{RpcRequest, RpcResponse};
use crate::transport::{RpcTransport, DEFAULT_EXPIRY};

const RESPONSE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// File-backed transport: drops a request file into the host datasite's
/// mailbox and polls for the correlated response until expiry.
pub struct FileTransport {
    /// Path layout of the *host* datasite (the DO's mailbox).
    host_paths: DatasitePaths,
    sender_email: String,
    expiry: Duration,
}

impl FileTransport {
    pub fn new(host_paths: DatasitePaths, sender_email: impl Into<String>) -> Self {
        Self {
            host_paths,
            sender_email: sender_email.into(),
            expiry: DEFAULT_EXPIRY,
        }
    }

    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.expiry = expiry;
        self
    }
}

#[async_trait]
impl RpcTransport for FileTransport {
    async fn call(&self, endpoint: &str, body: Value) -> Result<Value> {
        let uid = Uuid::new_v4();
        let now = Utc::now();
        let expires_at = now + chrono::Duration::from_std(self.expiry).expect("expiry fits");

        let request = RpcRequest {
            uid,
            endpoint: endpoint.to_string(),
            body,
            sender_email: self.sender_email.clone(),
            sent_at: now,
            expires_at,
        };

        let endpoint_dir = self.host_paths.rpc_dir(endpoint);
        let request_path = mailbox::request_path(&endpoint_dir, &uid);
        let response_path = mailbox::response_path(&endpoint_dir, &uid);
        mailbox::write_message(&request_path, &request).await?;
        debug!(%uid, endpoint, "request written, waiting for response");

        loop {
            if fs::try_exists(&response_path).await? {
                let response: RpcResponse = mailbox::read_message(&response_path).await?;
                let _ = fs::remove_file(&response_path).await;
                // A response that arrives after expiry is discarded, never
                // applied to state.
                if Utc::now() > expires_at {
                    return Err(RdsError::TransportTimeout(format!(
                        "{endpoint} response arrived after expiry"
                    )));
                }
                return response.into_result();
            }
            if Utc::now() > expires_at {
                let _ = fs::remove_file(&request_path).await;
                return Err(RdsError::TransportTimeout(format!(
                    "no response from {endpoint} within {:?}",
                    self.expiry
                )));
            }
            sleep(RESPONSE_POLL_INTERVAL).await;
        }
    }

    fn sender_email(&self) -> &str {
        &self.sender_email
    }
}
