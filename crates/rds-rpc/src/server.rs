use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

use rds_core::{DatasitePaths, Result};

use crate::mailbox;
use crate::protocol::RpcRequest;
use crate::registry::EndpointRegistry;

const REQUEST_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Watches the mailbox for request files and answers them.
///
/// Each request is handled on its own task; the watcher never holds locks
/// across handler I/O. Duplicate deliveries are de-duplicated by request id:
/// a request is skipped while in flight and its file is removed once the
/// response is on disk.
pub struct RpcServer {
    registry: Arc<EndpointRegistry>,
    host_paths: DatasitePaths,
    in_flight: Arc<Mutex<HashSet<Uuid>>>,
}

impl RpcServer {
    pub fn new(registry: Arc<EndpointRegistry>, host_paths: DatasitePaths) -> Self {
        Self {
            registry,
            host_paths,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Run the watcher loop forever.
    pub async fn run(self) -> Result<()> {
        info!(
            mailbox = %self.host_paths.rpc_root().display(),
            "rpc server watching mailbox"
        );
        loop {
            if let Err(e) = self.poll_once().await {
                warn!("mailbox poll failed: {e}");
            }
            sleep(REQUEST_POLL_INTERVAL).await;
        }
    }

    /// One poll pass over every endpoint directory. Exposed for tests.
    pub async fn poll_once(&self) -> Result<()> {
        for endpoint in self.registry.endpoints() {
            let endpoint_dir = self.host_paths.rpc_dir(endpoint);
            for request_path in mailbox::pending_requests(&endpoint_dir).await? {
                self.accept(request_path, endpoint_dir.clone()).await;
            }
        }
        Ok(())
    }

    async fn accept(&self, request_path: PathBuf, endpoint_dir: PathBuf) {
        let request: RpcRequest = match mailbox::read_message(&request_path).await {
            Ok(request) => request,
            Err(e) => {
                // Possibly a half-synced file; leave it for the next pass.
                debug!(path = %request_path.display(), "unreadable request: {e}");
                return;
            }
        };

        // Expired requests are dropped silently.
        if request.is_expired(Utc::now()) {
            debug!(uid = %request.uid, endpoint = request.endpoint, "dropping expired request");
            let _ = tokio::fs::remove_file(&request_path).await;
            return;
        }

        {
            let mut in_flight = self.in_flight.lock().expect("in-flight set poisoned");
            if !in_flight.insert(request.uid) {
                return;
            }
        }

        let registry = self.registry.clone();
        let in_flight = self.in_flight.clone();
        tokio::spawn(async move {
            let uid = request.uid;
            let response = registry.dispatch(request).await;
            let response_path = mailbox::response_path(&endpoint_dir, &uid);
            if let Err(e) = mailbox::write_message(&response_path, &response).await {
                warn!(%uid, "failed to write response: {e}");
            } else {
                let _ = tokio::fs::remove_file(&request_path).await;
            }
            in_flight.lock().expect("in-flight set poisoned").remove(&uid);
        });
    }
}
