//! Client facade for the RDS control plane.
//!
//! One `RdsClient` represents one party (DO or DS) talking to one host
//! datasite. Each entity kind gets a typed sub-client; job lifecycle verbs
//! (`submit`, `approve`, `run_private`, `share_results`) live on the job
//! sub-client. Reads can bypass RPC with [`FetchMode::Local`], which loads
//! the synced store snapshot directly.

pub mod clients;
pub mod local_store;

use std::sync::Arc;

use rds_core::models::HealthResponse;
use rds_core::{DatasiteConfig, DatasitePaths, Result};
use rds_rpc::{
    call_typed, EndpointRegistry, FileTransport, MockTransport, RpcTransport, HEALTH_ENDPOINT,
};

pub use clients::job::{RunOptions, RunOutcome, SubmitParams};
pub use clients::{
    custom_function::CustomFunctionClient, dataset::DatasetClient, dataset::DatasetCreateParams,
    job::JobClient, runtime::RuntimeClient, user_code::UserCodeClient, FetchMode,
};

/// Shared per-session state: identity, workspace layout, transport.
pub struct ClientCtx {
    /// Email of the datasite this client talks to (the DO).
    pub host: String,
    /// This party's own datasite identity.
    pub config: DatasiteConfig,
    /// Layout of the host's datasite inside this party's workspace.
    pub host_paths: DatasitePaths,
    pub transport: Arc<dyn RpcTransport>,
}

impl ClientCtx {
    pub fn email(&self) -> &str {
        &self.config.email
    }

    pub fn is_admin(&self) -> bool {
        self.config.email == self.host
    }

    pub async fn call<Req, Res>(&self, endpoint: &str, request: &Req) -> Result<Res>
    where
        Req: serde::Serialize + Sync,
        Res: serde::de::DeserializeOwned,
    {
        call_typed(self.transport.as_ref(), endpoint, request).await
    }
}

#[derive(Clone)]
pub struct RdsClient {
    ctx: Arc<ClientCtx>,
}

impl RdsClient {
    pub fn email(&self) -> &str {
        self.ctx.email()
    }

    pub fn host(&self) -> &str {
        &self.ctx.host
    }

    pub fn is_admin(&self) -> bool {
        self.ctx.is_admin()
    }

    pub fn config(&self) -> &DatasiteConfig {
        &self.ctx.config
    }

    pub fn dataset(&self) -> DatasetClient {
        DatasetClient::new(self.ctx.clone())
    }

    pub fn runtime(&self) -> RuntimeClient {
        RuntimeClient::new(self.ctx.clone())
    }

    pub fn job(&self) -> JobClient {
        JobClient::new(self.ctx.clone())
    }

    pub fn user_code(&self) -> UserCodeClient {
        UserCodeClient::new(self.ctx.clone())
    }

    pub fn custom_function(&self) -> CustomFunctionClient {
        CustomFunctionClient::new(self.ctx.clone())
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        self.ctx.call(HEALTH_ENDPOINT, &serde_json::json!({})).await
    }
}

/// Open a session against `host` over the file-backed transport.
pub fn init_session(host: &str, config: DatasiteConfig) -> RdsClient {
    let host_paths = config.paths_for(host);
    let transport = Arc::new(FileTransport::new(host_paths.clone(), config.email.clone()));
    from_transport(host, config, host_paths, transport)
}

/// Open a session that dispatches in-process into a server registry. Used
/// in tests and by co-located clients.
pub fn init_mock_session(
    host: &str,
    config: DatasiteConfig,
    registry: Arc<EndpointRegistry>,
) -> RdsClient {
    let host_paths = config.paths_for(host);
    let transport = Arc::new(MockTransport::new(registry, config.email.clone()));
    from_transport(host, config, host_paths, transport)
}

fn from_transport(
    host: &str,
    config: DatasiteConfig,
    host_paths: DatasitePaths,
    transport: Arc<dyn RpcTransport>,
) -> RdsClient {
    RdsClient {
        ctx: Arc::new(ClientCtx {
            host: host.to_string(),
            config,
            host_paths,
            transport,
        }),
    }
}
