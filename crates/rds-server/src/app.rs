use std::sync::Arc;

use tracing::info;

use rds_core::models::{CustomFunction, Dataset, Job, Runtime, UserCode};
use rds_core::store::StoreItem;
use rds_core::{DatasiteConfig, DatasitePaths, Result, YamlStore};
use rds_rpc::{EndpointRegistry, RpcServer};

use crate::handlers;

/// The DO-side control plane: one typed store per entity kind plus the
/// endpoint registry both transports dispatch into.
pub struct RdsApp {
    pub config: DatasiteConfig,
    pub paths: DatasitePaths,
    pub datasets: YamlStore<Dataset>,
    pub runtimes: YamlStore<Runtime>,
    pub jobs: YamlStore<Job>,
    pub user_code: YamlStore<UserCode>,
    pub custom_functions: YamlStore<CustomFunction>,
}

impl RdsApp {
    pub fn new(config: DatasiteConfig) -> Arc<Self> {
        let paths = config.paths();
        Arc::new(Self {
            datasets: YamlStore::new(paths.store_dir(Dataset::kind())),
            runtimes: YamlStore::new(paths.store_dir(Runtime::kind())),
            jobs: YamlStore::new(paths.store_dir(Job::kind())),
            user_code: YamlStore::new(paths.store_dir(UserCode::kind())),
            custom_functions: YamlStore::new(paths.store_dir(CustomFunction::kind())),
            paths,
            config,
        })
    }

    pub fn owner_email(&self) -> &str {
        &self.config.email
    }
}

/// Wire every endpoint. The registry is shared by the mailbox watcher and
/// by in-process mock transports.
pub fn create_app(config: DatasiteConfig) -> (Arc<RdsApp>, Arc<EndpointRegistry>) {
    let app = RdsApp::new(config);
    let mut registry = EndpointRegistry::new();
    handlers::register_all(&mut registry, app.clone());
    (app, Arc::new(registry))
}

/// Run the file-backed RPC server until shutdown.
pub async fn serve(config: DatasiteConfig) -> Result<()> {
    let (app, registry) = create_app(config);
    info!(owner = app.owner_email(), "starting rds server");
    let server = RpcServer::new(registry, app.paths.clone());
    server.run().await
}
