use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use rds_core::models::{Dataset, DatasetCreate, DatasetUpdate, GetOneRequest};
use rds_core::store::GetAllQuery;
use rds_core::{RdsError, Result};

use crate::clients::{FetchMode, KindClient};
use crate::local_store::{copy_into, dataset::infer_schema, remove_tree};
use crate::ClientCtx;

/// Parameters for publishing a dataset. Both source paths stay untouched;
/// their contents are copied into the datasite layout.
#[derive(Debug, Clone)]
pub struct DatasetCreateParams {
    pub name: String,
    /// Real contents; lands outside the synced tree.
    pub private_path: PathBuf,
    /// Redacted contents; lands in the public synced tree.
    pub mock_path: PathBuf,
    pub summary: Option<String>,
    pub description_path: Option<PathBuf>,
    pub tags: Vec<String>,
    pub runtime_id: Option<Uuid>,
}

pub struct DatasetClient {
    inner: KindClient<Dataset>,
}

impl DatasetClient {
    pub(crate) fn new(ctx: Arc<ClientCtx>) -> Self {
        Self {
            inner: KindClient::new(ctx),
        }
    }

    fn ctx(&self) -> &ClientCtx {
        &self.inner.ctx
    }

    /// Publish a dataset: place both trees, derive the schema, register the
    /// record. Admin only; file placement happens on the owner's machine
    /// before the record exists, and is rolled back if registration fails.
    pub async fn create(&self, params: DatasetCreateParams) -> Result<Dataset> {
        let ctx = self.ctx();
        if !ctx.is_admin() {
            return Err(RdsError::Permission(format!(
                "{} must be the datasite admin to create datasets",
                ctx.email()
            )));
        }
        if !params.private_path.exists() {
            return Err(RdsError::Validation(format!(
                "private path {} does not exist",
                params.private_path.display()
            )));
        }
        if !params.mock_path.exists() {
            return Err(RdsError::Validation(format!(
                "mock path {} does not exist",
                params.mock_path.display()
            )));
        }

        let mock_dir = ctx.host_paths.mock_dataset_dir(&params.name);
        let private_dir = ctx.host_paths.private_dataset_dir(&params.name);
        if mock_dir.exists() || private_dir.exists() {
            return Err(RdsError::AlreadyExists(format!("dataset '{}'", params.name)));
        }

        copy_into(&params.mock_path, &mock_dir)?;
        copy_into(&params.private_path, &private_dir)?;

        let readme_filename = match &params.description_path {
            Some(readme) => {
                copy_into(readme, &mock_dir)?;
                readme
                    .file_name()
                    .map(|name| name.to_string_lossy().to_string())
            }
            None => None,
        };

        let create = DatasetCreate {
            name: params.name.clone(),
            description: None,
            tags: params.tags,
            summary: params.summary,
            mock_url: ctx.host_paths.mock_dataset_url(&params.name),
            private_url: ctx.host_paths.private_dataset_url(&params.name),
            schema: infer_schema(&mock_dir)?,
            readme_filename,
            runtime_id: params.runtime_id,
        };

        match self.inner.create(&create).await {
            Ok(dataset) => {
                info!(name = dataset.name, "dataset published");
                Ok(dataset)
            }
            Err(e) => {
                let _ = remove_tree(&mock_dir);
                let _ = remove_tree(&private_dir);
                Err(e)
            }
        }
    }

    pub async fn get(&self, request: GetOneRequest) -> Result<Dataset> {
        self.inner.get(request, FetchMode::Rpc).await
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Dataset> {
        self.get(GetOneRequest::by_name(name)).await
    }

    pub async fn get_with_mode(&self, request: GetOneRequest, mode: FetchMode) -> Result<Dataset> {
        self.inner.get(request, mode).await
    }

    pub async fn get_all(&self) -> Result<Vec<Dataset>> {
        self.inner.get_all(&GetAllQuery::default(), FetchMode::Rpc).await
    }

    pub async fn get_all_with(&self, query: &GetAllQuery, mode: FetchMode) -> Result<Vec<Dataset>> {
        self.inner.get_all(query, mode).await
    }

    pub async fn update(&self, update: &DatasetUpdate) -> Result<Dataset> {
        self.inner.update(update).await
    }

    pub async fn delete(&self, name: &str) -> Result<bool> {
        let dataset = self.get_by_name(name).await?;
        self.inner.delete(dataset.uid).await
    }

    /// Resolve the synced mock tree of a dataset.
    pub fn mock_path(&self, dataset: &Dataset) -> Result<PathBuf> {
        self.ctx().host_paths.resolve_url(&dataset.mock_url)
    }

    /// Resolve the private tree. Admin only, even when the record itself is
    /// visible to the caller.
    pub fn private_path(&self, dataset: &Dataset) -> Result<PathBuf> {
        let ctx = self.ctx();
        if !ctx.is_admin() {
            return Err(RdsError::Permission(format!(
                "{} may not access private data of '{}'",
                ctx.email(),
                dataset.name
            )));
        }
        let private_url = dataset.private_url.as_ref().ok_or_else(|| {
            RdsError::NotFound(format!("dataset '{}' has no private url", dataset.name))
        })?;
        ctx.host_paths.resolve_url(private_url)
    }

    pub async fn text_search(&self, query: &str) -> Result<Vec<Dataset>> {
        let store: rds_core::YamlStore<Dataset> =
            rds_core::YamlStore::new(self.ctx().host_paths.store_dir("dataset"));
        store.text_search(query, &["name", "summary", "description"]).await
    }
}
