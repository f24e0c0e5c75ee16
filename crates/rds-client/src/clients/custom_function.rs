use std::path::{Path, PathBuf};
use std::sync::Arc;

use uuid::Uuid;

use rds_core::bundle;
use rds_core::models::{CustomFunction, CustomFunctionCreate, GetOneRequest};
use rds_core::store::GetAllQuery;
use rds_core::{RdsError, Result};

use crate::clients::{FetchMode, KindClient};
use crate::ClientCtx;

pub struct CustomFunctionClient {
    inner: KindClient<CustomFunction>,
}

impl CustomFunctionClient {
    pub(crate) fn new(ctx: Arc<ClientCtx>) -> Self {
        Self {
            inner: KindClient::new(ctx),
        }
    }

    fn ctx(&self) -> &ClientCtx {
        &self.inner.ctx
    }

    /// Bundle a function folder with its readme and register it.
    pub async fn create(
        &self,
        code_path: &Path,
        entrypoint: &str,
        readme_filename: &str,
    ) -> Result<CustomFunction> {
        if !code_path.join(entrypoint).exists() {
            return Err(RdsError::NotFound(format!(
                "entrypoint '{entrypoint}' not found in {}",
                code_path.display()
            )));
        }
        if !code_path.join(readme_filename).exists() {
            return Err(RdsError::NotFound(format!(
                "readme '{readme_filename}' not found in {}",
                code_path.display()
            )));
        }

        let bytes = bundle::pack_dir(code_path, &[])?;
        let create = CustomFunctionCreate {
            name: None,
            description: None,
            tags: Vec::new(),
            entrypoint: entrypoint.to_string(),
            readme_filename: readme_filename.to_string(),
            files_zipped: Some(bytes.clone()),
        };
        let function = self.inner.create(&create).await?;

        let local_dir = self.local_dir(&function);
        if !local_dir.exists() {
            bundle::unpack(&bytes, &local_dir)?;
        }
        Ok(function)
    }

    pub async fn get(&self, uid: Uuid) -> Result<CustomFunction> {
        self.inner.get(GetOneRequest::by_uid(uid), FetchMode::Rpc).await
    }

    pub async fn get_all(&self) -> Result<Vec<CustomFunction>> {
        self.inner.get_all(&GetAllQuery::default(), FetchMode::Rpc).await
    }

    pub async fn delete(&self, uid: Uuid) -> Result<bool> {
        self.inner.delete(uid).await
    }

    pub fn local_dir(&self, function: &CustomFunction) -> PathBuf {
        self.ctx().host_paths.custom_function_dir(&function.uid)
    }

    /// The readme contents from the local extraction.
    pub fn readme(&self, function: &CustomFunction) -> Result<String> {
        let path = self.local_dir(function).join(&function.readme_filename);
        Ok(std::fs::read_to_string(path)?)
    }
}
