use std::path::{Path, PathBuf};
use std::sync::Arc;

use uuid::Uuid;

use rds_core::bundle::{self, DEFAULT_IGNORE_PATTERNS};
use rds_core::models::{GetOneRequest, UserCode, UserCodeCreate, UserCodeType};
use rds_core::store::GetAllQuery;
use rds_core::{RdsError, Result};

use crate::clients::{FetchMode, KindClient};
use crate::ClientCtx;

pub struct UserCodeClient {
    inner: KindClient<UserCode>,
}

impl UserCodeClient {
    pub(crate) fn new(ctx: Arc<ClientCtx>) -> Self {
        Self {
            inner: KindClient::new(ctx),
        }
    }

    fn ctx(&self) -> &ClientCtx {
        &self.inner.ctx
    }

    /// Pack a file or folder and register it. `ignore_patterns = None` uses
    /// the default set; `Some(vec![])` packs everything.
    pub async fn create(
        &self,
        code_path: &Path,
        entrypoint: Option<&str>,
        ignore_patterns: Option<Vec<String>>,
    ) -> Result<UserCode> {
        let (create, bytes) = build_create(code_path, entrypoint, ignore_patterns)?;
        let user_code = self.inner.create(&create).await?;

        // Keep a local extraction for inspection; on the owner's machine the
        // server has already placed an identical copy.
        let local_dir = self.local_dir(&user_code);
        if !local_dir.exists() {
            bundle::unpack(&bytes, &local_dir)?;
        }
        Ok(user_code)
    }

    pub async fn get(&self, uid: Uuid) -> Result<UserCode> {
        self.inner.get(GetOneRequest::by_uid(uid), FetchMode::Rpc).await
    }

    pub async fn get_with_mode(&self, uid: Uuid, mode: FetchMode) -> Result<UserCode> {
        self.inner.get(GetOneRequest::by_uid(uid), mode).await
    }

    pub async fn get_all(&self) -> Result<Vec<UserCode>> {
        self.inner.get_all(&GetAllQuery::default(), FetchMode::Rpc).await
    }

    pub async fn delete(&self, uid: Uuid) -> Result<bool> {
        self.inner.delete(uid).await
    }

    /// Where this bundle lives (or would live) on this machine.
    pub fn local_dir(&self, user_code: &UserCode) -> PathBuf {
        self.ctx().host_paths.user_code_dir(&user_code.uid)
    }
}

/// Shared packing logic for `user_code.create` and `job.submit`.
pub(crate) fn build_create(
    code_path: &Path,
    entrypoint: Option<&str>,
    ignore_patterns: Option<Vec<String>>,
) -> Result<(UserCodeCreate, Vec<u8>)> {
    if !code_path.exists() {
        return Err(RdsError::NotFound(format!(
            "code path {} does not exist",
            code_path.display()
        )));
    }

    let (code_type, entrypoint, bytes) = if code_path.is_file() {
        let file_name = code_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                RdsError::Validation(format!("bad code file name: {}", code_path.display()))
            })?
            .to_string();
        if let Some(explicit) = entrypoint {
            if explicit != file_name {
                return Err(RdsError::Validation(format!(
                    "entrypoint '{explicit}' does not match submitted file '{file_name}'"
                )));
            }
        }
        (UserCodeType::File, file_name, bundle::pack_file(code_path)?)
    } else {
        let entrypoint = entrypoint
            .ok_or_else(|| {
                RdsError::Validation("an entrypoint is required when submitting a folder".into())
            })?
            .to_string();
        if !code_path.join(&entrypoint).exists() {
            return Err(RdsError::NotFound(format!(
                "entrypoint '{entrypoint}' not found in {}",
                code_path.display()
            )));
        }
        let patterns = ignore_patterns.unwrap_or_else(|| {
            DEFAULT_IGNORE_PATTERNS.iter().map(|s| s.to_string()).collect()
        });
        (
            UserCodeType::Folder,
            entrypoint,
            bundle::pack_dir(code_path, &patterns)?,
        )
    };

    let create = UserCodeCreate {
        name: None,
        description: None,
        tags: Vec::new(),
        entrypoint,
        code_type,
        files_zipped: Some(bytes.clone()),
    };
    Ok((create, bytes))
}
