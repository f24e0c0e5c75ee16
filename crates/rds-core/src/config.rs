use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{RdsError, Result};

/// A datasite identity: who we are and where the synced workspace lives.
///
/// The syncing filesystem client owns this file; we only read it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasiteConfig {
    pub email: String,
    pub data_dir: PathBuf,
}

impl DatasiteConfig {
    pub fn new(email: impl Into<String>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            email: email.into(),
            data_dir: data_dir.into(),
        }
    }

    /// Load from a JSON config file written by the datasite client.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: DatasiteConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }

    /// Path layout for a datasite hosted in this workspace (usually the DO's).
    pub fn paths_for(&self, owner: &str) -> DatasitePaths {
        DatasitePaths::new(&self.data_dir, owner)
    }

    pub fn paths(&self) -> DatasitePaths {
        self.paths_for(&self.email)
    }
}

pub const APP_NAME: &str = "rds";

const PRIVATE_SCHEME_PREFIX: &str = ".syftbox/";

/// All filesystem locations and URLs the control plane manufactures.
///
/// Everything under `datasites/<owner>/` is synced to peers by the datasite
/// filesystem; everything under `apps/` and `.syftbox/` stays on the owner's
/// machine.
#[derive(Debug, Clone)]
pub struct DatasitePaths {
    root: PathBuf,
    owner: String,
}

impl DatasitePaths {
    pub fn new(root: impl Into<PathBuf>, owner: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            owner: owner.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// `<root>/datasites/<owner>/`: the synced tree of this datasite.
    pub fn datasite_dir(&self) -> PathBuf {
        self.root.join("datasites").join(&self.owner)
    }

    /// Mock (redacted) dataset contents, world-readable once synced.
    pub fn mock_dataset_dir(&self, name: &str) -> PathBuf {
        self.datasite_dir().join("public").join("datasets").join(name)
    }

    /// Private dataset contents. Lives outside `datasites/`, never synced.
    pub fn private_dataset_dir(&self, name: &str) -> PathBuf {
        self.root
            .join(".syftbox")
            .join("private_datasets")
            .join(&self.owner)
            .join(name)
    }

    /// Entity records, one YAML file per record, grouped by kind.
    pub fn store_dir(&self, kind: &str) -> PathBuf {
        self.root.join("apps").join(APP_NAME).join("store").join(kind)
    }

    /// Runner working tree for one job.
    pub fn job_dir(&self, uid: &uuid::Uuid) -> PathBuf {
        self.root
            .join("apps")
            .join(APP_NAME)
            .join("jobs")
            .join(uid.to_string())
    }

    /// Extracted user-code bundles.
    pub fn user_code_dir(&self, uid: &uuid::Uuid) -> PathBuf {
        self.root
            .join("apps")
            .join(APP_NAME)
            .join("user_code")
            .join(uid.to_string())
    }

    /// Extracted custom-function bundles.
    pub fn custom_function_dir(&self, uid: &uuid::Uuid) -> PathBuf {
        self.root
            .join("apps")
            .join(APP_NAME)
            .join("custom_functions")
            .join(uid.to_string())
    }

    /// The RPC mailbox directory for one endpoint, e.g. `rds/job/create`.
    pub fn rpc_dir(&self, endpoint: &str) -> PathBuf {
        self.datasite_dir().join("app_data").join(APP_NAME).join("rpc").join(endpoint)
    }

    pub fn rpc_root(&self) -> PathBuf {
        self.datasite_dir().join("app_data").join(APP_NAME).join("rpc")
    }

    /// Shared artifacts for a finished job, synced back to the DS.
    pub fn job_output_dir(&self, uid: &uuid::Uuid) -> PathBuf {
        self.datasite_dir()
            .join("app_data")
            .join(APP_NAME)
            .join("job_outputs")
            .join(uid.to_string())
    }

    pub fn mock_dataset_url(&self, name: &str) -> String {
        format!("syft://{}/public/datasets/{}", self.owner, name)
    }

    pub fn private_dataset_url(&self, name: &str) -> String {
        format!(
            "syft://{}/.syftbox/private_datasets/{}/{}",
            self.owner, self.owner, name
        )
    }

    pub fn job_output_url(&self, uid: &uuid::Uuid) -> String {
        format!("syft://{}/app_data/{}/job_outputs/{}", self.owner, APP_NAME, uid)
    }

    /// Resolve a `syft://` URL back to a filesystem path in this workspace.
    pub fn resolve_url(&self, url: &str) -> Result<PathBuf> {
        let rest = url
            .strip_prefix("syft://")
            .ok_or_else(|| RdsError::Validation(format!("not a syft URL: {url}")))?;
        let (owner, rel) = rest
            .split_once('/')
            .ok_or_else(|| RdsError::Validation(format!("malformed syft URL: {url}")))?;
        if rel.starts_with(PRIVATE_SCHEME_PREFIX) {
            // Private paths are rooted at the workspace, not the datasite.
            Ok(self.root.join(rel))
        } else {
            Ok(self.root.join("datasites").join(owner).join(rel))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_resolve_back_to_paths() {
        let paths = DatasitePaths::new("/tmp/ws", "do@x");

        let mock_url = paths.mock_dataset_url("dummy");
        assert_eq!(
            paths.resolve_url(&mock_url).unwrap(),
            PathBuf::from("/tmp/ws/datasites/do@x/public/datasets/dummy")
        );

        let private_url = paths.private_dataset_url("dummy");
        assert_eq!(
            paths.resolve_url(&private_url).unwrap(),
            PathBuf::from("/tmp/ws/.syftbox/private_datasets/do@x/dummy")
        );
        assert!(!private_url.contains("/datasites/"));
    }

    #[test]
    fn private_and_mock_trees_are_disjoint() {
        let paths = DatasitePaths::new("/tmp/ws", "do@x");
        let mock = paths.mock_dataset_dir("d");
        let private = paths.private_dataset_dir("d");
        assert_ne!(mock, private);
        assert!(!private.starts_with(paths.datasite_dir()));
        assert!(mock.starts_with(paths.datasite_dir()));
    }

    #[test]
    fn config_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatasiteConfig::new("do@x", dir.path().join("ws"));
        let path = dir.path().join("config.json");
        config.save(&path).unwrap();
        let loaded = DatasiteConfig::load(&path).unwrap();
        assert_eq!(loaded.email, "do@x");
        assert_eq!(loaded.data_dir, dir.path().join("ws"));
    }
}
