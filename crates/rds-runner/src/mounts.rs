use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, OnceLock, RwLock};

use crate::config::JobConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountMode {
    ReadOnly,
    ReadWrite,
}

impl fmt::Display for MountMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MountMode::ReadOnly => write!(f, "ro"),
            MountMode::ReadWrite => write!(f, "rw"),
        }
    }
}

/// An extra bind mount contributed into the sandbox.
#[derive(Debug, Clone)]
pub struct Mount {
    pub source: PathBuf,
    pub target: String,
    pub mode: MountMode,
}

/// Contributes app-specific mounts, looked up by the runtime's `app_name`.
pub trait MountProvider: Send + Sync {
    fn mounts(&self, config: &JobConfig) -> Vec<Mount>;
}

fn registry() -> &'static RwLock<HashMap<String, Arc<dyn MountProvider>>> {
    static REGISTRY: OnceLock<RwLock<HashMap<String, Arc<dyn MountProvider>>>> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

pub fn register_mount_provider(app_name: impl Into<String>, provider: Arc<dyn MountProvider>) {
    registry()
        .write()
        .expect("mount registry poisoned")
        .insert(app_name.into(), provider);
}

pub fn mount_provider(app_name: &str) -> Option<Arc<dyn MountProvider>> {
    registry()
        .read()
        .expect("mount registry poisoned")
        .get(app_name)
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rds_core::Runtime;
    use std::collections::HashMap as StdHashMap;

    struct FixedMounts;

    impl MountProvider for FixedMounts {
        fn mounts(&self, _config: &JobConfig) -> Vec<Mount> {
            vec![Mount {
                source: PathBuf::from("/srv/models"),
                target: "/app/models".to_string(),
                mode: MountMode::ReadOnly,
            }]
        }
    }

    #[test]
    fn registry_lookup_by_app_name() {
        register_mount_provider("model-server", Arc::new(FixedMounts));
        assert!(mount_provider("model-server").is_some());
        assert!(mount_provider("unknown-app").is_none());

        let config = JobConfig {
            function_folder: PathBuf::from("/tmp/code"),
            data_path: PathBuf::from("/tmp/data"),
            job_path: PathBuf::from("/tmp/job"),
            args: vec!["main.py".to_string()],
            runtime: Runtime::ephemeral("do@x"),
            timeout_secs: 300,
            extra_env: StdHashMap::new(),
            blocking: true,
            data_mount_dir: String::new(),
        };
        let mounts = mount_provider("model-server").unwrap().mounts(&config);
        assert_eq!(mounts.len(), 1);
        assert_eq!(mounts[0].mode.to_string(), "ro");
    }
}
