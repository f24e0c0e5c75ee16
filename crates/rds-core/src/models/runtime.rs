use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{RdsError, Result};
use crate::store::{FieldKind, FieldSchema, StoreItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeKind {
    Python,
    Docker,
    Kubernetes,
}

impl RuntimeKind {
    pub const VARIANTS: &'static [&'static str] = &["python", "docker", "kubernetes"];

    pub fn as_str(self) -> &'static str {
        match self {
            RuntimeKind::Python => "python",
            RuntimeKind::Docker => "docker",
            RuntimeKind::Kubernetes => "kubernetes",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PythonRuntimeConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// When set and a `pyproject.toml` sits next to the entrypoint, execution
    /// goes through `uv run` so declared dependencies resolve on demand.
    #[serde(default = "default_use_uv")]
    pub use_uv: bool,
}

fn default_use_uv() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DockerRuntimeConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dockerfile_content: Option<String>,
    /// Key into the mount-provider registry for app-specific extra mounts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KubernetesRuntimeConfig {
    pub image: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_num_workers")]
    pub num_workers: u32,
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_num_workers() -> u32 {
    1
}

/// Kind-specific runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuntimeConfig {
    Python(PythonRuntimeConfig),
    Docker(DockerRuntimeConfig),
    Kubernetes(KubernetesRuntimeConfig),
}

impl RuntimeConfig {
    pub fn default_for(kind: RuntimeKind) -> Result<Self> {
        match kind {
            RuntimeKind::Python => Ok(RuntimeConfig::Python(PythonRuntimeConfig::default())),
            RuntimeKind::Docker => Ok(RuntimeConfig::Docker(DockerRuntimeConfig::default())),
            RuntimeKind::Kubernetes => Err(RdsError::Validation(
                "kubernetes runtimes require an explicit config".into(),
            )),
        }
    }

    pub fn kind(&self) -> RuntimeKind {
        match self {
            RuntimeConfig::Python(_) => RuntimeKind::Python,
            RuntimeConfig::Docker(_) => RuntimeKind::Docker,
            RuntimeConfig::Kubernetes(_) => RuntimeKind::Kubernetes,
        }
    }

    pub fn as_python(&self) -> Option<&PythonRuntimeConfig> {
        match self {
            RuntimeConfig::Python(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_docker(&self) -> Option<&DockerRuntimeConfig> {
        match self {
            RuntimeConfig::Docker(c) => Some(c),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Runtime {
    pub uid: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,

    pub kind: RuntimeKind,
    /// Interpreter argv prefix, e.g. `["python3"]`.
    pub cmd: Vec<String>,
    pub config: RuntimeConfig,
}

impl Runtime {
    /// The default runtime used when a job carries no `runtime_id`. Never
    /// persisted; manufactured fresh per run.
    pub fn ephemeral(created_by: &str) -> Runtime {
        let now = Utc::now();
        Runtime {
            uid: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            created_by: created_by.to_string(),
            name: "python-default".to_string(),
            description: None,
            tags: Vec::new(),
            kind: RuntimeKind::Python,
            cmd: default_cmd(RuntimeKind::Python),
            config: RuntimeConfig::Python(PythonRuntimeConfig::default()),
        }
    }
}

fn default_cmd(kind: RuntimeKind) -> Vec<String> {
    match kind {
        // Docker cmd is the interpreter used inside the container.
        RuntimeKind::Python | RuntimeKind::Docker | RuntimeKind::Kubernetes => {
            vec!["python3".to_string()]
        }
    }
}

impl StoreItem for Runtime {
    fn kind() -> &'static str {
        "runtime"
    }

    fn uid(&self) -> Uuid {
        self.uid
    }

    fn schema() -> FieldSchema {
        &[
            ("uid", FieldKind::Uuid),
            ("created_at", FieldKind::Instant),
            ("updated_at", FieldKind::Instant),
            ("kind", FieldKind::Enum(RuntimeKind::VARIANTS)),
        ]
    }

    fn set_updated_at(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeCreate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<RuntimeKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmd: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<RuntimeConfig>,
}

impl RuntimeCreate {
    pub fn into_runtime(self, created_by: &str) -> Result<Runtime> {
        let kind = self
            .kind
            .or(self.config.as_ref().map(RuntimeConfig::kind))
            .unwrap_or(RuntimeKind::Python);
        let config = match self.config {
            Some(config) => {
                if config.kind() != kind {
                    return Err(RdsError::Validation(format!(
                        "config is for {} but runtime kind is {}",
                        config.kind().as_str(),
                        kind.as_str()
                    )));
                }
                config
            }
            None => RuntimeConfig::default_for(kind)?,
        };
        let name = match self.name {
            Some(name) => name,
            None => generated_name(kind, &config),
        };
        let now = Utc::now();
        Ok(Runtime {
            uid: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            created_by: created_by.to_string(),
            name,
            description: self.description,
            tags: self.tags,
            kind,
            cmd: self.cmd.unwrap_or_else(|| default_cmd(kind)),
            config,
        })
    }
}

/// `<kind>-<hex8>` where the hex digest covers kind + config, so identical
/// anonymous runtimes collapse to the same name.
fn generated_name(kind: RuntimeKind, config: &RuntimeConfig) -> String {
    let mut hasher = DefaultHasher::new();
    kind.hash(&mut hasher);
    config.hash(&mut hasher);
    format!("{}-{:08x}", kind.as_str(), hasher.finish() as u32)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeUpdate {
    pub uid: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmd: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<RuntimeConfig>,
}
