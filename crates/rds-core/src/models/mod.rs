//! Entity model: each kind has a full record shape plus `Create` and
//! `Update` companions. Records are authoritative in the store; in-memory
//! copies may go stale at any time.

pub mod custom_function;
pub mod dataset;
pub mod job;
pub mod runtime;
pub mod user_code;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub use custom_function::{CustomFunction, CustomFunctionCreate, CustomFunctionUpdate};
pub use dataset::{Dataset, DatasetCreate, DatasetUpdate};
pub use job::{Job, JobCreate, JobStatus, JobUpdate};
pub use runtime::{
    DockerRuntimeConfig, KubernetesRuntimeConfig, PythonRuntimeConfig, Runtime, RuntimeConfig,
    RuntimeCreate, RuntimeKind, RuntimeUpdate,
};
pub use user_code::{UserCode, UserCodeCreate, UserCodeType, UserCodeUpdate};

/// Fetch exactly one record by uid, name, or filter map. Zero matches is
/// `NotFound`; with multiple matches the newest wins.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetOneRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub filters: HashMap<String, Value>,
}

impl GetOneRequest {
    pub fn by_uid(uid: Uuid) -> Self {
        Self {
            uid: Some(uid),
            ..Default::default()
        }
    }

    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteRequest {
    pub uid: Uuid,
}

/// Job-specific delete: optionally garbage-collect the user code when no
/// other job references it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDeleteRequest {
    pub uid: Uuid,
    #[serde(default)]
    pub delete_orphaned_usercode: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteAllRequest {
    #[serde(default)]
    pub filters: HashMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteAllResponse {
    pub deleted: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub app_name: String,
    pub version: String,
}
