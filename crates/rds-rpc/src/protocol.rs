use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use rds_core::{RdsError, APP_NAME};

/// One request file in the mailbox. The sender identity is attached by the
/// transport from the datasite configuration that owns the mailbox write; it
/// is never taken from a user-supplied body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    pub uid: Uuid,
    pub endpoint: String,
    pub body: Value,
    pub sender_email: String,
    pub sent_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl RpcRequest {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireError {
    pub code: String,
    pub message: String,
}

/// Response file, correlated with its request by `uid`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub uid: Uuid,
    pub status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<WireError>,
}

impl RpcResponse {
    pub fn ok(uid: Uuid, body: Value) -> Self {
        Self {
            uid,
            status: ResponseStatus::Ok,
            body: Some(body),
            error: None,
        }
    }

    pub fn err(uid: Uuid, error: &RdsError) -> Self {
        Self {
            uid,
            status: ResponseStatus::Error,
            body: None,
            error: Some(WireError {
                code: error.code().to_string(),
                message: error.to_string(),
            }),
        }
    }

    /// Unpack into the caller-facing result.
    pub fn into_result(self) -> rds_core::Result<Value> {
        match self.status {
            ResponseStatus::Ok => Ok(self.body.unwrap_or(Value::Null)),
            ResponseStatus::Error => {
                let error = self.error.unwrap_or(WireError {
                    code: "internal".to_string(),
                    message: "missing error detail".to_string(),
                });
                Err(RdsError::from_wire(&error.code, error.message))
            }
        }
    }
}

pub const HEALTH_ENDPOINT: &str = "rds/health";

pub const VERB_CREATE: &str = "create";
pub const VERB_GET_ONE: &str = "get_one";
pub const VERB_GET_ALL: &str = "get_all";
pub const VERB_UPDATE: &str = "update";
pub const VERB_DELETE: &str = "delete";
pub const VERB_DELETE_ALL: &str = "delete_all";

/// Endpoint names are `rds/<kind>/<verb>`.
pub fn endpoint(kind: &str, verb: &str) -> String {
    format!("{APP_NAME}/{kind}/{verb}")
}
