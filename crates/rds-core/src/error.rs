use thiserror::Error;

/// Error kinds shared by every surface (store, RPC, runner, client).
///
/// Runner failures are recorded onto the Job record rather than propagated,
/// so `RuntimeUnavailable` and `JobFailed` reaching a caller always mean the
/// failure happened before a Job could absorb it.
#[derive(Debug, Error)]
pub enum RdsError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("permission denied: {0}")]
    Permission(String),

    #[error("invalid update: {0}")]
    InvalidUpdate(String),

    #[error("rpc timeout: {0}")]
    TransportTimeout(String),

    #[error("runtime unavailable: {0}")]
    RuntimeUnavailable(String),

    #[error("job failed: {0}")]
    JobFailed(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RdsError>;

impl RdsError {
    /// Stable code used on the RPC wire.
    pub fn code(&self) -> &'static str {
        match self {
            RdsError::NotFound(_) => "not_found",
            RdsError::AlreadyExists(_) => "already_exists",
            RdsError::Permission(_) => "permission",
            RdsError::InvalidUpdate(_) => "invalid_update",
            RdsError::TransportTimeout(_) => "transport_timeout",
            RdsError::RuntimeUnavailable(_) => "runtime_unavailable",
            RdsError::JobFailed(_) => "job_failed",
            RdsError::Validation(_) => "validation",
            RdsError::Io(_) | RdsError::Yaml(_) | RdsError::Json(_) => "internal",
        }
    }

    /// Rebuild an error from its wire representation.
    pub fn from_wire(code: &str, message: String) -> Self {
        match code {
            "not_found" => RdsError::NotFound(message),
            "already_exists" => RdsError::AlreadyExists(message),
            "permission" => RdsError::Permission(message),
            "invalid_update" => RdsError::InvalidUpdate(message),
            "transport_timeout" => RdsError::TransportTimeout(message),
            "runtime_unavailable" => RdsError::RuntimeUnavailable(message),
            "job_failed" => RdsError::JobFailed(message),
            _ => RdsError::Validation(message),
        }
    }
}
