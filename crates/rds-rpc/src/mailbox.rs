//! File naming and atomic I/O for the mailbox directories.
//!
//! One file per message: `<request_uid>.request` is written atomically by
//! the client, `<request_uid>.response` by the server. The syncing
//! filesystem moves both between machines; rename-into-place means a reader
//! never observes a torn message.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::fs;

use rds_core::store::write_atomic;
use rds_core::Result;
use uuid::Uuid;

pub const REQUEST_EXT: &str = "request";
pub const RESPONSE_EXT: &str = "response";

pub fn request_path(endpoint_dir: &Path, uid: &Uuid) -> PathBuf {
    endpoint_dir.join(format!("{uid}.{REQUEST_EXT}"))
}

pub fn response_path(endpoint_dir: &Path, uid: &Uuid) -> PathBuf {
    endpoint_dir.join(format!("{uid}.{RESPONSE_EXT}"))
}

pub async fn write_message<T: Serialize>(path: &Path, message: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(message)?;
    write_atomic(path, &bytes).await
}

pub async fn read_message<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// All pending request files under one endpoint directory.
pub async fn pending_requests(endpoint_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut pending = Vec::new();
    if !fs::try_exists(endpoint_dir).await? {
        return Ok(pending);
    }
    let mut entries = fs::read_dir(endpoint_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) == Some(REQUEST_EXT) {
            pending.push(path);
        }
    }
    Ok(pending)
}
