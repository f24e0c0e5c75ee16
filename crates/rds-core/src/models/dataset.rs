use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::{FieldKind, FieldSchema, StoreItem};

/// A published dataset. The record carries URLs, not paths: the mock URL is
/// resolvable by anyone who syncs the datasite, the private URL only on the
/// owner's machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub uid: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: String,
    /// Unique per owner.
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub summary: Option<String>,
    pub mock_url: String,
    /// Admin-only; redacted before leaving the owner's control plane.
    #[serde(default)]
    pub private_url: Option<String>,
    /// File name -> CSV header columns (empty for non-tabular files).
    #[serde(default)]
    pub schema: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub readme_filename: Option<String>,
    #[serde(default)]
    pub runtime_id: Option<Uuid>,
}

impl Dataset {
    /// Strip owner-only fields before handing the record to a guest.
    pub fn redacted(mut self) -> Dataset {
        self.private_url = None;
        self
    }
}

impl StoreItem for Dataset {
    fn kind() -> &'static str {
        "dataset"
    }

    fn uid(&self) -> Uuid {
        self.uid
    }

    fn schema() -> FieldSchema {
        &[
            ("uid", FieldKind::Uuid),
            ("created_at", FieldKind::Instant),
            ("updated_at", FieldKind::Instant),
            ("runtime_id", FieldKind::Uuid),
        ]
    }

    fn set_updated_at(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }
}

/// Create payload. File placement happens owner-side before this record is
/// registered; the payload carries the manufactured URLs and derived schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetCreate {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub mock_url: String,
    pub private_url: String,
    #[serde(default)]
    pub schema: BTreeMap<String, Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readme_filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_id: Option<Uuid>,
}

impl DatasetCreate {
    pub fn into_dataset(self, created_by: &str) -> Dataset {
        let now = Utc::now();
        Dataset {
            uid: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            created_by: created_by.to_string(),
            name: self.name,
            description: self.description,
            tags: self.tags,
            summary: self.summary,
            mock_url: self.mock_url,
            private_url: Some(self.private_url),
            schema: self.schema,
            readme_filename: self.readme_filename,
            runtime_id: self.runtime_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetUpdate {
    pub uid: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_id: Option<Uuid>,
}
