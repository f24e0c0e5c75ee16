use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::{FieldKind, FieldSchema, StoreItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserCodeType {
    File,
    Folder,
}

impl UserCodeType {
    pub const VARIANTS: &'static [&'static str] = &["file", "folder"];
}

/// A submitted code bundle. `files_zipped` travels only on the wire; the
/// server extracts it on create and strips it from the stored record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCode {
    pub uid: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,

    /// Path of the entrypoint, relative to the extracted bundle root.
    pub entrypoint: String,
    pub code_type: UserCodeType,
    #[serde(default)]
    pub files_zipped: Option<Vec<u8>>,
}

impl StoreItem for UserCode {
    fn kind() -> &'static str {
        "user_code"
    }

    fn uid(&self) -> Uuid {
        self.uid
    }

    fn schema() -> FieldSchema {
        &[
            ("uid", FieldKind::Uuid),
            ("created_at", FieldKind::Instant),
            ("updated_at", FieldKind::Instant),
            ("code_type", FieldKind::Enum(UserCodeType::VARIANTS)),
        ]
    }

    fn set_updated_at(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCodeCreate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub entrypoint: String,
    pub code_type: UserCodeType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files_zipped: Option<Vec<u8>>,
}

impl UserCodeCreate {
    pub fn into_user_code(self, created_by: &str) -> UserCode {
        let now = Utc::now();
        UserCode {
            uid: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            created_by: created_by.to_string(),
            name: self.name,
            description: self.description,
            tags: self.tags,
            entrypoint: self.entrypoint,
            code_type: self.code_type,
            files_zipped: self.files_zipped,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCodeUpdate {
    pub uid: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}
