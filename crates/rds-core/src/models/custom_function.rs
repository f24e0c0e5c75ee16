use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::{FieldKind, FieldSchema, StoreItem};

/// An owner-curated function bundle a DS can target instead of submitting
/// free-form code. Same bundle mechanics as user code, plus a readme.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomFunction {
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

    pub entrypoint: String,
    pub readme_filename: String,
    #[serde(default)]
    pub files_zipped: Option<Vec<u8>>,
}

impl StoreItem for CustomFunction {
    fn kind() -> &'static str {
        "custom_function"
    }

    fn uid(&self) -> Uuid {
        self.uid
    }

    fn schema() -> FieldSchema {
        &[
            ("uid", FieldKind::Uuid),
            ("created_at", FieldKind::Instant),
            ("updated_at", FieldKind::Instant),
        ]
    }

    fn set_updated_at(&mut self, at: DateTime<Utc>) {
        self.updated_at = at;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomFunctionCreate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub entrypoint: String,
    pub readme_filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files_zipped: Option<Vec<u8>>,
}

impl CustomFunctionCreate {
    pub fn into_custom_function(self, created_by: &str) -> CustomFunction {
        let now = Utc::now();
        CustomFunction {
            uid: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            created_by: created_by.to_string(),
            name: self.name,
            description: self.description,
            tags: self.tags,
            entrypoint: self.entrypoint,
            readme_filename: self.readme_filename,
            files_zipped: self.files_zipped,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomFunctionUpdate {
    pub uid: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}
