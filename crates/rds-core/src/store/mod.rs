//! File-backed typed store, one YAML record per file.
//!
//! Writes are serialised per record through a scoped lock; reads are
//! lock-free snapshots (load + parse). Cross-record invariants are the
//! caller's problem.

pub mod coerce;

use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{RdsError, Result};
pub use coerce::{coerce_field_types, field_kind, values_equal, FieldKind, FieldSchema};

/// A record type persistable in a [`YamlStore`].
pub trait StoreItem: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Kind name, doubles as the store subdirectory ("job", "dataset", ...).
    fn kind() -> &'static str;

    fn uid(&self) -> Uuid;

    /// Semantic types of the filterable fields.
    fn schema() -> FieldSchema;

    fn set_updated_at(&mut self, at: DateTime<Utc>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Query shape for `get_all`. Filters are an equality map; unknown keys
/// yield an empty result rather than an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetAllQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<String>,
    #[serde(default)]
    pub sort_order: SortOrder,
    #[serde(default)]
    pub filters: HashMap<String, Value>,
}

pub struct YamlStore<T> {
    store_dir: PathBuf,
    locks: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
    _marker: std::marker::PhantomData<T>,
}

impl<T: StoreItem> YamlStore<T> {
    pub fn new(store_dir: impl Into<PathBuf>) -> Self {
        Self {
            store_dir: store_dir.into(),
            locks: Mutex::new(HashMap::new()),
            _marker: std::marker::PhantomData,
        }
    }

    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    fn record_path(&self, uid: &Uuid) -> PathBuf {
        self.store_dir.join(format!("{uid}.yaml"))
    }

    fn record_lock(&self, uid: Uuid) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().expect("lock registry poisoned");
        locks.entry(uid).or_default().clone()
    }

    pub async fn create(&self, item: &T) -> Result<T> {
        let uid = item.uid();
        let lock = self.record_lock(uid);
        let _guard = lock.lock().await;

        let path = self.record_path(&uid);
        if fs::try_exists(&path).await? {
            return Err(RdsError::AlreadyExists(format!("{} {uid}", T::kind())));
        }
        write_record(&path, item).await?;
        debug!(kind = T::kind(), %uid, "created record");
        Ok(item.clone())
    }

    pub async fn get_by_uid(&self, uid: &Uuid) -> Result<Option<T>> {
        let path = self.record_path(uid);
        if !fs::try_exists(&path).await? {
            return Ok(None);
        }
        Ok(Some(read_record(&path).await?))
    }

    pub async fn list_all(&self) -> Result<Vec<T>> {
        if !fs::try_exists(&self.store_dir).await? {
            return Ok(Vec::new());
        }
        let mut items = Vec::new();
        let mut entries = fs::read_dir(&self.store_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("yaml") {
                continue;
            }
            match read_record::<T>(&path).await {
                Ok(item) => items.push(item),
                // A half-synced or foreign file must not poison the listing.
                Err(e) => warn!(kind = T::kind(), path = %path.display(), "skipping unreadable record: {e}"),
            }
        }
        Ok(items)
    }

    pub async fn get_all(&self, query: &GetAllQuery) -> Result<Vec<T>> {
        let items = self.list_all().await?;
        let coerced = coerce_field_types(&query.filters, T::schema());

        let mut matched: Vec<(Value, T)> = Vec::new();
        for item in items {
            let value = serde_json::to_value(&item)?;
            if matches_filters(&value, &coerced, T::schema()) {
                matched.push((value, item));
            }
        }

        if let Some(order_by) = &query.order_by {
            let kind = field_kind(T::schema(), order_by);
            matched.sort_by(|(a, _), (b, _)| {
                let ord = compare_field(a.get(order_by.as_str()), b.get(order_by.as_str()), kind);
                match query.sort_order {
                    SortOrder::Asc => ord,
                    SortOrder::Desc => ord.reverse(),
                }
            });
        }

        let iter = matched.into_iter().map(|(_, item)| item).skip(query.offset);
        Ok(match query.limit {
            Some(limit) => iter.take(limit).collect(),
            None => iter.collect(),
        })
    }

    /// Case-insensitive substring search over the given string fields.
    pub async fn text_search(&self, query: &str, fields: &[&str]) -> Result<Vec<T>> {
        let needle = query.to_lowercase();
        let mut results = Vec::new();
        for item in self.list_all().await? {
            let value = serde_json::to_value(&item)?;
            let hit = fields.iter().any(|field| {
                value
                    .get(*field)
                    .and_then(Value::as_str)
                    .map(|s| s.to_lowercase().contains(&needle))
                    .unwrap_or(false)
            });
            if hit {
                results.push(item);
            }
        }
        Ok(results)
    }

    /// Apply a typed partial update. Unknown fields in the update object are
    /// ignored; a `uid` in the update that differs from `uid` is refused.
    pub async fn update<U: Serialize>(&self, uid: Uuid, update: &U) -> Result<T> {
        self.update_value(uid, serde_json::to_value(update)?).await
    }

    pub async fn update_value(&self, uid: Uuid, patch: Value) -> Result<T> {
        let patch = patch
            .as_object()
            .ok_or_else(|| RdsError::InvalidUpdate("update body must be an object".into()))?
            .clone();

        if let Some(patch_uid) = patch.get("uid").and_then(Value::as_str) {
            let patch_uid = Uuid::parse_str(patch_uid)
                .map_err(|e| RdsError::InvalidUpdate(format!("bad uid in update: {e}")))?;
            if patch_uid != uid {
                return Err(RdsError::InvalidUpdate(format!(
                    "update uid {patch_uid} does not match target {uid}"
                )));
            }
        }

        let lock = self.record_lock(uid);
        let _guard = lock.lock().await;

        let path = self.record_path(&uid);
        if !fs::try_exists(&path).await? {
            return Err(RdsError::NotFound(format!("{} {uid}", T::kind())));
        }
        let current: T = read_record(&path).await?;
        let mut value = serde_json::to_value(&current)?;
        let map = value.as_object_mut().expect("records serialize to maps");

        for (field, new_value) in &patch {
            if new_value.is_null() {
                continue;
            }
            // Only fields the record actually has are recognised.
            if map.contains_key(field) {
                map.insert(field.clone(), new_value.clone());
            }
        }

        let mut updated: T = serde_json::from_value(value)
            .map_err(|e| RdsError::InvalidUpdate(format!("update does not fit schema: {e}")))?;
        updated.set_updated_at(Utc::now());
        write_record(&path, &updated).await?;
        Ok(updated)
    }

    pub async fn delete(&self, uid: &Uuid) -> Result<bool> {
        let lock = self.record_lock(*uid);
        let _guard = lock.lock().await;

        let path = self.record_path(uid);
        if !fs::try_exists(&path).await? {
            return Ok(false);
        }
        fs::remove_file(&path).await?;
        debug!(kind = T::kind(), %uid, "deleted record");
        Ok(true)
    }
}

fn matches_filters(
    record: &Value,
    filters: &HashMap<String, Value>,
    schema: FieldSchema,
) -> bool {
    filters.iter().all(|(field, expected)| {
        match record.get(field.as_str()) {
            Some(actual) => values_equal(actual, expected, field_kind(schema, field)),
            // Unknown field: matches nothing.
            None => false,
        }
    })
}

fn compare_field(a: Option<&Value>, b: Option<&Value>, kind: FieldKind) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => {
            if kind == FieldKind::Instant {
                if let (Some(a), Some(b)) = (coerce::parse_instant(a), coerce::parse_instant(b)) {
                    return a.cmp(&b);
                }
            }
            match (a, b) {
                (Value::String(a), Value::String(b)) => a.cmp(b),
                (Value::Number(a), Value::Number(b)) => a
                    .as_f64()
                    .partial_cmp(&b.as_f64())
                    .unwrap_or(Ordering::Equal),
                (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
                _ => Ordering::Equal,
            }
        }
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

async fn read_record<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path).await?;
    Ok(serde_yaml::from_slice(&bytes)?)
}

async fn write_record<T: Serialize>(path: &Path, item: &T) -> Result<()> {
    let bytes = serde_yaml::to_string(item)?;
    write_atomic(path, bytes.as_bytes()).await
}

/// Write bytes via temp file + rename so readers never observe a torn record.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, bytes).await?;
    fs::rename(&tmp_path, path).await?;
    Ok(())
}
