//! Core types for the RDS control plane: error kinds, the entity model,
//! datasite path layout, and the file-backed typed store.

pub mod bundle;
pub mod config;
pub mod error;
pub mod models;
pub mod store;

pub use config::{DatasiteConfig, DatasitePaths, APP_NAME};
pub use error::{RdsError, Result};
pub use models::{
    CustomFunction, CustomFunctionCreate, CustomFunctionUpdate, Dataset, DatasetCreate,
    DatasetUpdate, Job, JobCreate, JobStatus, JobUpdate, Runtime, RuntimeConfig, RuntimeCreate,
    RuntimeKind, RuntimeUpdate, UserCode, UserCodeCreate, UserCodeType, UserCodeUpdate,
};
pub use store::{GetAllQuery, SortOrder, StoreItem, YamlStore};
