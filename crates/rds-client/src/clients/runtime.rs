use std::sync::Arc;

use uuid::Uuid;

use rds_core::models::{GetOneRequest, Runtime, RuntimeConfig, RuntimeCreate, RuntimeKind, RuntimeUpdate};
use rds_core::store::GetAllQuery;
use rds_core::Result;

use crate::clients::{FetchMode, KindClient};
use crate::ClientCtx;

pub struct RuntimeClient {
    inner: KindClient<Runtime>,
}

impl RuntimeClient {
    pub(crate) fn new(ctx: Arc<ClientCtx>) -> Self {
        Self {
            inner: KindClient::new(ctx),
        }
    }

    pub async fn create(&self, create: RuntimeCreate) -> Result<Runtime> {
        self.inner.create(&create).await
    }

    /// Convenience constructor mirroring the common call shape.
    pub async fn create_named(
        &self,
        name: impl Into<String>,
        kind: RuntimeKind,
        config: Option<RuntimeConfig>,
    ) -> Result<Runtime> {
        self.create(RuntimeCreate {
            name: Some(name.into()),
            kind: Some(kind),
            config,
            ..Default::default()
        })
        .await
    }

    pub async fn get(&self, uid: Uuid) -> Result<Runtime> {
        self.inner.get(GetOneRequest::by_uid(uid), FetchMode::Rpc).await
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Runtime> {
        self.inner
            .get(GetOneRequest::by_name(name), FetchMode::Rpc)
            .await
    }

    pub async fn get_all(&self) -> Result<Vec<Runtime>> {
        self.inner.get_all(&GetAllQuery::default(), FetchMode::Rpc).await
    }

    pub async fn get_all_with(&self, query: &GetAllQuery, mode: FetchMode) -> Result<Vec<Runtime>> {
        self.inner.get_all(query, mode).await
    }

    pub async fn update(&self, update: &RuntimeUpdate) -> Result<Runtime> {
        self.inner.update(update).await
    }

    pub async fn delete(&self, uid: Uuid) -> Result<bool> {
        self.inner.delete(uid).await
    }
}
