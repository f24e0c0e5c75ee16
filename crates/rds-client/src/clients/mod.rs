pub mod custom_function;
pub mod dataset;
pub mod job;
pub mod runtime;
pub mod user_code;

use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use rds_core::models::{DeleteRequest, GetOneRequest};
use rds_core::store::{GetAllQuery, StoreItem, YamlStore};
use rds_core::{RdsError, Result};
use rds_rpc::{endpoint, VERB_CREATE, VERB_DELETE, VERB_GET_ALL, VERB_GET_ONE, VERB_UPDATE};

use crate::ClientCtx;

/// Where a read is served from: the host's RPC endpoints (default) or the
/// local synced snapshot of its store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchMode {
    #[default]
    Rpc,
    Local,
}

/// Shared typed CRUD path every sub-client builds on.
pub(crate) struct KindClient<T: StoreItem> {
    pub(crate) ctx: Arc<ClientCtx>,
    _marker: PhantomData<T>,
}

impl<T: StoreItem> KindClient<T> {
    pub(crate) fn new(ctx: Arc<ClientCtx>) -> Self {
        Self {
            ctx,
            _marker: PhantomData,
        }
    }

    fn local_store(&self) -> YamlStore<T> {
        YamlStore::new(self.ctx.host_paths.store_dir(T::kind()))
    }

    pub(crate) async fn create<C: Serialize + Sync>(&self, create: &C) -> Result<T> {
        self.ctx.call(&endpoint(T::kind(), VERB_CREATE), create).await
    }

    pub(crate) async fn get(&self, request: GetOneRequest, mode: FetchMode) -> Result<T> {
        match mode {
            FetchMode::Rpc => self.ctx.call(&endpoint(T::kind(), VERB_GET_ONE), &request).await,
            FetchMode::Local => self.get_local(request).await,
        }
    }

    async fn get_local(&self, mut request: GetOneRequest) -> Result<T> {
        let store = self.local_store();
        if let Some(uid) = request.uid {
            return store
                .get_by_uid(&uid)
                .await?
                .ok_or_else(|| RdsError::NotFound(format!("no {} found for uid {uid}", T::kind())));
        }
        if let Some(name) = request.name.take() {
            request
                .filters
                .insert("name".to_string(), serde_json::Value::String(name));
        }
        store
            .get_all(&GetAllQuery {
                limit: Some(1),
                order_by: Some("created_at".to_string()),
                filters: request.filters,
                ..Default::default()
            })
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RdsError::NotFound(format!("no {} found matching request", T::kind())))
    }

    pub(crate) async fn get_all(&self, query: &GetAllQuery, mode: FetchMode) -> Result<Vec<T>> {
        match mode {
            FetchMode::Rpc => self.ctx.call(&endpoint(T::kind(), VERB_GET_ALL), query).await,
            FetchMode::Local => self.local_store().get_all(query).await,
        }
    }

    pub(crate) async fn update<U: Serialize + Sync>(&self, update: &U) -> Result<T> {
        self.ctx.call(&endpoint(T::kind(), VERB_UPDATE), update).await
    }

    pub(crate) async fn delete(&self, uid: Uuid) -> Result<bool> {
        self.ctx
            .call(&endpoint(T::kind(), VERB_DELETE), &DeleteRequest { uid })
            .await
    }
}
