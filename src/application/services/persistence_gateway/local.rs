use super::{
    Backend, LedgerSnapshot, PersistenceGateway, ALERTED_CARTS_KEY, ALERTED_PERMITS_KEY,
    CHECKOUTS_KEY, NAMESPACE_CODE_KEY, PERMITS_KEY,
};
use crate::application::ports::LocalStore;
use crate::domain::entities::{CartCheckout, ParkingPermit};
use crate::domain::value_objects::{EntryId, NamespaceCode};
use crate::shared::error::{AppError, PersistError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::sync::Arc;

/// 端末ローカルストアへの保存。
pub struct LocalGateway {
    store: Arc<dyn LocalStore>,
}

impl LocalGateway {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self { store }
    }

    /// 許可証とそのマーカーだけを書き込む。オンライン中もカートの保存内容には触れない。
    pub async fn save_permits(
        &self,
        permits: &[ParkingPermit],
        alerted_permits: &[EntryId],
    ) -> Result<(), PersistError> {
        let entries = [
            (PERMITS_KEY, serde_json::to_string(permits)?),
            (ALERTED_PERMITS_KEY, serde_json::to_string(alerted_permits)?),
        ];
        self.store.set_many(&entries).await
    }

    /// オンライン中に警告済みになったカートのマーカーを `alertedCarts` だけに書き足す。
    ///
    /// ローカルのカートに対応する保存済みマーカーは残し、`checkedOutCarts` は変更しない。
    pub async fn merge_cart_markers(&self, online: &[EntryId]) -> Result<(), PersistError> {
        let local_carts: Vec<CartCheckout> = self.read_list(CHECKOUTS_KEY).await?;
        let stored: Vec<EntryId> = self.read_list(ALERTED_CARTS_KEY).await?;
        let local_ids: HashSet<&EntryId> = local_carts.iter().map(|cart| &cart.id).collect();

        let mut merged: Vec<EntryId> = stored
            .into_iter()
            .filter(|id| local_ids.contains(id))
            .collect();
        for id in online {
            if !merged.contains(id) {
                merged.push(id.clone());
            }
        }
        merged.sort_by(|a, b| a.as_str().cmp(b.as_str()));

        self.store
            .set(ALERTED_CARTS_KEY, serde_json::to_string(&merged)?)
            .await?;
        tracing::debug!(
            target: "cart_tracker::persistence",
            markers = merged.len(),
            "cart alert markers merged"
        );
        Ok(())
    }

    pub async fn save_all(&self, snapshot: &LedgerSnapshot) -> Result<(), PersistError> {
        let entries = [
            (CHECKOUTS_KEY, serde_json::to_string(&snapshot.carts)?),
            (PERMITS_KEY, serde_json::to_string(&snapshot.permits)?),
            (ALERTED_CARTS_KEY, serde_json::to_string(&snapshot.alerted_carts)?),
            (
                ALERTED_PERMITS_KEY,
                serde_json::to_string(&snapshot.alerted_permits)?,
            ),
        ];
        self.store.set_many(&entries).await?;
        tracing::debug!(
            target: "cart_tracker::persistence",
            carts = snapshot.carts.len(),
            permits = snapshot.permits.len(),
            "local ledger saved"
        );
        Ok(())
    }

    pub async fn load_all(&self) -> Result<LedgerSnapshot, PersistError> {
        Ok(LedgerSnapshot {
            carts: self.read_list(CHECKOUTS_KEY).await?,
            permits: self.read_list(PERMITS_KEY).await?,
            alerted_carts: self.read_list(ALERTED_CARTS_KEY).await?,
            alerted_permits: self.read_list(ALERTED_PERMITS_KEY).await?,
        })
    }

    pub async fn save_code(&self, code: &NamespaceCode) -> Result<(), PersistError> {
        self.store
            .set(NAMESPACE_CODE_KEY, code.as_str().to_string())
            .await
    }

    pub async fn load_code(&self) -> Result<Option<NamespaceCode>, PersistError> {
        let raw = self.store.get(NAMESPACE_CODE_KEY).await?;
        Ok(raw.as_deref().and_then(NamespaceCode::parse))
    }

    pub async fn clear_code(&self) -> Result<(), PersistError> {
        self.store.remove(NAMESPACE_CODE_KEY).await
    }

    /// 未保存のキーは空として扱う。壊れた JSON も記録したうえで空にする。
    async fn read_list<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, PersistError> {
        let Some(raw) = self.store.get(key).await? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str(&raw) {
            Ok(values) => Ok(values),
            Err(err) => {
                tracing::warn!(
                    target: "cart_tracker::persistence",
                    key,
                    error = %err,
                    "discarding malformed local entry"
                );
                Ok(Vec::new())
            }
        }
    }
}

#[async_trait]
impl PersistenceGateway for LocalGateway {
    fn backend(&self) -> Backend {
        Backend::Local
    }

    async fn save(&self, snapshot: &LedgerSnapshot) -> Result<(), AppError> {
        Ok(self.save_all(snapshot).await?)
    }

    async fn load(&self) -> Result<LedgerSnapshot, AppError> {
        Ok(self.load_all().await?)
    }
}
