use super::{Backend, LedgerSnapshot, PersistenceGateway};
use crate::application::ports::{LocationDocument, RemoteDocumentStore};
use crate::domain::entities::CartCheckout;
use crate::domain::value_objects::NamespaceCode;
use crate::shared::clock::Clock;
use crate::shared::error::{AppError, SyncError};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const LOCATIONS_COLLECTION: &str = "locations";

/// 共有コードに紐づくリモート文書への保存。カートのみを扱う。
pub struct RemoteGateway {
    store: Arc<dyn RemoteDocumentStore>,
    code: NamespaceCode,
    clock: Arc<dyn Clock>,
    // 同じ共有コードへの書き込みを発行順に直列化する
    write_lock: Mutex<()>,
}

impl RemoteGateway {
    pub fn new(store: Arc<dyn RemoteDocumentStore>, code: NamespaceCode, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            code,
            clock,
            write_lock: Mutex::new(()),
        }
    }

    pub async fn save_carts(&self, carts: Vec<CartCheckout>) -> Result<(), SyncError> {
        let _guard = self.write_lock.lock().await;
        let count = carts.len();
        let document = LocationDocument {
            carts,
            last_updated: Some(self.clock.now()),
        };
        self.store.merge(&self.code, document).await?;
        tracing::debug!(
            target: "cart_tracker::sync",
            collection = LOCATIONS_COLLECTION,
            code = %self.code,
            carts = count,
            "remote carts saved"
        );
        Ok(())
    }

    /// 文書が存在しなければ空の台帳として扱う。
    pub async fn load_carts(&self) -> Result<Vec<CartCheckout>, SyncError> {
        let document = self.store.fetch(&self.code).await?;
        Ok(document.map(|doc| doc.carts).unwrap_or_default())
    }
}

#[async_trait]
impl PersistenceGateway for RemoteGateway {
    fn backend(&self) -> Backend {
        Backend::Remote
    }

    async fn save(&self, snapshot: &LedgerSnapshot) -> Result<(), AppError> {
        Ok(self.save_carts(snapshot.carts.clone()).await?)
    }

    async fn load(&self) -> Result<LedgerSnapshot, AppError> {
        Ok(LedgerSnapshot {
            carts: self.load_carts().await?,
            ..LedgerSnapshot::default()
        })
    }
}
