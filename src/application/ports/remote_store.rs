use crate::domain::entities::CartCheckout;
use crate::domain::value_objects::NamespaceCode;
use crate::shared::error::SyncError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// 共有コードごとに 1 つ存在するリモート文書。許可証は同期対象外。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationDocument {
    #[serde(default)]
    pub carts: Vec<CartCheckout>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

pub type DocumentSender = mpsc::UnboundedSender<LocationDocument>;

/// 購読中のリモート文書フィード。`unsubscribe` は何度呼んでも安全。
pub trait RemoteSubscription: Send + Sync {
    fn unsubscribe(&mut self);

    fn is_active(&self) -> bool;
}

/// 共有ドキュメントストアへのポート。
///
/// 書き込みは merge（対象フィールドのみ置き換え）。存在しない文書の取得は
/// エラーではなく `None` を返す。
#[async_trait]
pub trait RemoteDocumentStore: Send + Sync {
    async fn fetch(&self, code: &NamespaceCode) -> Result<Option<LocationDocument>, SyncError>;

    async fn merge(&self, code: &NamespaceCode, document: LocationDocument)
        -> Result<(), SyncError>;

    /// 文書の更新ごとに `sink` へ全体を送る購読を開始する。
    async fn subscribe(
        &self,
        code: &NamespaceCode,
        sink: DocumentSender,
    ) -> Result<Box<dyn RemoteSubscription>, SyncError>;
}
