//! 台帳の保存先。ローカル（端末の永続ストア）とリモート（共有文書）の 2 種類。

mod local;
mod remote;

pub use local::LocalGateway;
pub use remote::{RemoteGateway, LOCATIONS_COLLECTION};

use crate::domain::entities::{CartCheckout, OverdueRegistry, ParkingPermit, ResourceLedger};
use crate::domain::value_objects::{EntryId, ResourceClass};
use crate::shared::error::AppError;
use async_trait::async_trait;

pub const CHECKOUTS_KEY: &str = "checkedOutCarts";
pub const PERMITS_KEY: &str = "parkingPermits";
pub const ALERTED_CARTS_KEY: &str = "alertedCarts";
pub const ALERTED_PERMITS_KEY: &str = "alertedPermits";
pub const NAMESPACE_CODE_KEY: &str = "staffCode";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Local,
    Remote,
}

/// ある時点の台帳と警告済みマーカーの複製。保存はロック解放後にこれを使う。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerSnapshot {
    pub carts: Vec<CartCheckout>,
    pub permits: Vec<ParkingPermit>,
    pub alerted_carts: Vec<EntryId>,
    pub alerted_permits: Vec<EntryId>,
}

impl LedgerSnapshot {
    pub fn capture(ledger: &ResourceLedger, registry: &OverdueRegistry) -> Self {
        Self {
            carts: ledger.checkouts().to_vec(),
            permits: ledger.permits().to_vec(),
            alerted_carts: registry.alerted_ids(ResourceClass::Cart),
            alerted_permits: registry.alerted_ids(ResourceClass::Permit),
        }
    }
}

#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    fn backend(&self) -> Backend;

    async fn save(&self, snapshot: &LedgerSnapshot) -> Result<(), AppError>;

    async fn load(&self) -> Result<LedgerSnapshot, AppError>;
}
