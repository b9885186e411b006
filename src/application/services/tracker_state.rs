use super::persistence_gateway::LedgerSnapshot;
use crate::domain::entities::{CartCheckout, LedgerPolicy, OverdueRegistry, ResourceLedger};
use crate::domain::value_objects::ResourceClass;
use std::sync::Arc;
use tokio::sync::RwLock;

/// 台帳と警告済みマーカー。常に同じロックの下で一緒に更新する。
#[derive(Debug, Clone, Default)]
pub struct TrackerState {
    pub ledger: ResourceLedger,
    pub registry: OverdueRegistry,
}

pub type SharedTrackerState = Arc<RwLock<TrackerState>>;

impl TrackerState {
    pub fn new(policy: LedgerPolicy) -> Self {
        Self {
            ledger: ResourceLedger::new(policy),
            registry: OverdueRegistry::new(),
        }
    }

    pub fn shared(policy: LedgerPolicy) -> SharedTrackerState {
        Arc::new(RwLock::new(Self::new(policy)))
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot::capture(&self.ledger, &self.registry)
    }

    /// ローカル保存分で台帳とマーカーをすべて置き換える。
    pub fn restore(&mut self, snapshot: LedgerSnapshot) {
        self.ledger.replace_checkouts(snapshot.carts);
        self.ledger.replace_permits(snapshot.permits);
        self.registry
            .replace(ResourceClass::Cart, snapshot.alerted_carts);
        self.registry
            .replace(ResourceClass::Permit, snapshot.alerted_permits);
    }

    /// リモートのカート一覧で置き換え、消えたエントリのマーカーを捨てる。
    pub fn apply_remote_carts(&mut self, carts: Vec<CartCheckout>) -> usize {
        self.ledger.replace_checkouts(carts);
        let TrackerState { ledger, registry } = self;
        registry.retain_active(ResourceClass::Cart, ledger.checkout_ids())
    }
}
