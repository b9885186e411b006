use crate::domain::entities::{CartCheckout, CheckoutContact, ParkingPermit, ResourceLedger};
use crate::domain::time_math::{self, Countdown};
use crate::domain::value_objects::{EntryId, ResourceClass, SyncIndicator};
use crate::shared::config::PolicyConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// リクエストDTO
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub number: String,
    #[serde(default)]
    pub student_id: Option<String>,
    pub phone_number: String,
}

impl CheckoutRequest {
    pub fn contact(&self) -> CheckoutContact {
        CheckoutContact::new(self.student_id.clone(), self.phone_number.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermitRequest {
    pub license_plate: String,
    pub phone_number: String,
}

// レスポンスDTO
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartRow {
    pub id: EntryId,
    pub number: String,
    pub student_id: Option<String>,
    pub phone_number: String,
    pub checkout_time: DateTime<Utc>,
    pub elapsed: String,
    pub countdown: Countdown,
    pub is_overdue: bool,
}

impl CartRow {
    fn build(cart: &CartCheckout, limit_minutes: i64, now: DateTime<Utc>) -> Self {
        let countdown = time_math::countdown(cart.checkout_time, limit_minutes, now);
        Self {
            id: cart.id.clone(),
            number: cart.number.clone(),
            student_id: cart.student_id.clone(),
            phone_number: cart.phone_number.clone(),
            checkout_time: cart.checkout_time,
            elapsed: time_math::elapsed(cart.checkout_time, now).to_string(),
            is_overdue: countdown.is_overdue,
            countdown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PermitRow {
    pub id: EntryId,
    pub license_plate: String,
    pub phone_number: String,
    pub issue_time: DateTime<Utc>,
    pub elapsed: String,
    pub countdown: Countdown,
    pub is_overdue: bool,
}

impl PermitRow {
    fn build(permit: &ParkingPermit, limit_minutes: i64, now: DateTime<Utc>) -> Self {
        let countdown = time_math::countdown(permit.issue_time, limit_minutes, now);
        Self {
            id: permit.id.clone(),
            license_plate: permit.license_plate.clone(),
            phone_number: permit.phone_number.clone(),
            issue_time: permit.issue_time,
            elapsed: time_math::elapsed(permit.issue_time, now).to_string(),
            is_overdue: countdown.is_overdue,
            countdown,
        }
    }
}

/// 一覧画面 1 枚分の表示データ。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerView {
    pub carts: Vec<CartRow>,
    pub permits: Vec<PermitRow>,
    pub sync: SyncIndicator,
    pub generated_at: DateTime<Utc>,
}

impl LedgerView {
    pub fn build(
        ledger: &ResourceLedger,
        policy: &PolicyConfig,
        sync: SyncIndicator,
        now: DateTime<Utc>,
    ) -> Self {
        let cart_limit = policy.limit_minutes(ResourceClass::Cart);
        let permit_limit = policy.limit_minutes(ResourceClass::Permit);
        Self {
            carts: ledger
                .checkouts()
                .iter()
                .map(|cart| CartRow::build(cart, cart_limit, now))
                .collect(),
            permits: ledger
                .permits()
                .iter()
                .map(|permit| PermitRow::build(permit, permit_limit, now))
                .collect(),
            sync,
            generated_at: now,
        }
    }

    pub fn overdue_count(&self) -> usize {
        self.carts.iter().filter(|row| row.is_overdue).count()
            + self.permits.iter().filter(|row| row.is_overdue).count()
    }

    pub fn is_empty(&self) -> bool {
        self.carts.is_empty() && self.permits.is_empty()
    }
}
