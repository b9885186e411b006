use super::{CartCheckout, ParkingPermit};
use crate::domain::time_math;
use crate::domain::value_objects::{EntryId, ResourceClass};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// 延滞を知らせる一時的な警告。表示専用で、一定時間後に自動的に消える。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub class: ResourceClass,
    pub entry_id: EntryId,
    pub label: String,
    pub phone_number: String,
    pub elapsed: String,
    pub raised_at: DateTime<Utc>,
    pub dismiss_at: DateTime<Utc>,
}

impl Alert {
    pub fn for_cart(cart: &CartCheckout, now: DateTime<Utc>, dismiss_after: Duration) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            class: ResourceClass::Cart,
            entry_id: cart.id.clone(),
            label: format!("Cart #{}", cart.number),
            phone_number: cart.phone_number.clone(),
            elapsed: time_math::elapsed(cart.checkout_time, now).to_string(),
            raised_at: now,
            dismiss_at: now + dismiss_after,
        }
    }

    pub fn for_permit(permit: &ParkingPermit, now: DateTime<Utc>, dismiss_after: Duration) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            class: ResourceClass::Permit,
            entry_id: permit.id.clone(),
            label: permit.license_plate.clone(),
            phone_number: permit.phone_number.clone(),
            elapsed: time_math::elapsed(permit.issue_time, now).to_string(),
            raised_at: now,
            dismiss_at: now + dismiss_after,
        }
    }

    pub fn title(&self) -> &'static str {
        match self.class {
            ResourceClass::Cart => "OVERDUE CART!",
            ResourceClass::Permit => "PARKING PERMIT EXPIRED!",
        }
    }

    pub fn message(&self) -> String {
        match self.class {
            ResourceClass::Cart => format!(
                "{} has been out for {}. Call: {}",
                self.label, self.elapsed, self.phone_number
            ),
            ResourceClass::Permit => format!(
                "{} has been parked for {}. Call: {}",
                self.label, self.elapsed, self.phone_number
            ),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.dismiss_at
    }
}
