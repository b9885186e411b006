use crate::domain::value_objects::EntryId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 貸出中のゴルフカート。
///
/// 保存形式のフィールド名は camelCase。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartCheckout {
    pub number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
    pub phone_number: String,
    pub checkout_time: DateTime<Utc>,
    pub id: EntryId,
}

/// 貸出時に入力される連絡先情報。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckoutContact {
    pub student_id: Option<String>,
    pub phone_number: String,
}

impl CheckoutContact {
    pub fn new(student_id: Option<String>, phone_number: impl Into<String>) -> Self {
        Self {
            student_id,
            phone_number: phone_number.into(),
        }
    }
}
