use crate::domain::value_objects::EntryId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 発行中の駐車許可証。ナンバーは大文字に正規化済み。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParkingPermit {
    pub license_plate: String,
    pub phone_number: String,
    pub issue_time: DateTime<Utc>,
    pub id: EntryId,
}

pub fn normalize_plate(raw: &str) -> String {
    raw.trim().to_uppercase()
}
