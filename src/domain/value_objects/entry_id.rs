use serde::{Deserialize, Serialize};
use std::fmt;

/// 貸出・許可証エントリの識別子。削除と警告済みマーカーのキーになる。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntryId(String);

impl EntryId {
    /// 既存の識別子文字列から `EntryId` を生成する。
    ///
    /// 旧データのタイムスタンプ由来 ID もそのまま受け入れる。
    pub fn new(value: String) -> Result<Self, String> {
        if value.trim().is_empty() {
            return Err("EntryId cannot be empty".to_string());
        }
        Ok(Self(value))
    }

    /// 新規 EntryId を生成する。
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for EntryId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EntryId> for String {
    fn from(value: EntryId) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_ids_do_not_collide() {
        let ids: std::collections::HashSet<_> = (0..1000).map(|_| EntryId::random()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn legacy_timestamp_ids_deserialize() {
        let id: EntryId = serde_json::from_str("\"1714550400000\"").unwrap();
        assert_eq!(id.as_str(), "1714550400000");
        assert!(serde_json::from_str::<EntryId>("\"  \"").is_err());
    }
}
