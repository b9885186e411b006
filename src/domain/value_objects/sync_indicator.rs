use serde::{Deserialize, Serialize};
use std::fmt;

/// UI に表示する同期ステータス。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum SyncIndicator {
    Local,
    Connecting(String),
    Synced(String),
    Error(String),
}

impl SyncIndicator {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncIndicator::Local => "local",
            SyncIndicator::Connecting(_) => "connecting",
            SyncIndicator::Synced(_) => "synced",
            SyncIndicator::Error(_) => "error",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, SyncIndicator::Error(_))
    }
}

impl fmt::Display for SyncIndicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncIndicator::Local => write!(f, "Local Mode"),
            SyncIndicator::Connecting(code) => write!(f, "Connecting: {code}"),
            SyncIndicator::Synced(code) => write!(f, "Synced: {code}"),
            SyncIndicator::Error(message) => write!(f, "{message}"),
        }
    }
}
