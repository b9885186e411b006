use serde::{Deserialize, Serialize};
use std::fmt;

/// 複数端末で台帳を共有するためのスタッフコード。
///
/// 入力は前後の空白を除去して小文字に正規化する。空文字はローカルモードを意味するため
/// `NamespaceCode` としては存在しない。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NamespaceCode(String);

impl NamespaceCode {
    pub fn new(value: String) -> Result<Self, String> {
        Self::parse(&value).ok_or_else(|| "Namespace code cannot be empty".to_string())
    }

    /// 生の入力を正規化する。空なら `None`。
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_lowercase();
        if normalized.is_empty() {
            None
        } else {
            Some(Self(normalized))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NamespaceCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for NamespaceCode {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NamespaceCode> for String {
    fn from(value: NamespaceCode) -> Self {
        value.0
    }
}
