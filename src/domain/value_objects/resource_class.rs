use serde::{Deserialize, Serialize};
use std::fmt;

/// 貸し出すリソースの種別。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceClass {
    Cart,
    Permit,
}

impl ResourceClass {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ResourceClass::Cart => "cart",
            ResourceClass::Permit => "permit",
        }
    }

    /// 種別ごとの既定の制限時間（分）。
    pub const fn default_limit_minutes(&self) -> i64 {
        match self {
            ResourceClass::Cart => 30,
            ResourceClass::Permit => 15,
        }
    }
}

impl fmt::Display for ResourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
