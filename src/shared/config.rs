use crate::domain::value_objects::ResourceClass;
use serde::{Deserialize, Serialize};

/// 制限時間の上限（7 日）。
pub const MAX_LIMIT_MINUTES: i64 = 7 * 24 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub policy: PolicyConfig,
    pub alerts: AlertConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// 貸出ポリシー。制限時間はリソース種別ごとの固定値で、個々のエントリには持たせない。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PolicyConfig {
    pub cart_limit_minutes: i64,
    pub permit_limit_minutes: i64,
    pub require_student_id: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    pub tick_interval_secs: u64,
    pub dismiss_after_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub auto_resume: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://./data/cart-tracker.db?mode=rwc".to_string(),
                max_connections: 5,
            },
            policy: PolicyConfig::default(),
            alerts: AlertConfig {
                tick_interval_secs: 60,
                dismiss_after_secs: 10,
            },
            sync: SyncConfig { auto_resume: true },
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            cart_limit_minutes: ResourceClass::Cart.default_limit_minutes(),
            permit_limit_minutes: ResourceClass::Permit.default_limit_minutes(),
            require_student_id: true,
        }
    }
}

impl PolicyConfig {
    pub fn limit_minutes(&self, class: ResourceClass) -> i64 {
        match class {
            ResourceClass::Cart => self.cart_limit_minutes,
            ResourceClass::Permit => self.permit_limit_minutes,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("CART_TRACKER_DATABASE_URL") {
            let trimmed = v.trim();
            if !trimmed.is_empty() {
                cfg.database.url = trimmed.to_string();
            }
        }
        if let Some(value) = env_u64("CART_TRACKER_DB_MAX_CONNECTIONS") {
            cfg.database.max_connections = u32::try_from(value).unwrap_or(u32::MAX);
        }
        if let Some(value) = env_u64("CART_TRACKER_CART_LIMIT_MINUTES") {
            cfg.policy.cart_limit_minutes = i64::try_from(value).unwrap_or(i64::MAX);
        }
        if let Some(value) = env_u64("CART_TRACKER_PERMIT_LIMIT_MINUTES") {
            cfg.policy.permit_limit_minutes = i64::try_from(value).unwrap_or(i64::MAX);
        }
        if let Ok(v) = std::env::var("CART_TRACKER_REQUIRE_STUDENT_ID") {
            cfg.policy.require_student_id = parse_bool(&v, cfg.policy.require_student_id);
        }
        if let Some(value) = env_u64("CART_TRACKER_TICK_INTERVAL_SECS") {
            cfg.alerts.tick_interval_secs = value;
        }
        if let Some(value) = env_u64("CART_TRACKER_ALERT_DISMISS_SECS") {
            cfg.alerts.dismiss_after_secs = value;
        }
        if let Ok(v) = std::env::var("CART_TRACKER_AUTO_RESUME") {
            cfg.sync.auto_resume = parse_bool(&v, cfg.sync.auto_resume);
        }

        cfg
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.database.max_connections == 0 {
            return Err("Database max_connections must be greater than 0".to_string());
        }
        if self.policy.cart_limit_minutes <= 0 {
            return Err("Cart limit must be greater than 0 minutes".to_string());
        }
        if self.policy.permit_limit_minutes <= 0 {
            return Err("Permit limit must be greater than 0 minutes".to_string());
        }
        if self.policy.cart_limit_minutes > MAX_LIMIT_MINUTES
            || self.policy.permit_limit_minutes > MAX_LIMIT_MINUTES
        {
            return Err(format!("Limits must not exceed {MAX_LIMIT_MINUTES} minutes"));
        }
        if self.alerts.tick_interval_secs == 0 {
            return Err("Alert tick_interval_secs must be greater than 0".to_string());
        }
        if self.alerts.dismiss_after_secs == 0 {
            return Err("Alert dismiss_after_secs must be greater than 0".to_string());
        }
        Ok(())
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| parse_u64(&v))
}

fn parse_bool(s: &str, default: bool) -> bool {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

fn parse_u64(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.policy.limit_minutes(ResourceClass::Cart), 30);
        assert_eq!(cfg.policy.limit_minutes(ResourceClass::Permit), 15);
        assert_eq!(cfg.alerts.tick_interval_secs, 60);
        assert_eq!(cfg.alerts.dismiss_after_secs, 10);
    }

    #[test]
    fn validate_rejects_zero_tick_interval() {
        let mut cfg = AppConfig::default();
        cfg.alerts.tick_interval_secs = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_unbounded_limits() {
        let mut cfg = AppConfig::default();
        cfg.policy.cart_limit_minutes = i64::MAX;
        assert!(cfg.validate().is_err());

        let mut cfg = AppConfig::default();
        cfg.policy.permit_limit_minutes = MAX_LIMIT_MINUTES;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn parse_bool_falls_back_to_default() {
        assert!(parse_bool("yes", false));
        assert!(!parse_bool("OFF", true));
        assert!(parse_bool("maybe", true));
    }
}
