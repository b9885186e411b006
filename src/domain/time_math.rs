//! 経過時間・残り時間・緊急度の計算。状態を持たない純粋関数のみ。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

const MILLIS_PER_MINUTE: i64 = 60_000;
const CRITICAL_THRESHOLD_MINUTES: i64 = 5;
const WARNING_THRESHOLD_MINUTES: i64 = 10;

pub const OVERDUE_TEXT: &str = "OVERDUE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Normal,
    Warning,
    Critical,
}

impl Urgency {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Urgency::Normal => "normal",
            Urgency::Warning => "warning",
            Urgency::Critical => "critical",
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 経過分数。表示は `"{h}h {m}m"` または `"{m}m"`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Elapsed {
    pub minutes: i64,
}

impl fmt::Display for Elapsed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_minutes(self.minutes))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Countdown {
    pub text: String,
    pub is_overdue: bool,
    pub urgency: Urgency,
}

/// ミリ秒差を分に切り捨てる。負の差（時計のずれ）も床関数で扱う。
pub fn elapsed_minutes(since: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let millis = (now - since).num_milliseconds();
    millis.div_euclid(MILLIS_PER_MINUTE)
}

pub fn format_minutes(minutes: i64) -> String {
    if minutes >= 60 {
        format!("{}h {}m", minutes / 60, minutes % 60)
    } else {
        format!("{minutes}m")
    }
}

pub fn elapsed(since: DateTime<Utc>, now: DateTime<Utc>) -> Elapsed {
    Elapsed {
        minutes: elapsed_minutes(since, now),
    }
}

pub fn countdown(since: DateTime<Utc>, limit_minutes: i64, now: DateTime<Utc>) -> Countdown {
    let remaining = limit_minutes.saturating_sub(elapsed_minutes(since, now));

    if remaining <= 0 {
        return Countdown {
            text: OVERDUE_TEXT.to_string(),
            is_overdue: true,
            urgency: Urgency::Critical,
        };
    }

    let urgency = if remaining <= CRITICAL_THRESHOLD_MINUTES {
        Urgency::Critical
    } else if remaining <= WARNING_THRESHOLD_MINUTES {
        Urgency::Warning
    } else {
        Urgency::Normal
    };

    Countdown {
        text: format!("{} left", format_minutes(remaining)),
        is_overdue: false,
        urgency,
    }
}

pub fn is_overdue(since: DateTime<Utc>, limit_minutes: i64, now: DateTime<Utc>) -> bool {
    elapsed_minutes(since, now) >= limit_minutes
}
