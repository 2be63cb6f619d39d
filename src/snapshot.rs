use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// 変更履歴のある時点における課題のステータス/解決状況
///
/// `change` が `None` のものは課題作成時点を表す。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub change: Option<String>,
    pub key: String,
    pub date: DateTime<Utc>,
    pub status: Option<String>,
    pub resolution: Option<String>,
    pub is_resolved: bool,
}

impl StatusSnapshot {
    pub fn new<Tz: TimeZone>(
        change: Option<&str>,
        key: &str,
        date: DateTime<Tz>,
        status: Option<String>,
        resolution: Option<String>,
        is_resolved: bool,
    ) -> Self {
        Self {
            change: change.map(str::to_string),
            key: key.to_string(),
            date: date.with_timezone(&Utc),
            status,
            resolution,
            is_resolved,
        }
    }

    pub fn is_creation(&self) -> bool {
        self.change.is_none()
    }
}

// 同じ課題のスナップショットは同じバケットに入る
impl Hash for StatusSnapshot {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<IssueSnapshot change={} key={} date={} status={} resolution={} is_resolved={}>",
            display_opt(&self.change),
            self.key,
            self.date.to_rfc3339_opts(SecondsFormat::AutoSi, false),
            display_opt(&self.status),
            display_opt(&self.resolution),
            self.is_resolved
        )
    }
}

/// 変更履歴のある時点における課題のサイズ（見積もり）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SizeSnapshot {
    pub change: Option<String>,
    pub key: String,
    pub date: DateTime<Utc>,
    /// changelogに記録された文字列のまま保持する
    pub size: Option<String>,
}

impl SizeSnapshot {
    pub fn new<Tz: TimeZone>(
        change: Option<&str>,
        key: &str,
        date: DateTime<Tz>,
        size: Option<String>,
    ) -> Self {
        Self {
            change: change.map(str::to_string),
            key: key.to_string(),
            date: date.with_timezone(&Utc),
            size,
        }
    }

    pub fn is_creation(&self) -> bool {
        self.change.is_none()
    }
}

impl Hash for SizeSnapshot {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Display for SizeSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<IssueSnapshot change={} key={} date={} size={}>",
            display_opt(&self.change),
            self.key,
            self.date.to_rfc3339_opts(SecondsFormat::AutoSi, false),
            display_opt(&self.size)
        )
    }
}

fn display_opt(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("None")
}
