use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::Status;
use crate::time_util::{JIRA_FORMAT, jira_offset_timestamp, jira_timestamp};

/// 検索APIが返す課題レコード（取得時点の読み取り専用スナップショット）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    #[serde(default)]
    pub id: String,
    pub key: String,
    #[serde(rename = "self")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub self_url: Option<String>,
    pub fields: IssueFields,
    /// `expand=changelog` を指定しなかった場合は `None`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changelog: Option<Changelog>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueFields {
    /// 作成日時（JIRAが返したオフセットのまま）
    #[serde(with = "jira_offset_timestamp")]
    pub created: DateTime<FixedOffset>,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    // それ以外のフィールドはフィールドIDをキーにそのまま保持
    #[serde(flatten)]
    pub values: HashMap<String, serde_json::Value>,
}

impl IssueFields {
    /// フィールドIDに対応する生の値を取得
    ///
    /// 型付きで保持している `status` / `summary` / `created` もJSON値として返す。
    pub fn raw_value(&self, field_id: &str) -> Option<serde_json::Value> {
        match field_id {
            "status" => serde_json::to_value(&self.status).ok(),
            "summary" => self.summary.clone().map(serde_json::Value::String),
            "created" => Some(serde_json::Value::String(
                self.created.format(JIRA_FORMAT).to_string(),
            )),
            _ => self.values.get(field_id).cloned(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Changelog {
    #[serde(rename = "startAt")]
    #[serde(default)]
    pub start_at: u32,
    #[serde(rename = "maxResults")]
    #[serde(default)]
    pub max_results: u32,
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub histories: Vec<History>,
}

/// 1回の変更操作で記録されたフィールド変更のまとまり
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct History {
    #[serde(default)]
    pub id: String,
    #[serde(with = "jira_timestamp")]
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub items: Vec<HistoryItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryItem {
    pub field: String,
    #[serde(rename = "fieldtype")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(rename = "fromString")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_string: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(rename = "toString")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_string: Option<String>,
}
