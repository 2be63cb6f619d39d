use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncReadExt;

use crate::error::Result;

/// サイズ変更履歴でchangelog側に記録されるデフォルトのフィールド名
pub const DEFAULT_SIZE_FIELD_LABEL: &str = "Story Points";

/// クエリ実行と値の正規化に関する設定
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QuerySettings {
    /// 論理フィールド名 -> JIRA上のフィールド表示名
    pub fields: BTreeMap<String, String>,
    /// 論理フィールド名 -> 優先順に並べた既知の値
    pub known_values: HashMap<String, Vec<String>>,
    /// 1ページあたりの取得件数
    pub max_results: u32,
    /// デフォルトの並び順（JQLの ORDER BY 句）
    pub order: String,
    /// デフォルトでchangelogを展開するか
    pub changelog: bool,
    /// サイズ（見積もり）を表す論理フィールド名
    pub size_field: String,
}

impl QuerySettings {
    pub fn new() -> Self {
        Self {
            fields: BTreeMap::new(),
            known_values: HashMap::new(),
            max_results: 500,
            order: "KEY ASC".to_string(),
            changelog: true,
            size_field: "StoryPoints".to_string(),
        }
    }

    pub fn field(mut self, logical_name: impl Into<String>, label: impl Into<String>) -> Self {
        self.fields.insert(logical_name.into(), label.into());
        self
    }

    pub fn known_values(mut self, logical_name: impl Into<String>, values: Vec<String>) -> Self {
        self.known_values.insert(logical_name.into(), values);
        self
    }

    pub fn max_results(mut self, max_results: u32) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn order(mut self, order: impl Into<String>) -> Self {
        self.order = order.into();
        self
    }

    pub fn changelog(mut self, changelog: bool) -> Self {
        self.changelog = changelog;
        self
    }

    pub fn size_field(mut self, logical_name: impl Into<String>) -> Self {
        self.size_field = logical_name.into();
        self
    }

    /// サイズフィールドがchangelogに記録される名前（未設定なら "Story Points"）
    pub fn size_field_label(&self) -> &str {
        self.fields
            .get(&self.size_field)
            .map(String::as_str)
            .unwrap_or(DEFAULT_SIZE_FIELD_LABEL)
    }

    /// JSONファイルから設定を読み込み（省略された項目はデフォルト値）
    pub async fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = fs::File::open(path.as_ref()).await?;

        let mut contents = String::new();
        file.read_to_string(&mut contents).await?;

        if contents.trim().is_empty() {
            return Ok(Self::default());
        }

        Ok(serde_json::from_str(&contents)?)
    }
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self::new()
    }
}
