use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::Field;

/// 論理フィールド名からJIRAのフィールドIDへの対応表
///
/// 起動時に一度だけ構築し、以後は読み取り専用で共有する。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldMapping {
    ids: HashMap<String, String>,
}

impl FieldMapping {
    /// フィールドカタログと設定（論理名 -> 表示名）から対応表を構築
    ///
    /// 表示名は大文字小文字を区別せず完全一致で照合する。1つでも見つからなければ
    /// その表示名を含む `Error::FieldNotFound` を返し、部分的な対応表は返さない。
    pub fn resolve(catalog: &[Field], labels: &BTreeMap<String, String>) -> Result<Self> {
        let mut ids = HashMap::with_capacity(labels.len());

        for (logical_name, label) in labels {
            let wanted = label.to_lowercase();
            let field = catalog
                .iter()
                .find(|f| f.name.to_lowercase() == wanted)
                .ok_or_else(|| Error::FieldNotFound(label.clone()))?;

            debug!(logical_name = %logical_name, field_id = %field.id, "resolved field");
            ids.insert(logical_name.clone(), field.id.clone());
        }

        Ok(Self { ids })
    }

    pub fn get(&self, logical_name: &str) -> Option<&str> {
        self.ids.get(logical_name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
