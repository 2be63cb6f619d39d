use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

use crate::models::Issue;

/// JIRAのリソースオブジェクトで人が読める値を持つ可能性が高いキー（優先順）
const READABLE_KEYS: [&str; 10] = [
    "displayName",
    "key",
    "name",
    "filename",
    "value",
    "scope",
    "votes",
    "id",
    "mimeType",
    "closed",
];

static DATE_LIKE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(\d{4})[- ]?(\d\d)[- ]?(\d\d)[T ](\d\d):(\d\d):(\d\d)([.+])(\d{2,6})[+\-:]\d{2,6}$",
    )
    .expect("date-like field value regex")
});

/// 正規化後のスカラー値
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Number(f64),
    /// タイムゾーンを落とした日時（表計算向けのローカル時刻扱い）
    DateTime(NaiveDateTime),
    Text(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Number(n) => write!(f, "{}", n),
            FieldValue::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S%.f")),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

/// 課題のフィールド値を比較可能なスカラーに変換する
///
/// 外部データは壊れている前提で扱い、失敗は常に `None` か最善努力の文字列に吸収する。
#[derive(Debug, Clone, Default)]
pub struct ValueNormalizer {
    known_values: HashMap<String, Vec<String>>,
}

impl ValueNormalizer {
    pub fn new(known_values: HashMap<String, Vec<String>>) -> Self {
        Self { known_values }
    }

    /// 論理フィールド名に設定された既知の値（優先順）
    pub fn known_values(&self, logical_name: &str) -> Option<&[String]> {
        self.known_values.get(logical_name).map(Vec::as_slice)
    }

    pub fn normalize(&self, logical_name: &str, raw: Option<&Value>) -> Option<FieldValue> {
        normalize_value(raw, self.known_values(logical_name))
    }

    /// 課題からフィールドIDで値を取り出して正規化
    pub fn normalize_issue_field(
        &self,
        issue: &Issue,
        logical_name: &str,
        field_id: &str,
    ) -> Option<FieldValue> {
        let raw = issue.fields.raw_value(field_id);
        self.normalize(logical_name, raw.as_ref())
    }
}

/// 生のフィールド値を正規化
///
/// `known_values` が `Some` の場合、複数値フィールドはその順序で最初に含まれていた値1つに畳み込まれる。
pub fn normalize_value(raw: Option<&Value>, known_values: Option<&[String]>) -> Option<FieldValue> {
    let raw = raw?;
    if raw.is_null() {
        return None;
    }

    match unwrap_record(raw) {
        Value::Null => None,
        Value::Array(items) => collapse_list(&items, known_values),
        Value::Bool(b) => Some(FieldValue::Bool(b)),
        Value::Number(n) => Some(
            n.as_f64()
                .map(FieldValue::Number)
                .unwrap_or_else(|| FieldValue::Text(n.to_string())),
        ),
        Value::String(s) => Some(text_or_date(s)),
        Value::Object(map) => Some(text_or_date(readable_text(&map))),
    }
}

/// `{"value": ..., "child": {"value": ...}}` 形式のレコードから値を取り出す
fn unwrap_record(raw: &Value) -> Value {
    let Some(map) = raw.as_object() else {
        return raw.clone();
    };

    let value = match map.get("value") {
        Some(v) if !v.is_null() => v.clone(),
        _ => return raw.clone(),
    };

    let child = map
        .get("child")
        .and_then(|c| c.get("value"))
        .and_then(Value::as_str)
        .filter(|c| !c.is_empty());

    match (value, child) {
        (Value::String(parent), Some(child)) => Value::String(format!("{}|{}", parent, child)),
        (value, _) => value,
    }
}

fn collapse_list(items: &[Value], known_values: Option<&[String]>) -> Option<FieldValue> {
    if items.is_empty() {
        return None;
    }

    let names: Vec<String> = items.iter().map(element_name).collect();

    match known_values {
        None => Some(FieldValue::Text(names.join("|"))),
        Some(known) => known
            .iter()
            .find(|k| names.contains(k))
            .map(|k| FieldValue::Text(k.clone())),
    }
}

fn element_name(item: &Value) -> String {
    match item.get("name") {
        Some(name) if !name.is_null() => scalar_text(name),
        _ => scalar_text(item),
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(map) => readable_text(map),
        other => other.to_string(),
    }
}

fn readable_text(map: &Map<String, Value>) -> String {
    READABLE_KEYS
        .iter()
        .filter_map(|key| map.get(*key))
        .find(|v| !v.is_null())
        .map(scalar_text)
        .unwrap_or_else(|| Value::Object(map.clone()).to_string())
}

fn text_or_date(text: String) -> FieldValue {
    match parse_date_like(&text) {
        Some(dt) => FieldValue::DateTime(dt),
        None => FieldValue::Text(text),
    }
}

/// ISO-8601風の文字列をタイムゾーンなしの日時に変換（オフセットは捨てる）
pub fn parse_date_like(text: &str) -> Option<NaiveDateTime> {
    let caps = DATE_LIKE_RE.captures(text)?;
    let num = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());

    let year = caps.get(1)?.as_str().parse::<i32>().ok()?;
    let nanos = match caps.get(7).map(|m| m.as_str()) {
        Some(".") => {
            let digits = caps.get(8)?.as_str();
            format!("{:0<9}", digits).parse::<u32>().ok()?
        }
        // `+` の後ろはオフセットなので小数秒はない
        _ => 0,
    };

    NaiveDate::from_ymd_opt(year, num(2)?, num(3)?)?.and_hms_nano_opt(num(4)?, num(5)?, num(6)?, nanos)
}
