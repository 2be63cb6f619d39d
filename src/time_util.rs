use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};

/// JIRAのタイムスタンプ文字列を`DateTime<Utc>`にパース
///
/// JIRAは `2024-01-15T10:30:00.000+0000` のようにコロンなしのオフセットを返すため、
/// RFC3339 に加えてこの形式も受け付ける。
pub fn parse_jira_timestamp(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    parse_with_offset(s).map(|dt| dt.with_timezone(&Utc))
}

/// オフセットを保ったままパース
pub(crate) fn parse_with_offset(s: &str) -> Result<DateTime<FixedOffset>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s)
        .or_else(|_| DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z"))
}

/// JIRAが返すタイムスタンプの書式
pub(crate) const JIRA_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%z";

/// 日付をその日の0時の日時に変換
pub fn to_datetime(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

/// 時刻部分を切り捨てた日時を返す
pub fn strip_time(datetime: NaiveDateTime) -> NaiveDateTime {
    to_datetime(datetime.date())
}

/// serdeで`DateTime<Utc>`をJIRA形式として読み書きするためのモジュール
pub(crate) mod jira_timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        super::parse_jira_timestamp(&raw).map_err(serde::de::Error::custom)
    }
}

/// 課題の作成日時のように、JIRAが返したオフセットごと保持するためのモジュール
pub(crate) mod jira_offset_timestamp {
    use chrono::{DateTime, FixedOffset};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(dt: &DateTime<FixedOffset>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&dt.format(super::JIRA_FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<FixedOffset>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        super::parse_with_offset(&raw).map_err(serde::de::Error::custom)
    }
}
