//! changelogを再生して課題の状態遷移をスナップショット列として復元する。
//!
//! JIRAの変更履歴は差分しか記録しないため、作成時点の値は最初の変更の `fromString`
//! から求め、変更が一度もなければ現在値をそのまま作成時の値とみなす。

use serde_json::Value;

use crate::models::{History, HistoryItem, Issue};
use crate::snapshot::{SizeSnapshot, StatusSnapshot};

pub const STATUS_FIELD: &str = "status";
pub const RESOLUTION_FIELD: &str = "resolution";

/// 全historyの変更項目を順に辿るカーソル
///
/// 3つ目の値はそのhistoryの最初の項目であれば `true`。
#[derive(Debug, Clone)]
struct ItemCursor<'a> {
    histories: &'a [History],
    history_idx: usize,
    item_idx: usize,
}

impl<'a> ItemCursor<'a> {
    fn new(histories: &'a [History]) -> Self {
        Self {
            histories,
            history_idx: 0,
            item_idx: 0,
        }
    }
}

impl<'a> Iterator for ItemCursor<'a> {
    type Item = (&'a History, &'a HistoryItem, bool);

    fn next(&mut self) -> Option<Self::Item> {
        let histories = self.histories;
        while let Some(history) = histories.get(self.history_idx) {
            if let Some(item) = history.items.get(self.item_idx) {
                let first = self.item_idx == 0;
                self.item_idx += 1;
                return Some((history, item, first));
            }
            self.history_idx += 1;
            self.item_idx = 0;
        }
        None
    }
}

fn histories(issue: &Issue) -> Option<&[History]> {
    issue.changelog.as_ref().map(|c| c.histories.as_slice())
}

/// 指定フィールドの最初の変更を探す
fn first_change<'a>(histories: &'a [History], field: &str) -> Option<&'a HistoryItem> {
    histories
        .iter()
        .flat_map(|h| h.items.iter())
        .find(|item| item.field == field)
}

/// ステータス/解決状況のスナップショット列
///
/// 最初に作成時点のスナップショットを1件返し、その後はステータス変更（と、有効なら解決状況の変更）
/// ごとに1件ずつchangelogの順序で返す。changelogが展開されていない課題では空になる。
#[derive(Debug, Clone)]
pub struct StatusChanges<'a> {
    key: &'a str,
    cursor: ItemCursor<'a>,
    created: Option<StatusSnapshot>,
    include_resolution_changes: bool,
    last_status: Option<String>,
    last_resolution: Option<String>,
    is_resolved: bool,
}

impl<'a> StatusChanges<'a> {
    pub fn new(issue: &'a Issue, include_resolution_changes: bool) -> Self {
        let histories = histories(issue);

        let last_status = histories.map(|h| match first_change(h, STATUS_FIELD) {
            Some(item) => item.from_string.clone(),
            None => Some(issue.fields.status.name.clone()),
        });

        let created = last_status.as_ref().map(|status| {
            StatusSnapshot::new(
                None,
                &issue.key,
                issue.fields.created,
                status.clone(),
                None,
                false,
            )
        });

        Self {
            key: &issue.key,
            cursor: ItemCursor::new(histories.unwrap_or_default()),
            created,
            include_resolution_changes,
            last_status: last_status.flatten(),
            last_resolution: None,
            is_resolved: false,
        }
    }

    fn snapshot(&self, change: &str, history: &History) -> StatusSnapshot {
        StatusSnapshot::new(
            Some(change),
            self.key,
            history.created,
            self.last_status.clone(),
            self.last_resolution.clone(),
            self.is_resolved,
        )
    }
}

impl Iterator for StatusChanges<'_> {
    type Item = StatusSnapshot;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(created) = self.created.take() {
            return Some(created);
        }

        while let Some((history, item, first)) = self.cursor.next() {
            if first {
                // historyに入った時点で、最後の解決状況の変更を先に反映する
                if let Some(last) = history
                    .items
                    .iter()
                    .rev()
                    .find(|i| i.field == RESOLUTION_FIELD)
                {
                    if last.to.is_some() {
                        self.is_resolved = true;
                    }
                    self.last_resolution = last.to_string.clone();
                }
            }

            match item.field.as_str() {
                STATUS_FIELD => {
                    self.last_status = item.to_string.clone();
                    return Some(self.snapshot(STATUS_FIELD, history));
                }
                RESOLUTION_FIELD => {
                    self.last_resolution = item.to_string.clone();
                    if self.include_resolution_changes {
                        return Some(self.snapshot(RESOLUTION_FIELD, history));
                    }
                }
                _ => {}
            }
        }

        None
    }
}

/// サイズ（見積もり）のスナップショット列
#[derive(Debug, Clone)]
pub struct SizeChanges<'a> {
    key: &'a str,
    field_name: &'a str,
    cursor: ItemCursor<'a>,
    created: Option<SizeSnapshot>,
}

impl<'a> SizeChanges<'a> {
    /// `field_name` はchangelogに記録されるフィールド名、`current_size` は課題の現在値
    pub fn new(issue: &'a Issue, field_name: &'a str, current_size: Option<String>) -> Self {
        let histories = histories(issue);

        let created = histories.map(|h| {
            let size = match first_change(h, field_name) {
                Some(item) => item.from_string.clone(),
                None => current_size,
            };
            SizeSnapshot::new(None, &issue.key, issue.fields.created, size)
        });

        Self {
            key: &issue.key,
            field_name,
            cursor: ItemCursor::new(histories.unwrap_or_default()),
            created,
        }
    }
}

impl Iterator for SizeChanges<'_> {
    type Item = SizeSnapshot;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(created) = self.created.take() {
            return Some(created);
        }

        let field_name = self.field_name;
        let (history, item, _) = self.cursor.find(|(_, item, _)| item.field == field_name)?;

        Some(SizeSnapshot::new(
            Some(field_name),
            self.key,
            history.created,
            item.to_string.clone(),
        ))
    }
}

/// ステータス/解決状況の変更ごとのスナップショットを遅延生成
pub fn iter_changes(issue: &Issue, include_resolution_changes: bool) -> StatusChanges<'_> {
    StatusChanges::new(issue, include_resolution_changes)
}

/// サイズ変更ごとのスナップショットを遅延生成
///
/// `field_id` は現在値を取り出すためのフィールドID（マッピングにない場合は `None`）。
pub fn iter_size_changes<'a>(
    issue: &'a Issue,
    field_name: &'a str,
    field_id: Option<&str>,
) -> SizeChanges<'a> {
    let current_size = field_id
        .and_then(|id| issue.fields.raw_value(id))
        .and_then(|v| raw_size(&v));
    SizeChanges::new(issue, field_name, current_size)
}

/// 現在値を文字列のまま取り出す（数値への変換はしない）
fn raw_size(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn issue_with(changelog: Option<serde_json::Value>) -> Issue {
        let mut raw = json!({
            "id": "10000",
            "key": "TEST-1",
            "fields": {
                "status": {"name": "Done"},
                "created": "2024-01-01T00:00:00.000+0000",
                "customfield_10002": 8.0
            }
        });
        if let Some(changelog) = changelog {
            raw["changelog"] = changelog;
        }
        serde_json::from_value(raw).unwrap()
    }

    fn item(field: &str, from: Option<&str>, to: Option<&str>) -> serde_json::Value {
        json!({
            "field": field,
            "from": from.map(|_| "id"),
            "fromString": from,
            "to": to.map(|_| "id"),
            "toString": to
        })
    }

    fn history(created: &str, items: Vec<serde_json::Value>) -> serde_json::Value {
        json!({"id": created, "created": created, "items": items})
    }

    #[test]
    fn test_missing_changelog_yields_nothing() {
        let issue = issue_with(None);

        assert_eq!(iter_changes(&issue, true).count(), 0);
        assert_eq!(
            iter_size_changes(&issue, "Story Points", Some("customfield_10002")).count(),
            0
        );
    }

    #[test]
    fn test_empty_changelog_yields_creation_only() {
        // Given: 一度も変更されていない課題
        let issue = issue_with(Some(json!({"histories": []})));

        // When: 再生
        let statuses: Vec<_> = iter_changes(&issue, true).collect();
        let sizes: Vec<_> = iter_size_changes(&issue, "Story Points", Some("customfield_10002")).collect();

        // Then: 現在値を作成時の値とする作成スナップショットのみ
        assert_eq!(statuses.len(), 1);
        assert!(statuses[0].is_creation());
        assert_eq!(statuses[0].status.as_deref(), Some("Done"));
        assert_eq!(statuses[0].resolution, None);
        assert!(!statuses[0].is_resolved);
        assert_eq!(
            statuses[0].date,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );

        assert_eq!(sizes.len(), 1);
        assert!(sizes[0].is_creation());
        assert_eq!(sizes[0].size.as_deref(), Some("8.0"));
    }

    #[test]
    fn test_status_and_resolution_in_same_history() {
        // Given: 同じhistoryでステータス変更と解決状況の設定
        let issue = issue_with(Some(json!({"histories": [
            history("2024-01-02T10:00:00.000+0000", vec![
                item("status", Some("Open"), Some("In Progress")),
                item("resolution", None, Some("Fixed")),
            ]),
        ]})));

        // When: 解決状況の変更も含めて再生
        let snapshots: Vec<_> = iter_changes(&issue, true).collect();

        // Then: ステータス変更時点で既に解決済み扱い
        assert_eq!(snapshots.len(), 3);
        assert_eq!(snapshots[0].status.as_deref(), Some("Open"));
        assert!(!snapshots[0].is_resolved);

        assert_eq!(snapshots[1].change.as_deref(), Some("status"));
        assert_eq!(snapshots[1].status.as_deref(), Some("In Progress"));
        assert!(snapshots[1].is_resolved);
        assert_eq!(snapshots[1].resolution.as_deref(), Some("Fixed"));

        assert_eq!(snapshots[2].change.as_deref(), Some("resolution"));
        assert_eq!(snapshots[2].status.as_deref(), Some("In Progress"));
        assert_eq!(snapshots[2].resolution.as_deref(), Some("Fixed"));
        assert!(snapshots[2].is_resolved);
    }

    #[test]
    fn test_resolution_first_is_visible_on_status_snapshot() {
        let issue = issue_with(Some(json!({"histories": [
            history("2024-01-02T10:00:00.000+0000", vec![
                item("resolution", None, Some("Fixed")),
                item("status", Some("Open"), Some("In Progress")),
            ]),
        ]})));

        let snapshots: Vec<_> = iter_changes(&issue, true).collect();

        assert_eq!(snapshots.len(), 3);
        assert_eq!(snapshots[2].change.as_deref(), Some("status"));
        assert_eq!(snapshots[2].resolution.as_deref(), Some("Fixed"));
        assert!(snapshots[2].is_resolved);
    }

    #[test]
    fn test_resolution_changes_can_be_excluded() {
        let issue = issue_with(Some(json!({"histories": [
            history("2024-01-02T10:00:00.000+0000", vec![
                item("resolution", None, Some("Fixed")),
                item("status", Some("Open"), Some("Done")),
            ]),
        ]})));

        let snapshots: Vec<_> = iter_changes(&issue, false).collect();

        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[1].change.as_deref(), Some("status"));
        assert_eq!(snapshots[1].resolution.as_deref(), Some("Fixed"));
        assert!(snapshots[1].is_resolved);
    }

    #[test]
    fn test_resolution_set_and_cleared_in_same_history() {
        // Given: 同じhistoryで解決状況を設定してすぐにクリア
        let issue = issue_with(Some(json!({"histories": [
            history("2024-01-02T10:00:00.000+0000", vec![
                item("status", Some("Open"), Some("Done")),
                item("resolution", None, Some("Fixed")),
                item("resolution", Some("Fixed"), None),
            ]),
        ]})));

        // When: 解決状況の変更も含めて再生
        let snapshots: Vec<_> = iter_changes(&issue, true).collect();

        // Then: 最後の変更がクリアなので解決済みにはならない
        assert_eq!(snapshots.len(), 4);
        assert!(snapshots.iter().all(|s| !s.is_resolved));
        assert_eq!(snapshots[1].change.as_deref(), Some("status"));
        assert_eq!(snapshots[1].resolution, None);
        assert_eq!(snapshots[2].resolution.as_deref(), Some("Fixed"));
        assert_eq!(snapshots[3].resolution, None);
    }

    #[test]
    fn test_last_resolution_change_in_history_decides_resolved() {
        // Given: クリア -> ステータス変更 -> 再設定 の順に並んだhistory
        let issue = issue_with(Some(json!({"histories": [
            history("2024-01-02T10:00:00.000+0000", vec![
                item("resolution", Some("Fixed"), None),
                item("status", Some("Open"), Some("Done")),
                item("resolution", None, Some("Done")),
            ]),
        ]})));

        // When: ステータス変更のみ / 解決状況の変更も含めて再生
        let statuses: Vec<_> = iter_changes(&issue, false).collect();
        let all: Vec<_> = iter_changes(&issue, true).collect();

        // Then: ステータス変更の時点で解決済み
        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[1].change.as_deref(), Some("status"));
        assert!(statuses[1].is_resolved);

        let flags: Vec<_> = all.iter().map(|s| s.is_resolved).collect();
        assert_eq!(flags, vec![false, true, true, true]);
        assert_eq!(all[3].resolution.as_deref(), Some("Done"));
    }

    #[test]
    fn test_creation_status_comes_from_first_status_change() {
        // Given: 無関係な変更を挟んだ複数のステータス変更
        let issue = issue_with(Some(json!({"histories": [
            history("2024-01-02T10:00:00.000+0000", vec![
                item("assignee", None, Some("Jane Doe")),
            ]),
            history("2024-01-03T10:00:00.000+0000", vec![
                item("status", Some("Backlog"), Some("In Progress")),
            ]),
            history("2024-01-04T10:00:00.000+0000", vec![
                item("summary", Some("old"), Some("new")),
                item("status", Some("In Progress"), Some("Done")),
            ]),
        ]})));

        let snapshots: Vec<_> = iter_changes(&issue, true).collect();

        let statuses: Vec<_> = snapshots.iter().map(|s| s.status.as_deref()).collect();
        assert_eq!(
            statuses,
            vec![Some("Backlog"), Some("In Progress"), Some("Done")]
        );
        assert_eq!(
            snapshots[2].date,
            Utc.with_ymd_and_hms(2024, 1, 4, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_is_resolved_never_goes_back() {
        // Given: 解決 -> 再オープン（解決状況クリア）
        let issue = issue_with(Some(json!({"histories": [
            history("2024-01-02T10:00:00.000+0000", vec![
                item("status", Some("Open"), Some("Done")),
                item("resolution", None, Some("Fixed")),
            ]),
            history("2024-01-03T10:00:00.000+0000", vec![
                item("status", Some("Done"), Some("Reopened")),
                item("resolution", Some("Fixed"), None),
            ]),
        ]})));

        let snapshots: Vec<_> = iter_changes(&issue, true).collect();

        let flags: Vec<_> = snapshots.iter().map(|s| s.is_resolved).collect();
        assert_eq!(flags, vec![false, true, true, true, true]);
        assert!(flags.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(snapshots[4].resolution, None);
    }

    #[test]
    fn test_size_replay() {
        let issue = issue_with(Some(json!({"histories": [
            history("2024-01-02T10:00:00.000+0000", vec![
                item("status", Some("Open"), Some("In Progress")),
                item("Story Points", Some("3"), Some("5")),
            ]),
            history("2024-01-05T10:00:00.000+0000", vec![
                item("Story Points", Some("5"), Some("8")),
            ]),
        ]})));

        let sizes: Vec<_> =
            iter_size_changes(&issue, "Story Points", Some("customfield_10002")).collect();

        let values: Vec<_> = sizes.iter().map(|s| s.size.as_deref()).collect();
        assert_eq!(values, vec![Some("3"), Some("5"), Some("8")]);
        assert_eq!(sizes[1].change.as_deref(), Some("Story Points"));
        assert_eq!(
            sizes[2].date,
            Utc.with_ymd_and_hms(2024, 1, 5, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_size_set_after_creation_starts_empty() {
        let issue = issue_with(Some(json!({"histories": [
            history("2024-01-02T10:00:00.000+0000", vec![
                item("Story Points", None, Some("8")),
            ]),
        ]})));

        let sizes: Vec<_> = iter_size_changes(&issue, "Story Points", None).collect();

        assert_eq!(sizes.len(), 2);
        assert_eq!(sizes[0].size, None);
        assert_eq!(sizes[1].size.as_deref(), Some("8"));
    }

    #[test]
    fn test_size_without_mapping_or_changes() {
        let issue = issue_with(Some(json!({"histories": []})));

        let sizes: Vec<_> = iter_size_changes(&issue, "Story Points", None).collect();

        assert_eq!(sizes.len(), 1);
        assert_eq!(sizes[0].size, None);
    }

    #[test]
    fn test_sequences_are_lazy() {
        let issue = issue_with(Some(json!({"histories": [
            history("2024-01-02T10:00:00.000+0000", vec![
                item("status", Some("Open"), Some("In Progress")),
            ]),
            history("2024-01-03T10:00:00.000+0000", vec![
                item("status", Some("In Progress"), Some("Done")),
            ]),
        ]})));

        let mut changes = iter_changes(&issue, true);

        assert!(changes.next().unwrap().is_creation());
        assert_eq!(changes.next().unwrap().status.as_deref(), Some("In Progress"));
        assert_eq!(changes.next().unwrap().status.as_deref(), Some("Done"));
        assert!(changes.next().is_none());
        assert!(changes.next().is_none());
    }
}
