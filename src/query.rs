use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::client::IssueSearch;
use crate::error::{Error, Result};
use crate::field_resolver::FieldMapping;
use crate::models::{Issue, SearchParams};
use crate::normalize::{FieldValue, ValueNormalizer};
use crate::replay::{self, SizeChanges, StatusChanges};
use crate::settings::QuerySettings;

/// 課題検索の条件（各条件はANDで結合される）
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QueryCriteria {
    pub project: Vec<String>,
    pub issue_types: Vec<String>,
    /// 未解決、またはこのいずれかで解決された課題だけを対象にする
    pub valid_resolutions: Vec<String>,
    pub jql_filter: Option<String>,
}

impl QueryCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn project(mut self, projects: Vec<String>) -> Self {
        self.project = projects;
        self
    }

    pub fn issue_types(mut self, issue_types: Vec<String>) -> Self {
        self.issue_types = issue_types;
        self
    }

    pub fn valid_resolutions(mut self, resolutions: Vec<String>) -> Self {
        self.valid_resolutions = resolutions;
        self
    }

    pub fn jql_filter(mut self, filter: impl Into<String>) -> Self {
        self.jql_filter = Some(filter.into());
        self
    }
}

fn quoted_list(values: &[String]) -> String {
    values
        .iter()
        .map(|v| format!("\"{}\"", v.replace('"', "\\\"")))
        .collect::<Vec<_>>()
        .join(", ")
}

/// 検索条件と追加のJQLから1本のJQLを組み立てる
pub fn build_jql(criteria: &QueryCriteria, jql: Option<&str>, order: &str) -> String {
    let mut clauses = Vec::new();

    if !criteria.project.is_empty() {
        clauses.push(format!("project IN ({})", quoted_list(&criteria.project)));
    }

    if !criteria.issue_types.is_empty() {
        clauses.push(format!("issueType IN ({})", quoted_list(&criteria.issue_types)));
    }

    if !criteria.valid_resolutions.is_empty() {
        clauses.push(format!(
            "(resolution IS EMPTY OR resolution IN ({}))",
            quoted_list(&criteria.valid_resolutions)
        ));
    }

    if let Some(filter) = &criteria.jql_filter {
        clauses.push(format!("({})", filter));
    }

    if let Some(jql) = jql {
        clauses.push(format!("({})", jql));
    }

    if clauses.is_empty() {
        format!("ORDER BY {}", order)
    } else {
        format!("{} ORDER BY {}", clauses.join(" AND "), order)
    }
}

/// ページング検索の結果
///
/// 途中のページで失敗した場合も、それまでに取得した課題は `issues` に残り `error` に原因が入る。
#[derive(Debug, Default)]
pub struct IssueBatch {
    pub issues: Vec<Issue>,
    pub error: Option<Error>,
}

impl IssueBatch {
    /// 最後のページまで取得できたか
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }
}

/// 空のページが返るまで `page_size` 件ずつ検索して全件を集める
///
/// ページは1つずつ順番に取得する。検索エラーでループを打ち切り、クエリをログに残して部分結果を返す。
pub async fn fetch_all<S>(search: &S, jql: &str, page_size: u32, changelog: bool) -> IssueBatch
where
    S: IssueSearch + ?Sized,
{
    let page_size = page_size.max(1);
    let mut start_at = 0u32;
    let mut batch = IssueBatch::default();

    loop {
        let params = SearchParams::new()
            .start_at(start_at)
            .max_results(page_size)
            .with_changelog(changelog);

        match search.search_issues(jql, params).await {
            Ok(page) => {
                debug!(start_at, count = page.issues.len(), "fetched page");
                if page.issues.is_empty() {
                    break;
                }
                batch.issues.extend(page.issues);
                match start_at.checked_add(page_size) {
                    Some(next) => start_at = next,
                    None => {
                        warn!(start_at, page_size, "page offset overflow, stopping pagination");
                        break;
                    }
                }
            }
            Err(e) => {
                warn!(query = %jql, error = %e, "JIRA query error, returning partial results");
                batch.error = Some(e);
                break;
            }
        }
    }

    info!(count = batch.issues.len(), complete = batch.is_complete(), "fetched issues");
    batch
}

/// 検索、フィールド解決、値の正規化、変更履歴の再生をまとめて扱う
pub struct QueryManager<S> {
    search: S,
    settings: QuerySettings,
    fields: FieldMapping,
    normalizer: ValueNormalizer,
}

impl<S: IssueSearch> QueryManager<S> {
    /// フィールドカタログを取得して設定の全フィールドを解決する
    ///
    /// 解決できないフィールドが1つでもあれば初期化は失敗する。
    pub async fn new(search: S, settings: QuerySettings) -> Result<Self> {
        let catalog = search.get_fields().await?;
        let fields = FieldMapping::resolve(&catalog, &settings.fields)?;
        Ok(Self::with_mapping(search, settings, fields))
    }

    /// 解決済みのマッピングで作成
    pub fn with_mapping(search: S, settings: QuerySettings, fields: FieldMapping) -> Self {
        let normalizer = ValueNormalizer::new(settings.known_values.clone());
        Self {
            search,
            settings,
            fields,
            normalizer,
        }
    }

    pub fn settings(&self) -> &QuerySettings {
        &self.settings
    }

    pub fn field_mapping(&self) -> &FieldMapping {
        &self.fields
    }

    pub fn search(&self) -> &S {
        &self.search
    }

    /// 論理フィールド名で課題の値を取り出して正規化
    pub fn resolve_field_value(&self, issue: &Issue, name: &str) -> Option<FieldValue> {
        let field_id = self.fields.get(name)?;
        self.normalizer.normalize_issue_field(issue, name, field_id)
    }

    pub fn iter_changes<'a>(
        &self,
        issue: &'a Issue,
        include_resolution_changes: bool,
    ) -> StatusChanges<'a> {
        replay::iter_changes(issue, include_resolution_changes)
    }

    pub fn iter_size_changes<'a>(&'a self, issue: &'a Issue) -> SizeChanges<'a> {
        replay::iter_size_changes(
            issue,
            self.settings.size_field_label(),
            self.fields.get(&self.settings.size_field),
        )
    }

    /// 条件に合う課題を全件取得
    ///
    /// `order` / `changelog` を省略した場合は設定の値を使う。
    pub async fn find_issues(
        &self,
        criteria: &QueryCriteria,
        jql: Option<&str>,
        order: Option<&str>,
        changelog: Option<bool>,
    ) -> IssueBatch {
        let order = order.unwrap_or(&self.settings.order);
        let changelog = changelog.unwrap_or(self.settings.changelog);
        let query = build_jql(criteria, jql, order);

        debug!(query = %query, changelog, "fetching issues");
        fetch_all(&self.search, &query, self.settings.max_results, changelog).await
    }
}
