use crate::error::{Error, Result};
use crate::models::{Field, SearchParams, SearchResult};
use async_trait::async_trait;
use base64::Engine;
use reqwest::{Client, header};
use std::sync::Arc;
use url::Url;

/// 課題検索APIの抽象化トレイト
///
/// 検索とフィールドカタログ取得だけを要求する。ページングやJQLの組み立ては呼び出し側の責務。
#[async_trait]
pub trait IssueSearch: Send + Sync {
    /// JQLで課題を1ページ分検索
    async fn search_issues(&self, jql: &str, params: SearchParams) -> Result<SearchResult>;

    /// フィールドカタログ（名前とIDの組）を取得
    async fn get_fields(&self) -> Result<Vec<Field>>;
}

#[derive(Debug, Clone)]
pub enum Auth {
    Basic { username: String, api_token: String },
    Bearer { token: String },
}

#[derive(Debug, Clone)]
pub struct JiraConfig {
    pub base_url: String,
    pub auth: Auth,
}

impl JiraConfig {
    pub fn new(base_url: impl Into<String>, auth: Auth) -> Result<Self> {
        let base_url = base_url.into();

        let _ = Url::parse(&base_url)
            .map_err(|_| Error::InvalidConfiguration("Invalid base URL".to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
        })
    }

    pub fn from_env() -> Result<Self> {
        let base_url = required_env("JIRA_URL")?;
        let username = required_env("JIRA_USER")?;
        let api_token = required_env("JIRA_API_TOKEN")?;

        Self::new(base_url, Auth::Basic { username, api_token })
    }

    /// `.env` を読み込んでから環境変数で設定を作成
    pub fn from_dotenv() -> Result<Self> {
        // .envが無いのは正常
        let _ = dotenv::dotenv();
        Self::from_env()
    }
}

fn required_env(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| Error::ConfigurationMissing(format!("{} not found in environment", name)))
}

#[derive(Debug, Clone)]
pub struct JiraClient {
    pub(crate) client: Client,
    pub(crate) config: Arc<JiraConfig>,
}

impl JiraClient {
    pub fn new(config: JiraConfig) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let auth_value = match &config.auth {
            Auth::Basic { username, api_token } => {
                let encoded = base64::engine::general_purpose::STANDARD
                    .encode(format!("{}:{}", username, api_token).as_bytes());
                format!("Basic {}", encoded)
            }
            Auth::Bearer { token } => format!("Bearer {}", token),
        };
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&auth_value)
                .map_err(|_| Error::InvalidConfiguration("Invalid auth header".to_string()))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| {
                Error::InvalidConfiguration(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &JiraConfig {
        &self.config
    }

    pub(crate) async fn get<T>(&self, endpoint: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let url = format!("{}{}", self.config.base_url, endpoint);
        let response = self.client.get(&url).send().await?;
        Self::read_json(response).await
    }

    pub(crate) async fn post<T, B>(&self, endpoint: &str, body: &B) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
        B: serde::Serialize,
    {
        let url = format!("{}{}", self.config.base_url, endpoint);
        let response = self.client.post(&url).json(body).send().await?;
        Self::read_json(response).await
    }

    async fn read_json<T>(response: reqwest::Response) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Error::ApiError { status, message });
        }

        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl IssueSearch for JiraClient {
    async fn search_issues(&self, jql: &str, params: SearchParams) -> Result<SearchResult> {
        let mut body = serde_json::to_value(&params)?;
        body["jql"] = jql.into();

        self.post("/rest/api/2/search", &body).await
    }

    async fn get_fields(&self) -> Result<Vec<Field>> {
        self.get("/rest/api/2/field").await
    }
}
