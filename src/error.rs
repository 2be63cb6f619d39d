use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Configuration missing: {0}")]
    ConfigurationMissing(String),

    #[error("JIRA field with name `{0}` does not exist (did you try to use the field id instead?)")]
    FieldNotFound(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl Error {
    /// 初期化を中断すべき設定エラーかどうか
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Error::FieldNotFound(_)
                | Error::InvalidConfiguration(_)
                | Error::ConfigurationMissing(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
