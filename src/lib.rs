pub mod client;
pub mod error;
pub mod field_resolver;
pub mod models;
pub mod normalize;
pub mod query;
pub mod replay;
pub mod settings;
pub mod snapshot;
pub mod time_util;

pub use client::{Auth, IssueSearch, JiraClient, JiraConfig};
pub use error::Error;
pub use models::*;

// Field resolution / normalization re-exports
pub use field_resolver::FieldMapping;
pub use normalize::{FieldValue, ValueNormalizer, normalize_value, parse_date_like};

// Changelog replay re-exports
pub use replay::{SizeChanges, StatusChanges, iter_changes, iter_size_changes};
pub use snapshot::{SizeSnapshot, StatusSnapshot};

// Query re-exports
pub use query::{IssueBatch, QueryCriteria, QueryManager, build_jql, fetch_all};
pub use settings::QuerySettings;

pub use time_util::{parse_jira_timestamp, strip_time, to_datetime};
