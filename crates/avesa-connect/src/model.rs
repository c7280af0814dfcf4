use chrono::{DateTime, Utc};
use serde_json::Value;

/// A page-fetch request against one (service, endpoint) pair.
#[derive(Debug, Clone)]
pub struct FetchPageRequest {
    pub endpoint_path: String,
    pub credentials: String,
    pub cursor: Option<String>,
    pub since_ts: DateTime<Utc>,
    pub until_ts: DateTime<Utc>,
    pub page_size: u32,
    pub incremental_field: String,
    pub order_by: String,
}

/// Records are attribute maps: string keys to scalar, nested object, or
/// array values — `serde_json::Value::Object` covers all three.
#[derive(Debug, Clone)]
pub struct FetchPageOutcome {
    pub records: Vec<Value>,
    /// `None` terminates pagination for this window.
    pub next_cursor: Option<String>,
    pub raw_last_updated_max: Option<DateTime<Utc>>,
}
