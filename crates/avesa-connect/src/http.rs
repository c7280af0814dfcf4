//! `HttpConnector`: a generic REST `SourceConnector` reference
//! implementation — bearer-token auth, cursor pagination via a
//! `next_cursor` response field, `since`/`until` query parameters. Real
//! per-service connectors (ConnectWise, HaloPSA, ...) differ only in
//! field names and are out of scope here (`spec` Non-goals).

use crate::connector::SourceConnector;
use crate::error::{ConnectError, Result};
use crate::model::{FetchPageOutcome, FetchPageRequest};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

pub struct HttpConnector {
    service: String,
    base_url: String,
    client: reqwest::Client,
}

impl HttpConnector {
    pub fn new(service: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl SourceConnector for HttpConnector {
    fn service_name(&self) -> &str {
        &self.service
    }

    async fn fetch_page(&self, request: FetchPageRequest) -> Result<FetchPageOutcome> {
        let url = format!("{}{}", self.base_url, request.endpoint_path);

        let mut query = vec![
            (request.incremental_field.clone() + "_since", request.since_ts.to_rfc3339()),
            (request.incremental_field.clone() + "_until", request.until_ts.to_rfc3339()),
            ("order_by".to_string(), request.order_by.clone()),
            ("page_size".to_string(), request.page_size.to_string()),
        ];
        if let Some(cursor) = &request.cursor {
            query.push(("cursor".to_string(), cursor.clone()));
        }

        let response = self
            .client
            .get(&url)
            .bearer_auth(&request.credentials)
            .query(&query)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ConnectError::AuthFailure(format!("{service} returned {status}", service = self.service)));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30);
            return Err(ConnectError::RateLimited {
                retry_after: std::time::Duration::from_secs(retry_after),
            });
        }
        if status.is_server_error() {
            return Err(ConnectError::Transient(format!("{} returned {}", self.service, status)));
        }

        let body: Value = response.json().await?;
        let records = body
            .get("records")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();
        let next_cursor = body.get("next_cursor").and_then(|v| v.as_str()).map(str::to_string);
        let raw_last_updated_max = body
            .get("raw_last_updated_max")
            .and_then(|v| v.as_str())
            .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
            .map(|dt| dt.with_timezone(&Utc));

        Ok(FetchPageOutcome { records, next_cursor, raw_last_updated_max })
    }
}
