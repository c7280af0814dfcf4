//! `MockConnector`: a scripted `SourceConnector`, the reference
//! implementation for tests — replays a fixed sequence of pages per
//! cursor, grounded on the teacher's extensive `MockStore`-based test
//! fixtures.

use crate::connector::SourceConnector;
use crate::error::{ConnectError, Result};
use crate::model::{FetchPageOutcome, FetchPageRequest};
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

pub struct MockConnector {
    service: String,
    /// Scripted pages, popped front-to-back regardless of the requested
    /// cursor — good enough for a deterministic test fixture.
    pages: Mutex<Vec<FetchPageOutcome>>,
    fail_with_auth_failure: bool,
    rate_limited_once: Mutex<bool>,
}

impl MockConnector {
    pub fn empty(service: &str) -> Self {
        Self {
            service: service.to_string(),
            pages: Mutex::new(Vec::new()),
            fail_with_auth_failure: false,
            rate_limited_once: Mutex::new(false),
        }
    }

    pub fn with_pages(service: &str, pages: Vec<FetchPageOutcome>) -> Self {
        Self {
            service: service.to_string(),
            pages: Mutex::new(pages),
            fail_with_auth_failure: false,
            rate_limited_once: Mutex::new(false),
        }
    }

    pub fn failing_auth(service: &str) -> Self {
        Self {
            service: service.to_string(),
            pages: Mutex::new(Vec::new()),
            fail_with_auth_failure: true,
            rate_limited_once: Mutex::new(false),
        }
    }

    /// Returns `RateLimited` on the first call, then serves scripted pages.
    pub fn rate_limited_then(service: &str, pages: Vec<FetchPageOutcome>) -> Self {
        Self {
            service: service.to_string(),
            pages: Mutex::new(pages),
            fail_with_auth_failure: false,
            rate_limited_once: Mutex::new(true),
        }
    }
}

#[async_trait]
impl SourceConnector for MockConnector {
    fn service_name(&self) -> &str {
        &self.service
    }

    async fn fetch_page(&self, _request: FetchPageRequest) -> Result<FetchPageOutcome> {
        if self.fail_with_auth_failure {
            return Err(ConnectError::AuthFailure("invalid api key".to_string()));
        }

        {
            let mut pending = self.rate_limited_once.lock().unwrap();
            if *pending {
                *pending = false;
                return Err(ConnectError::RateLimited { retry_after: Duration::from_millis(50) });
            }
        }

        let mut pages = self.pages.lock().unwrap();
        if pages.is_empty() {
            return Ok(FetchPageOutcome {
                records: Vec::new(),
                next_cursor: None,
                raw_last_updated_max: None,
            });
        }
        Ok(pages.remove(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn pages_are_served_in_order() {
        let connector = MockConnector::with_pages(
            "connectwise",
            vec![
                FetchPageOutcome {
                    records: vec![json!({"id": "1"})],
                    next_cursor: Some("page-2".to_string()),
                    raw_last_updated_max: None,
                },
                FetchPageOutcome {
                    records: vec![json!({"id": "2"})],
                    next_cursor: None,
                    raw_last_updated_max: None,
                },
            ],
        );

        let req = FetchPageRequest {
            endpoint_path: "/company/companies".to_string(),
            credentials: "token".to_string(),
            cursor: None,
            since_ts: chrono::Utc::now(),
            until_ts: chrono::Utc::now(),
            page_size: 100,
            incremental_field: "lastUpdated".to_string(),
            order_by: "id".to_string(),
        };

        let first = connector.fetch_page(req.clone()).await.unwrap();
        assert_eq!(first.next_cursor.as_deref(), Some("page-2"));

        let second = connector.fetch_page(req).await.unwrap();
        assert!(second.next_cursor.is_none());
    }

    #[tokio::test]
    async fn failing_auth_connector_rejects_every_call() {
        let connector = MockConnector::failing_auth("connectwise");
        let req = FetchPageRequest {
            endpoint_path: "/company/companies".to_string(),
            credentials: "bad".to_string(),
            cursor: None,
            since_ts: chrono::Utc::now(),
            until_ts: chrono::Utc::now(),
            page_size: 100,
            incremental_field: "lastUpdated".to_string(),
            order_by: "id".to_string(),
        };
        let err = connector.fetch_page(req).await.unwrap_err();
        assert!(matches!(err, ConnectError::AuthFailure(_)));
    }
}
