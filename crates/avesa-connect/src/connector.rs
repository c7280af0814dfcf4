//! `SourceConnector`: the uniform per-service fetch capability (`spec`
//! §4.2), grounded on `avesa_interface`'s trait-object-safe async
//! capability style — one trait, held as `Arc<dyn SourceConnector>` by the
//! registry rather than monomorphized per service.

use crate::error::Result;
use crate::model::{FetchPageOutcome, FetchPageRequest};
use async_trait::async_trait;

#[async_trait]
pub trait SourceConnector: Send + Sync + 'static {
    /// The service name this connector answers for (`connectwise`, ...).
    fn service_name(&self) -> &str;

    async fn fetch_page(&self, request: FetchPageRequest) -> Result<FetchPageOutcome>;
}
