//! The `SourceConnector` capability (`spec` §4.2): one uniform
//! page-fetch interface per external service, registered once at
//! orchestrator start and wrapped with rate limiting and circuit breaking
//! before the Chunk Processor ever sees it.

pub mod connector;
pub mod error;
pub mod http;
pub mod mock;
pub mod model;
pub mod registry;
pub mod resilient;

pub use connector::SourceConnector;
pub use error::{ConnectError, Result};
pub use http::HttpConnector;
pub use mock::MockConnector;
pub use model::{FetchPageOutcome, FetchPageRequest};
pub use registry::ConnectorRegistry;
pub use resilient::ResilientConnector;
