//! avesa-core: the data model (`spec` §3) and the closed error-kind set
//! (`spec` §7) shared by every other crate in the workspace.
//!
//! Nothing in this crate talks to a database, an HTTP endpoint, or an
//! object store — those capabilities are traits defined one layer up in
//! `avesa-interface` and `avesa-connect`, which both depend on the types
//! here.

pub mod context;
pub mod error;
pub mod model;

pub use context::cancellable;
pub use error::{AvesaError, ErrorKind, Result};
pub use model::{
    CanonicalRecord, ChunkProgress, ChunkStatus, EndpointConfig, Job, JobStatus, JobSummary,
    RunKind, ServiceConfig, TableSummary, Tenant, Watermark,
};

pub use tokio_util::sync::CancellationToken;
