//! The ingestion engine: the Chunk, Table, Tenant and Pipeline
//! Orchestrator processors (`spec` §4.5-4.7) that turn a run request into
//! a tree of bounded-concurrency async work, plus the `Context` capability
//! bundle and `EngineConfig` that configure every tier of it.

pub mod backfill;
pub mod chunk;
pub mod config;
pub mod context;
pub mod endpoints;
pub mod orchestrator;
pub mod table;
pub mod tenant;

pub use backfill::{BackfillError, BackfillRequest, BackfillResult, run_backfill};
pub use chunk::{ChunkInput, ChunkOutcome};
pub use config::EngineConfig;
pub use context::Context;
pub use endpoints::EndpointRegistry;
pub use orchestrator::{run_job, OrchestratorError, RunRequest, RunResult};
pub use table::{TableInput, TableOutcome};
pub use tenant::{resolve_sources, TenantInput, TenantOutcome, TenantTableSource};
