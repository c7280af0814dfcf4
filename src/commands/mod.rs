/*!
 * CLI subcommand handlers (`spec` §6). Each handler takes the shared
 * `Context`/`EndpointRegistry` built in `crate::wiring` plus its own
 * parsed `clap` args, and returns the process exit code to use.
 */

pub mod backfill;
pub mod run;
pub mod service;
pub mod status;
pub mod tenant;

pub use backfill::BackfillArgs;
pub use run::RunArgs;
pub use service::ServiceArgs;
pub use status::StatusArgs;
pub use tenant::TenantArgs;
