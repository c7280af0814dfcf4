/*!
 * AVESA — multi-tenant SaaS data pipeline CLI (`spec` §6).
 *
 * Onboards tenants and services, drives incremental orchestrator runs
 * and historical backfills, and reports job status. Exit codes:
 * `0` success, `1` partial, `2` failed, `3` usage error, `4` state store
 * unreachable / fatal error.
 */

use avesa::commands::{self, BackfillArgs, RunArgs, ServiceArgs, StatusArgs, TenantArgs};
use avesa::config::AppConfig;
use avesa::error::AppError;
use avesa::{logging, wiring};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "avesa", version, about = "Multi-tenant SaaS data pipeline")]
struct Cli {
    /// Path to a TOML config file. Defaults to `./avesa.toml` if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage tenants.
    Tenant(TenantArgs),
    /// Manage per-tenant service configuration.
    Service(ServiceArgs),
    /// Trigger an incremental orchestrator run.
    Run(RunArgs),
    /// Backfill a historical window for one tenant/service/table.
    Backfill(BackfillArgs),
    /// Report a job's status.
    Status(StatusArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(err) => {
            eprintln!("error: failed to start async runtime: {err}");
            return ExitCode::from(4);
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(code) => ExitCode::from(code as u8),
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(err.exit_code() as u8)
        }
    }
}

async fn run(cli: Cli) -> Result<i32, AppError> {
    let config = AppConfig::load(cli.config.as_deref())?;
    let audit = Arc::new(wiring::load_audit_logger(&config)?);
    logging::init_logging(&config, audit.clone())?;

    let built = wiring::build(&config, audit).await?;

    let code = match cli.command {
        Commands::Tenant(args) => commands::tenant::run(args, &built).await?,
        Commands::Service(args) => commands::service::run(args, &built).await?,
        Commands::Run(args) => commands::run::run(args, &built).await?,
        Commands::Backfill(args) => commands::backfill::run(args, &built).await?,
        Commands::Status(args) => commands::status::run(args, &built).await?,
    };

    Ok(code)
}
