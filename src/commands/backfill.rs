/*!
 * `avesa backfill` (`spec` §6, §4.9): split a historical `[start, end)`
 * window for one `(tenant, service, table)` into fixed-duration chunks
 * and drive them through the Chunk Processor directly, bypassing the
 * Tenant/Table fan-out a regular `avesa run` uses.
 */

use crate::error::{AppError, Result};
use crate::wiring::Wiring;
use avesa_engine::BackfillRequest;
use chrono::{DateTime, Utc};
use clap::Args;
use console::style;
use std::time::Duration;

#[derive(Args, Debug)]
pub struct BackfillArgs {
    #[arg(long)]
    pub tenant: String,
    #[arg(long)]
    pub service: String,
    /// Canonical table name or endpoint path to backfill.
    #[arg(long)]
    pub table: String,
    #[arg(long)]
    pub start: DateTime<Utc>,
    #[arg(long)]
    pub end: DateTime<Utc>,
    /// Window size per chunk, e.g. `2d`, `12h`, `30m`.
    #[arg(long, default_value = "2d", value_parser = parse_duration)]
    pub chunk_duration: Duration,
}

fn parse_duration(raw: &str) -> std::result::Result<Duration, String> {
    let raw = raw.trim();
    let (digits, unit) = raw.split_at(raw.len() - 1);
    let n: u64 = digits.parse().map_err(|_| format!("invalid duration `{raw}`"))?;
    match unit {
        "s" => Ok(Duration::from_secs(n)),
        "m" => Ok(Duration::from_secs(n * 60)),
        "h" => Ok(Duration::from_secs(n * 3600)),
        "d" => Ok(Duration::from_secs(n * 86_400)),
        _ => Err(format!("unknown duration unit in `{raw}` (expected s/m/h/d)")),
    }
}

pub async fn run(args: BackfillArgs, wiring: &Wiring) -> Result<i32> {
    let service_config = wiring.ctx.state.get_service_config(&args.tenant, &args.service).await?;

    let endpoint = wiring
        .endpoints
        .for_service(&args.service)
        .iter()
        .find(|e| e.canonical_table == args.table || e.path == args.table)
        .ok_or_else(|| AppError::Usage(format!("no endpoint for service {} and table {}", args.service, args.table)))?;

    let endpoint_path = service_config.endpoint_overrides.get(&endpoint.path).cloned().unwrap_or_else(|| endpoint.path.clone());

    let request = BackfillRequest {
        tenant_id: args.tenant,
        service: args.service,
        endpoint_path,
        table_name: endpoint.path.clone(),
        canonical_table: endpoint.canonical_table.clone(),
        credentials_ref: service_config.credentials_ref,
        page_size: endpoint.page_size,
        incremental_field: endpoint.incremental_field.clone(),
        order_by: endpoint.order_by.clone(),
        start: args.start,
        end: args.end,
        chunk_duration: args.chunk_duration,
    };

    let result = avesa_engine::run_backfill(&wiring.ctx, request).await?;

    println!(
        "{} backfill job {} finished with status {:?} ({} records)",
        style("✓").green().bold(),
        style(&result.job_id).cyan(),
        result.status,
        result.table.records_written
    );

    Ok(match result.status {
        avesa_core::JobStatus::Succeeded => 0,
        avesa_core::JobStatus::Partial => 1,
        avesa_core::JobStatus::Failed => 2,
        avesa_core::JobStatus::Running => unreachable!("run_backfill only returns a terminal status"),
    })
}
