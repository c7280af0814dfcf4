/*!
 * `avesa status` (`spec` §6): report a job's terminal/non-terminal
 * status and its per-chunk progress.
 */

use crate::error::Result;
use crate::wiring::Wiring;
use avesa_core::JobStatus;
use clap::Args;

#[derive(Args, Debug)]
pub struct StatusArgs {
    #[arg(long)]
    pub job: String,
}

pub async fn run(args: StatusArgs, wiring: &Wiring) -> Result<i32> {
    let job = wiring.ctx.state.get_job(&args.job).await?;
    println!("job {} ({:?}), run_kind={:?}, tenants={}", job.job_id, job.status, job.run_kind, job.tenant_set.len());

    let chunks = wiring.ctx.state.list_chunks(&args.job).await?;
    if !chunks.is_empty() {
        let mut table = comfy_table::Table::new();
        table.set_header(vec!["tenant", "table", "window_start", "window_end", "status", "records"]);
        for chunk in &chunks {
            table.add_row(vec![
                chunk.tenant_id.clone(),
                chunk.table_name.clone(),
                chunk.window_start.to_rfc3339(),
                chunk.window_end.to_rfc3339(),
                format!("{:?}", chunk.status),
                chunk.records_written.to_string(),
            ]);
        }
        println!("{table}");
    }

    for (tenant_id, tables) in &job.summary.per_tenant {
        for (table_name, summary) in tables {
            println!("  {tenant_id}/{table_name}: {:?} ({} records)", summary.status, summary.records_written);
        }
    }

    Ok(match job.status {
        JobStatus::Succeeded => 0,
        JobStatus::Partial => 1,
        JobStatus::Failed => 2,
        JobStatus::Running => 0,
    })
}
