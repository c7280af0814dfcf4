//! The Pipeline Orchestrator (`spec` §4.7): the top-level state machine
//! that turns one run request into `building -> dispatching -> waiting ->
//! aggregating -> terminal`. Validates connector services up front, fans
//! out to the Tenant Processor with bounded concurrency, and aggregates
//! the per-tenant outcomes into one `Job` row.

use crate::context::Context;
use crate::endpoints::EndpointRegistry;
use crate::tenant::{self, resolve_sources, TenantInput};
use avesa_core::{Job, JobStatus, JobSummary, RunKind, TableSummary};
use avesa_observability::TraceContext;
use avesa_state::StateStore;
use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{error, info, info_span, warn, Instrument};

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("state error: {0}")]
    State(#[from] avesa_state::StateError),
    #[error("connector error: {0}")]
    Connect(#[from] avesa_connect::ConnectError),
}

impl From<OrchestratorError> for avesa_core::AvesaError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::State(e) => e.into(),
            OrchestratorError::Connect(e) => e.into(),
        }
    }
}

/// One orchestrator run request (`spec` §6 `avesa run` / `avesa backfill`
/// map onto this with different `run_kind`/window parameters upstream).
pub struct RunRequest {
    pub run_kind: RunKind,
    /// Restrict the run to these tenants; `None` runs every non-deleted
    /// tenant (`spec` §6 `--tenant`).
    pub tenant_ids: Option<Vec<String>>,
    /// Restrict the run to one table, by canonical table name or endpoint
    /// path (`spec` §6 `--table`).
    pub table_filter: Option<String>,
    pub force_full_sync: bool,
    pub endpoints: Arc<EndpointRegistry>,
}

pub struct RunResult {
    pub job_id: String,
    pub status: JobStatus,
    pub summary: JobSummary,
}

fn run_kind_label(run_kind: RunKind) -> &'static str {
    match run_kind {
        RunKind::Manual => "manual",
        RunKind::Scheduled => "scheduled",
        RunKind::Backfill => "backfill",
    }
}

/// Drives one run to completion. `ctx.cancel` scopes the whole job: a
/// cancellation of the passed-in context stops every tenant/table/chunk
/// still in flight without affecting sibling jobs (`Context::child`).
pub async fn run_job(ctx: &Context, request: RunRequest) -> Result<RunResult, OrchestratorError> {
    let job_id = uuid::Uuid::new_v4().to_string();
    let ctx = ctx.child();
    let job_timeout = ctx.config.job_timeout;
    let span = info_span!("job", job_id = %job_id, run_kind = ?request.run_kind);
    let trace = TraceContext::new_root().with_job(job_id.clone());
    let started_at = Instant::now();

    async {
        // building: enumerate tenants, resolve sources, validate connectors.
        let all_tenants = ctx.state.get_tenants().await?;
        let tenants: Vec<_> = all_tenants
            .into_iter()
            .filter(|t| t.deleted_at.is_none())
            .filter(|t| {
                request
                    .tenant_ids
                    .as_ref()
                    .map_or(true, |ids| ids.contains(&t.tenant_id))
            })
            .collect();

        let mut tenant_sources = Vec::with_capacity(tenants.len());
        let mut touched_services: BTreeSet<String> = BTreeSet::new();
        for tenant in &tenants {
            let service_configs = ctx.state.list_service_configs(&tenant.tenant_id).await?;
            for config in &service_configs {
                if config.enabled {
                    touched_services.insert(config.service_name.clone());
                }
            }
            let sources = resolve_sources(&service_configs, &request.endpoints, request.table_filter.as_deref());
            tenant_sources.push((tenant.tenant_id.clone(), sources));
        }

        let touched_services: Vec<String> = touched_services.into_iter().collect();
        ctx.connectors.validate_services(&touched_services)?;
        let table_count: u64 = tenant_sources.iter().map(|(_, sources)| sources.len() as u64).sum();

        let job = Job {
            job_id: job_id.clone(),
            run_kind: request.run_kind,
            tenant_set: tenants.iter().map(|t| t.tenant_id.clone()).collect(),
            status: JobStatus::Running,
            created_at: chrono::Utc::now(),
            finished_at: None,
            summary: JobSummary::default(),
        };
        ctx.state.create_job(&job).await?;
        info!(tenant_count = tenants.len(), "job started");
        let _ = ctx.audit.emit_job_start(&trace, tenants.len() as u32, table_count, run_kind_label(request.run_kind));

        // dispatching + waiting: bounded-parallel tenant map.
        let tenants_concurrency = ctx.config.tenants_concurrency.max(1);
        let force_full_sync = request.force_full_sync;
        let table_filter = request.table_filter.clone();
        let job_id_for_map = job_id.clone();
        let ctx_ref = &ctx;

        let dispatch = stream::iter(tenant_sources.into_iter().map(|(tenant_id, sources)| {
            let input = TenantInput {
                job_id: job_id_for_map.clone(),
                tenant_id,
                force_full_sync,
                table_filter: table_filter.clone(),
                sources,
            };
            async move { tenant::process_tenant(ctx_ref, input).await }
        }))
        .buffer_unordered(tenants_concurrency)
        .collect::<Vec<_>>();

        // Bounded by the job's wall-clock budget (`spec` §5 "per-job
        // budget"). A timeout cancels every in-flight tenant/table/chunk
        // through the job-scoped token and settles the job as failed
        // rather than leaving it stuck in `running`.
        let outcomes = match tokio::time::timeout(job_timeout, dispatch).await {
            Ok(outcomes) => outcomes,
            Err(_elapsed) => {
                ctx.cancel.cancel();
                error!(budget = ?job_timeout, "job exceeded its wall-clock budget");
                ctx.state.update_job_status(&job_id, JobStatus::Failed, None).await?;
                let _ = ctx.audit.emit_job_failed(&trace, "job exceeded its wall-clock budget", 0);
                avesa_observability::metrics::record_job_duration("failed", started_at.elapsed().as_secs_f64());
                return Ok(RunResult { job_id, status: JobStatus::Failed, summary: JobSummary::default() });
            }
        };

        // aggregating: fold per-tenant outcomes into the job summary and
        // overall status.
        let mut summary = JobSummary::default();
        for outcome in &outcomes {
            let mut per_table = BTreeMap::new();
            for table in &outcome.tables {
                per_table.insert(
                    table.table_name.clone(),
                    TableSummary {
                        status: table.status,
                        records_written: table.records_written,
                        error: table.error.clone(),
                    },
                );
            }
            summary.per_tenant.insert(outcome.tenant_id.clone(), per_table);
        }

        // `spec` §4.7 step 4: "partial iff at least one tenant had any
        // succeeded table". A tenant whose own status is `Partial` still
        // counts here — it has at least one succeeded table by
        // definition — so this must be computed from the table rows, not
        // from tenant-level `JobStatus::Succeeded`, or a run where every
        // tenant is `Partial` is wrongly reported `Failed`.
        let any_succeeded = outcomes
            .iter()
            .any(|o| o.tables.iter().any(|t| t.status == JobStatus::Succeeded));
        let any_unsuccessful = outcomes
            .iter()
            .any(|o| matches!(o.status, JobStatus::Failed | JobStatus::Partial));

        let status = if outcomes.is_empty() {
            JobStatus::Succeeded
        } else if any_succeeded && any_unsuccessful {
            JobStatus::Partial
        } else if any_unsuccessful {
            JobStatus::Failed
        } else {
            JobStatus::Succeeded
        };

        ctx.state.update_job_status(&job_id, status, Some(summary.clone())).await?;

        let duration_ms = started_at.elapsed().as_millis() as u64;
        let status_label = match status {
            JobStatus::Succeeded => "succeeded",
            JobStatus::Partial => "partial",
            JobStatus::Failed => "failed",
            JobStatus::Running => "running",
        };
        avesa_observability::metrics::record_job_duration(status_label, started_at.elapsed().as_secs_f64());

        match status {
            JobStatus::Succeeded => {
                info!(?status, "job complete");
                let _ = ctx.audit.emit_job_complete(&trace, duration_ms, status_label);
            }
            JobStatus::Partial => {
                warn!(?status, "job complete with partial failures");
                let _ = ctx.audit.emit_job_complete(&trace, duration_ms, status_label);
            }
            JobStatus::Failed => {
                error!(?status, "job failed");
                let error = outcomes.iter().find_map(|o| o.tables.iter().find_map(|t| t.error.clone()));
                let _ = ctx.audit.emit_job_failed(&trace, error.as_deref().unwrap_or("job failed"), 0);
            }
            JobStatus::Running => unreachable!("aggregation always yields a terminal status"),
        }

        Ok(RunResult { job_id, status, summary })
    }
    .instrument(span)
    .await
}
