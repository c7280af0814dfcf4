//! The Tenant Processor (`spec` §4.6): discover enabled `(service, table)`
//! pairs for one tenant, drive a bounded-parallel table map, and fire off
//! one canonical-transform dispatch per distinct canonical table touched.

use crate::context::Context;
use crate::table::{self, TableInput, TableOutcome};
use avesa_core::{JobStatus, ServiceConfig};
use avesa_interface::secret::SecretStore;
use futures::stream::{self, StreamExt};
use std::collections::{BTreeSet, HashMap};
use tracing::{error, info, warn};

/// One `(service, endpoint)` pair resolved for a tenant, fully expanded
/// with everything the Table Processor needs. Built by the orchestrator
/// (or directly by callers in tests) from `ServiceConfig` × the static
/// `EndpointRegistry`. `credentials_ref` is resolved to an actual
/// credential once per distinct service, not per source, in
/// `process_tenant`.
#[derive(Debug, Clone)]
pub struct TenantTableSource {
    pub service: String,
    pub credentials_ref: String,
    pub endpoint_path: String,
    pub table_name: String,
    pub canonical_table: String,
    pub page_size: u32,
    pub incremental_field: String,
    pub order_by: String,
}

#[derive(Debug, Clone)]
pub struct TenantInput {
    pub job_id: String,
    pub tenant_id: String,
    pub force_full_sync: bool,
    /// Restrict the run to one table name, if set (`spec` §6 `--table`).
    pub table_filter: Option<String>,
    pub sources: Vec<TenantTableSource>,
}

#[derive(Debug, Clone)]
pub struct TenantOutcome {
    pub tenant_id: String,
    pub status: JobStatus,
    pub records_written: u64,
    pub tables: Vec<TableOutcome>,
}

/// Resolve the enabled `(service, endpoint)` pairs for a tenant from its
/// `ServiceConfig` rows and the static endpoint registry, applying
/// `table_filter` if present (`spec` §4.6 step 1).
pub fn resolve_sources(
    service_configs: &[ServiceConfig],
    endpoints: &crate::endpoints::EndpointRegistry,
    table_filter: Option<&str>,
) -> Vec<TenantTableSource> {
    let mut sources = Vec::new();
    for config in service_configs {
        if !config.enabled {
            continue;
        }
        for endpoint in endpoints.for_service(&config.service_name) {
            if !endpoint.enabled {
                continue;
            }
            if let Some(filter) = table_filter {
                if endpoint.canonical_table != filter && endpoint.path != filter {
                    continue;
                }
            }
            sources.push(TenantTableSource {
                service: config.service_name.clone(),
                credentials_ref: config.credentials_ref.clone(),
                endpoint_path: endpoint.path.clone(),
                table_name: endpoint.path.clone(),
                canonical_table: endpoint.canonical_table.clone(),
                page_size: endpoint.page_size,
                incremental_field: endpoint.incremental_field.clone(),
                order_by: endpoint.order_by.clone(),
            });
        }
    }
    sources
}

/// Runs one tenant to completion: drives the bounded table map, then
/// fire-and-forgets one canonical-transform dispatch per distinct
/// canonical table any succeeded/partial table with `records_written > 0`
/// touched (`spec` §4.6 steps 3-4).
pub async fn process_tenant(ctx: &Context, input: TenantInput) -> TenantOutcome {
    let tables_concurrency = ctx.config.tables_concurrency.max(1);

    let job_id = input.job_id.clone();
    let tenant_id = input.tenant_id.clone();
    let force_full_sync = input.force_full_sync;

    let mut resolved_credentials: HashMap<String, String> = HashMap::new();
    for source in &input.sources {
        if resolved_credentials.contains_key(&source.credentials_ref) {
            continue;
        }
        match ctx.secrets.resolve(&source.credentials_ref).await {
            Ok(secret) => {
                resolved_credentials.insert(source.credentials_ref.clone(), secret);
            }
            Err(err) => {
                error!(tenant_id, credentials_ref = %source.credentials_ref, error = %err, "credential resolution failed");
            }
        }
    }

    let outcomes = stream::iter(input.sources.into_iter().filter_map(|source| {
        let credentials = resolved_credentials.get(&source.credentials_ref)?.clone();
        Some(TableInput {
            job_id: job_id.clone(),
            tenant_id: tenant_id.clone(),
            service: source.service,
            table_name: source.table_name,
            canonical_table: source.canonical_table,
            endpoint_path: source.endpoint_path,
            credentials,
            page_size: source.page_size,
            incremental_field: source.incremental_field,
            order_by: source.order_by,
            force_full_sync,
        })
    }))
    .map(|table_input| async move { table::process_table(ctx, table_input).await })
    .buffer_unordered(tables_concurrency)
    .collect::<Vec<_>>()
    .await;

    dispatch_canonical_transforms(ctx, &tenant_id, &job_id, &outcomes);

    summarize(tenant_id, outcomes)
}

/// `should_trigger_canonical = ∃ table with status ∈ {succeeded, partial}
/// AND records_written > 0` (`spec` §4.6 step 3). Submission is
/// fire-and-forget: the join handle is logged but never awaited, so a
/// canonical failure never changes the tenant's job status
/// (`spec` §4.6 step 4).
fn dispatch_canonical_transforms(ctx: &Context, tenant_id: &str, job_id: &str, outcomes: &[TableOutcome]) {
    let canonical_tables: BTreeSet<String> = outcomes
        .iter()
        .filter(|o| matches!(o.status, JobStatus::Succeeded | JobStatus::Partial) && o.records_written > 0)
        .map(|o| o.canonical_table.clone())
        .collect();

    for canonical_table in canonical_tables {
        let raw_blob_prefix = format!("{tenant_id}/raw/");
        let ctx = ctx.clone();
        let tenant_id = tenant_id.to_string();
        let job_id = job_id.to_string();
        tokio::spawn(async move {
            match run_canonical_dispatch(&ctx, &tenant_id, &job_id, &canonical_table, &raw_blob_prefix).await {
                Ok(outcome) => info!(
                    tenant_id, job_id, canonical_table,
                    inserted = outcome.inserted, replaced = outcome.replaced,
                    filed_historical = outcome.filed_historical, no_op = outcome.no_op,
                    rejected = outcome.rejected,
                    "canonical transform complete"
                ),
                Err(err) => error!(tenant_id, job_id, canonical_table, error = %err, "canonical transform failed"),
            }
        });
    }
}

/// List every raw blob written under this job for this tenant and apply
/// each to the canonical table in turn, accumulating one `ApplyOutcome`.
/// `spec` §4.8's "source_blobs[]" input is resolved here by prefix listing
/// rather than threading an explicit blob list through the tenant map —
/// the deterministic chunk path layout makes the job's own blobs
/// discoverable without extra bookkeeping.
async fn run_canonical_dispatch(
    ctx: &Context,
    tenant_id: &str,
    job_id: &str,
    canonical_table: &str,
    raw_blob_prefix: &str,
) -> avesa_canonical::Result<avesa_canonical::ApplyOutcome> {
    use avesa_interface::blob::BlobStore;

    let blobs = ctx
        .blob
        .list(raw_blob_prefix)
        .await
        .map_err(avesa_canonical::CanonicalError::Blob)?;

    let mut total = avesa_canonical::ApplyOutcome::default();
    let mut all_rejects = Vec::new();
    for blob in blobs {
        if !blob.path.contains(&format!("/{job_id}/")) {
            continue;
        }
        let Some(service) = blob.path.split('/').nth(2) else { continue };
        let outcome = ctx
            .canonical
            .apply_chunk(canonical_table, service, tenant_id, job_id, &blob.path, None)
            .await?;
        total.inserted += outcome.inserted;
        total.replaced += outcome.replaced;
        total.filed_historical += outcome.filed_historical;
        total.no_op += outcome.no_op;
        total.rejected += outcome.rejected;
        all_rejects.extend(outcome.rejects);
    }

    // Flushed once for the whole canonical pass, not per blob (`spec`
    // §4.8), so rejects from every chunk survive in one reject blob
    // instead of the last chunk's write clobbering the rest.
    avesa_canonical::reject::flush_rejects(&ctx.blob, tenant_id, canonical_table, job_id, &all_rejects).await?;

    Ok(total)
}

fn summarize(tenant_id: String, tables: Vec<TableOutcome>) -> TenantOutcome {
    let records_written = tables.iter().map(|t| t.records_written).sum();
    let any_succeeded = tables.iter().any(|t| t.status == JobStatus::Succeeded);
    let any_failed = tables.iter().any(|t| matches!(t.status, JobStatus::Failed | JobStatus::Partial));

    let status = if tables.is_empty() {
        JobStatus::Succeeded
    } else if any_succeeded && any_failed {
        JobStatus::Partial
    } else if any_failed {
        JobStatus::Failed
    } else {
        JobStatus::Succeeded
    };

    if status == JobStatus::Failed {
        warn!(tenant_id, "tenant run failed: no table succeeded");
    }

    TenantOutcome {
        tenant_id,
        status,
        records_written,
        tables,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use avesa_core::EndpointConfig;

    fn service_config(service: &str, enabled: bool) -> ServiceConfig {
        ServiceConfig {
            tenant_id: "t1".to_string(),
            service_name: service.to_string(),
            enabled,
            credentials_ref: "ref".to_string(),
            endpoint_overrides: Default::default(),
        }
    }

    fn endpoint(path: &str, canonical_table: &str) -> EndpointConfig {
        EndpointConfig {
            path: path.to_string(),
            canonical_table: canonical_table.to_string(),
            enabled: true,
            page_size: 100,
            order_by: "id".to_string(),
            incremental_field: "lastUpdated".to_string(),
            sync_frequency: std::time::Duration::from_secs(3600),
        }
    }

    #[test]
    fn resolve_sources_skips_disabled_services() {
        let mut registry = crate::endpoints::EndpointRegistry::new();
        registry.register("connectwise", vec![endpoint("/company/companies", "companies")]);

        let configs = vec![service_config("connectwise", false)];
        let sources = resolve_sources(&configs, &registry, None);
        assert!(sources.is_empty());
    }

    #[test]
    fn resolve_sources_applies_table_filter() {
        let mut registry = crate::endpoints::EndpointRegistry::new();
        registry.register(
            "connectwise",
            vec![endpoint("/company/companies", "companies"), endpoint("/tickets", "tickets")],
        );

        let configs = vec![service_config("connectwise", true)];
        let sources = resolve_sources(&configs, &registry, Some("tickets"));
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].canonical_table, "tickets");
    }

    #[test]
    fn summarize_empty_tables_is_succeeded() {
        let outcome = summarize("t1".to_string(), vec![]);
        assert_eq!(outcome.status, JobStatus::Succeeded);
    }

    #[test]
    fn summarize_mixed_success_and_failure_is_partial() {
        let tables = vec![
            TableOutcome {
                table_name: "companies".to_string(),
                canonical_table: "companies".to_string(),
                status: JobStatus::Succeeded,
                records_written: 10,
                error: None,
            },
            TableOutcome {
                table_name: "tickets".to_string(),
                canonical_table: "tickets".to_string(),
                status: JobStatus::Failed,
                records_written: 0,
                error: Some("boom".to_string()),
            },
        ];
        let outcome = summarize("t1".to_string(), tables);
        assert_eq!(outcome.status, JobStatus::Partial);
        assert_eq!(outcome.records_written, 10);
    }
}
