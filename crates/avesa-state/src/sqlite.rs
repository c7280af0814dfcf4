//! SQLite-backed `StateStore`: a `sqlx::SqlitePool` in WAL mode, schema
//! applied via `sqlx::migrate!`, conditional writes expressed as single
//! `UPDATE` / `INSERT ... ON CONFLICT` statements so "atomic per key" holds
//! without an application-level lock.

use crate::error::{Result, StateError};
use crate::StateStore;
use async_trait::async_trait;
use avesa_core::{ChunkProgress, ChunkStatus, Job, JobStatus, JobSummary, RunKind, ServiceConfig, Tenant, Watermark};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;

pub struct SqliteStateStore {
    pool: SqlitePool,
}

impl SqliteStateStore {
    pub async fn open(path: &str) -> Result<Self> {
        let db_url = if path.starts_with("sqlite://") {
            path.to_string()
        } else {
            format!("sqlite://{}", path)
        };

        use sqlx::migrate::MigrateDatabase;
        if !sqlx::Sqlite::database_exists(&db_url).await.unwrap_or(false) {
            sqlx::Sqlite::create_database(&db_url).await?;
        }

        let options = SqliteConnectOptions::from_str(&db_url)
            .map_err(sqlx::Error::from)?
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn job_status_str(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Running => "running",
        JobStatus::Succeeded => "succeeded",
        JobStatus::Partial => "partial",
        JobStatus::Failed => "failed",
    }
}

fn job_status_from_str(s: &str) -> Result<JobStatus> {
    Ok(match s {
        "running" => JobStatus::Running,
        "succeeded" => JobStatus::Succeeded,
        "partial" => JobStatus::Partial,
        "failed" => JobStatus::Failed,
        other => return Err(StateError::Database(sqlx::Error::Decode(format!("unknown job status {other}").into()))),
    })
}

fn run_kind_str(kind: RunKind) -> &'static str {
    match kind {
        RunKind::Scheduled => "scheduled",
        RunKind::Manual => "manual",
        RunKind::Backfill => "backfill",
    }
}

fn run_kind_from_str(s: &str) -> Result<RunKind> {
    Ok(match s {
        "scheduled" => RunKind::Scheduled,
        "manual" => RunKind::Manual,
        "backfill" => RunKind::Backfill,
        other => return Err(StateError::Database(sqlx::Error::Decode(format!("unknown run kind {other}").into()))),
    })
}

fn chunk_status_str(status: ChunkStatus) -> &'static str {
    match status {
        ChunkStatus::Pending => "pending",
        ChunkStatus::InProgress => "in_progress",
        ChunkStatus::Succeeded => "succeeded",
        ChunkStatus::Failed => "failed",
        ChunkStatus::TimedOut => "timed_out",
    }
}

fn chunk_status_from_str(s: &str) -> Result<ChunkStatus> {
    Ok(match s {
        "pending" => ChunkStatus::Pending,
        "in_progress" => ChunkStatus::InProgress,
        "succeeded" => ChunkStatus::Succeeded,
        "failed" => ChunkStatus::Failed,
        "timed_out" => ChunkStatus::TimedOut,
        other => return Err(StateError::Database(sqlx::Error::Decode(format!("unknown chunk status {other}").into()))),
    })
}

#[async_trait]
impl StateStore for SqliteStateStore {
    async fn get_tenants(&self) -> Result<Vec<Tenant>> {
        let rows = sqlx::query(
            "SELECT tenant_id, company_name, created_at, deleted_at FROM tenants ORDER BY tenant_id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(Tenant {
                    tenant_id: row.try_get("tenant_id")?,
                    company_name: row.try_get("company_name")?,
                    created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
                    deleted_at: row.try_get::<Option<DateTime<Utc>>, _>("deleted_at")?,
                })
            })
            .collect()
    }

    async fn create_tenant(&self, tenant: Tenant) -> Result<()> {
        sqlx::query(
            "INSERT INTO tenants (tenant_id, company_name, created_at, deleted_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT (tenant_id) DO UPDATE SET company_name = excluded.company_name",
        )
        .bind(&tenant.tenant_id)
        .bind(&tenant.company_name)
        .bind(tenant.created_at)
        .bind(tenant.deleted_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_service_config(&self, tenant_id: &str, service: &str) -> Result<ServiceConfig> {
        let row = sqlx::query(
            "SELECT tenant_id, service_name, enabled, credentials_ref, endpoint_overrides
             FROM service_configs WHERE tenant_id = ? AND service_name = ?",
        )
        .bind(tenant_id)
        .bind(service)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StateError::not_found(format!("service config {tenant_id}/{service}")))?;

        let overrides_json: String = row.try_get("endpoint_overrides")?;
        Ok(ServiceConfig {
            tenant_id: row.try_get("tenant_id")?,
            service_name: row.try_get("service_name")?,
            enabled: row.try_get::<i64, _>("enabled")? != 0,
            credentials_ref: row.try_get("credentials_ref")?,
            endpoint_overrides: serde_json::from_str(&overrides_json)?,
        })
    }

    async fn upsert_service_config(&self, config: ServiceConfig) -> Result<()> {
        let overrides_json = serde_json::to_string(&config.endpoint_overrides)?;
        sqlx::query(
            "INSERT INTO service_configs (tenant_id, service_name, enabled, credentials_ref, endpoint_overrides)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT (tenant_id, service_name) DO UPDATE SET
                enabled = excluded.enabled,
                credentials_ref = excluded.credentials_ref,
                endpoint_overrides = excluded.endpoint_overrides",
        )
        .bind(&config.tenant_id)
        .bind(&config.service_name)
        .bind(config.enabled as i64)
        .bind(&config.credentials_ref)
        .bind(overrides_json)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_service_configs(&self, tenant_id: &str) -> Result<Vec<ServiceConfig>> {
        let rows = sqlx::query(
            "SELECT tenant_id, service_name, enabled, credentials_ref, endpoint_overrides
             FROM service_configs WHERE tenant_id = ? ORDER BY service_name",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let overrides_json: String = row.try_get("endpoint_overrides")?;
                Ok(ServiceConfig {
                    tenant_id: row.try_get("tenant_id")?,
                    service_name: row.try_get("service_name")?,
                    enabled: row.try_get::<i64, _>("enabled")? != 0,
                    credentials_ref: row.try_get("credentials_ref")?,
                    endpoint_overrides: serde_json::from_str(&overrides_json)?,
                })
            })
            .collect()
    }

    async fn get_watermark(&self, tenant_id: &str, table_name: &str) -> Result<Watermark> {
        let row = sqlx::query(
            "SELECT tenant_id, table_name, last_updated_ts, last_successful_job_id, updated_at
             FROM watermarks WHERE tenant_id = ? AND table_name = ?",
        )
        .bind(tenant_id)
        .bind(table_name)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Watermark {
                tenant_id: row.try_get("tenant_id")?,
                table_name: row.try_get("table_name")?,
                last_updated_ts: row.try_get("last_updated_ts")?,
                last_successful_job_id: row.try_get("last_successful_job_id")?,
                updated_at: row.try_get("updated_at")?,
            }),
            None => Ok(Watermark::epoch(tenant_id, table_name)),
        }
    }

    async fn set_watermark(
        &self,
        tenant_id: &str,
        table_name: &str,
        last_updated_ts: DateTime<Utc>,
        job_id: &str,
    ) -> Result<()> {
        let now = Utc::now();

        // Insert-if-absent, otherwise update only if the new timestamp is
        // not behind what's stored — one statement, atomic per key.
        let result = sqlx::query(
            "INSERT INTO watermarks (tenant_id, table_name, last_updated_ts, last_successful_job_id, updated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT (tenant_id, table_name) DO UPDATE SET
                last_updated_ts = excluded.last_updated_ts,
                last_successful_job_id = excluded.last_successful_job_id,
                updated_at = excluded.updated_at
             WHERE excluded.last_updated_ts >= watermarks.last_updated_ts",
        )
        .bind(tenant_id)
        .bind(table_name)
        .bind(last_updated_ts)
        .bind(job_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StateError::conflict(format!(
                "watermark for {tenant_id}/{table_name} is already at or past {last_updated_ts}"
            )));
        }
        Ok(())
    }

    async fn create_job(&self, job: &Job) -> Result<()> {
        let summary_json = serde_json::to_string(&job.summary)?;
        sqlx::query(
            "INSERT INTO jobs (job_id, run_kind, tenant_set, status, created_at, finished_at, summary)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&job.job_id)
        .bind(run_kind_str(job.run_kind))
        .bind(serde_json::to_string(&job.tenant_set)?)
        .bind(job_status_str(job.status))
        .bind(job.created_at)
        .bind(job.finished_at)
        .bind(summary_json)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_job_status(
        &self,
        job_id: &str,
        status: JobStatus,
        summary: Option<JobSummary>,
    ) -> Result<()> {
        let finished_at = if status.is_terminal() { Some(Utc::now()) } else { None };

        if let Some(summary) = summary {
            let summary_json = serde_json::to_string(&summary)?;
            sqlx::query(
                "UPDATE jobs SET status = ?, finished_at = ?, summary = ? WHERE job_id = ?",
            )
            .bind(job_status_str(status))
            .bind(finished_at)
            .bind(summary_json)
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        } else {
            sqlx::query("UPDATE jobs SET status = ?, finished_at = ? WHERE job_id = ?")
                .bind(job_status_str(status))
                .bind(finished_at)
                .bind(job_id)
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    async fn get_job(&self, job_id: &str) -> Result<Job> {
        let row = sqlx::query(
            "SELECT job_id, run_kind, tenant_set, status, created_at, finished_at, summary
             FROM jobs WHERE job_id = ?",
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StateError::not_found(format!("job {job_id}")))?;

        let tenant_set_json: String = row.try_get("tenant_set")?;
        let summary_json: String = row.try_get("summary")?;
        let status_str: String = row.try_get("status")?;
        let run_kind_raw: String = row.try_get("run_kind")?;

        Ok(Job {
            job_id: row.try_get("job_id")?,
            run_kind: run_kind_from_str(&run_kind_raw)?,
            tenant_set: serde_json::from_str(&tenant_set_json)?,
            status: job_status_from_str(&status_str)?,
            created_at: row.try_get("created_at")?,
            finished_at: row.try_get::<Option<DateTime<Utc>>, _>("finished_at")?,
            summary: serde_json::from_str(&summary_json)?,
        })
    }

    async fn upsert_chunk(&self, chunk: &ChunkProgress) -> Result<()> {
        let result = sqlx::query(
            "INSERT INTO chunk_progress
                (job_id, tenant_id, table_name, chunk_id, window_start, window_end,
                 status, attempt_count, records_written, raw_last_updated_max, error)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (job_id, chunk_id) DO UPDATE SET
                status = excluded.status,
                attempt_count = excluded.attempt_count,
                records_written = excluded.records_written,
                raw_last_updated_max = excluded.raw_last_updated_max,
                error = excluded.error
             WHERE chunk_progress.status != 'succeeded'",
        )
        .bind(&chunk.job_id)
        .bind(&chunk.tenant_id)
        .bind(&chunk.table_name)
        .bind(&chunk.chunk_id)
        .bind(chunk.window_start)
        .bind(chunk.window_end)
        .bind(chunk_status_str(chunk.status))
        .bind(chunk.attempt_count as i64)
        .bind(chunk.records_written as i64)
        .bind(chunk.raw_last_updated_max)
        .bind(&chunk.error)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Either the insert collided with an existing succeeded row, or
            // this is a no-op re-write of an already-succeeded chunk.
            let existing = sqlx::query("SELECT status FROM chunk_progress WHERE job_id = ? AND chunk_id = ?")
                .bind(&chunk.job_id)
                .bind(&chunk.chunk_id)
                .fetch_optional(&self.pool)
                .await?;
            if let Some(row) = existing {
                let status: String = row.try_get("status")?;
                if status == "succeeded" {
                    return Err(StateError::already_terminal(format!(
                        "chunk {} for job {} already succeeded",
                        chunk.chunk_id, chunk.job_id
                    )));
                }
            }
        }
        Ok(())
    }

    async fn list_chunks(&self, job_id: &str) -> Result<Vec<ChunkProgress>> {
        let rows = sqlx::query(
            "SELECT job_id, tenant_id, table_name, chunk_id, window_start, window_end,
                    status, attempt_count, records_written, raw_last_updated_max, error
             FROM chunk_progress WHERE job_id = ? ORDER BY tenant_id, table_name, window_start",
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_chunk_progress).collect()
    }

    async fn list_chunks_for_table(
        &self,
        job_id: &str,
        tenant_id: &str,
        table_name: &str,
    ) -> Result<Vec<ChunkProgress>> {
        let rows = sqlx::query(
            "SELECT job_id, tenant_id, table_name, chunk_id, window_start, window_end,
                    status, attempt_count, records_written, raw_last_updated_max, error
             FROM chunk_progress
             WHERE job_id = ? AND tenant_id = ? AND table_name = ?
             ORDER BY window_start",
        )
        .bind(job_id)
        .bind(tenant_id)
        .bind(table_name)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_chunk_progress).collect()
    }
}

fn row_to_chunk_progress(row: &sqlx::sqlite::SqliteRow) -> Result<ChunkProgress> {
    let status_str: String = row.try_get("status")?;
    Ok(ChunkProgress {
        job_id: row.try_get("job_id")?,
        tenant_id: row.try_get("tenant_id")?,
        table_name: row.try_get("table_name")?,
        chunk_id: row.try_get("chunk_id")?,
        window_start: row.try_get("window_start")?,
        window_end: row.try_get("window_end")?,
        status: chunk_status_from_str(&status_str)?,
        attempt_count: row.try_get::<i64, _>("attempt_count")? as u32,
        records_written: row.try_get::<i64, _>("records_written")? as u64,
        raw_last_updated_max: row.try_get::<Option<DateTime<Utc>>, _>("raw_last_updated_max")?,
        error: row.try_get("error")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use avesa_core::{ChunkProgress, JobSummary};

    async fn open_tmp() -> (SqliteStateStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.db");
        let store = SqliteStateStore::open(path.to_str().unwrap()).await.unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn watermark_defaults_to_epoch() {
        let (store, _dir) = open_tmp().await;
        let wm = store.get_watermark("t1", "companies").await.unwrap();
        assert_eq!(wm.last_updated_ts.timestamp(), 0);
    }

    #[tokio::test]
    async fn set_watermark_rejects_regression() {
        let (store, _dir) = open_tmp().await;
        let now = Utc::now();
        store.set_watermark("t1", "companies", now, "job-1").await.unwrap();

        let earlier = now - chrono::Duration::seconds(60);
        let err = store.set_watermark("t1", "companies", earlier, "job-2").await.unwrap_err();
        assert!(matches!(err, StateError::Conflict(_)));
    }

    #[tokio::test]
    async fn upsert_chunk_rejects_writes_after_success() {
        let (store, _dir) = open_tmp().await;
        let mut chunk = ChunkProgress::new_pending(
            "job-1",
            "t1",
            "companies",
            Utc::now() - chrono::Duration::hours(1),
            Utc::now(),
        );
        store.upsert_chunk(&chunk).await.unwrap();

        chunk.status = avesa_core::ChunkStatus::Succeeded;
        chunk.records_written = 10;
        store.upsert_chunk(&chunk).await.unwrap();

        chunk.records_written = 999;
        let err = store.upsert_chunk(&chunk).await.unwrap_err();
        assert!(matches!(err, StateError::AlreadyTerminal(_)));
    }

    #[tokio::test]
    async fn job_round_trips_with_summary() {
        let (store, _dir) = open_tmp().await;
        let job = Job {
            job_id: "job-1".to_string(),
            run_kind: RunKind::Scheduled,
            tenant_set: vec!["t1".to_string()],
            status: JobStatus::Running,
            created_at: Utc::now(),
            finished_at: None,
            summary: JobSummary::default(),
        };
        store.create_job(&job).await.unwrap();
        store.update_job_status("job-1", JobStatus::Succeeded, Some(JobSummary::default())).await.unwrap();

        let fetched = store.get_job("job-1").await.unwrap();
        assert_eq!(fetched.status, JobStatus::Succeeded);
        assert!(fetched.finished_at.is_some());
    }
}
