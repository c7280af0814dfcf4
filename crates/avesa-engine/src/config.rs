//! Engine-level concurrency and timing knobs (`spec` §5, §6). The root
//! `avesa` crate owns the layered TOML/env/CLI configuration surface and
//! constructs one of these to hand to the orchestrator.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub tenants_concurrency: usize,
    pub tables_concurrency: usize,
    pub chunks_concurrency: usize,
    pub chunk_duration: Duration,
    pub chunk_timeout: Duration,
    pub job_timeout: Duration,
    pub max_pages_in_memory: usize,
    pub rate_limit_wait_max: Duration,
    pub reject_ratio_max: f64,
    /// Clock-skew guard subtracted from `now` when computing a table's run
    /// window upper bound (`spec` §4.5).
    pub clock_skew_guard: Duration,
}

impl EngineConfig {
    /// `max_open_chunks = tenants_concurrency * tables_concurrency * chunks_concurrency` (`spec` §4.7).
    pub fn max_open_chunks(&self) -> usize {
        self.tenants_concurrency * self.tables_concurrency * self.chunks_concurrency
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tenants_concurrency: 10,
            tables_concurrency: 4,
            chunks_concurrency: 3,
            chunk_duration: Duration::from_secs(2 * 24 * 3600),
            chunk_timeout: Duration::from_secs(15 * 60),
            job_timeout: Duration::from_secs(4 * 3600),
            max_pages_in_memory: 5,
            rate_limit_wait_max: Duration::from_secs(60),
            reject_ratio_max: 5.0,
            clock_skew_guard: Duration::from_secs(30),
        }
    }
}
