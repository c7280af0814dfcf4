//! The capability bundle threaded through every tier of the engine
//! (`spec` §9: "pass a `Context` value carrying references to State, Blob,
//! Column, Secret stores and a cancellation token. No process-wide mutable
//! state.").

use crate::config::EngineConfig;
use avesa_canonical::CanonicalApplier;
use avesa_connect::ConnectorRegistry;
use avesa_interface::blob::BlobStore;
use avesa_interface::secret::SecretStore;
use avesa_observability::UnifiedLogger;
use avesa_state::StateStore;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct Context {
    pub state: Arc<dyn StateStore>,
    pub blob: Arc<dyn BlobStore>,
    pub secrets: Arc<dyn SecretStore>,
    pub connectors: Arc<ConnectorRegistry>,
    pub canonical: Arc<CanonicalApplier>,
    pub config: Arc<EngineConfig>,
    pub cancel: CancellationToken,
    /// Audit plane (`spec` §10): a no-op `UnifiedLogger::disabled()` when no
    /// audit secret/path is configured, so every call site can emit
    /// unconditionally.
    pub audit: Arc<UnifiedLogger>,
}

impl Context {
    /// A child token that cancels when the parent does but can also be
    /// cancelled independently — used to scope a single job's lifetime
    /// without affecting sibling jobs sharing the same process.
    pub fn child(&self) -> Self {
        Self {
            cancel: self.cancel.child_token(),
            ..self.clone()
        }
    }
}
