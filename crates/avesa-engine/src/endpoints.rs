//! The static per-service endpoint registry (`spec` §3, §4.6): read-only
//! at runtime, populated once at process start from the connector
//! registry's own configuration rather than the state store — a tenant
//! cannot add endpoints, only enable/disable the services that expose
//! them via `ServiceConfig`.

use avesa_core::EndpointConfig;
use std::collections::HashMap;

#[derive(Default)]
pub struct EndpointRegistry {
    by_service: HashMap<String, Vec<EndpointConfig>>,
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, service: impl Into<String>, endpoints: Vec<EndpointConfig>) {
        self.by_service.insert(service.into(), endpoints);
    }

    /// Enabled endpoints for `service`, in registration order. An unknown
    /// service resolves to an empty slice rather than an error — a
    /// `ServiceConfig` with no matching endpoints simply contributes no
    /// tables, which the Tenant Processor treats the same as a
    /// fully-disabled service.
    pub fn for_service(&self, service: &str) -> &[EndpointConfig] {
        self.by_service.get(service).map(Vec::as_slice).unwrap_or(&[])
    }
}
