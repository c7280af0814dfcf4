//! The `ConnectorRegistry`: built once at orchestrator start. Looking up a
//! service name that was never registered fails immediately
//! (`ConnectError::UnknownService`) — "fail at orchestrator start, not
//! mid-run" per `spec` §4.2.

use crate::connector::SourceConnector;
use crate::error::{ConnectError, Result};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
pub struct ConnectorRegistry {
    connectors: HashMap<String, Arc<dyn SourceConnector>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, connector: Arc<dyn SourceConnector>) {
        self.connectors.insert(connector.service_name().to_string(), connector);
    }

    pub fn get(&self, service: &str) -> Result<Arc<dyn SourceConnector>> {
        self.connectors
            .get(service)
            .cloned()
            .ok_or_else(|| ConnectError::UnknownService(service.to_string()))
    }

    /// Validate that every `services` entry has a registered connector —
    /// called once at orchestrator start so an unknown service is rejected
    /// before any tenant processing begins.
    pub fn validate_services(&self, services: &[String]) -> Result<()> {
        for service in services {
            self.get(service)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockConnector;

    #[test]
    fn unregistered_service_is_rejected() {
        let registry = ConnectorRegistry::new();
        let err = registry.get("connectwise").unwrap_err();
        assert!(matches!(err, ConnectError::UnknownService(_)));
    }

    #[test]
    fn registered_service_resolves() {
        let mut registry = ConnectorRegistry::new();
        registry.register(Arc::new(MockConnector::empty("connectwise")));
        assert!(registry.get("connectwise").is_ok());
    }

    #[test]
    fn validate_services_rejects_on_first_unknown() {
        let mut registry = ConnectorRegistry::new();
        registry.register(Arc::new(MockConnector::empty("connectwise")));
        let err = registry
            .validate_services(&["connectwise".to_string(), "halopsa".to_string()])
            .unwrap_err();
        assert!(matches!(err, ConnectError::UnknownService(_)));
    }
}
