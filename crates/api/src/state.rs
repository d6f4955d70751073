//! Application state shared across handlers.

use std::sync::Arc;

use orchestrator::Orchestrator;
use roundtable_core::Gateway;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Turn orchestrator.
    pub orchestrator: Arc<Orchestrator>,
    /// Gateway name reported by the health check.
    pub gateway_name: String,
}

impl AppState {
    /// Build state around a gateway, reading the director prompt from the environment.
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        let gateway_name = gateway.name().to_string();
        Self::with_orchestrator(Orchestrator::from_env(gateway), gateway_name)
    }

    /// Build state around an existing orchestrator.
    pub fn with_orchestrator(orchestrator: Orchestrator, gateway_name: impl Into<String>) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            gateway_name: gateway_name.into(),
        }
    }
}
