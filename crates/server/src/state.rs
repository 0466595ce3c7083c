use std::sync::Arc;

use conveyor_core::{Config, ErrorLog, EventBus, ItemStore, PipelineOrchestrator, SanitizedConfig};

use crate::api::WsBroadcaster;

/// Shared application state
pub struct AppState {
    config: Config,
    store: Arc<dyn ItemStore>,
    errors: Arc<dyn ErrorLog>,
    bus: EventBus,
    orchestrator: Option<Arc<PipelineOrchestrator>>,
    ws_broadcaster: WsBroadcaster,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn ItemStore>,
        errors: Arc<dyn ErrorLog>,
        bus: EventBus,
        orchestrator: Option<Arc<PipelineOrchestrator>>,
        ws_broadcaster: WsBroadcaster,
    ) -> Self {
        Self {
            config,
            store,
            errors,
            bus,
            orchestrator,
            ws_broadcaster,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn store(&self) -> &dyn ItemStore {
        self.store.as_ref()
    }

    pub fn errors(&self) -> &dyn ErrorLog {
        self.errors.as_ref()
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn orchestrator(&self) -> Option<&Arc<PipelineOrchestrator>> {
        self.orchestrator.as_ref()
    }

    pub fn ws_broadcaster(&self) -> &WsBroadcaster {
        &self.ws_broadcaster
    }

    /// Let the orchestrator act on an operator change right away.
    pub fn wake_orchestrator(&self) {
        if let Some(orchestrator) = &self.orchestrator {
            orchestrator.wake();
        }
    }
}
