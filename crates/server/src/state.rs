use std::sync::Arc;
use tubepipe_core::{Config, JobStore, StreamOrchestrator};

/// Shared application state
pub struct AppState {
    config: Config,
    orchestrator: Arc<StreamOrchestrator>,
}

impl AppState {
    pub fn new(config: Config, orchestrator: Arc<StreamOrchestrator>) -> Self {
        Self {
            config,
            orchestrator,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn job_store(&self) -> &dyn JobStore {
        self.orchestrator.context().jobs.as_ref()
    }

    pub fn orchestrator(&self) -> &Arc<StreamOrchestrator> {
        &self.orchestrator
    }
}
