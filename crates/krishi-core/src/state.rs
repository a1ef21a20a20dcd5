//! Shared application state for the HTTP server and CLI.

use std::sync::Arc;
use std::time::Duration;

use crate::flow::{FlowExecutor, FlowRegistry};
use crate::model::ModelClient;

pub struct AppStateInner {
    pub registry: Arc<FlowRegistry>,
    pub executor: FlowExecutor,
}

pub type AppState = Arc<AppStateInner>;

impl AppStateInner {
    /// Freeze the registry and bind it to a model client.
    pub fn new(registry: FlowRegistry, client: Arc<dyn ModelClient>) -> Self {
        let registry = Arc::new(registry);
        Self {
            executor: FlowExecutor::new(registry.clone(), client),
            registry,
        }
    }

    /// Bound every execution by `deadline`, usually `ModelConfig::deadline()`.
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        if let Some(limit) = deadline {
            self.executor = self.executor.with_timeout(limit);
        }
        self
    }
}
