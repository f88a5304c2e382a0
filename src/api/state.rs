//! HTTP 共享状态

use std::sync::Arc;

use crate::workflow::WorkflowEngine;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<WorkflowEngine>,
    pub service_name: String,
}

impl AppState {
    pub fn new(engine: Arc<WorkflowEngine>, service_name: impl Into<String>) -> Self {
        Self {
            engine,
            service_name: service_name.into(),
        }
    }
}
