//! Tool execution context - the backend handle tools run against

use std::fmt;
use std::sync::Arc;

use crate::backend::CloudBackend;

/// Execution context shared by every tool in a registry
#[derive(Clone)]
pub struct ToolContext {
    backend: Arc<dyn CloudBackend>,
}

impl ToolContext {
    pub fn new(backend: Arc<dyn CloudBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &dyn CloudBackend {
        self.backend.as_ref()
    }
}

impl fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolContext")
            .field("backend", &self.backend.name())
            .finish()
    }
}
