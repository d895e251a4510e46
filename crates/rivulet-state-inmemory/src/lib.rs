//! In-memory state store implementation for the Rivulet flow controller
//!
//! This crate provides in-memory implementations of the repository
//! contracts defined in rivulet-core. It is useful for development, tests,
//! and single-process deployments where persistence is not required; the
//! run-state repository enforces the same revision-checked conditional
//! write a durable adapter would.

use std::sync::Arc;

pub mod repositories;
pub use repositories::{InMemoryFlowDefinitionRepository, InMemoryFlowRunStateRepository};


use rivulet_core::{FlowDefinitionRepository, FlowRunStateRepository};

/// Provider for in-memory state store repositories
///
/// The provider owns the shared storage; repositories handed out by the
/// same provider see the same data.
pub struct InMemoryStateStoreProvider {
    definition_repo: Arc<InMemoryFlowDefinitionRepository>,
    run_state_repo: Arc<InMemoryFlowRunStateRepository>,
}

impl InMemoryStateStoreProvider {
    /// Create a new in-memory state store provider
    pub fn new() -> Self {
        Self {
            definition_repo: Arc::new(InMemoryFlowDefinitionRepository::new()),
            run_state_repo: Arc::new(InMemoryFlowRunStateRepository::new()),
        }
    }

    /// The flow definition repository backed by this provider
    pub fn definition_repository(&self) -> Arc<dyn FlowDefinitionRepository> {
        self.definition_repo.clone()
    }

    /// The run state repository backed by this provider
    pub fn run_state_repository(&self) -> Arc<dyn FlowRunStateRepository> {
        self.run_state_repo.clone()
    }
}

impl Default for InMemoryStateStoreProvider {
    fn default() -> Self {
        Self::new()
    }
}
