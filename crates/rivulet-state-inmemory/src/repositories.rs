use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

use rivulet_core::{
    AccountId, FlowDefinition, FlowDefinitionRepository, FlowError, FlowId, FlowRunState,
    FlowRunStateRepository, RunId,
};

fn definition_key(account: &AccountId, flow_id: &FlowId) -> String {
    format!("{}/{}", account.0, flow_id.0)
}

fn run_key(flow_id: &FlowId, run_id: &RunId) -> String {
    format!("{}:{}", flow_id.0, run_id.0)
}

/// In-memory implementation of the FlowDefinitionRepository
pub struct InMemoryFlowDefinitionRepository {
    definitions: DashMap<String, FlowDefinition>,
}

impl InMemoryFlowDefinitionRepository {
    /// Create a new in-memory flow definition repository
    pub fn new() -> Self {
        Self {
            definitions: DashMap::with_capacity(16),
        }
    }
}

impl Default for InMemoryFlowDefinitionRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FlowDefinitionRepository for InMemoryFlowDefinitionRepository {
    async fn find(
        &self,
        account: &AccountId,
        flow_id: &FlowId,
    ) -> Result<Option<FlowDefinition>, FlowError> {
        Ok(self
            .definitions
            .get(&definition_key(account, flow_id))
            .map(|definition| definition.clone()))
    }

    async fn save(&self, definition: &FlowDefinition) -> Result<(), FlowError> {
        self.definitions.insert(
            definition_key(&definition.account, &definition.flow_id),
            definition.clone(),
        );

        debug!(
            flow_id = %definition.flow_id.0,
            account = %definition.account.0,
            steps = definition.steps.len(),
            "stored flow definition"
        );
        Ok(())
    }
}

/// In-memory implementation of the FlowRunStateRepository
///
/// `save` is a conditional write: the caller's revision must match the
/// stored one (zero for a new run). The check and the insert happen under
/// the map's per-key entry lock, so two concurrent events for the same
/// `(flow_id, run_id)` serialize and the loser gets a `StateConflict`
/// instead of silently dropping a transition.
pub struct InMemoryFlowRunStateRepository {
    states: DashMap<String, FlowRunState>,
}

impl InMemoryFlowRunStateRepository {
    /// Create a new in-memory run state repository
    pub fn new() -> Self {
        Self {
            states: DashMap::with_capacity(64),
        }
    }
}

impl Default for InMemoryFlowRunStateRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FlowRunStateRepository for InMemoryFlowRunStateRepository {
    async fn find(
        &self,
        flow_id: &FlowId,
        run_id: &RunId,
    ) -> Result<Option<FlowRunState>, FlowError> {
        Ok(self
            .states
            .get(&run_key(flow_id, run_id))
            .map(|state| state.clone()))
    }

    async fn save(&self, state: &FlowRunState) -> Result<(), FlowError> {
        let key = run_key(&state.flow_id, &state.run_id);

        match self.states.entry(key) {
            Entry::Occupied(mut entry) => {
                if entry.get().revision != state.revision {
                    return Err(FlowError::StateConflict {
                        flow_id: state.flow_id.0.clone(),
                        run_id: state.run_id.0.clone(),
                    });
                }

                let mut persisted = state.clone();
                persisted.revision += 1;
                entry.insert(persisted);
            }
            Entry::Vacant(entry) => {
                if state.revision != 0 {
                    return Err(FlowError::StateConflict {
                        flow_id: state.flow_id.0.clone(),
                        run_id: state.run_id.0.clone(),
                    });
                }

                let mut persisted = state.clone();
                persisted.revision = 1;
                entry.insert(persisted);
            }
        }

        debug!(
            flow_id = %state.flow_id.0,
            run_id = %state.run_id.0,
            status = ?state.status,
            "stored run state"
        );
        Ok(())
    }
}
