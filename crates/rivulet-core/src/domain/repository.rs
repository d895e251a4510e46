//! Repository traits for the Rivulet controller
//!
//! This module defines the storage contracts the controller depends on.
//! External crates implement these traits to provide different persistence
//! mechanisms; the controller only depends on the signatures.

use async_trait::async_trait;

use super::flow_definition::FlowDefinition;
use super::flow_run::{AccountId, FlowId, FlowRunState, RunId};
use crate::FlowError;

/// Repository for flow definitions
///
/// Definitions are read-only to the controller; `find` returns `None` (not
/// an error) when no definition exists for the pair, and the executor maps
/// that to [`FlowError::DefinitionNotFound`] at its own boundary.
#[async_trait]
pub trait FlowDefinitionRepository: Send + Sync {
    /// Look up the definition for an account's flow
    async fn find(
        &self,
        account: &AccountId,
        flow_id: &FlowId,
    ) -> Result<Option<FlowDefinition>, FlowError>;

    /// Save a flow definition
    async fn save(&self, definition: &FlowDefinition) -> Result<(), FlowError>;
}

/// Repository for flow run state
///
/// The single source of truth for in-flight runs. The controller calls
/// `find` before deciding the next action and `save` after every
/// transition, including failure paths.
#[async_trait]
pub trait FlowRunStateRepository: Send + Sync {
    /// Find run state by its `(flow_id, run_id)` key
    async fn find(
        &self,
        flow_id: &FlowId,
        run_id: &RunId,
    ) -> Result<Option<FlowRunState>, FlowError>;

    /// Conditionally save run state
    ///
    /// The write succeeds only when `state.revision` matches the stored
    /// revision (zero for a new run); the stored copy's revision is bumped
    /// on success. A mismatch means a concurrent event won the race and
    /// surfaces as [`FlowError::StateConflict`], so a lost update is a
    /// retriable error rather than a silently dropped transition.
    async fn save(&self, state: &FlowRunState) -> Result<(), FlowError>;
}

/// Memory implementations for testing
#[cfg(feature = "testing")]
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::sync::RwLock;

    fn run_key(flow_id: &FlowId, run_id: &RunId) -> String {
        format!("{}:{}", flow_id.0, run_id.0)
    }

    fn definition_key(account: &AccountId, flow_id: &FlowId) -> String {
        format!("{}/{}", account.0, flow_id.0)
    }

    /// In-memory flow definition repository
    pub struct MemoryFlowDefinitionRepository {
        definitions: RwLock<HashMap<String, FlowDefinition>>,
    }

    impl MemoryFlowDefinitionRepository {
        /// Create a new memory flow definition repository
        pub fn new() -> Self {
            Self {
                definitions: RwLock::new(HashMap::new()),
            }
        }
    }

    impl Default for MemoryFlowDefinitionRepository {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl FlowDefinitionRepository for MemoryFlowDefinitionRepository {
        async fn find(
            &self,
            account: &AccountId,
            flow_id: &FlowId,
        ) -> Result<Option<FlowDefinition>, FlowError> {
            let definitions = self.definitions.read().map_err(|e| {
                FlowError::StateStoreError(format!("Failed to acquire read lock: {}", e))
            })?;

            Ok(definitions.get(&definition_key(account, flow_id)).cloned())
        }

        async fn save(&self, definition: &FlowDefinition) -> Result<(), FlowError> {
            let mut definitions = self.definitions.write().map_err(|e| {
                FlowError::StateStoreError(format!("Failed to acquire write lock: {}", e))
            })?;

            definitions.insert(
                definition_key(&definition.account, &definition.flow_id),
                definition.clone(),
            );

            Ok(())
        }
    }

    /// In-memory flow run state repository with revision-checked saves
    pub struct MemoryFlowRunStateRepository {
        states: RwLock<HashMap<String, FlowRunState>>,
    }

    impl MemoryFlowRunStateRepository {
        /// Create a new memory flow run state repository
        pub fn new() -> Self {
            Self {
                states: RwLock::new(HashMap::new()),
            }
        }
    }

    impl Default for MemoryFlowRunStateRepository {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl FlowRunStateRepository for MemoryFlowRunStateRepository {
        async fn find(
            &self,
            flow_id: &FlowId,
            run_id: &RunId,
        ) -> Result<Option<FlowRunState>, FlowError> {
            let states = self.states.read().map_err(|e| {
                FlowError::StateStoreError(format!("Failed to acquire read lock: {}", e))
            })?;

            Ok(states.get(&run_key(flow_id, run_id)).cloned())
        }

        async fn save(&self, state: &FlowRunState) -> Result<(), FlowError> {
            let mut states = self.states.write().map_err(|e| {
                FlowError::StateStoreError(format!("Failed to acquire write lock: {}", e))
            })?;

            let key = run_key(&state.flow_id, &state.run_id);
            let stored_revision = states.get(&key).map(|stored| stored.revision).unwrap_or(0);

            if state.revision != stored_revision {
                return Err(FlowError::StateConflict {
                    flow_id: state.flow_id.0.clone(),
                    run_id: state.run_id.0.clone(),
                });
            }

            let mut persisted = state.clone();
            persisted.revision += 1;
            states.insert(key, persisted);

            Ok(())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::domain::classify::FlowMode;
        use crate::domain::flow_definition::normalize_steps;
        use serde_json::json;

        fn sample_state() -> FlowRunState {
            let steps = normalize_steps(&json!({
                "tasks": {"extract": {"type": "action"}}
            }))
            .unwrap();

            FlowRunState::new(
                FlowId("f1".to_string()),
                RunId("r1".to_string()),
                AccountId("acme".to_string()),
                steps,
                FlowMode::Basic,
            )
        }

        #[tokio::test]
        async fn test_save_bumps_revision() {
            let repo = MemoryFlowRunStateRepository::new();
            let state = sample_state();

            repo.save(&state).await.unwrap();

            let stored = repo
                .find(&state.flow_id, &state.run_id)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(stored.revision, 1);
        }

        #[tokio::test]
        async fn test_stale_revision_conflicts() {
            let repo = MemoryFlowRunStateRepository::new();
            let state = sample_state();

            repo.save(&state).await.unwrap();

            // A second save from the stale revision-0 copy must lose
            let result = repo.save(&state).await;
            assert!(matches!(result, Err(FlowError::StateConflict { .. })));
        }

        #[tokio::test]
        async fn test_definition_round_trip() {
            let repo = MemoryFlowDefinitionRepository::new();
            let account = AccountId("acme".to_string());
            let flow_id = FlowId("f1".to_string());

            assert!(repo.find(&account, &flow_id).await.unwrap().is_none());

            let definition = FlowDefinition {
                flow_id: flow_id.clone(),
                account: account.clone(),
                steps: normalize_steps(&json!({"tasks": {"a": {}}})).unwrap(),
            };
            repo.save(&definition).await.unwrap();

            let found = repo.find(&account, &flow_id).await.unwrap().unwrap();
            assert_eq!(found.steps.len(), 1);

            // Same flow id under a different account stays invisible
            let other = AccountId("other".to_string());
            assert!(repo.find(&other, &flow_id).await.unwrap().is_none());
        }
    }
}
