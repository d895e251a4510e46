use crate::domain::classify::classify;
use crate::domain::event::{EventStatus, TaskEvent};
use crate::domain::flow_definition::{normalize_steps, FlowDefinition, StepDefinition};
use crate::domain::flow_run::{FlowRunState, StepId, StepRecord};
use crate::domain::repository::{FlowDefinitionRepository, FlowRunStateRepository};
use crate::publish::{FlowNotifier, MessagePublisher, NotificationKind, TopicName};
use crate::{DataPacket, FlowError};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// What handling one event did to the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// A new run was created and its first step dispatched
    RunStarted(StepId),

    /// The run advanced and the next step was dispatched
    StepDispatched(StepId),

    /// The run completed successfully
    RunCompleted,

    /// The run failed; the failure notification was published
    RunFailed,

    /// Duplicate or informational delivery; state was left untouched
    NoChange,
}

/// Orchestration service for flow runs
///
/// Each inbound event is handled by one stateless invocation: read the run
/// state, decide the next action, persist, publish. The state machine is
/// `Pending -> Running -> {Completed, Failed}` with linear advancement over
/// the plan persisted at run creation.
pub struct FlowExecutionService {
    /// Repository for flow definitions
    definition_repo: Arc<dyn FlowDefinitionRepository>,

    /// Repository for run state
    run_state_repo: Arc<dyn FlowRunStateRepository>,

    /// Downstream publisher
    publisher: Arc<dyn MessagePublisher>,

    /// User notification boundary
    notifier: Arc<dyn FlowNotifier>,

    /// Topic step dispatches are published on
    trigger_topic: TopicName,

    /// Topic controller status messages are published on
    controller_topic: TopicName,
}

impl FlowExecutionService {
    /// Create a new flow execution service
    pub fn new(
        definition_repo: Arc<dyn FlowDefinitionRepository>,
        run_state_repo: Arc<dyn FlowRunStateRepository>,
        publisher: Arc<dyn MessagePublisher>,
        notifier: Arc<dyn FlowNotifier>,
        trigger_topic: TopicName,
        controller_topic: TopicName,
    ) -> Self {
        Self {
            definition_repo,
            run_state_repo,
            publisher,
            notifier,
            trigger_topic,
            controller_topic,
        }
    }

    /// Handle one decoded event
    pub async fn handle_event(&self, event: &TaskEvent) -> Result<ExecutionOutcome, FlowError> {
        let state = self
            .run_state_repo
            .find(&event.flow_id, &event.run_id)
            .await?;

        match state {
            None if event.is_start() => self.start_run(event).await,
            None => Err(FlowError::StateNotFound {
                flow_id: event.flow_id.0.clone(),
                run_id: event.run_id.0.clone(),
            }),
            Some(state) => self.advance_run(state, event).await,
        }
    }

    /// Handle the first event of a run
    async fn start_run(&self, event: &TaskEvent) -> Result<ExecutionOutcome, FlowError> {
        let steps = self.resolve_steps(event).await?;

        let definition = FlowDefinition {
            flow_id: event.flow_id.clone(),
            account: event.account.clone(),
            steps,
        };
        definition
            .validate()
            .map_err(|err| FlowError::ConfigurationError {
                flow_id: event.flow_id.0.clone(),
                run_id: event.run_id.0.clone(),
                message: err.to_string(),
            })?;

        let mode = classify(&definition.steps);

        let mut state = FlowRunState::new(
            event.flow_id.clone(),
            event.run_id.clone(),
            event.account.clone(),
            definition.steps,
            mode,
        );
        let first = state.start()?;

        info!(
            flow_id = %state.flow_id.0,
            run_id = %state.run_id.0,
            mode = ?mode,
            steps = state.steps.len(),
            "starting flow run"
        );

        self.persist(&state).await?;
        self.dispatch(&state, &first).await?;
        self.publish_status(&state, "run_started").await?;
        self.notifier
            .send_flow_notification(&state, NotificationKind::Dispatched)
            .await?;

        Ok(ExecutionOutcome::RunStarted(first))
    }

    /// Resolve the step list for a new run
    ///
    /// An inline `flow_config` on the event takes precedence over the
    /// definition store.
    async fn resolve_steps(&self, event: &TaskEvent) -> Result<Vec<StepDefinition>, FlowError> {
        if let Some(flow_config) = &event.flow_config {
            return normalize_steps(flow_config);
        }

        let definition = self
            .definition_repo
            .find(&event.account, &event.flow_id)
            .await?
            .ok_or_else(|| FlowError::DefinitionNotFound {
                flow_id: event.flow_id.0.clone(),
                run_id: event.run_id.0.clone(),
            })?;

        Ok(definition.steps)
    }

    /// Handle a progress event for an existing run
    async fn advance_run(
        &self,
        state: FlowRunState,
        event: &TaskEvent,
    ) -> Result<ExecutionOutcome, FlowError> {
        if state.status.is_terminal() {
            debug!(
                flow_id = %state.flow_id.0,
                run_id = %state.run_id.0,
                status = ?state.status,
                "event for terminal run ignored"
            );
            return Ok(ExecutionOutcome::NoChange);
        }

        let step_id = match &event.step {
            Some(step) => step.clone(),
            None => {
                // Re-delivered start event for a run that already exists
                debug!(
                    flow_id = %state.flow_id.0,
                    run_id = %state.run_id.0,
                    "start event for existing run ignored"
                );
                return Ok(ExecutionOutcome::NoChange);
            }
        };

        if !state.has_step(&step_id) {
            return Err(FlowError::ExecutionError {
                flow_id: state.flow_id.0.clone(),
                run_id: state.run_id.0.clone(),
                message: format!("event references unknown step {}", step_id.0),
            });
        }

        match event.status {
            Some(EventStatus::Completed) => self.complete_step(state, step_id, event).await,
            Some(EventStatus::Failed) => self.fail_step(state, step_id, event).await,
            other => {
                debug!(
                    flow_id = %state.flow_id.0,
                    run_id = %state.run_id.0,
                    step_id = %step_id.0,
                    status = ?other,
                    "informational step status ignored"
                );
                Ok(ExecutionOutcome::NoChange)
            }
        }
    }

    /// Advance past a completed step, or complete the run
    async fn complete_step(
        &self,
        mut state: FlowRunState,
        step_id: StepId,
        event: &TaskEvent,
    ) -> Result<ExecutionOutcome, FlowError> {
        if state.is_step_completed(&step_id) {
            // At-least-once delivery: the broker may hand us the same
            // completion twice
            debug!(
                flow_id = %state.flow_id.0,
                run_id = %state.run_id.0,
                step_id = %step_id.0,
                "duplicate completion report ignored"
            );
            return Ok(ExecutionOutcome::NoChange);
        }

        if state.current_step_id.as_ref() != Some(&step_id) {
            let current = state
                .current_step_id
                .as_ref()
                .map(|step| step.0.as_str())
                .unwrap_or("<none>");
            return Err(FlowError::ExecutionError {
                flow_id: state.flow_id.0.clone(),
                run_id: state.run_id.0.clone(),
                message: format!(
                    "step {} reported completed but the current step is {}",
                    step_id.0, current
                ),
            });
        }

        state.record_step(StepRecord::completed(step_id.clone(), event.result.clone()))?;

        match state
            .next_step_after(&step_id)
            .map(|step| StepId(step.id.clone()))
        {
            Some(next) => {
                state.advance_to(next.clone())?;
                self.persist(&state).await?;
                self.dispatch(&state, &next).await?;
                self.publish_status(&state, "step_dispatched").await?;

                info!(
                    flow_id = %state.flow_id.0,
                    run_id = %state.run_id.0,
                    completed = %step_id.0,
                    dispatched = %next.0,
                    "advanced flow run"
                );
                Ok(ExecutionOutcome::StepDispatched(next))
            }
            None => {
                state.complete()?;
                self.persist(&state).await?;
                self.publish_status(&state, "run_completed").await?;
                self.notifier
                    .send_flow_notification(&state, NotificationKind::Completed)
                    .await?;

                info!(
                    flow_id = %state.flow_id.0,
                    run_id = %state.run_id.0,
                    "flow run completed"
                );
                Ok(ExecutionOutcome::RunCompleted)
            }
        }
    }

    /// Record a step failure and fail the run
    async fn fail_step(
        &self,
        mut state: FlowRunState,
        step_id: StepId,
        event: &TaskEvent,
    ) -> Result<ExecutionOutcome, FlowError> {
        let detail = event
            .error
            .clone()
            .unwrap_or_else(|| "step reported failure".to_string());
        let wrapped = FlowError::StepExecutionError {
            flow_id: state.flow_id.0.clone(),
            run_id: state.run_id.0.clone(),
            step_id: step_id.0.clone(),
            message: detail.clone(),
        };

        state.record_step(StepRecord::failed(step_id.clone(), detail))?;
        state.fail(wrapped.to_string())?;

        self.persist(&state).await?;
        self.publish_status(&state, "run_failed").await?;
        self.notifier
            .send_flow_notification(&state, NotificationKind::Failed)
            .await?;

        warn!(
            flow_id = %state.flow_id.0,
            run_id = %state.run_id.0,
            step_id = %step_id.0,
            "flow run failed"
        );
        Ok(ExecutionOutcome::RunFailed)
    }

    /// Save run state
    ///
    /// Once a transition decision has been made, a failed save still
    /// attempts a failure notification before the error is re-raised, so
    /// the run is never silently stuck.
    async fn persist(&self, state: &FlowRunState) -> Result<(), FlowError> {
        if let Err(save_err) = self.run_state_repo.save(state).await {
            error!(
                flow_id = %state.flow_id.0,
                run_id = %state.run_id.0,
                error = %save_err,
                "failed to persist run state"
            );

            if let Err(notify_err) = self
                .notifier
                .send_flow_notification(state, NotificationKind::Failed)
                .await
            {
                warn!(
                    flow_id = %state.flow_id.0,
                    run_id = %state.run_id.0,
                    error = %notify_err,
                    "best-effort failure notification was not delivered"
                );
            }

            return Err(save_err);
        }

        Ok(())
    }

    /// Publish a step dispatch on the trigger topic
    async fn dispatch(&self, state: &FlowRunState, step_id: &StepId) -> Result<(), FlowError> {
        let step = state
            .steps
            .iter()
            .find(|step| step.id == step_id.0)
            .ok_or_else(|| FlowError::ExecutionError {
                flow_id: state.flow_id.0.clone(),
                run_id: state.run_id.0.clone(),
                message: format!("dispatch target {} is not in the plan", step_id.0),
            })?;

        let message = DataPacket::new(json!({
            "flow_id": state.flow_id.0,
            "run_id": state.run_id.0,
            "account": state.account.0,
            "mode": state.mode,
            "step": step,
        }));

        let message_id = self.publisher.publish(&self.trigger_topic, message).await?;
        debug!(
            flow_id = %state.flow_id.0,
            run_id = %state.run_id.0,
            step_id = %step_id.0,
            message_id = %message_id,
            "dispatched step"
        );

        Ok(())
    }

    /// Publish a controller status message
    async fn publish_status(&self, state: &FlowRunState, kind: &str) -> Result<(), FlowError> {
        let message = DataPacket::new(json!({
            "flow_id": state.flow_id.0,
            "run_id": state.run_id.0,
            "account": state.account.0,
            "status": state.status,
            "current_step": state.current_step_id,
            "event": kind,
        }));

        self.publisher
            .publish(&self.controller_topic, message)
            .await?;

        Ok(())
    }
}
