use crate::domain::classify::FlowMode;
use crate::domain::event::EventStatus;
use crate::domain::flow_definition::StepDefinition;
use crate::{DataPacket, FlowError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Value object: Flow ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowId(pub String);

/// Value object: Run ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

/// Value object: Step ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StepId(pub String);

/// Value object: Account ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(pub String);

/// Run lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Run state created but not yet started
    Pending,

    /// Run is in flight; `current_step_id` names the dispatched step
    Running,

    /// All steps completed
    Completed,

    /// A step reported failure
    Failed,
}

impl RunStatus {
    /// Whether the status is terminal
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

/// One history entry: the reported outcome of a dispatched step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Step the record belongs to
    pub step_id: StepId,

    /// Reported outcome
    pub status: EventStatus,

    /// Result payload reported with the outcome
    pub result: Option<DataPacket>,

    /// Error detail, for failed outcomes
    pub error: Option<String>,

    /// When the outcome was recorded
    pub recorded_at: DateTime<Utc>,
}

impl StepRecord {
    /// Record a successful step outcome
    pub fn completed(step_id: StepId, result: Option<DataPacket>) -> Self {
        Self {
            step_id,
            status: EventStatus::Completed,
            result,
            error: None,
            recorded_at: Utc::now(),
        }
    }

    /// Record a failed step outcome
    pub fn failed(step_id: StepId, error: String) -> Self {
        Self {
            step_id,
            status: EventStatus::Failed,
            result: None,
            error: Some(error),
            recorded_at: Utc::now(),
        }
    }
}

/// Aggregate: the mutable state of one flow run
///
/// Uniquely identified by `(flow_id, run_id)`. The normalized plan and the
/// classifier verdict are persisted with the state so that classification
/// runs exactly once, on the first event of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowRunState {
    /// Flow the run belongs to
    pub flow_id: FlowId,

    /// Unique run identifier within the flow
    pub run_id: RunId,

    /// Account the flow belongs to
    pub account: AccountId,

    /// Current status
    pub status: RunStatus,

    /// The step currently dispatched, while the run is in flight
    pub current_step_id: Option<StepId>,

    /// The persisted plan: normalized steps in dispatch order
    pub steps: Vec<StepDefinition>,

    /// Classifier verdict for the plan
    pub mode: FlowMode,

    /// Ordered step outcomes reported so far
    pub history: Vec<StepRecord>,

    /// Error message if the run failed
    pub error: Option<String>,

    /// Concurrency token; bumped by the state store on every successful save
    pub revision: u64,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl FlowRunState {
    /// Create run state for the first event of a `(flow_id, run_id)` pair
    pub fn new(
        flow_id: FlowId,
        run_id: RunId,
        account: AccountId,
        steps: Vec<StepDefinition>,
        mode: FlowMode,
    ) -> Self {
        let now = Utc::now();

        Self {
            flow_id,
            run_id,
            account,
            status: RunStatus::Pending,
            current_step_id: None,
            steps,
            mode,
            history: Vec::new(),
            error: None,
            revision: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Start the run: move to `Running` with the first step current
    ///
    /// Returns the id of the step to dispatch first.
    pub fn start(&mut self) -> Result<StepId, FlowError> {
        if self.status != RunStatus::Pending {
            return Err(self.execution_error(format!(
                "cannot start run in state: {:?}",
                self.status
            )));
        }

        let first = self.steps.first().ok_or_else(|| {
            FlowError::ConfigurationError {
                flow_id: self.flow_id.0.clone(),
                run_id: self.run_id.0.clone(),
                message: "flow has no steps".to_string(),
            }
        })?;

        let first = StepId(first.id.clone());
        self.current_step_id = Some(first.clone());
        self.status = RunStatus::Running;
        self.update_timestamp();
        Ok(first)
    }

    /// Append a step outcome to the history
    pub fn record_step(&mut self, record: StepRecord) -> Result<(), FlowError> {
        if self.status.is_terminal() {
            return Err(self.execution_error(format!(
                "cannot record step outcome while run is in state: {:?}",
                self.status
            )));
        }

        self.history.push(record);
        self.update_timestamp();
        Ok(())
    }

    /// Advance the run to the given step
    pub fn advance_to(&mut self, step_id: StepId) -> Result<(), FlowError> {
        if self.status != RunStatus::Running {
            return Err(self.execution_error(format!(
                "cannot advance run in state: {:?}",
                self.status
            )));
        }

        self.current_step_id = Some(step_id);
        self.update_timestamp();
        Ok(())
    }

    /// Complete the run successfully
    pub fn complete(&mut self) -> Result<(), FlowError> {
        if self.status != RunStatus::Running {
            return Err(self.execution_error(format!(
                "cannot complete run in state: {:?}",
                self.status
            )));
        }

        self.status = RunStatus::Completed;
        self.current_step_id = None;
        self.update_timestamp();
        Ok(())
    }

    /// Set the run as failed
    pub fn fail(&mut self, error: String) -> Result<(), FlowError> {
        if self.status.is_terminal() {
            return Err(self.execution_error(format!(
                "cannot fail run in state: {:?}",
                self.status
            )));
        }

        self.status = RunStatus::Failed;
        self.error = Some(error);
        self.update_timestamp();
        Ok(())
    }

    /// Whether a step has a completed outcome in the history
    pub fn is_step_completed(&self, step_id: &StepId) -> bool {
        self.history
            .iter()
            .any(|record| record.step_id == *step_id && record.status == EventStatus::Completed)
    }

    /// Whether a step is part of the persisted plan
    pub fn has_step(&self, step_id: &StepId) -> bool {
        self.steps.iter().any(|step| step.id == step_id.0)
    }

    /// The plan step following the given one, if any
    pub fn next_step_after(&self, step_id: &StepId) -> Option<&StepDefinition> {
        let position = self.steps.iter().position(|step| step.id == step_id.0)?;
        self.steps.get(position + 1)
    }

    /// Update the timestamp
    #[inline]
    pub fn update_timestamp(&mut self) {
        self.updated_at = Utc::now();
    }

    fn execution_error(&self, message: String) -> FlowError {
        FlowError::ExecutionError {
            flow_id: self.flow_id.0.clone(),
            run_id: self.run_id.0.clone(),
            message,
        }
    }
}
