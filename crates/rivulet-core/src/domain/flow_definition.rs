use crate::domain::flow_run::{AccountId, FlowId};
use crate::FlowError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The declared kind of a step
///
/// `action` and `trigger` are the two built-in kinds a basic flow is made
/// of; anything else is carried through as a custom kind for the dispatched
/// worker to interpret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StepType {
    /// A unit of work executed by an external worker
    Action,
    /// The step that starts a flow in response to an external signal
    Trigger,
    /// Any other declared kind
    Custom(String),
}

impl Default for StepType {
    fn default() -> Self {
        StepType::Action
    }
}

impl From<String> for StepType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "action" => StepType::Action,
            "trigger" => StepType::Trigger,
            _ => StepType::Custom(value),
        }
    }
}

impl From<StepType> for String {
    fn from(value: StepType) -> Self {
        match value {
            StepType::Action => "action".to_string(),
            StepType::Trigger => "trigger".to_string(),
            StepType::Custom(kind) => kind,
        }
    }
}

/// Represents one step of a flow definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDefinition {
    /// ID of the step, unique within its flow
    pub id: String,

    /// Declared step kind
    #[serde(rename = "type", default)]
    pub step_type: StepType,

    /// Per-step configuration; a non-empty config marks the flow as advanced
    #[serde(default)]
    pub config: serde_json::Map<String, Value>,

    /// Step payload; string values may embed `{{identifier}}` expressions
    #[serde(default)]
    pub data: serde_json::Map<String, Value>,
}

/// Represents a parsed flow definition
///
/// Definitions are owned by the definition store and read-only to the
/// controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowDefinition {
    /// ID of the flow
    pub flow_id: FlowId,

    /// Account the flow belongs to
    pub account: AccountId,

    /// The steps in this flow, in dispatch order
    pub steps: Vec<StepDefinition>,
}

impl FlowDefinition {
    /// Validate the flow definition
    pub fn validate(&self) -> Result<(), FlowError> {
        if self.steps.is_empty() {
            return Err(FlowError::ValidationError(
                "Flow must have at least one step".to_string(),
            ));
        }

        let mut step_ids = std::collections::HashSet::new();
        for step in &self.steps {
            if !step_ids.insert(&step.id) {
                return Err(FlowError::ValidationError(format!(
                    "Duplicate step ID: {}",
                    step.id
                )));
            }
        }

        Ok(())
    }
}

/// Normalize a heterogeneous flow configuration into the canonical step list
///
/// Declarations come in three shapes, resolved in priority order:
///
/// 1. an explicit `steps` sequence, used verbatim;
/// 2. a `tasks` sequence, treated as the canonical list;
/// 3. a `tasks` mapping of name to step config, converted in insertion order
///    to `{id: name, ..config}` entries (or bare `{id: name}` when the value
///    is not a mapping).
///
/// Anything else normalizes to an empty sequence. Explicit `steps` always
/// win over inferred `tasks` so that older explicit definitions keep their
/// meaning next to the more compact `tasks` authoring style.
pub fn normalize_steps(flow_config: &Value) -> Result<Vec<StepDefinition>, FlowError> {
    let config = match flow_config.as_object() {
        Some(config) => config,
        None => return Ok(Vec::new()),
    };

    if let Some(steps) = config.get("steps").and_then(Value::as_array) {
        return bind_steps(steps);
    }

    match config.get("tasks") {
        Some(Value::Array(tasks)) => bind_steps(tasks),
        Some(Value::Object(tasks)) => {
            let mut steps = Vec::with_capacity(tasks.len());
            for (name, task_config) in tasks {
                let mut entry = serde_json::Map::new();
                entry.insert("id".to_string(), Value::String(name.clone()));
                if let Some(attributes) = task_config.as_object() {
                    for (key, value) in attributes {
                        entry.insert(key.clone(), value.clone());
                    }
                }
                steps.push(serde_json::from_value(Value::Object(entry))?);
            }
            Ok(steps)
        }
        _ => Ok(Vec::new()),
    }
}

fn bind_steps(raw: &[Value]) -> Result<Vec<StepDefinition>, FlowError> {
    raw.iter()
        .map(|step| serde_json::from_value(step.clone()).map_err(FlowError::from))
        .collect()
}
