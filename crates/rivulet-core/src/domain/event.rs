use crate::domain::flow_run::{AccountId, FlowId, RunId, StepId};
use crate::{DataPacket, FlowError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Step status reported by an inbound event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    /// The step is queued but not yet picked up
    Pending,
    /// The step is being executed by its worker
    Running,
    /// The step finished successfully
    Completed,
    /// The step failed
    Failed,
}

/// A decoded inbound event
///
/// One event describes the progress or result of a single workflow step (or
/// starts a new run when it carries no step report). Events are immutable
/// once decoded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEvent {
    /// Flow the event belongs to
    pub flow_id: FlowId,

    /// Account the flow belongs to
    pub account: AccountId,

    /// Run the event belongs to
    pub run_id: RunId,

    /// Upstream task identifier, when the publisher assigns one
    #[serde(default)]
    pub task_id: Option<String>,

    /// The step this event reports on; absent for run-start events
    #[serde(default)]
    pub step: Option<StepId>,

    /// Reported step status
    #[serde(default)]
    pub status: Option<EventStatus>,

    /// Step result payload
    #[serde(default)]
    pub result: Option<DataPacket>,

    /// Step error detail, propagated verbatim into failure notifications
    #[serde(default)]
    pub error: Option<String>,

    /// Inline flow configuration carried by the triggering publisher
    #[serde(default)]
    pub flow_config: Option<Value>,
}

impl TaskEvent {
    /// Bind a decoded JSON payload to an event
    ///
    /// `flow_id`, `account` and `run_id` are required identifiers; their
    /// absence is a decode failure. Publishers that inline the flow shape
    /// may do so either under `flow_config` or as top-level `steps`/`tasks`
    /// keys; the latter are folded into `flow_config` here.
    pub fn from_value(payload: Value) -> Result<Self, FlowError> {
        let mut event: TaskEvent = serde_json::from_value(payload.clone())
            .map_err(|err| FlowError::DecodeError(format!("invalid event payload: {}", err)))?;

        if event.flow_id.0.is_empty() || event.account.0.is_empty() || event.run_id.0.is_empty() {
            return Err(FlowError::DecodeError(
                "event is missing one of flow_id, account, run_id".to_string(),
            ));
        }

        if event.flow_config.is_none() {
            if let Some(object) = payload.as_object() {
                for key in ["steps", "tasks"] {
                    if let Some(value) = object.get(key) {
                        let mut config = serde_json::Map::new();
                        config.insert(key.to_string(), value.clone());
                        event.flow_config = Some(Value::Object(config));
                        break;
                    }
                }
            }
        }

        Ok(event)
    }

    /// Whether this event starts a new run
    ///
    /// A start event carries no step progress report: no `step` and no
    /// terminal `status`.
    pub fn is_start(&self) -> bool {
        self.step.is_none()
            && !matches!(
                self.status,
                Some(EventStatus::Completed) | Some(EventStatus::Failed)
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bind_minimal_event() {
        let event = TaskEvent::from_value(json!({
            "flow_id": "f1",
            "account": "acme",
            "run_id": "r1"
        }))
        .unwrap();

        assert_eq!(event.flow_id.0, "f1");
        assert_eq!(event.account.0, "acme");
        assert_eq!(event.run_id.0, "r1");
        assert!(event.step.is_none());
        assert!(event.is_start());
    }

    #[test]
    fn test_missing_required_identifier_fails() {
        let result = TaskEvent::from_value(json!({
            "flow_id": "f1",
            "account": "acme"
        }));

        match result {
            Err(FlowError::DecodeError(msg)) => {
                assert!(msg.contains("invalid event payload") || msg.contains("missing"));
            }
            _ => panic!("Expected DecodeError"),
        }
    }

    #[test]
    fn test_empty_identifier_fails() {
        let result = TaskEvent::from_value(json!({
            "flow_id": "f1",
            "account": "",
            "run_id": "r1"
        }));

        match result {
            Err(FlowError::DecodeError(msg)) => {
                assert!(msg.contains("missing one of"));
            }
            _ => panic!("Expected DecodeError"),
        }
    }

    #[test]
    fn test_progress_event_is_not_start() {
        let event = TaskEvent::from_value(json!({
            "flow_id": "f1",
            "account": "acme",
            "run_id": "r1",
            "step": "extract",
            "status": "completed",
            "result": {"rows": 10}
        }))
        .unwrap();

        assert!(!event.is_start());
        assert_eq!(event.step.as_ref().unwrap().0, "extract");
        assert_eq!(event.status, Some(EventStatus::Completed));
        assert_eq!(
            event.result.unwrap().as_value()["rows"],
            json!(10)
        );
    }

    #[test]
    fn test_top_level_tasks_fold_into_flow_config() {
        let event = TaskEvent::from_value(json!({
            "flow_id": "f1",
            "account": "acme",
            "run_id": "r1",
            "tasks": {"extract": {"type": "action"}}
        }))
        .unwrap();

        let flow_config = event.flow_config.unwrap();
        assert!(flow_config["tasks"]["extract"].is_object());
    }

    #[test]
    fn test_explicit_flow_config_wins_over_top_level_keys() {
        let event = TaskEvent::from_value(json!({
            "flow_id": "f1",
            "account": "acme",
            "run_id": "r1",
            "flow_config": {"steps": [{"id": "real"}]},
            "tasks": {"shadowed": {}}
        }))
        .unwrap();

        let flow_config = event.flow_config.unwrap();
        assert_eq!(flow_config["steps"][0]["id"], json!("real"));
        assert!(flow_config.get("tasks").is_none());
    }

    #[test]
    fn test_unknown_status_fails_to_bind() {
        let result = TaskEvent::from_value(json!({
            "flow_id": "f1",
            "account": "acme",
            "run_id": "r1",
            "step": "extract",
            "status": "exploded"
        }));

        assert!(matches!(result, Err(FlowError::DecodeError(_))));
    }
}
