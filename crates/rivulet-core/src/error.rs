use thiserror::Error;

/// Core error type for the Rivulet flow controller
///
/// Orchestration variants carry the `flow_id`/`run_id` pair of the run they
/// belong to so that broker-side logs can always be correlated with a run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    /// Flow definition is malformed or missing required structure
    #[error("Flow configuration error for flow {flow_id} run {run_id}: {message}")]
    ConfigurationError {
        /// Flow the malformed definition belongs to
        flow_id: String,
        /// Run that triggered resolution of the definition
        run_id: String,
        /// What is wrong with the definition
        message: String,
    },

    /// Generic failure while deciding the next orchestration action
    #[error("Flow execution error for flow {flow_id} run {run_id}: {message}")]
    ExecutionError {
        /// Flow the run belongs to
        flow_id: String,
        /// Run being orchestrated
        run_id: String,
        /// Failure detail
        message: String,
    },

    /// A specific step reported failure
    #[error("Step {step_id} failed: {message}")]
    StepExecutionError {
        /// Flow the run belongs to
        flow_id: String,
        /// Run being orchestrated
        run_id: String,
        /// Step that reported the failure
        step_id: String,
        /// Error detail propagated from the step event
        message: String,
    },

    /// The referenced run has no persisted state and the event is not a
    /// valid first event
    #[error("No run state found for flow {flow_id} run {run_id}")]
    StateNotFound {
        /// Flow referenced by the event
        flow_id: String,
        /// Run referenced by the event
        run_id: String,
    },

    /// The resolver returned no definition for the `(account, flow_id)` pair
    #[error("Flow definition not found for flow {flow_id} run {run_id}")]
    DefinitionNotFound {
        /// Flow with no stored definition
        flow_id: String,
        /// Run that needed the definition
        run_id: String,
    },

    /// The inbound transport envelope could not be decoded
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// Flow definition validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// State store failure
    #[error("State store error: {0}")]
    StateStoreError(String),

    /// A conditional state write lost against a concurrent update
    #[error("Concurrent update detected for flow {flow_id} run {run_id}")]
    StateConflict {
        /// Flow whose run state was written concurrently
        flow_id: String,
        /// Run whose state was written concurrently
        run_id: String,
    },

    /// Publisher failure
    #[error("Publish error: {0}")]
    PublishError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for FlowError {
    fn from(err: serde_json::Error) -> Self {
        FlowError::SerializationError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let errors = vec![
            (
                FlowError::ConfigurationError {
                    flow_id: "f1".to_string(),
                    run_id: "r1".to_string(),
                    message: "flow has no steps".to_string(),
                },
                "Flow configuration error for flow f1 run r1: flow has no steps",
            ),
            (
                FlowError::ExecutionError {
                    flow_id: "f1".to_string(),
                    run_id: "r1".to_string(),
                    message: "unknown step".to_string(),
                },
                "Flow execution error for flow f1 run r1: unknown step",
            ),
            (
                FlowError::StepExecutionError {
                    flow_id: "f1".to_string(),
                    run_id: "r1".to_string(),
                    step_id: "extract".to_string(),
                    message: "upstream timeout".to_string(),
                },
                "Step extract failed: upstream timeout",
            ),
            (
                FlowError::StateNotFound {
                    flow_id: "f1".to_string(),
                    run_id: "r1".to_string(),
                },
                "No run state found for flow f1 run r1",
            ),
            (
                FlowError::DefinitionNotFound {
                    flow_id: "f1".to_string(),
                    run_id: "r1".to_string(),
                },
                "Flow definition not found for flow f1 run r1",
            ),
            (
                FlowError::DecodeError("bad payload".to_string()),
                "Decode error: bad payload",
            ),
            (
                FlowError::ValidationError("duplicate step id".to_string()),
                "Validation error: duplicate step id",
            ),
            (
                FlowError::StateStoreError("db down".to_string()),
                "State store error: db down",
            ),
            (
                FlowError::StateConflict {
                    flow_id: "f1".to_string(),
                    run_id: "r1".to_string(),
                },
                "Concurrent update detected for flow f1 run r1",
            ),
            (
                FlowError::PublishError("topic gone".to_string()),
                "Publish error: topic gone",
            ),
            (
                FlowError::SerializationError("ser_err".to_string()),
                "Serialization error: ser_err",
            ),
        ];

        for (error, expected_msg) in errors {
            assert_eq!(error.to_string(), expected_msg);
        }
    }

    #[test]
    fn test_step_failure_message_wraps_step_id() {
        let error = FlowError::StepExecutionError {
            flow_id: "f1".to_string(),
            run_id: "r1".to_string(),
            step_id: "notify".to_string(),
            message: "mail gateway rejected the request".to_string(),
        };

        assert_eq!(
            error.to_string(),
            "Step notify failed: mail gateway rejected the request"
        );
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_error = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let error: FlowError = json_error.into();

        match error {
            FlowError::SerializationError(msg) => {
                assert!(msg.contains("expected value"));
            }
            _ => panic!("Expected SerializationError variant"),
        }
    }

    #[test]
    fn test_error_clone_and_eq() {
        let original = FlowError::DecodeError("test".to_string());
        let cloned = original.clone();

        assert_eq!(original, cloned);
        assert_eq!(format!("{:?}", original), format!("{:?}", cloned));
    }
}
