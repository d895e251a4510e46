//!
//! Rivulet Controller - the message-handling shell around the core
//!
//! One inbound broker delivery per invocation: the controller decodes the
//! envelope, hands the event to the execution service, and maps the outcome
//! back to the broker. Transport and routing live outside this crate; the
//! entry point here is [`FlowController::handle_message`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::sync::Arc;

use rivulet_core::{
    decode_envelope, ExecutionOutcome, FlowDefinitionRepository, FlowExecutionService,
    FlowRunStateRepository, MessagePublisher, PublishingFlowNotifier, TopicName,
};
use serde_json::Value;
use tracing::{error, info};

/// Configuration types
pub mod config;

/// Error types
pub mod error;

pub use config::ControllerConfig;
pub use error::{ControllerError, ControllerResult};

/// The message-triggered flow controller
///
/// Wires the execution service against concrete repository and publisher
/// adapters, with topics resolved once against the configured project
/// namespace.
pub struct FlowController {
    service: FlowExecutionService,
}

impl FlowController {
    /// Create a controller from configuration and boundary adapters
    pub fn new(
        config: &ControllerConfig,
        definition_repo: Arc<dyn FlowDefinitionRepository>,
        run_state_repo: Arc<dyn FlowRunStateRepository>,
        publisher: Arc<dyn MessagePublisher>,
    ) -> Self {
        let notifier = Arc::new(PublishingFlowNotifier::new(
            publisher.clone(),
            TopicName::resolve(&config.project_id, &config.notification_topic),
        ));

        let service = FlowExecutionService::new(
            definition_repo,
            run_state_repo,
            publisher,
            notifier,
            TopicName::resolve(&config.project_id, &config.trigger_topic),
            TopicName::resolve(&config.project_id, &config.controller_topic),
        );

        Self { service }
    }

    /// Handle one inbound broker delivery
    ///
    /// Decode failures abort the invocation with no state write and are
    /// surfaced to the broker for retry; orchestration errors are logged
    /// with full run context before being re-raised.
    pub async fn handle_message(&self, envelope: &Value) -> ControllerResult<ExecutionOutcome> {
        let event = decode_envelope(envelope).map_err(|err| {
            error!(error = %err, "failed to decode inbound envelope");
            err
        })?;

        info!(
            flow_id = %event.flow_id.0,
            run_id = %event.run_id.0,
            step = event.step.as_ref().map(|s| s.0.as_str()),
            "handling flow event"
        );

        let outcome = self.service.handle_event(&event).await.map_err(|err| {
            error!(
                flow_id = %event.flow_id.0,
                run_id = %event.run_id.0,
                error = %err,
                "flow event handling failed"
            );
            err
        })?;

        Ok(outcome)
    }
}

/// Initialize the tracing subscriber
///
/// `RUST_LOG` wins over the configured level. Call once at process start.
pub fn init_tracing(log_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
