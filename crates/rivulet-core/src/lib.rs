//!
//! Rivulet Core - domain models and orchestration logic for the Rivulet
//! flow controller
//!
//! This crate defines the controller's domain model, its storage and
//! publishing contracts, the inbound envelope decoder, and the executor
//! state machine that advances flow runs one event at a time. It is the
//! foundation for the adapter and controller crates.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Domain layer - core business models, entities, and rules
pub mod domain;

/// Application services - orchestration logic
pub mod application;

/// Inbound envelope decoding
pub mod decode;

/// Error types
pub mod error;

/// Publishing boundaries
pub mod publish;

/// Core types
pub mod types;

// Re-export key types
pub use error::FlowError;
pub use types::DataPacket;

pub use decode::decode_envelope;

// Re-export main domain types for easy use
pub use domain::classify::{classify, has_expressions, FlowMode};
pub use domain::event::{EventStatus, TaskEvent};
pub use domain::flow_definition::{normalize_steps, FlowDefinition, StepDefinition, StepType};
pub use domain::flow_run::{
    AccountId, FlowId, FlowRunState, RunId, RunStatus, StepId, StepRecord,
};
pub use domain::repository::{FlowDefinitionRepository, FlowRunStateRepository};

pub use application::flow_execution_service::{ExecutionOutcome, FlowExecutionService};
pub use publish::{
    FlowNotification, FlowNotifier, MessagePublisher, NotificationKind, PublishingFlowNotifier,
    TopicName,
};
