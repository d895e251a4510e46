//! Publishing boundaries
//!
//! The controller never talks to the broker directly; it publishes through
//! the [`MessagePublisher`] contract and sends user-facing notifications
//! through [`FlowNotifier`]. Concrete adapters live outside this crate.

use crate::domain::flow_run::{AccountId, FlowRunState};
use crate::{DataPacket, FlowError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A resolved topic path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TopicName(pub String);

impl TopicName {
    /// Resolve a topic name against a project namespace
    ///
    /// Short names become `projects/{project}/topics/{name}`; names that are
    /// already fully qualified pass through untouched.
    pub fn resolve(project_id: &str, name: &str) -> Self {
        if name.starts_with("projects/") {
            Self(name.to_string())
        } else {
            Self(format!("projects/{}/topics/{}", project_id, name))
        }
    }
}

/// Downstream publisher boundary
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Publish a message, returning the broker-assigned message id
    async fn publish(&self, topic: &TopicName, message: DataPacket) -> Result<String, FlowError>;
}

/// A user-facing notification message
///
/// Write-once, fire-and-forget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowNotification {
    /// Kind of recipient the notification addresses
    pub recipient_type: String,

    /// Account the notification belongs to
    pub account: AccountId,

    /// Short subject line
    pub subject: String,

    /// Human-readable body
    pub body: String,

    /// Structured context for downstream consumers
    pub meta: serde_json::Map<String, serde_json::Value>,
}

/// The kind of run event a notification describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    /// The run started and its first step was dispatched
    Dispatched,
    /// The run completed successfully
    Completed,
    /// The run failed
    Failed,
}

/// User notification boundary
#[async_trait]
pub trait FlowNotifier: Send + Sync {
    /// Send a user-facing notification about a run
    async fn send_flow_notification(
        &self,
        state: &FlowRunState,
        kind: NotificationKind,
    ) -> Result<(), FlowError>;
}

/// Notifier that renders notifications and publishes them on a topic
pub struct PublishingFlowNotifier {
    publisher: Arc<dyn MessagePublisher>,
    topic: TopicName,
}

impl PublishingFlowNotifier {
    /// Create a notifier that publishes on the given topic
    pub fn new(publisher: Arc<dyn MessagePublisher>, topic: TopicName) -> Self {
        Self { publisher, topic }
    }

    fn render(state: &FlowRunState, kind: NotificationKind) -> FlowNotification {
        let (verb, body) = match kind {
            NotificationKind::Dispatched => (
                "started",
                format!(
                    "Flow {} run {} started; first step dispatched.",
                    state.flow_id.0, state.run_id.0
                ),
            ),
            NotificationKind::Completed => (
                "completed",
                format!(
                    "Flow {} run {} completed successfully.",
                    state.flow_id.0, state.run_id.0
                ),
            ),
            NotificationKind::Failed => (
                "failed",
                state
                    .error
                    .clone()
                    .unwrap_or_else(|| "flow run failed".to_string()),
            ),
        };

        let mut meta = serde_json::Map::new();
        meta.insert(
            "flow_id".to_string(),
            serde_json::Value::String(state.flow_id.0.clone()),
        );
        meta.insert(
            "run_id".to_string(),
            serde_json::Value::String(state.run_id.0.clone()),
        );
        meta.insert(
            "status".to_string(),
            serde_json::to_value(state.status).unwrap_or(serde_json::Value::Null),
        );

        FlowNotification {
            recipient_type: "user".to_string(),
            account: state.account.clone(),
            subject: format!("Flow {} run {} {}", state.flow_id.0, state.run_id.0, verb),
            body,
            meta,
        }
    }
}

#[async_trait]
impl FlowNotifier for PublishingFlowNotifier {
    async fn send_flow_notification(
        &self,
        state: &FlowRunState,
        kind: NotificationKind,
    ) -> Result<(), FlowError> {
        let notification = Self::render(state, kind);
        let message = DataPacket::from(&notification)?;

        let message_id = self.publisher.publish(&self.topic, message).await?;
        tracing::debug!(
            flow_id = %state.flow_id.0,
            run_id = %state.run_id.0,
            message_id = %message_id,
            "published flow notification"
        );

        Ok(())
    }
}

/// Memory implementations for testing
#[cfg(feature = "testing")]
pub mod memory {
    use super::*;
    use std::sync::Mutex;

    /// In-memory publisher that records every published message
    pub struct MemoryMessagePublisher {
        published: Mutex<Vec<(TopicName, DataPacket)>>,
    }

    impl MemoryMessagePublisher {
        /// Create a new memory publisher
        pub fn new() -> Self {
            Self {
                published: Mutex::new(Vec::new()),
            }
        }

        /// All messages published so far, in publish order
        pub fn published(&self) -> Vec<(TopicName, DataPacket)> {
            self.published
                .lock()
                .expect("publisher mutex poisoned")
                .clone()
        }

        /// Messages published on one topic
        pub fn published_on(&self, topic: &TopicName) -> Vec<DataPacket> {
            self.published()
                .into_iter()
                .filter(|(t, _)| t == topic)
                .map(|(_, message)| message)
                .collect()
        }
    }

    impl Default for MemoryMessagePublisher {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl MessagePublisher for MemoryMessagePublisher {
        async fn publish(
            &self,
            topic: &TopicName,
            message: DataPacket,
        ) -> Result<String, FlowError> {
            let mut published = self
                .published
                .lock()
                .map_err(|e| FlowError::PublishError(format!("publisher mutex poisoned: {}", e)))?;

            published.push((topic.clone(), message));
            Ok(uuid::Uuid::new_v4().to_string())
        }
    }
}
