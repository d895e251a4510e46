//! Configuration for the Rivulet controller
//!
//! Environment-sourced and validated once at startup; the resulting struct
//! is passed by reference to every component. There is no process-wide
//! mutable configuration global.

use serde::{Deserialize, Serialize};
use std::env;
use tracing::info;

use crate::error::{ControllerError, ControllerResult};

/// Environment variables probed, in order, for the project identifier
pub const PROJECT_ENV_VARS: [&str; 3] =
    ["RIVULET_PROJECT", "GOOGLE_CLOUD_PROJECT", "GCLOUD_PROJECT"];

/// Controller configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Project namespace short topic names are resolved against
    pub project_id: String,

    /// Bucket holding flow definitions
    #[serde(default = "default_definitions_bucket")]
    pub definitions_bucket: String,

    /// Bucket holding run records
    #[serde(default = "default_runs_bucket")]
    pub runs_bucket: String,

    /// Topic step dispatches are published on
    #[serde(default = "default_trigger_topic")]
    pub trigger_topic: String,

    /// Topic controller status messages are published on
    #[serde(default = "default_controller_topic")]
    pub controller_topic: String,

    /// Topic user notifications are published on
    #[serde(default = "default_notification_topic")]
    pub notification_topic: String,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_definitions_bucket() -> String {
    "rivulet-flow-definitions".to_string()
}

fn default_runs_bucket() -> String {
    "rivulet-flow-runs".to_string()
}

fn default_trigger_topic() -> String {
    "flow-step-trigger".to_string()
}

fn default_controller_topic() -> String {
    "flows-controller-events".to_string()
}

fn default_notification_topic() -> String {
    "user-notifications".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl ControllerConfig {
    /// Load configuration from environment variables
    ///
    /// The project identifier is taken from the first set variable of
    /// [`PROJECT_ENV_VARS`]; a missing identifier is a fatal startup error.
    pub fn from_env() -> ControllerResult<Self> {
        let project_id = PROJECT_ENV_VARS
            .iter()
            .find_map(|name| env::var(name).ok().filter(|value| !value.is_empty()))
            .ok_or_else(|| {
                ControllerError::ConfigError(format!(
                    "no project identifier found; set one of {}",
                    PROJECT_ENV_VARS.join(", ")
                ))
            })?;

        let mut config = Self {
            project_id,
            ..Self::default()
        };

        if let Ok(bucket) = env::var("RIVULET_DEFINITIONS_BUCKET") {
            config.definitions_bucket = bucket;
        }

        if let Ok(bucket) = env::var("RIVULET_RUNS_BUCKET") {
            config.runs_bucket = bucket;
        }

        if let Ok(topic) = env::var("RIVULET_TRIGGER_TOPIC") {
            config.trigger_topic = topic;
        }

        if let Ok(topic) = env::var("RIVULET_CONTROLLER_TOPIC") {
            config.controller_topic = topic;
        }

        if let Ok(topic) = env::var("RIVULET_NOTIFICATION_TOPIC") {
            config.notification_topic = topic;
        }

        if let Ok(log_level) = env::var("RIVULET_LOG_LEVEL") {
            config.log_level = log_level;
        }

        info!(project_id = %config.project_id, "Loaded controller configuration");
        Ok(config)
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            definitions_bucket: default_definitions_bucket(),
            runs_bucket: default_runs_bucket(),
            trigger_topic: default_trigger_topic(),
            controller_topic: default_controller_topic(),
            notification_topic: default_notification_topic(),
            log_level: default_log_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clear_config_env() {
        for name in PROJECT_ENV_VARS {
            env::remove_var(name);
        }
        for name in [
            "RIVULET_DEFINITIONS_BUCKET",
            "RIVULET_RUNS_BUCKET",
            "RIVULET_TRIGGER_TOPIC",
            "RIVULET_CONTROLLER_TOPIC",
            "RIVULET_NOTIFICATION_TOPIC",
            "RIVULET_LOG_LEVEL",
        ] {
            env::remove_var(name);
        }
    }

    // Environment mutation is process-global, so all from_env cases run in
    // one test
    #[test]
    fn test_from_env() {
        clear_config_env();

        // Missing project identifier is fatal
        let result = ControllerConfig::from_env();
        match result {
            Err(ControllerError::ConfigError(msg)) => {
                assert!(msg.contains("no project identifier"));
            }
            _ => panic!("Expected ConfigError"),
        }

        // The last variable in the chain is enough
        env::set_var("GCLOUD_PROJECT", "legacy-project");
        let config = ControllerConfig::from_env().unwrap();
        assert_eq!(config.project_id, "legacy-project");
        assert_eq!(config.trigger_topic, "flow-step-trigger");
        assert_eq!(config.definitions_bucket, "rivulet-flow-definitions");

        // Earlier variables win over later ones
        env::set_var("GOOGLE_CLOUD_PROJECT", "cloud-project");
        let config = ControllerConfig::from_env().unwrap();
        assert_eq!(config.project_id, "cloud-project");

        env::set_var("RIVULET_PROJECT", "rivulet-project");
        let config = ControllerConfig::from_env().unwrap();
        assert_eq!(config.project_id, "rivulet-project");

        // Empty values are treated as unset
        env::set_var("RIVULET_PROJECT", "");
        let config = ControllerConfig::from_env().unwrap();
        assert_eq!(config.project_id, "cloud-project");

        // Overrides for buckets and topics
        env::set_var("RIVULET_RUNS_BUCKET", "custom-runs");
        env::set_var("RIVULET_TRIGGER_TOPIC", "custom-trigger");
        env::set_var("RIVULET_LOG_LEVEL", "debug");
        let config = ControllerConfig::from_env().unwrap();
        assert_eq!(config.runs_bucket, "custom-runs");
        assert_eq!(config.trigger_topic, "custom-trigger");
        assert_eq!(config.log_level, "debug");

        clear_config_env();
    }

    #[test]
    fn test_defaults() {
        let config = ControllerConfig::default();

        assert!(config.project_id.is_empty());
        assert_eq!(config.definitions_bucket, "rivulet-flow-definitions");
        assert_eq!(config.runs_bucket, "rivulet-flow-runs");
        assert_eq!(config.controller_topic, "flows-controller-events");
        assert_eq!(config.notification_topic, "user-notifications");
        assert_eq!(config.log_level, "info");
    }
}
