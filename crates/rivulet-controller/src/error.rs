//! Error types for the Rivulet controller shell

use rivulet_core::FlowError;
use thiserror::Error;

/// Controller error types
#[derive(Error, Debug)]
pub enum ControllerError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Orchestration error surfaced from the core
    #[error(transparent)]
    Flow(#[from] FlowError),
}

/// Result type alias for controller operations
pub type ControllerResult<T> = Result<T, ControllerError>;
