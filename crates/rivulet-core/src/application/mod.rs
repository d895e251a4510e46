//! Application services - orchestration logic over the domain contracts

/// The flow executor state machine
pub mod flow_execution_service;
