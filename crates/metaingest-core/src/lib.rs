//! metaingest core
//!
//! Shared domain model for the ingestion framework: service categories,
//! connection settings, configuration and the test-connection result types
//! that connectors report into.

pub mod service;
pub mod connection;
pub mod config;
pub mod result;
pub mod workflow;

pub use service::{ServiceType, ParseServiceTypeError};
pub use connection::{ServiceConnection, SanitizedConnection, MASK};
pub use config::{Config, ConfigError, FallbackPolicy, ResolutionConfig, TestConnectionConfig, THREE_MIN};
pub use result::{
    StatusType, TestConnectionDefinition, TestConnectionResult, TestConnectionStep,
    TestConnectionStepResult,
};
pub use workflow::{AutomationWorkflow, WorkflowStatus};
