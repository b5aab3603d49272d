//! Automation workflow context
//!
//! When a connectivity test runs on behalf of an automation workflow (for
//! example a "Test Connection" button in the catalog UI), step results are
//! recorded against the workflow instead of aborting on the first failure.

use crate::connection::ServiceConnection;
use crate::result::{StatusType, TestConnectionResult};
use serde::{Deserialize, Serialize};

/// Lifecycle of a workflow run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowStatus {
    Pending,
    Running,
    Successful,
    Failed,
}

/// Workflow that aggregates test-connection results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationWorkflow {
    pub name: String,

    pub status: WorkflowStatus,

    /// Connection under test
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<ServiceConnection>,

    /// Latest step results
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<TestConnectionResult>,
}

impl AutomationWorkflow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: WorkflowStatus::Pending,
            request: None,
            response: None,
        }
    }

    pub fn with_request(mut self, request: ServiceConnection) -> Self {
        self.request = Some(request);
        self
    }

    /// Replace the response and derive the workflow status from it
    pub fn record(&mut self, response: TestConnectionResult) {
        self.status = match response.status {
            StatusType::Running => WorkflowStatus::Running,
            StatusType::Successful => WorkflowStatus::Successful,
            StatusType::Failed => WorkflowStatus::Failed,
        };
        self.response = Some(response);
    }
}
