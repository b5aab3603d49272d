//! Test-connection definitions and results
//!
//! A [`TestConnectionDefinition`] is what the catalog declares for a source
//! type: the ordered list of named steps, and whether each one is mandatory.
//! A [`TestConnectionResult`] is what a connector reports back, one entry per
//! step, so an operator can see exactly which capability is missing.

use serde::{Deserialize, Serialize};

/// One declared connectivity step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestConnectionStep {
    /// Step name, matched against the connector's probe names (e.g. "GetTables")
    pub name: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// A failing mandatory step fails the whole test
    #[serde(default = "default_true")]
    pub mandatory: bool,

    /// A failing short-circuit step skips every step after it
    #[serde(default)]
    pub short_circuit: bool,
}

fn default_true() -> bool {
    true
}

impl TestConnectionStep {
    /// Mandatory step with no description
    pub fn mandatory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            mandatory: true,
            short_circuit: false,
        }
    }

    /// Optional step with no description
    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            mandatory: false,
            ..Self::mandatory(name)
        }
    }

    /// Mark this step as short-circuiting
    pub fn with_short_circuit(mut self) -> Self {
        self.short_circuit = true;
        self
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Steps the catalog declares for one source type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestConnectionDefinition {
    /// Source type this definition applies to (e.g. "Redshift")
    pub name: String,

    /// Ordered steps
    pub steps: Vec<TestConnectionStep>,
}

impl TestConnectionDefinition {
    pub fn new(name: impl Into<String>, steps: Vec<TestConnectionStep>) -> Self {
        Self {
            name: name.into(),
            steps,
        }
    }

    /// Every probe name treated as a mandatory step, in the given order
    pub fn all_mandatory<I, S>(name: impl Into<String>, step_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            name,
            step_names.into_iter().map(TestConnectionStep::mandatory).collect(),
        )
    }
}

/// Outcome of a single step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestConnectionStepResult {
    pub name: String,
    pub mandatory: bool,
    pub passed: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_log: Option<String>,
}

impl TestConnectionStepResult {
    pub fn passed(step: &TestConnectionStep) -> Self {
        Self {
            name: step.name.clone(),
            mandatory: step.mandatory,
            passed: true,
            message: None,
            error_log: None,
        }
    }

    pub fn failed(step: &TestConnectionStep, message: impl Into<String>, error_log: Option<String>) -> Self {
        Self {
            name: step.name.clone(),
            mandatory: step.mandatory,
            passed: false,
            message: Some(message.into()),
            error_log,
        }
    }
}

/// Overall test status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusType {
    Running,
    Successful,
    Failed,
}

impl std::fmt::Display for StatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "Running"),
            Self::Successful => write!(f, "Successful"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// Aggregated per-step results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestConnectionResult {
    pub status: StatusType,

    pub steps: Vec<TestConnectionStepResult>,

    /// Timestamp of the last update (RFC 3339)
    pub last_updated_at: String,
}

impl TestConnectionResult {
    /// Empty result in the running state
    pub fn running() -> Self {
        Self {
            status: StatusType::Running,
            steps: Vec::new(),
            last_updated_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Record a step outcome
    pub fn push(&mut self, step: TestConnectionStepResult) {
        self.steps.push(step);
        self.last_updated_at = chrono::Utc::now().to_rfc3339();
    }

    /// Whether every mandatory step passed
    pub fn mandatory_passed(&self) -> bool {
        self.steps.iter().all(|s| s.passed || !s.mandatory)
    }

    /// Set the final status from the recorded steps
    pub fn finish(&mut self) {
        self.status = if self.mandatory_passed() {
            StatusType::Successful
        } else {
            StatusType::Failed
        };
        self.last_updated_at = chrono::Utc::now().to_rfc3339();
    }

    /// Steps that did not pass
    pub fn failed_steps(&self) -> impl Iterator<Item = &TestConnectionStepResult> {
        self.steps.iter().filter(|s| !s.passed)
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
