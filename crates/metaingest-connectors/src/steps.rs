//! Step-by-step connectivity tests
//!
//! A connector describes its connectivity probes as a [`TestFns`] table of
//! named futures. [`test_connection_steps`] runs them in the order the
//! catalog's test-connection definition gives, each under its own timeout,
//! and reports one result per step.
//!
//! With a workflow, every outcome is recorded against it and pushed to the
//! catalog, and the call succeeds even if steps failed. Without a workflow,
//! the first failing mandatory step is returned as an error.

use crate::catalog::CatalogClient;
use crate::connector::TestConnectionError;
use metaingest_core::{
    AutomationWorkflow, TestConnectionDefinition, TestConnectionResult, TestConnectionStep,
    TestConnectionStepResult, THREE_MIN,
};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// A pending probe
pub type ProbeFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'static>>;

const SKIPPED: &str = "Skipped: a previous step failed";

/// Named connectivity probes, in declaration order
#[derive(Default)]
pub struct TestFns {
    probes: Vec<(String, ProbeFuture)>,
}

impl TestFns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a probe
    ///
    /// The future is not polled until its step runs.
    pub fn with<F>(mut self, name: impl Into<String>, probe: F) -> Self
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.insert(name, probe);
        self
    }

    /// Add a probe, replacing any probe with the same name
    pub fn insert<F>(&mut self, name: impl Into<String>, probe: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let name = name.into();
        self.probes.retain(|(existing, _)| *existing != name);
        self.probes.push((name, Box::pin(probe)));
    }

    /// Probe names, in declaration order
    pub fn names(&self) -> Vec<&str> {
        self.probes.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }

    fn take(&mut self, name: &str) -> Option<ProbeFuture> {
        let index = self.probes.iter().position(|(n, _)| n == name)?;
        Some(self.probes.remove(index).1)
    }
}

impl std::fmt::Debug for TestFns {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestFns").field("probes", &self.names()).finish()
    }
}

enum StepFailure {
    Failed { message: String, error_log: Option<String> },
    TimedOut,
}

/// Run the probes of `test_fns` for `source_type`
///
/// The steps come from the catalog's definition for `source_type`; when the
/// catalog has none, every probe runs as a mandatory step. `timeout` applies
/// to each step separately and defaults to three minutes.
pub async fn test_connection_steps(
    catalog: &dyn CatalogClient,
    mut test_fns: TestFns,
    source_type: &str,
    mut workflow: Option<&mut AutomationWorkflow>,
    timeout: Option<Duration>,
) -> Result<TestConnectionResult, TestConnectionError> {
    let timeout = timeout.unwrap_or(Duration::from_secs(THREE_MIN));

    let definition = match catalog.get_test_connection_definition(source_type).await? {
        Some(definition) => definition,
        None => {
            tracing::debug!(source_type, "no test connection definition, running every probe");
            TestConnectionDefinition::all_mandatory(source_type, test_fns.names())
        }
    };

    let mut result = TestConnectionResult::running();
    publish(catalog, workflow.as_deref_mut(), &result).await?;

    let mut skip_rest = false;
    for step in &definition.steps {
        if skip_rest {
            if workflow.is_none() && step.mandatory {
                return Err(TestConnectionError::StepFailed {
                    step: step.name.clone(),
                    message: SKIPPED.to_string(),
                    error_log: None,
                });
            }
            result.push(TestConnectionStepResult::failed(step, SKIPPED, None));
            continue;
        }

        match run_step(step, test_fns.take(&step.name), timeout).await {
            Ok(()) => {
                tracing::debug!(step = %step.name, "test connection step passed");
                result.push(TestConnectionStepResult::passed(step));
            }
            Err(failure) => {
                if workflow.is_none() && step.mandatory {
                    return Err(match failure {
                        StepFailure::Failed { message, error_log } => TestConnectionError::StepFailed {
                            step: step.name.clone(),
                            message,
                            error_log,
                        },
                        StepFailure::TimedOut => TestConnectionError::StepTimedOut {
                            step: step.name.clone(),
                            timeout,
                        },
                    });
                }

                let (message, error_log) = match failure {
                    StepFailure::Failed { message, error_log } => (message, error_log),
                    StepFailure::TimedOut => (format!("Timed out after {:?}", timeout), None),
                };
                tracing::warn!(step = %step.name, mandatory = step.mandatory, "test connection step failed: {}", message);

                result.push(TestConnectionStepResult::failed(step, message, error_log));
                skip_rest = step.short_circuit;
            }
        }

        publish(catalog, workflow.as_deref_mut(), &result).await?;
    }

    result.finish();
    publish(catalog, workflow, &result).await?;

    Ok(result)
}

async fn run_step(
    step: &TestConnectionStep,
    probe: Option<ProbeFuture>,
    timeout: Duration,
) -> Result<(), StepFailure> {
    let Some(probe) = probe else {
        return Err(StepFailure::Failed {
            message: format!("No test function found for step '{}'", step.name),
            error_log: None,
        });
    };

    match tokio::time::timeout(timeout, probe).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(StepFailure::Failed {
            message: e.to_string(),
            error_log: Some(format!("{:?}", e)),
        }),
        Err(_) => Err(StepFailure::TimedOut),
    }
}

async fn publish(
    catalog: &dyn CatalogClient,
    workflow: Option<&mut AutomationWorkflow>,
    result: &TestConnectionResult,
) -> Result<(), TestConnectionError> {
    if let Some(workflow) = workflow {
        workflow.record(result.clone());
        catalog.update_workflow_response(workflow).await?;
    }
    Ok(())
}
