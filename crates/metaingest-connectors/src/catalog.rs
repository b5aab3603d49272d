//! Catalog client used by connectivity tests
//!
//! The catalog owns the test-connection definitions (which steps a source
//! type must pass) and receives workflow progress while a test runs.

use metaingest_core::{AutomationWorkflow, TestConnectionDefinition};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Errors talking to the catalog
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Catalog request failed: {0}")]
    RequestError(String),

    #[error("Failed to read test connection definitions: {0}")]
    IoError(String),

    #[error("Invalid test connection definitions: {0}")]
    ParseError(String),
}

/// Operations a connectivity test needs from the catalog
#[async_trait::async_trait]
pub trait CatalogClient: Send + Sync {
    /// Definition registered for a source type, if any
    async fn get_test_connection_definition(
        &self,
        source_type: &str,
    ) -> Result<Option<TestConnectionDefinition>, CatalogError>;

    /// Publish the current state of a workflow
    async fn update_workflow_response(&self, workflow: &AutomationWorkflow) -> Result<(), CatalogError>;
}

/// In-memory catalog
///
/// Definitions are matched case-insensitively on their name, so a
/// definition called "Redshift" applies to the source type "redshift".
/// Every workflow update is kept, in order.
#[derive(Clone, Default)]
pub struct InMemoryCatalog {
    definitions: Arc<RwLock<HashMap<String, TestConnectionDefinition>>>,
    updates: Arc<RwLock<Vec<AutomationWorkflow>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog seeded with the given definitions
    pub fn from_definitions(definitions: impl IntoIterator<Item = TestConnectionDefinition>) -> Self {
        let map = definitions
            .into_iter()
            .map(|def| (def.name.to_lowercase(), def))
            .collect();

        Self {
            definitions: Arc::new(RwLock::new(map)),
            updates: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Load definitions from a JSON file holding an array of definitions
    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| CatalogError::IoError(format!("{}: {}", path.display(), e)))?;

        Self::from_json(&contents)
    }

    /// Parse definitions from a JSON array
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let definitions: Vec<TestConnectionDefinition> =
            serde_json::from_str(json).map_err(|e| CatalogError::ParseError(e.to_string()))?;

        Ok(Self::from_definitions(definitions))
    }

    /// Add or replace a definition
    pub async fn add_definition(&self, definition: TestConnectionDefinition) {
        self.definitions
            .write()
            .await
            .insert(definition.name.to_lowercase(), definition);
    }

    /// Every workflow update received so far
    pub async fn workflow_updates(&self) -> Vec<AutomationWorkflow> {
        self.updates.read().await.clone()
    }

    /// The most recent workflow update
    pub async fn last_workflow_update(&self) -> Option<AutomationWorkflow> {
        self.updates.read().await.last().cloned()
    }
}

#[async_trait::async_trait]
impl CatalogClient for InMemoryCatalog {
    async fn get_test_connection_definition(
        &self,
        source_type: &str,
    ) -> Result<Option<TestConnectionDefinition>, CatalogError> {
        Ok(self.definitions.read().await.get(&source_type.to_lowercase()).cloned())
    }

    async fn update_workflow_response(&self, workflow: &AutomationWorkflow) -> Result<(), CatalogError> {
        self.updates.write().await.push(workflow.clone());
        Ok(())
    }
}
