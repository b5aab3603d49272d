//! Service categories

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Category of external system being ingested
///
/// This is a closed set. New connectors are added as source types within
/// one of these categories, never as new categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ServiceType {
    /// REST/GraphQL API services
    #[serde(alias = "api")]
    Api,

    /// BI and dashboarding tools
    #[serde(alias = "dashboard")]
    Dashboard,

    /// Databases and warehouses
    #[serde(alias = "database")]
    Database,

    /// Message brokers
    #[serde(alias = "messaging")]
    Messaging,

    /// Other metadata catalogs (sources and sinks)
    #[serde(alias = "metadata")]
    Metadata,

    /// ML model registries
    #[serde(alias = "mlmodel")]
    MlModel,

    /// Orchestrators and pipeline schedulers
    #[serde(alias = "pipeline")]
    Pipeline,

    /// Search engines
    #[serde(alias = "search")]
    Search,

    /// Object storage
    #[serde(alias = "storage")]
    Storage,
}

impl ServiceType {
    /// All service types, in declaration order
    pub const ALL: [ServiceType; 9] = [
        ServiceType::Api,
        ServiceType::Dashboard,
        ServiceType::Database,
        ServiceType::Messaging,
        ServiceType::Metadata,
        ServiceType::MlModel,
        ServiceType::Pipeline,
        ServiceType::Search,
        ServiceType::Storage,
    ];

    /// Canonical name (e.g. "Database", "MlModel")
    pub fn name(&self) -> &'static str {
        match self {
            Self::Api => "Api",
            Self::Dashboard => "Dashboard",
            Self::Database => "Database",
            Self::Messaging => "Messaging",
            Self::Metadata => "Metadata",
            Self::MlModel => "MlModel",
            Self::Pipeline => "Pipeline",
            Self::Search => "Search",
            Self::Storage => "Storage",
        }
    }

    /// Segment used in plugin module paths: the lower-cased name
    pub fn module_segment(&self) -> String {
        self.name().to_lowercase()
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Error returned when a string does not name a service type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown service type '{0}'. Expected one of: api, dashboard, database, messaging, metadata, mlmodel, pipeline, search, storage")]
pub struct ParseServiceTypeError(pub String);

impl FromStr for ServiceType {
    type Err = ParseServiceTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace(['-', '_'], "");
        Self::ALL
            .iter()
            .copied()
            .find(|st| st.module_segment() == wanted)
            .ok_or_else(|| ParseServiceTypeError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_segment_is_lowercase_name() {
        assert_eq!(ServiceType::Database.module_segment(), "database");
        assert_eq!(ServiceType::MlModel.module_segment(), "mlmodel");
        assert_eq!(ServiceType::Metadata.name(), "Metadata");
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("database".parse::<ServiceType>().unwrap(), ServiceType::Database);
        assert_eq!("Dashboard".parse::<ServiceType>().unwrap(), ServiceType::Dashboard);
        assert_eq!("ml-model".parse::<ServiceType>().unwrap(), ServiceType::MlModel);
        assert_eq!("ML_MODEL".parse::<ServiceType>().unwrap(), ServiceType::MlModel);
    }

    #[test]
    fn parse_rejects_unknown() {
        let err = "warehouse".parse::<ServiceType>().unwrap_err();
        assert_eq!(err, ParseServiceTypeError("warehouse".to_string()));
    }

    #[test]
    fn serde_uses_canonical_name() {
        let json = serde_json::to_string(&ServiceType::MlModel).unwrap();
        assert_eq!(json, "\"MlModel\"");
        let parsed: ServiceType = serde_json::from_str("\"Database\"").unwrap();
        assert_eq!(parsed, ServiceType::Database);
    }
}
