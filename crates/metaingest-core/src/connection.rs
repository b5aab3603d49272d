//! Service connection settings
//!
//! A [`ServiceConnection`] is the validated configuration a connector turns
//! into a live handle. Settings are kept as plain strings, the same way they
//! appear in `metaingest.toml`, and every connector picks the keys it needs.
//!
//! Anything that ends up in an error message or a log line must go through
//! [`ServiceConnection::sanitized`], which masks secret-looking values.

use crate::service::ServiceType;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Replacement for masked secret values
pub const MASK: &str = "**********";

static SECRET_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(password|passwd|secret|token|private_?key|credentials|key_?json|api_?key)")
        .expect("secret key pattern is valid")
});

/// Connection settings for one service
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConnection {
    /// Service category (database, dashboard, ...)
    pub service_type: ServiceType,

    /// Connector identifier within the category (e.g. "redshift")
    #[serde(rename = "type")]
    pub source_type: String,

    /// Connector-specific settings
    #[serde(flatten)]
    pub settings: BTreeMap<String, String>,
}

impl ServiceConnection {
    /// Create a connection with no settings
    pub fn new(service_type: ServiceType, source_type: impl Into<String>) -> Self {
        Self {
            service_type,
            source_type: source_type.into(),
            settings: BTreeMap::new(),
        }
    }

    /// Add a setting
    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    /// Look up a setting
    pub fn get(&self, key: &str) -> Option<&str> {
        self.settings.get(key).map(String::as_str)
    }

    /// Whether a setting key holds a secret and must never be printed
    pub fn is_secret_key(key: &str) -> bool {
        SECRET_KEY.is_match(key)
    }

    /// Copy of this connection with every secret value masked
    pub fn sanitized(&self) -> SanitizedConnection {
        let settings = self
            .settings
            .iter()
            .map(|(k, v)| {
                let value = if Self::is_secret_key(k) { MASK.to_string() } else { v.clone() };
                (k.clone(), value)
            })
            .collect();

        SanitizedConnection {
            service_type: self.service_type,
            source_type: self.source_type.clone(),
            settings,
        }
    }
}

impl fmt::Debug for ServiceConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.sanitized(), f)
    }
}

/// Connection settings safe to log or attach to errors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanitizedConnection {
    pub service_type: ServiceType,

    #[serde(rename = "type")]
    pub source_type: String,

    #[serde(flatten)]
    pub settings: BTreeMap<String, String>,
}

impl fmt::Display for SanitizedConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.source_type, self.service_type)?;
        if !self.settings.is_empty() {
            let pairs: Vec<String> = self
                .settings
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            write!(f, " {{{}}}", pairs.join(", "))?;
        }
        Ok(())
    }
}
