//! Service spec descriptors
//!
//! [`RawSpec`] is what a plugin exports; [`SpecDescriptor`] is the validated
//! form handed to callers. Building a descriptor always normalizes first
//! (direct type handles become paths) and validates second. The only rule is
//! that `metadata_source_class` is present and non-empty: whether the named
//! classes exist is checked later, when somebody resolves them.

use crate::locator::Symbol;
use crate::reference::Reference;
use serde::{Deserialize, Serialize};

pub const METADATA_SOURCE_CLASS: &str = "metadata_source_class";
pub const PROFILER_CLASS: &str = "profiler_class";
pub const LINEAGE_SOURCE_CLASS: &str = "lineage_source_class";
pub const USAGE_SOURCE_CLASS: &str = "usage_source_class";
pub const SAMPLER_CLASS: &str = "sampler_class";

/// Errors raised when an object does not have the service spec shape
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpecValidationError {
    #[error("Service spec is missing required field 'metadata_source_class'")]
    MissingMetadataSource,

    #[error("Service spec field '{field}' must be a class path string, found {found}")]
    InvalidField { field: String, found: &'static str },

    #[error("Service spec must be a mapping, found {0}")]
    NotAMapping(&'static str),

    #[error("Resolved object is not a service spec")]
    UnsupportedShape,
}

/// Service spec as exported by a plugin
///
/// Every field is optional here so that incomplete specs can be represented
/// and rejected with a proper error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawSpec {
    pub metadata_source_class: Option<Reference>,
    pub profiler_class: Option<Reference>,
    pub lineage_source_class: Option<Reference>,
    pub usage_source_class: Option<Reference>,
    pub sampler_class: Option<Reference>,
}

impl RawSpec {
    /// Spec with the given metadata source class
    pub fn new(metadata_source: impl Into<Reference>) -> Self {
        Self {
            metadata_source_class: Some(metadata_source.into()),
            ..Self::default()
        }
    }

    pub fn with_profiler(mut self, profiler: impl Into<Reference>) -> Self {
        self.profiler_class = Some(profiler.into());
        self
    }

    pub fn with_lineage_source(mut self, lineage: impl Into<Reference>) -> Self {
        self.lineage_source_class = Some(lineage.into());
        self
    }

    pub fn with_usage_source(mut self, usage: impl Into<Reference>) -> Self {
        self.usage_source_class = Some(usage.into());
        self
    }

    pub fn with_sampler(mut self, sampler: impl Into<Reference>) -> Self {
        self.sampler_class = Some(sampler.into());
        self
    }

    /// Replace every direct type handle with its path
    pub fn normalize(self) -> Self {
        let to_path = |r: Option<Reference>| r.map(|r| Reference::Path(r.normalize()));

        Self {
            metadata_source_class: to_path(self.metadata_source_class),
            profiler_class: to_path(self.profiler_class),
            lineage_source_class: to_path(self.lineage_source_class),
            usage_source_class: to_path(self.usage_source_class),
            sampler_class: to_path(self.sampler_class),
        }
    }

    /// Build from a JSON mapping (e.g. a manifest file)
    ///
    /// Values must be strings or null. Unknown keys are ignored.
    pub fn from_value(value: &serde_json::Value) -> Result<Self, SpecValidationError> {
        let map = value
            .as_object()
            .ok_or_else(|| SpecValidationError::NotAMapping(json_kind(value)))?;

        let mut raw = Self::default();
        for (key, value) in map {
            let slot = match key.as_str() {
                METADATA_SOURCE_CLASS => &mut raw.metadata_source_class,
                PROFILER_CLASS => &mut raw.profiler_class,
                LINEAGE_SOURCE_CLASS => &mut raw.lineage_source_class,
                USAGE_SOURCE_CLASS => &mut raw.usage_source_class,
                SAMPLER_CLASS => &mut raw.sampler_class,
                unknown => {
                    tracing::warn!(field = unknown, "ignoring unknown service spec field");
                    continue;
                }
            };

            *slot = match value {
                serde_json::Value::Null => None,
                serde_json::Value::String(path) => Some(Reference::Path(path.clone())),
                other => {
                    return Err(SpecValidationError::InvalidField {
                        field: key.clone(),
                        found: json_kind(other),
                    })
                }
            };
        }

        Ok(raw)
    }
}

impl From<SpecDescriptor> for RawSpec {
    fn from(spec: SpecDescriptor) -> Self {
        Self {
            metadata_source_class: Some(Reference::Path(spec.metadata_source_class)),
            profiler_class: spec.profiler_class.map(Reference::Path),
            lineage_source_class: spec.lineage_source_class.map(Reference::Path),
            usage_source_class: spec.usage_source_class.map(Reference::Path),
            sampler_class: spec.sampler_class.map(Reference::Path),
        }
    }
}

/// Validated service spec
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecDescriptor {
    /// Class implementing metadata extraction (never empty)
    pub metadata_source_class: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profiler_class: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lineage_source_class: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_source_class: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampler_class: Option<String>,
}

impl SpecDescriptor {
    /// Normalize, then validate
    pub fn from_raw(raw: RawSpec) -> Result<Self, SpecValidationError> {
        let raw = raw.normalize();

        let metadata_source_class = non_empty(raw.metadata_source_class)
            .ok_or(SpecValidationError::MissingMetadataSource)?;

        Ok(Self {
            metadata_source_class,
            profiler_class: non_empty(raw.profiler_class),
            lineage_source_class: non_empty(raw.lineage_source_class),
            usage_source_class: non_empty(raw.usage_source_class),
            sampler_class: non_empty(raw.sampler_class),
        })
    }

    /// Build from a JSON mapping
    pub fn from_value(value: &serde_json::Value) -> Result<Self, SpecValidationError> {
        Self::from_raw(RawSpec::from_value(value)?)
    }

    /// Build from whatever a `ServiceSpec` symbol holds
    ///
    /// Accepts a [`RawSpec`], a [`SpecDescriptor`] or a `serde_json::Value`.
    pub fn from_symbol(symbol: &Symbol) -> Result<Self, SpecValidationError> {
        if let Some(raw) = (**symbol).downcast_ref::<RawSpec>() {
            return Self::from_raw(raw.clone());
        }
        if let Some(spec) = (**symbol).downcast_ref::<SpecDescriptor>() {
            return Self::from_raw(spec.clone().into());
        }
        if let Some(value) = (**symbol).downcast_ref::<serde_json::Value>() {
            return Self::from_value(value);
        }
        Err(SpecValidationError::UnsupportedShape)
    }

    /// Every declared class path, by field name
    pub fn class_paths(&self) -> Vec<(&'static str, &str)> {
        let mut paths = vec![(METADATA_SOURCE_CLASS, self.metadata_source_class.as_str())];
        let optional = [
            (PROFILER_CLASS, &self.profiler_class),
            (LINEAGE_SOURCE_CLASS, &self.lineage_source_class),
            (USAGE_SOURCE_CLASS, &self.usage_source_class),
            (SAMPLER_CLASS, &self.sampler_class),
        ];
        for (field, value) in optional {
            if let Some(path) = value {
                paths.push((field, path.as_str()));
            }
        }
        paths
    }
}

/// Path of a normalized reference, with blank paths treated as absent
fn non_empty(reference: Option<Reference>) -> Option<String> {
    reference
        .map(Reference::normalize)
        .filter(|path| !path.trim().is_empty())
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
