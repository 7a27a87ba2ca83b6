//! Collector configuration
//!
//! Static settings handed to the [`Collector`](crate::Collector) at
//! construction. Every field has a default, so an empty (or absent) file is
//! a valid configuration.

use crate::error::ConfigError;
use runai_kube::{ResourceCatalog, ResourceCoordinate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CollectorConfig {
    /// Namespace running the RunAI cluster components
    pub primary_namespace: String,
    /// Namespace running the RunAI control plane backend
    pub backend_namespace: String,
    /// Where working directories and archives are created
    pub output_dir: PathBuf,
    /// Prefix each log line with its timestamp
    pub log_timestamps: bool,
    /// Maximum producers in flight per plan (1 = strictly sequential)
    pub log_concurrency: usize,
    /// Namespace label key whose value is the project name
    pub project_label: String,
    /// Explicit kubeconfig path
    pub kubeconfig: Option<PathBuf>,
    /// Added or replacement resource descriptors
    pub resources: BTreeMap<String, Vec<ResourceCoordinate>>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            primary_namespace: "runai".to_string(),
            backend_namespace: "runai-backend".to_string(),
            output_dir: PathBuf::from("."),
            log_timestamps: true,
            log_concurrency: 1,
            project_label: "runai/queue".to_string(),
            kubeconfig: None,
            resources: BTreeMap::new(),
        }
    }
}

impl CollectorConfig {
    /// Load from a YAML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes to null, not to an empty mapping
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.primary_namespace.is_empty() || self.backend_namespace.is_empty() {
            return Err(ConfigError::Invalid("namespace names must not be empty".to_string()));
        }
        if self.log_concurrency == 0 {
            return Err(ConfigError::Invalid("logConcurrency must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Namespaces visited by the namespace bundle, in collection order
    pub fn namespaces(&self) -> [&str; 2] {
        [&self.backend_namespace, &self.primary_namespace]
    }

    /// Built-in descriptors with configured overrides applied
    pub fn catalog(&self) -> ResourceCatalog {
        ResourceCatalog::builtin().with_overrides(&self.resources)
    }
}
