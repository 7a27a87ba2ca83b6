//! Facts read from the `runaiconfig` singleton

use runai_kube::DynamicObject;
use serde_json::Value;

pub const UNKNOWN: &str = "unknown";

/// Name of the runaiconfig object in the primary namespace
pub const RUNAI_CONFIG_NAME: &str = "runai";
/// Name of the engine config object in the primary namespace
pub const ENGINE_CONFIG_NAME: &str = "engine-config";
/// Public cluster ConfigMap in the primary namespace
pub const RUNAI_PUBLIC: &str = "runai-public";
/// `runai-public` key holding the cluster version
pub const CLUSTER_VERSION_KEY: &str = "cluster-version";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterUrls {
    pub cluster: String,
    pub control_plane: String,
}

impl Default for ClusterUrls {
    fn default() -> Self {
        Self {
            cluster: UNKNOWN.to_string(),
            control_plane: UNKNOWN.to_string(),
        }
    }
}

impl ClusterUrls {
    pub fn from_runai_config(config: &DynamicObject) -> Self {
        let global = &config.data["spec"]["__internal"]["global"];
        Self {
            cluster: string_or_unknown(&global["clusterURL"]),
            control_plane: string_or_unknown(&global["controlPlane"]["url"]),
        }
    }
}

/// Installed RunAI version (`spec.global.image.tag`)
pub fn runai_version(config: &DynamicObject) -> Option<String> {
    config.data["spec"]["global"]["image"]["tag"]
        .as_str()
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.trim().to_string())
}

/// Trimmed string, `unknown` when absent or blank
fn string_or_unknown(value: &Value) -> String {
    match value.as_str().map(str::trim) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => UNKNOWN.to_string(),
    }
}
