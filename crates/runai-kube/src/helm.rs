//! Helm release inventory from release secrets
//!
//! Helm 3 stores each release revision in a secret labelled `owner=helm`.
//! Labels carry the name, revision and status; the chart metadata lives in
//! the `release` payload as base64-encoded, gzipped JSON.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flate2::read::GzDecoder;
use k8s_openapi::api::core::v1::Secret;
use std::fmt::Write;
use std::io::Read;

/// Selector matching Helm release secrets
pub const HELM_SECRET_SELECTOR: &str = "owner=helm";

const RELEASE_SECRET_TYPE: &str = "helm.sh/release.v1";

/// One Helm release revision
#[derive(Debug, Clone, PartialEq)]
pub struct HelmRelease {
    pub namespace: String,
    pub name: String,
    pub revision: String,
    pub status: String,
    pub chart: String,
    pub app_version: String,
}

impl HelmRelease {
    /// Build from a release secret; `None` when the secret has no `name` label
    pub fn from_secret(secret: &Secret) -> Option<Self> {
        let labels = secret.metadata.labels.as_ref()?;
        let name = labels.get("name").filter(|n| !n.is_empty())?.clone();
        let label = |key: &str| {
            labels
                .get(key)
                .cloned()
                .unwrap_or_else(|| "unknown".to_string())
        };

        let (chart, app_version) = chart_info(secret)
            .unwrap_or_else(|| ("unknown".to_string(), "unknown".to_string()));

        Some(Self {
            namespace: secret.metadata.namespace.clone().unwrap_or_default(),
            name,
            revision: label("version"),
            status: label("status"),
            chart,
            app_version,
        })
    }
}

/// Extract `(name-version, appVersion)` from the release payload
fn chart_info(secret: &Secret) -> Option<(String, String)> {
    if secret.type_.as_deref() != Some(RELEASE_SECRET_TYPE) {
        return None;
    }
    let payload = secret.data.as_ref()?.get("release")?;
    let release = decode_release(&payload.0)?;

    let metadata = release.get("chart")?.get("metadata")?;
    let name = metadata.get("name")?.as_str()?;
    let version = metadata.get("version")?.as_str()?;
    let app_version = metadata
        .get("appVersion")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown");

    Some((format!("{}-{}", name, version), app_version.to_string()))
}

/// base64 -> gzip -> JSON
fn decode_release(encoded: &[u8]) -> Option<serde_json::Value> {
    let compressed = STANDARD.decode(encoded).ok()?;
    let mut json = Vec::new();
    GzDecoder::new(compressed.as_slice())
        .read_to_end(&mut json)
        .ok()?;
    serde_json::from_slice(&json).ok()
}

/// Render release secrets as a `helm ls`-style table
pub fn release_table(secrets: &[Secret]) -> String {
    let mut out = String::from("# Helm releases information (extracted from Kubernetes secrets)\n\n");

    if secrets.is_empty() {
        out.push_str("No Helm releases found\n");
        return out;
    }

    out.push_str("NAMESPACE\tNAME\tREVISION\tSTATUS\tCHART\tAPP VERSION\n");
    for release in secrets.iter().filter_map(HelmRelease::from_secret) {
        let _ = writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}\t{}",
            release.namespace,
            release.name,
            release.revision,
            release.status,
            release.chart,
            release.app_version
        );
    }

    out
}
