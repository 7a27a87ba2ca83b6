//! Text rendering for collected objects
//!
//! Manifests are YAML; inventories are tab-separated tables in the same
//! layout `kubectl get -o wide` prints, so support engineers can read them
//! side by side with live output.

use crate::error::ClusterError;
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{Node, Pod};
use serde::Serialize;
use std::fmt::Write;

/// Render any serializable object as YAML
pub fn to_yaml<T: Serialize + ?Sized>(obj: &T) -> Result<String, ClusterError> {
    Ok(serde_yaml::to_string(obj)?)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ManifestList<'a, T> {
    api_version: &'static str,
    kind: &'static str,
    items: &'a [T],
}

/// Render a slice of objects as a single `kind: List` manifest
pub fn list_to_yaml<T: Serialize>(items: &[T]) -> Result<String, ClusterError> {
    to_yaml(&ManifestList {
        api_version: "v1",
        kind: "List",
        items,
    })
}

/// Format an age the way Go prints a truncated `time.Duration`
pub fn format_age(seconds: i64) -> String {
    let secs = seconds.max(0);
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{}h{}m{}s", h, m, s)
    } else if m > 0 {
        format!("{}m{}s", m, s)
    } else {
        format!("{}s", s)
    }
}

fn age_since(created: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    match created {
        Some(ts) => format_age((now - ts).num_seconds()),
        None => "<unknown>".to_string(),
    }
}

/// `NAME READY STATUS RESTARTS AGE IP NODE`
pub fn pod_table(pods: &[Pod], now: DateTime<Utc>) -> String {
    let mut out = String::from("NAME\tREADY\tSTATUS\tRESTARTS\tAGE\tIP\tNODE\n");

    for pod in pods {
        let status = pod.status.as_ref();
        let container_statuses = status
            .and_then(|s| s.container_statuses.as_deref())
            .unwrap_or_default();

        let ready = container_statuses.iter().filter(|c| c.ready).count();
        let restarts: i32 = container_statuses.iter().map(|c| c.restart_count).sum();
        let phase = status.and_then(|s| s.phase.as_deref()).unwrap_or("");
        let ip = status.and_then(|s| s.pod_ip.as_deref()).unwrap_or("");
        let node = pod
            .spec
            .as_ref()
            .and_then(|s| s.node_name.as_deref())
            .unwrap_or("");
        let created = pod.metadata.creation_timestamp.as_ref().map(|t| t.0);

        let _ = writeln!(
            out,
            "{}\t{}/{}\t{}\t{}\t{}\t{}\t{}",
            pod.metadata.name.as_deref().unwrap_or(""),
            ready,
            container_statuses.len(),
            phase,
            restarts,
            age_since(created, now),
            ip,
            node,
        );
    }

    out
}

/// `NAME STATUS ROLES AGE VERSION INTERNAL-IP EXTERNAL-IP OS-IMAGE KERNEL-VERSION CONTAINER-RUNTIME`
pub fn node_table(nodes: &[Node], now: DateTime<Utc>) -> String {
    let mut out = String::from(
        "NAME\tSTATUS\tROLES\tAGE\tVERSION\tINTERNAL-IP\tEXTERNAL-IP\tOS-IMAGE\tKERNEL-VERSION\tCONTAINER-RUNTIME\n",
    );

    for node in nodes {
        let status = node.status.as_ref();

        let ready = status
            .and_then(|s| s.conditions.as_ref())
            .map(|conditions| {
                conditions
                    .iter()
                    .any(|c| c.type_ == "Ready" && c.status == "True")
            })
            .unwrap_or(false);

        let address = |kind: &str| {
            status
                .and_then(|s| s.addresses.as_ref())
                .and_then(|addrs| addrs.iter().find(|a| a.type_ == kind))
                .map(|a| a.address.clone())
                .unwrap_or_default()
        };

        let info = status.and_then(|s| s.node_info.as_ref());
        let created = node.metadata.creation_timestamp.as_ref().map(|t| t.0);

        let _ = writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            node.metadata.name.as_deref().unwrap_or(""),
            if ready { "Ready" } else { "NotReady" },
            node_roles(node),
            age_since(created, now),
            info.map(|i| i.kubelet_version.as_str()).unwrap_or(""),
            address("InternalIP"),
            address("ExternalIP"),
            info.map(|i| i.os_image.as_str()).unwrap_or(""),
            info.map(|i| i.kernel_version.as_str()).unwrap_or(""),
            info.map(|i| i.container_runtime_version.as_str())
                .unwrap_or(""),
        );
    }

    out
}

/// Roles from `node-role.kubernetes.io/<role>` labels, `<none>` when absent
fn node_roles(node: &Node) -> String {
    const PREFIX: &str = "node-role.kubernetes.io/";
    let roles: Vec<&str> = node
        .metadata
        .labels
        .as_ref()
        .map(|labels| {
            labels
                .keys()
                .filter_map(|k| k.strip_prefix(PREFIX))
                .filter(|r| !r.is_empty())
                .collect()
        })
        .unwrap_or_default();

    if roles.is_empty() {
        "<none>".to_string()
    } else {
        roles.join(",")
    }
}
