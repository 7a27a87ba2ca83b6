//! The three collection targets
//!
//! - `namespace` - pod logs, inventories and RunAI config per namespace
//! - `workload` - manifests and logs for one workload
//! - `scheduler` - projects, queues, node pools and departments

pub mod namespace;
pub mod scheduler;
pub mod workload;

use k8s_openapi::api::core::v1::Pod;

/// `(regular, init)` container names, in spec order
pub(crate) fn container_names(pod: &Pod) -> (Vec<String>, Vec<String>) {
    let Some(spec) = pod.spec.as_ref() else {
        return (Vec::new(), Vec::new());
    };
    let regular = spec.containers.iter().map(|c| c.name.clone()).collect();
    let init = spec
        .init_containers
        .as_deref()
        .unwrap_or_default()
        .iter()
        .map(|c| c.name.clone())
        .collect();
    (regular, init)
}

pub(crate) fn pod_name(pod: &Pod) -> String {
    pod.metadata.name.clone().unwrap_or_default()
}
