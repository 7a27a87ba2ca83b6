//! Workload bundle
//!
//! Manifests, pods, pod groups and logs for one RunAI workload, archived flat
//! as `{project}_{type}_{name}_{ts}.tar.gz`.

use super::{container_names, pod_name};
use crate::collector::Collector;
use crate::error::CollectError;
use crate::naming;
use crate::orchestrator::Orchestrator;
use crate::plan::CollectionPlan;
use crate::types::{TargetReport, TargetStatus};
use runai_kube::catalog::{KNATIVE_SERVICE, POD_GROUP, RUNAI_JOB};
use runai_kube::{render, ClusterError, VersionedResolver};

const INFERENCE: &str = "inferenceworkloads";

/// Alias (short or plural) to the workload's logical resource name
pub fn canonical_type(alias: &str) -> Option<&'static str> {
    match alias {
        "tw" | "trainingworkloads" => Some("trainingworkloads"),
        "iw" | "interactiveworkloads" => Some("interactiveworkloads"),
        "infw" | "inferenceworkloads" => Some(INFERENCE),
        "dw" | "distributedworkloads" => Some("distributedworkloads"),
        "dinfw" | "distributedinferenceworkloads" => Some("distributedinferenceworkloads"),
        "ew" | "externalworkloads" => Some("externalworkloads"),
        _ => None,
    }
}

pub(crate) async fn collect(
    c: &Collector<'_>,
    project: &str,
    alias: &str,
    name: &str,
) -> Result<TargetReport, CollectError> {
    let canonical =
        canonical_type(alias).ok_or_else(|| CollectError::InvalidInput(alias.to_string()))?;
    tracing::info!(
        "Starting workload info collection for '{}' ({}) in project '{}'",
        name,
        alias,
        project
    );

    let api = c.api();
    let namespace = resolve_namespace(c, project).await?;
    tracing::info!("Found namespace: {}", namespace);

    let type_safe = naming::type_safe(alias);
    let archive_name =
        naming::workload_archive(project, alias, name, &naming::workload_timestamp(&c.now()));
    let out = &c.config().output_dir;
    let root_name = archive_name.trim_end_matches(".tar.gz");
    let mut orch = Orchestrator::start(out.join(root_name), c.config().log_concurrency)?;

    let file = |suffix: &str| format!("{}_{}_{}", name, type_safe, suffix);
    let pods_selector = format!("workloadName={}", name);
    let ns = namespace.as_str();
    let catalog = c.catalog();
    let resolver = move || VersionedResolver::new(api, catalog);

    let mut plan = CollectionPlan::new();
    plan.step(format!("{} YAML", canonical), file("workload.yaml"), async move {
        resolver().get_manifest(canonical, Some(ns), name).await
    })
    .step("RunAIJob YAML", file("runaijob.yaml"), async move {
        resolver().get_manifest(RUNAI_JOB, Some(ns), name).await
    })
    .step("Pod YAML", file("pod.yaml"), {
        let selector = pods_selector.clone();
        async move { render::list_to_yaml(&api.list_pods(ns, Some(&selector)).await?) }
    })
    .step("PodGroup YAML", file("podgroup.yaml"), {
        let selector = pods_selector.clone();
        async move {
            let groups = resolver().list(POD_GROUP, Some(ns), Some(&selector)).await?;
            if groups.is_empty() {
                return Err(ClusterError::not_found(
                    "PodGroup",
                    format!("{} (this is normal for some workload types)", selector),
                ));
            }
            render::list_to_yaml(&groups)
        }
    });
    if canonical == INFERENCE {
        plan.step("KSVC YAML", file("ksvc.yaml"), async move {
            resolver().get_manifest(KNATIVE_SERVICE, Some(ns), name).await
        });
    }
    orch.execute(plan).await;

    // Second pass: one log file per container of every matched pod
    match api.list_pods(ns, Some(&pods_selector)).await {
        Ok(pods) if pods.is_empty() => {
            orch.skip(format!("No pods found for workload: {}", name));
        }
        Ok(pods) => {
            let several = pods.len() > 1;
            let timestamps = c.config().log_timestamps;
            let mut plan = CollectionPlan::new();
            for pod in &pods {
                let (regular, init) = container_names(pod);
                let pod = pod_name(pod);
                tracing::info!("Processing pod: {}", pod);

                for container in init.into_iter().chain(regular) {
                    let path = naming::workload_log(
                        name,
                        alias,
                        several.then_some(pod.as_str()),
                        &container,
                    );
                    let pod = pod.clone();
                    plan.step(format!("logs {}/{}", pod, container), path, async move {
                        api.container_logs(ns, &pod, &container, timestamps).await
                    });
                }
            }
            orch.execute(plan).await;
        }
        Err(e) => orch.record_failure("Pod logs", e),
    }

    let archive = orch.seal_written(&out.join(&archive_name))?;
    Ok(TargetReport {
        target: format!("{}/{}/{}", project, alias, name),
        status: TargetStatus::Archived(archive),
        summary: orch.into_summary(),
    })
}

/// First namespace labelled with the project
async fn resolve_namespace(c: &Collector<'_>, project: &str) -> Result<String, CollectError> {
    let selector = format!("{}={}", c.config().project_label, project);
    tracing::info!("Resolving namespace for project '{}'", project);

    match c.api().namespaces_by_label(&selector).await {
        Ok(namespaces) => namespaces
            .into_iter()
            .map(|ns| ns.trim().to_string())
            .find(|ns| !ns.is_empty())
            .ok_or_else(|| CollectError::ProjectNamespace(project.to_string())),
        Err(e) => {
            tracing::debug!("Namespace lookup for {} failed: {}", selector, e);
            Err(CollectError::ProjectNamespace(project.to_string()))
        }
    }
}
