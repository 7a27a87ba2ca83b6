//! Namespace bundle
//!
//! For each configured namespace that exists: every container's log, the
//! namespace-specific auxiliary files, and a `script.log` narrating the run,
//! sealed as `{cp}-{namespace}-logs-{ts}.tar.gz`.

use super::{container_names, pod_name};
use crate::cluster_info::{ClusterUrls, ENGINE_CONFIG_NAME, RUNAI_CONFIG_NAME, RUNAI_PUBLIC};
use crate::collector::Collector;
use crate::error::CollectError;
use crate::naming;
use crate::orchestrator::Orchestrator;
use crate::plan::CollectionPlan;
use crate::types::{RunSummary, TargetReport, TargetStatus};
use chrono::{DateTime, Utc};
use runai_kube::catalog::{ENGINE_CONFIG, RUNAI_CONFIG};
use runai_kube::helm::{self, HELM_SECRET_SELECTOR};
use runai_kube::{render, ClusterApi, ClusterError, VersionedResolver};

pub(crate) async fn collect_all(c: &Collector<'_>) -> Vec<TargetReport> {
    let urls = match c.cluster_urls().await {
        Ok(urls) => urls,
        Err(e) => {
            tracing::warn!("Could not extract cluster information: {}", e);
            ClusterUrls::default()
        }
    };
    tracing::info!("Cluster URL: {}", urls.cluster);
    tracing::info!("Control Plane URL: {}", urls.control_plane);
    tracing::info!(
        "Control Plane Name (cleaned): {}",
        naming::clean_endpoint(&urls.control_plane)
    );

    let mut reports = Vec::new();
    for namespace in c.config().namespaces() {
        tracing::info!("Processing namespace: {}", namespace);

        let status = match c.api().namespace_exists(namespace).await {
            Ok(true) => match collect_one(c, namespace, &urls).await {
                Ok(report) => {
                    tracing::info!("Completed processing namespace: {}", namespace);
                    reports.push(report);
                    continue;
                }
                Err(e) => {
                    tracing::error!("Error processing namespace {}: {}", namespace, e);
                    TargetStatus::Failed(e.to_string())
                }
            },
            Ok(false) => {
                let note = format!("Namespace '{}' does not exist. Skipping.", namespace);
                tracing::info!("{}", note);
                TargetStatus::Skipped(note)
            }
            Err(e) => {
                let note = format!("Could not check namespace '{}': {}. Skipping.", namespace, e);
                tracing::warn!("{}", note);
                TargetStatus::Skipped(note)
            }
        };

        reports.push(TargetReport {
            target: namespace.to_string(),
            status,
            summary: RunSummary::default(),
        });
    }
    reports
}

async fn collect_one(
    c: &Collector<'_>,
    namespace: &str,
    urls: &ClusterUrls,
) -> Result<TargetReport, CollectError> {
    let started = c.now();
    let root_name = naming::namespace_root(
        &urls.control_plane,
        namespace,
        &naming::bundle_timestamp(&started),
    );
    let archive_name = naming::archive_name(&root_name);
    let out = &c.config().output_dir;

    let mut orch = Orchestrator::start(out.join(&root_name), c.config().log_concurrency)?;
    let root = orch.root().to_path_buf();
    orch.open_narrative()?
        .header(&started, namespace, &urls.cluster, &urls.control_plane)
        .map_err(|source| CollectError::WorkingDir { path: root, source })?;

    collect_pod_logs(c, &mut orch, namespace).await;

    orch.section("Collecting Additional Information");
    orch.execute(auxiliary_plan(c, namespace)).await;

    orch.narrate(&format!("Logs and info archived to {}", archive_name));
    let archive = orch.seal(&out.join(&archive_name))?;

    Ok(TargetReport {
        target: namespace.to_string(),
        status: TargetStatus::Archived(archive),
        summary: orch.into_summary(),
    })
}

/// Enumerate pods, then fetch every container's log (regular first, then init)
async fn collect_pod_logs(c: &Collector<'_>, orch: &mut Orchestrator, namespace: &str) {
    orch.section("Collecting Pod Logs");
    orch.narrate(&format!("Collecting pod information for namespace: {}", namespace));

    let api = c.api();
    let pods = match api.list_pods(namespace, None).await {
        Ok(pods) => pods,
        Err(e) => {
            orch.record_failure("pod list", e);
            return;
        }
    };
    if pods.is_empty() {
        orch.narrate(&format!("No pods found in namespace: {}", namespace));
        return;
    }
    orch.narrate(&format!("Found {} pods in namespace: {}", pods.len(), namespace));

    let timestamps = c.config().log_timestamps;
    let mut plan = CollectionPlan::new();
    for (i, pod) in pods.iter().enumerate() {
        let (regular, init) = container_names(pod);
        let pod = pod_name(pod);
        orch.narrate(&format!(
            "[{}/{}] Processing pod: {} ({} containers, {} init containers)",
            i + 1,
            pods.len(),
            pod,
            regular.len(),
            init.len()
        ));

        let containers = regular
            .into_iter()
            .map(|name| (name, false))
            .chain(init.into_iter().map(|name| (name, true)));
        for (container, is_init) in containers {
            let step = if is_init {
                format!("init container logs {}/{}", pod, container)
            } else {
                format!("container logs {}/{}", pod, container)
            };
            let path = naming::container_log(&pod, &container, is_init);
            let pod = pod.clone();
            plan.step(step, path, async move {
                api.container_logs(namespace, &pod, &container, timestamps)
                    .await
            });
        }
    }

    orch.execute(plan).await;
}

/// Fixed per-namespace files; other namespaces get none
fn auxiliary_plan<'c>(c: &'c Collector<'_>, namespace: &'c str) -> CollectionPlan<'c> {
    let api = c.api();
    let catalog = c.catalog();
    let now = c.now_utc();
    let config = c.config();
    let mut plan = CollectionPlan::new();

    if namespace == config.primary_namespace {
        plan.step("Helm releases info", "helm_releases_info.txt", async move {
            let secrets = api.list_secrets(None, HELM_SECRET_SELECTOR).await?;
            Ok::<_, ClusterError>(helm::release_table(&secrets))
        })
        .step(
            format!("ConfigMap {}", RUNAI_PUBLIC),
            format!("cm_{}.yaml", RUNAI_PUBLIC),
            async move { render::to_yaml(&api.get_config_map(namespace, RUNAI_PUBLIC).await?) },
        )
        .step(
            format!("Pod list for {} namespace", namespace),
            format!("pod-list_{}.txt", namespace),
            pod_list(api, namespace, now),
        )
        .step("Node list", "node-list.txt", async move {
            Ok::<_, ClusterError>(render::node_table(&api.list_nodes().await?, now))
        })
        .step("RunAI config", "runaiconfig.yaml", async move {
            VersionedResolver::new(api, catalog)
                .get_manifest(RUNAI_CONFIG, Some(namespace), RUNAI_CONFIG_NAME)
                .await
        })
        .step("Engine config", "engine-config.yaml", async move {
            VersionedResolver::new(api, catalog)
                .get_manifest(ENGINE_CONFIG, Some(namespace), ENGINE_CONFIG_NAME)
                .await
        });
    } else if namespace == config.backend_namespace {
        plan.step(
            format!("Pod list for {} namespace", namespace),
            format!("pod-list_{}.txt", namespace),
            pod_list(api, namespace, now),
        )
        .step(
            "Helm releases info (backend)",
            "helm_releases_info_backend.txt",
            async move {
                let secrets = api.list_secrets(Some(namespace), HELM_SECRET_SELECTOR).await?;
                Ok::<_, ClusterError>(helm::release_table(&secrets))
            },
        );
    }

    plan
}

async fn pod_list(
    api: &dyn ClusterApi,
    namespace: &str,
    now: DateTime<Utc>,
) -> Result<String, ClusterError> {
    Ok(render::pod_table(&api.list_pods(namespace, None).await?, now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CollectorConfig;
    use crate::testing::{archive_bytes, archive_entries, archive_file, FakeCluster};
    use chrono::{Local, TimeZone};
    use runai_kube::ResourceCatalog;
    use serde_json::json;
    use std::path::Path;

    fn config(out: &Path, primary: &str, backend: &str) -> CollectorConfig {
        CollectorConfig {
            primary_namespace: primary.to_string(),
            backend_namespace: backend.to_string(),
            output_dir: out.to_path_buf(),
            ..Default::default()
        }
    }

    fn clock() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 3, 2, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_existing_namespace_archived_missing_one_skipped() {
        let out = tempfile::tempdir().unwrap();
        let cluster = FakeCluster::new()
            .with_namespace("platform", &[])
            .with_pod("platform", "p1", &["main"], &[], &[])
            .with_log("platform", "p1", "main", "2025-03-02T11:59:00Z started\n")
            .with_node("gpu-node-1");
        let collector = Collector::new(&cluster, config(out.path(), "platform", "missing-ns"))
            .with_clock(clock());

        let reports = collector.collect_namespaces().await;
        assert_eq!(reports.len(), 2);

        assert_eq!(reports[0].target, "missing-ns");
        assert!(matches!(&reports[0].status, TargetStatus::Skipped(note) if note.contains("does not exist")));

        let archive = reports[1].archive().expect("platform archived");
        assert_eq!(
            archive,
            &out.path().join("unknown-platform-logs-02-03-2025_12-00.tar.gz")
        );

        let root = "unknown-platform-logs-02-03-2025_12-00";
        let entries = archive_entries(archive);
        for expected in [
            format!("{}/logs/p1_main.log", root),
            format!("{}/script.log", root),
            format!("{}/helm_releases_info.txt", root),
            format!("{}/pod-list_platform.txt", root),
            format!("{}/node-list.txt", root),
        ] {
            assert!(entries.contains(&expected), "missing {expected} in {entries:?}");
        }
        // Not found on this cluster, so absent rather than empty
        assert!(!entries.contains(&format!("{}/runaiconfig.yaml", root)));
        assert!(!entries.contains(&format!("{}/cm_runai-public.yaml", root)));

        assert_eq!(
            archive_file(archive, &format!("{}/logs/p1_main.log", root)).unwrap(),
            "2025-03-02T11:59:00Z started\n"
        );
        let script = archive_file(archive, &format!("{}/script.log", root)).unwrap();
        assert!(script.contains("Namespace: platform"));
        assert!(script.contains("=== Collecting Pod Logs ==="));
        assert!(script.contains("=== Collecting Additional Information ==="));

        assert_eq!(reports[1].summary.failed(), 3);
        assert!(!out.path().join(root).exists());
    }

    #[tokio::test]
    async fn test_no_namespaces_produce_no_archives() {
        let out = tempfile::tempdir().unwrap();
        let cluster = FakeCluster::new();
        let collector = Collector::new(&cluster, CollectorConfig {
            output_dir: out.path().to_path_buf(),
            ..Default::default()
        });

        let reports = collector.collect_namespaces().await;
        assert!(reports.iter().all(|r| matches!(r.status, TargetStatus::Skipped(_))));
        assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_runai_config_names_bundle_and_init_logs_suffixed() {
        let out = tempfile::tempdir().unwrap();
        let runai_config = ResourceCatalog::builtin().candidates(RUNAI_CONFIG).unwrap()[0].clone();
        let cluster = FakeCluster::new()
            .with_namespace("runai", &[])
            .with_object(
                &runai_config,
                Some("runai"),
                "runai",
                &[],
                json!({"spec": {"__internal": {"global": {
                    "clusterURL": "https://cluster.example.com",
                    "controlPlane": {"url": "https://cp.example.com"}
                }}}}),
            )
            .with_pod("runai", "scheduler-0", &["scheduler"], &["wait-db"], &[])
            .with_log("runai", "scheduler-0", "wait-db", "db ready\n");
        let collector =
            Collector::new(&cluster, config(out.path(), "runai", "runai-backend")).with_clock(clock());

        let reports = collector.collect_namespaces().await;
        let archive = reports[1].archive().unwrap();
        let root = "cp-example-com-runai-logs-02-03-2025_12-00";
        assert_eq!(archive, &out.path().join(format!("{}.tar.gz", root)));

        let entries = archive_entries(archive);
        assert!(entries.contains(&format!("{}/logs/scheduler-0_wait-db_init.log", root)));
        assert!(entries.contains(&format!("{}/runaiconfig.yaml", root)));
        // Regular container had no log; the failure is recorded, not fatal
        assert!(!entries.contains(&format!("{}/logs/scheduler-0_scheduler.log", root)));
        assert!(
            reports[1]
                .summary
                .failures()
                .any(|(name, _)| name == "container logs scheduler-0/scheduler")
        );

        let script = archive_file(archive, &format!("{}/script.log", root)).unwrap();
        assert!(script.contains("Cluster URL: https://cluster.example.com"));
        assert!(script.contains("Control Plane URL: https://cp.example.com"));
    }

    #[tokio::test]
    async fn test_padded_control_plane_url_gives_clean_archive_name() {
        let out = tempfile::tempdir().unwrap();
        let runai_config = ResourceCatalog::builtin().candidates(RUNAI_CONFIG).unwrap()[0].clone();
        let cluster = FakeCluster::new()
            .with_namespace("runai", &[])
            .with_object(
                &runai_config,
                Some("runai"),
                "runai",
                &[],
                json!({"spec": {"__internal": {"global": {
                    "controlPlane": {"url": " https://cp.example.com\n"}
                }}}}),
            );
        let collector =
            Collector::new(&cluster, config(out.path(), "runai", "runai-backend")).with_clock(clock());

        let reports = collector.collect_namespaces().await;
        assert_eq!(
            reports[1].archive().unwrap(),
            &out.path().join("cp-example-com-runai-logs-02-03-2025_12-00.tar.gz")
        );
    }

    #[tokio::test]
    async fn test_archive_failure_does_not_stop_next_namespace() {
        let out = tempfile::tempdir().unwrap();
        let cluster = FakeCluster::new()
            .with_namespace("runai-backend", &[])
            .with_namespace("runai", &[])
            .with_pod("runai", "scheduler-0", &["scheduler"], &[], &[])
            .with_log("runai", "scheduler-0", "scheduler", "ok\n");
        // A directory where the backend archive should go makes sealing it fail
        let backend_root = "unknown-runai-backend-logs-02-03-2025_12-00";
        std::fs::create_dir(out.path().join(format!("{}.tar.gz", backend_root))).unwrap();
        let collector =
            Collector::new(&cluster, config(out.path(), "runai", "runai-backend")).with_clock(clock());

        let reports = collector.collect_namespaces().await;
        assert_eq!(reports.len(), 2);

        assert_eq!(reports[0].target, "runai-backend");
        assert!(matches!(&reports[0].status, TargetStatus::Failed(cause) if cause.contains("I/O error")));
        assert!(out.path().join(backend_root).join("script.log").exists());

        let archive = reports[1].archive().expect("primary archived");
        let root = "unknown-runai-logs-02-03-2025_12-00";
        assert!(archive_entries(archive).contains(&format!("{}/logs/scheduler-0_scheduler.log", root)));
        assert!(!out.path().join(root).exists());
    }

    #[tokio::test]
    async fn test_non_utf8_log_archived_byte_for_byte() {
        let out = tempfile::tempdir().unwrap();
        let body = [b"step ".as_slice(), &[0xff, 0xfe, 0x00], b" done\n"].concat();
        let cluster = FakeCluster::new()
            .with_namespace("runai", &[])
            .with_pod("runai", "agent-0", &["agent"], &[], &[])
            .with_log("runai", "agent-0", "agent", &body);
        let collector =
            Collector::new(&cluster, config(out.path(), "runai", "runai-backend")).with_clock(clock());

        let reports = collector.collect_namespaces().await;
        let archive = reports[1].archive().unwrap();
        let root = "unknown-runai-logs-02-03-2025_12-00";
        assert_eq!(
            archive_bytes(archive, &format!("{}/logs/agent-0_agent.log", root)).unwrap(),
            body
        );
        assert!(
            !reports[1]
                .summary
                .failures()
                .any(|(name, _)| name == "container logs agent-0/agent")
        );
    }

    #[tokio::test]
    async fn test_backend_namespace_files() {
        let out = tempfile::tempdir().unwrap();
        let cluster = FakeCluster::new()
            .with_namespace("runai-backend", &[])
            .with_secret(
                "runai-backend",
                "sh.helm.release.v1.runai-backend.v1",
                &[("owner", "helm"), ("name", "runai-backend"), ("status", "deployed"), ("version", "1")],
            );
        let collector =
            Collector::new(&cluster, config(out.path(), "runai", "runai-backend")).with_clock(clock());

        let reports = collector.collect_namespaces().await;
        let archive = reports[0].archive().unwrap();
        let root = "unknown-runai-backend-logs-02-03-2025_12-00";
        let helm = archive_file(archive, &format!("{}/helm_releases_info_backend.txt", root)).unwrap();
        assert!(helm.contains("runai-backend\trunai-backend\t1\tdeployed"));
        assert!(archive_entries(archive).contains(&format!("{}/pod-list_runai-backend.txt", root)));
        assert_eq!(reports[0].summary.failed(), 0);
    }
}
