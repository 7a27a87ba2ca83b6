//! Scheduler dump
//!
//! Lists each scheduling resource kind cluster-wide into a summary table and
//! writes every instance's manifest next to it.

use crate::collector::Collector;
use crate::error::CollectError;
use crate::naming;
use crate::orchestrator::Orchestrator;
use crate::plan::{CollectionPlan, CollectionStep};
use crate::types::{TargetReport, TargetStatus};
use chrono::{DateTime, Utc};
use runai_kube::catalog::{DEPARTMENTS, NODEPOOLS, PROJECTS, QUEUES};
use runai_kube::{render, ClusterError, DynamicObject};
use std::fmt::Write;

/// `(logical resource, manifest file prefix)` in dump order
pub const SCHEDULER_KINDS: [(&str, &str); 4] = [
    (PROJECTS, "project"),
    (QUEUES, "queue"),
    (NODEPOOLS, "nodepool"),
    (DEPARTMENTS, "department"),
];

pub(crate) async fn collect(c: &Collector<'_>) -> Result<TargetReport, CollectError> {
    tracing::info!("Starting RunAI scheduler info collection");
    c.api()
        .probe()
        .await
        .map_err(CollectError::Connectivity)?;
    tracing::info!("Connected to Kubernetes cluster");

    let root_name = naming::scheduler_root(&naming::bundle_timestamp(&c.now()));
    let out = &c.config().output_dir;
    let mut orch = Orchestrator::start(out.join(&root_name), c.config().log_concurrency)?;

    let resolver = c.resolver();
    let now = c.now_utc();
    for (plural, singular) in SCHEDULER_KINDS {
        tracing::info!("Dumping {}...", plural);
        let list_file = format!("{}_list.txt", plural);
        let mut plan = CollectionPlan::new();

        match resolver.list(plural, None, None).await {
            Ok(items) => {
                let served_by = served_api(c, plural, &items);
                let text = list_text(plural, &items, served_by.as_deref(), now);
                plan.push(
                    CollectionStep::new(format!("{} list", plural), list_file, async move {
                        Ok(text)
                    })
                    .validated(),
                );

                if items.is_empty() {
                    tracing::info!("No {} found to extract", plural);
                }
                for name in items.iter().filter_map(|i| i.metadata.name.clone()) {
                    let resolver = &resolver;
                    plan.step(
                        format!("{} {}", singular, name),
                        format!("{}_{}.yaml", singular, name),
                        async move { resolver.get_manifest(plural, None, &name).await },
                    );
                }
            }
            Err(e) => {
                tracing::warn!("{} list saved with error info: {}", plural, e);
                let text = error_placeholder(plural, &e);
                plan.push(
                    CollectionStep::new(format!("{} list", plural), list_file, async move {
                        Ok(text)
                    })
                    .validated(),
                );
            }
        }

        orch.execute(plan).await;
    }

    let archive = orch.seal(&out.join(naming::archive_name(&root_name)))?;
    Ok(TargetReport {
        target: "scheduler".to_string(),
        status: TargetStatus::Archived(archive),
        summary: orch.into_summary(),
    })
}

/// apiVersion the listed objects came from, else the first declared candidate
fn served_api(c: &Collector<'_>, plural: &str, items: &[DynamicObject]) -> Option<String> {
    items
        .iter()
        .find_map(|i| i.types.as_ref().map(|t| t.api_version.clone()))
        .or_else(|| {
            c.catalog()
                .candidates(plural)
                .and_then(|candidates| candidates.first())
                .map(|coord| coord.api_version())
        })
}

fn list_text(
    plural: &str,
    items: &[DynamicObject],
    api_version: Option<&str>,
    now: DateTime<Utc>,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# {} resources (found {})", plural, items.len());
    out.push_str("# Retrieved from the Kubernetes API\n\n");

    if plural == QUEUES {
        out.push_str("# Note: Queues are dedicated RunAI scheduling resources\n");
        if let Some(api_version) = api_version {
            let _ = writeln!(out, "# API: {}", api_version);
        }
        out.push('\n');
    }

    out.push_str("NAME\tCREATED\tAGE\n");
    for item in items {
        let created = item.metadata.creation_timestamp.as_ref().map(|t| t.0);
        let (created, age) = match created {
            Some(ts) => (
                ts.format("%Y-%m-%d %H:%M:%S").to_string(),
                render::format_age((now - ts).num_seconds()),
            ),
            None => ("<unknown>".to_string(), "<unknown>".to_string()),
        };
        let _ = writeln!(
            out,
            "{}\t{}\t{}",
            item.metadata.name.as_deref().unwrap_or(""),
            created,
            age
        );
    }
    out
}

/// Written instead of a list when the kind cannot be listed at all
fn error_placeholder(plural: &str, err: &ClusterError) -> String {
    format!(
        "# {plural} resources\n# Error retrieving {plural}: {err}\n# This may be normal if {plural} are not configured in this cluster\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CollectorConfig;
    use crate::testing::{archive_entries, archive_file, FakeCluster};
    use chrono::{Local, TimeZone};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
    use runai_kube::ResourceCatalog;
    use runai_kube::catalog::ResourceCoordinate;
    use serde_json::json;

    fn coord(resource: &str) -> ResourceCoordinate {
        ResourceCatalog::builtin().candidates(resource).unwrap()[0].clone()
    }

    fn collector<'a>(cluster: &'a FakeCluster, out: &std::path::Path) -> Collector<'a> {
        Collector::new(
            cluster,
            CollectorConfig {
                output_dir: out.to_path_buf(),
                ..Default::default()
            },
        )
        .with_clock(Local.with_ymd_and_hms(2025, 3, 2, 9, 30, 0).unwrap())
    }

    #[tokio::test]
    async fn test_dump_writes_lists_manifests_and_placeholders() {
        let out = tempfile::tempdir().unwrap();
        let cluster = FakeCluster::new()
            .with_object(&coord(PROJECTS), None, "team-a", &[], json!({"spec": {}}))
            .with_object(&coord(PROJECTS), None, "team-b", &[], json!({"spec": {}}))
            .serving(&coord(QUEUES))
            .with_object(&coord(DEPARTMENTS), None, "default", &[], json!({}));

        let report = collector(&cluster, out.path())
            .collect_scheduler_dump()
            .await
            .unwrap();

        let archive = report.archive().unwrap();
        assert_eq!(
            archive,
            &out.path().join("scheduler_info_dump_02-03-2025_09-30.tar.gz")
        );

        let root = "scheduler_info_dump_02-03-2025_09-30";
        let entries = archive_entries(archive);
        assert_eq!(
            entries,
            vec![
                root.to_string(),
                format!("{}/department_default.yaml", root),
                format!("{}/departments_list.txt", root),
                format!("{}/nodepools_list.txt", root),
                format!("{}/project_team-a.yaml", root),
                format!("{}/project_team-b.yaml", root),
                format!("{}/projects_list.txt", root),
                format!("{}/queues_list.txt", root),
            ]
        );

        let projects = archive_file(archive, &format!("{}/projects_list.txt", root)).unwrap();
        assert!(projects.starts_with("# projects resources (found 2)\n"));
        assert!(projects.contains("NAME\tCREATED\tAGE\n"));

        let nodepools = archive_file(archive, &format!("{}/nodepools_list.txt", root)).unwrap();
        assert!(nodepools.starts_with("# nodepools resources\n# Error retrieving nodepools: "));
        assert!(nodepools.ends_with("# This may be normal if nodepools are not configured in this cluster\n"));

        // Only the placeholder is comment-only
        let warnings = report.summary.warnings();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].path.ends_with("nodepools_list.txt"));
        assert_eq!(report.summary.failed(), 0);
    }

    #[tokio::test]
    async fn test_empty_queues_write_header_only() {
        let out = tempfile::tempdir().unwrap();
        let cluster = FakeCluster::new().serving(&coord(QUEUES));

        let report = collector(&cluster, out.path())
            .collect_scheduler_dump()
            .await
            .unwrap();

        let archive = report.archive().unwrap();
        let root = "scheduler_info_dump_02-03-2025_09-30";
        let queues = archive_file(archive, &format!("{}/queues_list.txt", root)).unwrap();
        assert_eq!(
            queues,
            "# queues resources (found 0)\n\
             # Retrieved from the Kubernetes API\n\n\
             # Note: Queues are dedicated RunAI scheduling resources\n\
             # API: scheduling.run.ai/v2\n\n\
             NAME\tCREATED\tAGE\n"
        );
        assert!(
            !archive_entries(archive)
                .iter()
                .any(|e| e.contains("/queue_"))
        );
        assert_eq!(report.summary.failed(), 0);
    }

    #[tokio::test]
    async fn test_unreachable_cluster_is_fatal() {
        let out = tempfile::tempdir().unwrap();
        let cluster = FakeCluster::new().unreachable();

        let err = collector(&cluster, out.path())
            .collect_scheduler_dump()
            .await
            .unwrap_err();

        assert!(matches!(err, CollectError::Connectivity(_)));
        assert_eq!(cluster.calls(), vec!["probe"]);
        assert_eq!(std::fs::read_dir(out.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_list_rows() {
        let now = Utc.with_ymd_and_hms(2025, 3, 2, 12, 0, 0).unwrap();
        let mut project = DynamicObject::new("team-a", &coord(PROJECTS).api_resource());
        project.metadata.creation_timestamp = Some(Time(now - chrono::Duration::seconds(3725)));

        let text = list_text(PROJECTS, &[project], None, now);
        assert!(text.ends_with("team-a\t2025-03-02 10:57:55\t1h2m5s\n"));
    }
}
