//! File and archive naming

use chrono::{DateTime, TimeZone};
use std::fmt::Display;

/// Namespace and scheduler bundles: `02-03-2025_14-05`
pub const BUNDLE_TIMESTAMP: &str = "%d-%m-%Y_%H-%M";
/// Workload bundles: `2025_03_02-14_05`
pub const WORKLOAD_TIMESTAMP: &str = "%Y_%m_%d-%H_%M";

pub fn bundle_timestamp<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    at.format(BUNDLE_TIMESTAMP).to_string()
}

pub fn workload_timestamp<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: Display,
{
    at.format(WORKLOAD_TIMESTAMP).to_string()
}

/// Control plane URL as a filename fragment: first `https://` dropped, dots to dashes
pub fn clean_endpoint(url: &str) -> String {
    url.replacen("https://", "", 1).replace('.', "-")
}

/// `{cp}-{namespace}-logs-{ts}`
pub fn namespace_root(control_plane: &str, namespace: &str, ts: &str) -> String {
    format!("{}-{}-logs-{}", clean_endpoint(control_plane), namespace, ts)
}

pub fn scheduler_root(ts: &str) -> String {
    format!("scheduler_info_dump_{}", ts)
}

/// Workload type as it appears in file names
pub fn type_safe(workload_type: &str) -> String {
    workload_type.replace('/', "_")
}

/// `{project}_{type}_{name}_{ts}.tar.gz`
pub fn workload_archive(project: &str, workload_type: &str, name: &str, ts: &str) -> String {
    format!("{}_{}_{}_{}.tar.gz", project, type_safe(workload_type), name, ts)
}

pub fn archive_name(root: &str) -> String {
    format!("{}.tar.gz", root)
}

/// Container log path inside a namespace bundle
pub fn container_log(pod: &str, container: &str, init: bool) -> String {
    if init {
        format!("logs/{}_{}_init.log", pod, container)
    } else {
        format!("logs/{}_{}.log", pod, container)
    }
}

/// Workload log file name, flat in the workload archive
///
/// `{name}_{type}_pod_logs_{container}.log` when the workload has one pod.
/// With several pods the pod name is inserted,
/// `{name}_{type}_pod_logs_{pod}_{container}.log`, so parsers matching the
/// single-pod form must also accept this variant.
pub fn workload_log(name: &str, workload_type: &str, pod: Option<&str>, container: &str) -> String {
    match pod {
        Some(pod) => format!(
            "{}_{}_pod_logs_{}_{}.log",
            name,
            type_safe(workload_type),
            pod,
            container
        ),
        None => format!("{}_{}_pod_logs_{}.log", name, type_safe(workload_type), container),
    }
}
