//! Environment checks run before collecting
//!
//! Each check yields a [`DiagnosticCheck`]. A failed connectivity check, or
//! finding none of the RunAI namespaces, stops the remaining checks.

use crate::cluster_info::{
    self, ClusterUrls, CLUSTER_VERSION_KEY, RUNAI_CONFIG_NAME, RUNAI_PUBLIC,
};
use crate::collector::Collector;
use crate::error::CollectError;
use runai_kube::catalog::RUNAI_CONFIG;
use runai_kube::helm::HELM_SECRET_SELECTOR;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
    Unknown,
}

impl CheckStatus {
    pub fn label(&self) -> &'static str {
        match self {
            CheckStatus::Pass => "PASS",
            CheckStatus::Warn => "WARN",
            CheckStatus::Fail => "FAIL",
            CheckStatus::Unknown => "????",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosticCheck {
    pub id: String,
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub details: Option<String>,
    /// What the operator can do about a failure
    pub hint: Option<String>,
}

impl DiagnosticCheck {
    fn new(id: &str, name: &str, status: CheckStatus, message: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            status,
            message: message.to_string(),
            details: None,
            hint: None,
        }
    }

    pub fn pass(id: &str, name: &str, message: &str) -> Self {
        Self::new(id, name, CheckStatus::Pass, message)
    }

    pub fn warn(id: &str, name: &str, message: &str) -> Self {
        Self::new(id, name, CheckStatus::Warn, message)
    }

    pub fn fail(id: &str, name: &str, message: &str, hint: Option<&str>) -> Self {
        let mut check = Self::new(id, name, CheckStatus::Fail, message);
        check.hint = hint.map(str::to_string);
        check
    }

    pub fn unknown(id: &str, name: &str) -> Self {
        Self::new(id, name, CheckStatus::Unknown, "Unknown")
    }

    pub fn with_details(mut self, details: &str) -> Self {
        self.details = Some(details.to_string());
        self
    }
}

/// Checks in the order they ran, plus the error that cut the run short
#[derive(Debug, Default)]
pub struct DiagnosticReport {
    pub checks: Vec<DiagnosticCheck>,
    pub aborted: Option<CollectError>,
}

impl DiagnosticReport {
    pub fn check(&self, id: &str) -> Option<&DiagnosticCheck> {
        self.checks.iter().find(|c| c.id == id)
    }

    pub fn has_failures(&self) -> bool {
        self.aborted.is_some() || self.checks.iter().any(|c| c.status == CheckStatus::Fail)
    }
}

pub(crate) async fn run(c: &Collector<'_>) -> DiagnosticReport {
    let mut report = DiagnosticReport::default();
    if let Err(e) = run_checks(c, &mut report.checks).await {
        report.aborted = Some(e);
    }
    report
}

async fn run_checks(c: &Collector<'_>, checks: &mut Vec<DiagnosticCheck>) -> Result<(), CollectError> {
    let api = c.api();

    // Connectivity
    if let Err(e) = api.probe().await {
        checks.push(
            DiagnosticCheck::fail(
                "connectivity",
                "Cluster connection",
                "Cannot connect to the Kubernetes API server",
                Some("Check the kubeconfig, credentials and network access"),
            )
            .with_details(&format!("Error: {}", e)),
        );
        return Err(CollectError::Connectivity(e));
    }
    checks.push(DiagnosticCheck::pass("connectivity", "Cluster connection", "Connected"));

    match api.list_nodes().await {
        Ok(nodes) => checks.push(DiagnosticCheck::pass(
            "permissions",
            "Cluster permissions",
            &format!("Can list nodes ({} found)", nodes.len()),
        )),
        Err(e) => checks.push(
            DiagnosticCheck::warn(
                "permissions",
                "Cluster permissions",
                "Cannot list nodes (may have limited permissions)",
            )
            .with_details(&format!("Error: {}", e)),
        ),
    }

    checks.push(match c.context() {
        Some(context) => DiagnosticCheck::pass("context", "Current context", context),
        None => DiagnosticCheck::unknown("context", "Current context")
            .with_details("No kubeconfig context in use"),
    });

    checks.push(match api.server_version().await {
        Ok(version) => DiagnosticCheck::pass("server_version", "Kubernetes version", &version),
        Err(e) => DiagnosticCheck::unknown("server_version", "Kubernetes version")
            .with_details(&format!("Error: {}", e)),
    });

    check_namespaces(c, checks).await?;
    check_runai(c, checks).await;
    Ok(())
}

async fn check_namespaces(
    c: &Collector<'_>,
    checks: &mut Vec<DiagnosticCheck>,
) -> Result<(), CollectError> {
    let api = c.api();
    let config = c.config();
    let mut found = Vec::new();

    for namespace in config.namespaces() {
        let id = format!("namespace_{}", namespace);
        let name = format!("Namespace {}", namespace);

        match api.namespace_exists(namespace).await {
            Ok(true) => {
                found.push(namespace);
                checks.push(match api.list_pods(namespace, None).await {
                    Ok(pods) => {
                        DiagnosticCheck::pass(&id, &name, &format!("Exists, {} pods", pods.len()))
                    }
                    Err(e) => DiagnosticCheck::warn(&id, &name, "Exists, cannot list pods")
                        .with_details(&format!("Error: {}", e)),
                });
            }
            Ok(false) => checks.push(DiagnosticCheck::warn(&id, &name, "Not found")),
            Err(e) => checks.push(
                DiagnosticCheck::unknown(&id, &name).with_details(&format!("Error: {}", e)),
            ),
        }
    }

    if found.is_empty() {
        checks.push(DiagnosticCheck::fail(
            "namespaces",
            "RunAI namespaces",
            "No RunAI namespaces found",
            Some("Is RunAI installed on this cluster?"),
        ));
        return Err(CollectError::NoNamespaces(
            config.primary_namespace.clone(),
            config.backend_namespace.clone(),
        ));
    }

    checks.push(DiagnosticCheck::pass(
        "namespaces",
        "RunAI namespaces",
        &format!("Found {}: {}", found.len(), found.join(", ")),
    ));
    Ok(())
}

async fn check_runai(c: &Collector<'_>, checks: &mut Vec<DiagnosticCheck>) {
    let api = c.api();
    let primary = c.config().primary_namespace.as_str();

    match c
        .resolver()
        .get(RUNAI_CONFIG, Some(primary), RUNAI_CONFIG_NAME)
        .await
    {
        Ok(config) => {
            let urls = ClusterUrls::from_runai_config(&config);
            checks.push(
                DiagnosticCheck::pass("runai_urls", "RunAI URLs", &urls.cluster).with_details(
                    &format!(
                        "Cluster URL: {}\nControl Plane URL: {}",
                        urls.cluster, urls.control_plane
                    ),
                ),
            );
            checks.push(match cluster_info::runai_version(&config) {
                Some(version) => DiagnosticCheck::pass("runai_version", "RunAI version", &version),
                None => DiagnosticCheck::unknown("runai_version", "RunAI version")
                    .with_details("runaiconfig has no spec.global.image.tag"),
            });
        }
        Err(e) => checks.push(
            DiagnosticCheck::warn("runai_version", "RunAI version", "RunAI configuration not found")
                .with_details(&format!("Error: {}", e)),
        ),
    }

    checks.push(match api.get_config_map(primary, RUNAI_PUBLIC).await {
        Ok(cm) => match cm.data.as_ref().and_then(|d| d.get(CLUSTER_VERSION_KEY)) {
            Some(version) => {
                DiagnosticCheck::pass("cluster_version", "RunAI cluster version", version.trim())
            }
            None => DiagnosticCheck::warn(
                "cluster_version",
                "RunAI cluster version",
                &format!("{} not found in {}", CLUSTER_VERSION_KEY, RUNAI_PUBLIC),
            ),
        },
        Err(e) => DiagnosticCheck::warn(
            "cluster_version",
            "RunAI cluster version",
            &format!("ConfigMap {} not found", RUNAI_PUBLIC),
        )
        .with_details(&format!("Error: {}", e)),
    });

    checks.push(match api.list_secrets(Some(primary), HELM_SECRET_SELECTOR).await {
        Ok(secrets) if secrets.is_empty() => DiagnosticCheck::warn(
            "helm_releases",
            "Helm releases",
            &format!("No Helm releases found in {} namespace", primary),
        ),
        Ok(secrets) => {
            let lines: Vec<String> = secrets
                .iter()
                .filter_map(|s| s.metadata.labels.as_ref())
                .map(|labels| {
                    let label = |k: &str| labels.get(k).map(String::as_str).unwrap_or("unknown");
                    format!("- {} (status: {})", label("name"), label("status"))
                })
                .collect();
            DiagnosticCheck::pass(
                "helm_releases",
                "Helm releases",
                &format!("{} Helm release(s) found in {} namespace", secrets.len(), primary),
            )
            .with_details(&lines.join("\n"))
        }
        Err(e) => DiagnosticCheck::warn("helm_releases", "Helm releases", "Could not check Helm releases")
            .with_details(&format!("Error: {}", e)),
    });
}
