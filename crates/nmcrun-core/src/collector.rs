//! Entry points for every collection target
//!
//! A [`Collector`] is built once per run from a cluster handle and a
//! [`CollectorConfig`]; each method runs one kind of bundle to completion.

use crate::bundles::{namespace, scheduler, workload};
use crate::cluster_info::{ClusterUrls, RUNAI_CONFIG_NAME};
use crate::config::CollectorConfig;
use crate::diagnostics::{self, DiagnosticReport};
use crate::error::CollectError;
use crate::types::TargetReport;
use chrono::{DateTime, Local, Utc};
use runai_kube::catalog::RUNAI_CONFIG;
use runai_kube::{ClusterApi, ClusterError, ResourceCatalog, VersionedResolver};

pub struct Collector<'a> {
    api: &'a dyn ClusterApi,
    config: CollectorConfig,
    catalog: ResourceCatalog,
    /// kubeconfig current-context, when kubeconfig auth was used
    context: Option<String>,
    clock: Option<DateTime<Local>>,
}

impl<'a> Collector<'a> {
    pub fn new(api: &'a dyn ClusterApi, config: CollectorConfig) -> Self {
        let catalog = config.catalog();
        Self {
            api,
            config,
            catalog,
            context: None,
            clock: None,
        }
    }

    pub fn with_context(mut self, context: Option<String>) -> Self {
        self.context = context;
        self
    }

    /// Pin the run time used for names, headers and ages
    pub fn with_clock(mut self, at: DateTime<Local>) -> Self {
        self.clock = Some(at);
        self
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    pub(crate) fn api(&self) -> &'a dyn ClusterApi {
        self.api
    }

    pub(crate) fn catalog(&self) -> &ResourceCatalog {
        &self.catalog
    }

    pub(crate) fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    pub(crate) fn resolver(&self) -> VersionedResolver<'_, dyn ClusterApi + 'a> {
        VersionedResolver::new(self.api, &self.catalog)
    }

    pub(crate) fn now(&self) -> DateTime<Local> {
        self.clock.unwrap_or_else(Local::now)
    }

    pub(crate) fn now_utc(&self) -> DateTime<Utc> {
        self.now().with_timezone(&Utc)
    }

    /// Read the cluster and control plane URLs from `runaiconfig`
    pub async fn cluster_urls(&self) -> Result<ClusterUrls, ClusterError> {
        let config = self
            .resolver()
            .get(
                RUNAI_CONFIG,
                Some(&self.config.primary_namespace),
                RUNAI_CONFIG_NAME,
            )
            .await?;
        Ok(ClusterUrls::from_runai_config(&config))
    }

    /// One archive per existing RunAI namespace
    pub async fn collect_namespaces(&self) -> Vec<TargetReport> {
        namespace::collect_all(self).await
    }

    /// Archive everything known about one workload
    pub async fn collect_workload(
        &self,
        project: &str,
        workload_type: &str,
        name: &str,
    ) -> Result<TargetReport, CollectError> {
        workload::collect(self, project, workload_type, name).await
    }

    /// Archive the scheduler's projects, queues, node pools and departments
    pub async fn collect_scheduler_dump(&self) -> Result<TargetReport, CollectError> {
        scheduler::collect(self).await
    }

    pub async fn run_diagnostic_checks(&self) -> DiagnosticReport {
        diagnostics::run(self).await
    }
}
