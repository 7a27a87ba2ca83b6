//! Read-only cluster access
//!
//! [`ClusterApi`] is the seam between the collection engine and the API
//! server. [`KubeClusterApi`] implements it on top of a `kube::Client`; tests
//! implement it in memory.

use crate::catalog::ResourceCoordinate;
use crate::error::ClusterError;
use async_trait::async_trait;
use futures::AsyncReadExt;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Node, Pod, Secret};
use kube::{
    api::{Api, DynamicObject, ListParams, LogParams},
    Client,
};

/// Get/list for resources addressed by coordinate rather than by Rust type
#[async_trait]
pub trait DynamicApi: Send + Sync {
    async fn get_dynamic(
        &self,
        coord: &ResourceCoordinate,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<DynamicObject, ClusterError>;

    async fn list_dynamic(
        &self,
        coord: &ResourceCoordinate,
        namespace: Option<&str>,
        selector: Option<&str>,
    ) -> Result<Vec<DynamicObject>, ClusterError>;
}

/// Typed read operations used by the collectors
#[async_trait]
pub trait ClusterApi: DynamicApi {
    /// Cheap call used only to establish reachability
    async fn probe(&self) -> Result<(), ClusterError>;

    async fn server_version(&self) -> Result<String, ClusterError>;

    async fn namespace_exists(&self, name: &str) -> Result<bool, ClusterError>;

    async fn namespaces_by_label(&self, selector: &str) -> Result<Vec<String>, ClusterError>;

    async fn list_pods(
        &self,
        namespace: &str,
        selector: Option<&str>,
    ) -> Result<Vec<Pod>, ClusterError>;

    async fn list_nodes(&self) -> Result<Vec<Node>, ClusterError>;

    async fn get_config_map(&self, namespace: &str, name: &str)
    -> Result<ConfigMap, ClusterError>;

    /// `namespace: None` lists across all namespaces
    async fn list_secrets(
        &self,
        namespace: Option<&str>,
        selector: &str,
    ) -> Result<Vec<Secret>, ClusterError>;

    /// Raw log bytes; never decoded, so non-UTF-8 output survives intact
    async fn container_logs(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        timestamps: bool,
    ) -> Result<Vec<u8>, ClusterError>;
}

/// [`ClusterApi`] backed by the Kubernetes API server
#[derive(Clone)]
pub struct KubeClusterApi {
    client: Client,
}

impl KubeClusterApi {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn dynamic_api(&self, coord: &ResourceCoordinate, namespace: Option<&str>) -> Api<DynamicObject> {
        let ar = coord.api_resource();
        match namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &ar),
            None => Api::all_with(self.client.clone(), &ar),
        }
    }
}

fn list_params(selector: Option<&str>) -> ListParams {
    match selector {
        Some(s) => ListParams::default().labels(s),
        None => ListParams::default(),
    }
}

#[async_trait]
impl DynamicApi for KubeClusterApi {
    async fn get_dynamic(
        &self,
        coord: &ResourceCoordinate,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<DynamicObject, ClusterError> {
        self.dynamic_api(coord, namespace)
            .get(name)
            .await
            .map_err(|e| ClusterError::from_kube(e, &coord.to_string(), name))
    }

    async fn list_dynamic(
        &self,
        coord: &ResourceCoordinate,
        namespace: Option<&str>,
        selector: Option<&str>,
    ) -> Result<Vec<DynamicObject>, ClusterError> {
        let list = self
            .dynamic_api(coord, namespace)
            .list(&list_params(selector))
            .await
            .map_err(|e| ClusterError::from_kube(e, &coord.to_string(), "list"))?;
        Ok(list.items)
    }
}

#[async_trait]
impl ClusterApi for KubeClusterApi {
    async fn probe(&self) -> Result<(), ClusterError> {
        let nodes: Api<Node> = Api::all(self.client.clone());
        nodes
            .list(&ListParams::default().limit(1))
            .await
            .map(|_| ())
            .map_err(|e| ClusterError::Transport(e.to_string()))
    }

    async fn server_version(&self) -> Result<String, ClusterError> {
        let info = self
            .client
            .apiserver_version()
            .await
            .map_err(|e| ClusterError::Transport(e.to_string()))?;
        Ok(info.git_version)
    }

    async fn namespace_exists(&self, name: &str) -> Result<bool, ClusterError> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        namespaces
            .get_opt(name)
            .await
            .map(|ns| ns.is_some())
            .map_err(|e| ClusterError::from_kube(e, "namespace", name))
    }

    async fn namespaces_by_label(&self, selector: &str) -> Result<Vec<String>, ClusterError> {
        let namespaces: Api<Namespace> = Api::all(self.client.clone());
        let list = namespaces
            .list(&ListParams::default().labels(selector))
            .await
            .map_err(|e| ClusterError::from_kube(e, "namespace", selector))?;
        Ok(list
            .items
            .into_iter()
            .filter_map(|ns| ns.metadata.name)
            .collect())
    }

    async fn list_pods(
        &self,
        namespace: &str,
        selector: Option<&str>,
    ) -> Result<Vec<Pod>, ClusterError> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let list = pods
            .list(&list_params(selector))
            .await
            .map_err(|e| ClusterError::from_kube(e, "pods", namespace))?;
        Ok(list.items)
    }

    async fn list_nodes(&self) -> Result<Vec<Node>, ClusterError> {
        let nodes: Api<Node> = Api::all(self.client.clone());
        let list = nodes
            .list(&ListParams::default())
            .await
            .map_err(|e| ClusterError::from_kube(e, "nodes", "list"))?;
        Ok(list.items)
    }

    async fn get_config_map(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<ConfigMap, ClusterError> {
        let config_maps: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        config_maps
            .get(name)
            .await
            .map_err(|e| ClusterError::from_kube(e, "configmap", name))
    }

    async fn list_secrets(
        &self,
        namespace: Option<&str>,
        selector: &str,
    ) -> Result<Vec<Secret>, ClusterError> {
        let secrets: Api<Secret> = match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        };
        let list = secrets
            .list(&ListParams::default().labels(selector))
            .await
            .map_err(|e| ClusterError::from_kube(e, "secrets", selector))?;
        Ok(list.items)
    }

    async fn container_logs(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        timestamps: bool,
    ) -> Result<Vec<u8>, ClusterError> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = LogParams {
            container: Some(container.to_string()),
            timestamps,
            follow: false,
            ..Default::default()
        };
        let target = format!("{}/{}", pod, container);
        let reader = pods
            .log_stream(pod, &params)
            .await
            .map_err(|e| ClusterError::from_kube(e, "pod", &target))?;

        let mut body = Vec::new();
        Box::pin(reader)
            .read_to_end(&mut body)
            .await
            .map_err(|e| ClusterError::Transport(format!("reading logs of {}: {}", target, e)))?;
        Ok(body)
    }
}
