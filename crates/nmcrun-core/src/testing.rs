//! In-memory cluster for collector tests

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{
    ConfigMap, Container, Namespace, Node, Pod, PodSpec, Secret,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use runai_kube::catalog::ResourceCoordinate;
use runai_kube::{ClusterApi, ClusterError, DynamicApi, DynamicObject};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

#[derive(Default)]
pub struct FakeCluster {
    unreachable: bool,
    namespaces: Vec<Namespace>,
    pods: Vec<Pod>,
    nodes: Vec<Node>,
    config_maps: Vec<ConfigMap>,
    secrets: Vec<Secret>,
    /// `api_version/plural` of every served custom resource
    served: BTreeSet<String>,
    objects: Vec<(String, DynamicObject)>,
    logs: BTreeMap<(String, String, String), Vec<u8>>,
    calls: Mutex<Vec<String>>,
}

fn labels(pairs: &[(&str, &str)]) -> Option<BTreeMap<String, String>> {
    Some(
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    )
}

fn served_key(coord: &ResourceCoordinate) -> String {
    format!("{}/{}", coord.api_version(), coord.plural)
}

/// `k=v[,k=v]` equality selectors only
fn matches(labels: Option<&BTreeMap<String, String>>, selector: Option<&str>) -> bool {
    let Some(selector) = selector else {
        return true;
    };
    selector.split(',').filter(|s| !s.is_empty()).all(|term| {
        let (key, value) = term.split_once('=').unwrap_or((term, ""));
        labels.and_then(|l| l.get(key)).map(String::as_str) == Some(value)
    })
}

fn in_namespace(meta: &ObjectMeta, namespace: Option<&str>) -> bool {
    namespace.is_none() || meta.namespace.as_deref() == namespace
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    pub fn with_namespace(mut self, name: &str, label_pairs: &[(&str, &str)]) -> Self {
        self.namespaces.push(Namespace {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                labels: labels(label_pairs),
                ..Default::default()
            },
            ..Default::default()
        });
        self
    }

    pub fn with_pod(
        mut self,
        namespace: &str,
        name: &str,
        containers: &[&str],
        init_containers: &[&str],
        label_pairs: &[(&str, &str)],
    ) -> Self {
        let to_containers = |names: &[&str]| -> Vec<Container> {
            names
                .iter()
                .map(|n| Container {
                    name: n.to_string(),
                    ..Default::default()
                })
                .collect()
        };
        self.pods.push(Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                labels: labels(label_pairs),
                ..Default::default()
            },
            spec: Some(PodSpec {
                containers: to_containers(containers),
                init_containers: (!init_containers.is_empty())
                    .then(|| to_containers(init_containers)),
                ..Default::default()
            }),
            ..Default::default()
        });
        self
    }

    pub fn with_log(
        mut self,
        namespace: &str,
        pod: &str,
        container: &str,
        body: impl AsRef<[u8]>,
    ) -> Self {
        self.logs.insert(
            (namespace.to_string(), pod.to_string(), container.to_string()),
            body.as_ref().to_vec(),
        );
        self
    }

    pub fn with_node(mut self, name: &str) -> Self {
        self.nodes.push(Node {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                ..Default::default()
            },
            ..Default::default()
        });
        self
    }

    pub fn with_config_map(mut self, namespace: &str, name: &str, data: &[(&str, &str)]) -> Self {
        self.config_maps.push(ConfigMap {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                ..Default::default()
            },
            data: labels(data),
            ..Default::default()
        });
        self
    }

    pub fn with_secret(mut self, namespace: &str, name: &str, label_pairs: &[(&str, &str)]) -> Self {
        self.secrets.push(Secret {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(namespace.to_string()),
                labels: labels(label_pairs),
                ..Default::default()
            },
            ..Default::default()
        });
        self
    }

    /// Mark a custom resource as installed without adding instances
    pub fn serving(mut self, coord: &ResourceCoordinate) -> Self {
        self.served.insert(served_key(coord));
        self
    }

    pub fn with_object(
        mut self,
        coord: &ResourceCoordinate,
        namespace: Option<&str>,
        name: &str,
        label_pairs: &[(&str, &str)],
        data: Value,
    ) -> Self {
        let mut obj = DynamicObject::new(name, &coord.api_resource()).data(data);
        obj.metadata.namespace = namespace.map(str::to_string);
        obj.metadata.labels = labels(label_pairs);
        self.served.insert(served_key(coord));
        self.objects.push((served_key(coord), obj));
        self
    }

    /// Every API call made so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: String) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    fn check_reachable(&self) -> Result<(), ClusterError> {
        if self.unreachable {
            Err(ClusterError::Transport("connection refused".to_string()))
        } else {
            Ok(())
        }
    }

    fn check_served(&self, coord: &ResourceCoordinate) -> Result<(), ClusterError> {
        if self.served.contains(&served_key(coord)) {
            Ok(())
        } else {
            Err(ClusterError::not_found(
                coord.to_string(),
                "the server could not find the requested resource",
            ))
        }
    }
}

#[async_trait]
impl DynamicApi for FakeCluster {
    async fn get_dynamic(
        &self,
        coord: &ResourceCoordinate,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<DynamicObject, ClusterError> {
        self.record(format!("get {} {}/{}", coord, namespace.unwrap_or(""), name));
        self.check_reachable()?;
        self.check_served(coord)?;
        let key = served_key(coord);
        self.objects
            .iter()
            .find(|(k, o)| {
                *k == key
                    && in_namespace(&o.metadata, namespace)
                    && o.metadata.name.as_deref() == Some(name)
            })
            .map(|(_, o)| o.clone())
            .ok_or_else(|| ClusterError::not_found(coord.kind.clone(), name))
    }

    async fn list_dynamic(
        &self,
        coord: &ResourceCoordinate,
        namespace: Option<&str>,
        selector: Option<&str>,
    ) -> Result<Vec<DynamicObject>, ClusterError> {
        self.record(format!("list {} {}", coord, namespace.unwrap_or("*")));
        self.check_reachable()?;
        self.check_served(coord)?;
        let key = served_key(coord);
        Ok(self
            .objects
            .iter()
            .filter(|(k, o)| {
                *k == key
                    && in_namespace(&o.metadata, namespace)
                    && matches(o.metadata.labels.as_ref(), selector)
            })
            .map(|(_, o)| o.clone())
            .collect())
    }
}

#[async_trait]
impl ClusterApi for FakeCluster {
    async fn probe(&self) -> Result<(), ClusterError> {
        self.record("probe".to_string());
        self.check_reachable()
    }

    async fn server_version(&self) -> Result<String, ClusterError> {
        self.record("server_version".to_string());
        self.check_reachable()?;
        Ok("v1.31.2".to_string())
    }

    async fn namespace_exists(&self, name: &str) -> Result<bool, ClusterError> {
        self.record(format!("namespace_exists {}", name));
        self.check_reachable()?;
        Ok(self
            .namespaces
            .iter()
            .any(|ns| ns.metadata.name.as_deref() == Some(name)))
    }

    async fn namespaces_by_label(&self, selector: &str) -> Result<Vec<String>, ClusterError> {
        self.record(format!("namespaces_by_label {}", selector));
        self.check_reachable()?;
        Ok(self
            .namespaces
            .iter()
            .filter(|ns| matches(ns.metadata.labels.as_ref(), Some(selector)))
            .filter_map(|ns| ns.metadata.name.clone())
            .collect())
    }

    async fn list_pods(
        &self,
        namespace: &str,
        selector: Option<&str>,
    ) -> Result<Vec<Pod>, ClusterError> {
        self.record(format!("list_pods {} {}", namespace, selector.unwrap_or("")));
        self.check_reachable()?;
        Ok(self
            .pods
            .iter()
            .filter(|p| {
                in_namespace(&p.metadata, Some(namespace))
                    && matches(p.metadata.labels.as_ref(), selector)
            })
            .cloned()
            .collect())
    }

    async fn list_nodes(&self) -> Result<Vec<Node>, ClusterError> {
        self.record("list_nodes".to_string());
        self.check_reachable()?;
        Ok(self.nodes.clone())
    }

    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<ConfigMap, ClusterError> {
        self.record(format!("get_config_map {}/{}", namespace, name));
        self.check_reachable()?;
        self.config_maps
            .iter()
            .find(|cm| {
                in_namespace(&cm.metadata, Some(namespace))
                    && cm.metadata.name.as_deref() == Some(name)
            })
            .cloned()
            .ok_or_else(|| ClusterError::not_found("ConfigMap", name))
    }

    async fn list_secrets(
        &self,
        namespace: Option<&str>,
        selector: &str,
    ) -> Result<Vec<Secret>, ClusterError> {
        self.record(format!("list_secrets {} {}", namespace.unwrap_or("*"), selector));
        self.check_reachable()?;
        Ok(self
            .secrets
            .iter()
            .filter(|s| {
                in_namespace(&s.metadata, namespace)
                    && matches(s.metadata.labels.as_ref(), Some(selector))
            })
            .cloned()
            .collect())
    }

    async fn container_logs(
        &self,
        namespace: &str,
        pod: &str,
        container: &str,
        _timestamps: bool,
    ) -> Result<Vec<u8>, ClusterError> {
        self.record(format!("logs {}/{}/{}", namespace, pod, container));
        self.check_reachable()?;
        self.logs
            .get(&(namespace.to_string(), pod.to_string(), container.to_string()))
            .cloned()
            .ok_or_else(|| ClusterError::not_found("Pod", format!("{}/{}", pod, container)))
    }
}

/// Entry names of a `.tar.gz`, in archive order, directories without the trailing `/`
pub fn archive_entries(path: &std::path::Path) -> Vec<String> {
    read_archive(path).into_iter().map(|(name, _)| name).collect()
}

/// Contents of one file entry
pub fn archive_file(path: &std::path::Path, entry: &str) -> Option<String> {
    archive_bytes(path, entry).map(|data| String::from_utf8(data).expect("utf-8 entry"))
}

/// Raw contents of one file entry
pub fn archive_bytes(path: &std::path::Path, entry: &str) -> Option<Vec<u8>> {
    read_archive(path)
        .into_iter()
        .find(|(name, _)| name == entry)
        .and_then(|(_, data)| data)
}

fn read_archive(path: &std::path::Path) -> Vec<(String, Option<Vec<u8>>)> {
    use std::io::Read;

    let file = std::fs::File::open(path).expect("archive exists");
    let mut archive = tar::Archive::new(flate2::read::GzDecoder::new(file));
    archive
        .entries()
        .expect("readable archive")
        .map(|entry| {
            let mut entry = entry.expect("readable entry");
            let name = entry
                .path()
                .expect("entry path")
                .to_string_lossy()
                .trim_end_matches('/')
                .to_string();
            if entry.header().entry_type().is_dir() {
                (name, None)
            } else {
                let mut data = Vec::new();
                entry.read_to_end(&mut data).expect("readable entry data");
                (name, Some(data))
            }
        })
        .collect()
}
