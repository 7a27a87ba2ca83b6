//! Resource catalog
//!
//! Maps logical resource names (as operators and support engineers know them)
//! to the API coordinates different RunAI releases serve them under. The
//! candidate order matters: the resolver tries them first to last.

use kube::discovery::ApiResource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const RUNAI_CONFIG: &str = "runaiconfig";
pub const ENGINE_CONFIG: &str = "configs.engine.run.ai";
pub const RUNAI_JOB: &str = "rj";
pub const POD_GROUP: &str = "pg";
pub const KNATIVE_SERVICE: &str = "ksvc";
pub const PROJECTS: &str = "projects";
pub const QUEUES: &str = "queues";
pub const NODEPOOLS: &str = "nodepools";
pub const DEPARTMENTS: &str = "departments";

/// How a resource is addressed on a particular cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceCoordinate {
    pub group: String,
    pub version: String,
    pub kind: String,
    /// URL path segment, e.g. "trainingworkloads"
    pub plural: String,
}

impl ResourceCoordinate {
    pub fn new(group: &str, version: &str, kind: &str, plural: &str) -> Self {
        Self {
            group: group.to_string(),
            version: version.to_string(),
            kind: kind.to_string(),
            plural: plural.to_string(),
        }
    }

    /// `group/version`, or just `version` for the core group
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    pub fn api_resource(&self) -> ApiResource {
        ApiResource {
            group: self.group.clone(),
            version: self.version.clone(),
            api_version: self.api_version(),
            kind: self.kind.clone(),
            plural: self.plural.clone(),
        }
    }
}

impl std::fmt::Display for ResourceCoordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.plural, self.api_version())
    }
}

/// Logical name plus its ordered candidates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    pub name: String,
    pub candidates: Vec<ResourceCoordinate>,
}

/// Immutable lookup table of resource descriptors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceCatalog {
    descriptors: BTreeMap<String, ResourceDescriptor>,
}

impl Default for ResourceCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ResourceCatalog {
    pub fn empty() -> Self {
        Self {
            descriptors: BTreeMap::new(),
        }
    }

    /// The coordinates known to be served by current and past RunAI releases
    pub fn builtin() -> Self {
        let mut catalog = Self::empty();
        let c = ResourceCoordinate::new;

        catalog.insert(
            RUNAI_CONFIG,
            vec![c("run.ai", "v1", "RunaiConfig", "runaiconfigs")],
        );
        catalog.insert(
            ENGINE_CONFIG,
            vec![c("engine.run.ai", "v1", "Config", "configs")],
        );
        catalog.insert(RUNAI_JOB, vec![c("run.ai", "v1", "RunaiJob", "runaijobs")]);
        catalog.insert(
            POD_GROUP,
            vec![
                c("scheduling.run.ai", "v1", "PodGroup", "podgroups"),
                c("scheduling.k8s.io", "v1", "PodGroup", "podgroups"),
            ],
        );
        catalog.insert(
            KNATIVE_SERVICE,
            vec![c("serving.knative.dev", "v1", "Service", "services")],
        );

        for (kind, plural) in [
            ("TrainingWorkload", "trainingworkloads"),
            ("InteractiveWorkload", "interactiveworkloads"),
            ("InferenceWorkload", "inferenceworkloads"),
            ("DistributedWorkload", "distributedworkloads"),
            ("DistributedInferenceWorkload", "distributedinferenceworkloads"),
            ("ExternalWorkload", "externalworkloads"),
        ] {
            catalog.insert(
                plural,
                vec![
                    c("run.ai", "v1", kind, plural),
                    c("run.ai", "v2alpha1", kind, plural),
                ],
            );
        }

        // Scheduler resources
        catalog.insert(PROJECTS, vec![c("run.ai", "v2", "Project", "projects")]);
        catalog.insert(
            QUEUES,
            vec![c("scheduling.run.ai", "v2", "Queue", "queues")],
        );
        catalog.insert(
            NODEPOOLS,
            vec![c("run.ai", "v1alpha1", "Nodepool", "nodepools")],
        );
        catalog.insert(
            DEPARTMENTS,
            vec![c("scheduling.run.ai", "v1", "Department", "departments")],
        );

        catalog
    }

    /// Add or replace the candidates for a logical name
    pub fn insert(&mut self, name: &str, candidates: Vec<ResourceCoordinate>) {
        self.descriptors.insert(
            name.to_string(),
            ResourceDescriptor {
                name: name.to_string(),
                candidates,
            },
        );
    }

    /// Return a copy with `overrides` layered on top
    pub fn with_overrides(
        mut self,
        overrides: &BTreeMap<String, Vec<ResourceCoordinate>>,
    ) -> Self {
        for (name, candidates) in overrides {
            self.insert(name, candidates.clone());
        }
        self
    }

    pub fn descriptor(&self, name: &str) -> Option<&ResourceDescriptor> {
        self.descriptors.get(name)
    }

    pub fn candidates(&self, name: &str) -> Option<&[ResourceCoordinate]> {
        self.descriptor(name).map(|d| d.candidates.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workloads_prefer_v1_over_v2alpha1() {
        let catalog = ResourceCatalog::builtin();
        let candidates = catalog.candidates("trainingworkloads").unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].version, "v1");
        assert_eq!(candidates[1].version, "v2alpha1");
    }

    #[test]
    fn test_podgroup_falls_back_to_upstream_group() {
        let catalog = ResourceCatalog::builtin();
        let groups: Vec<_> = catalog
            .candidates(POD_GROUP)
            .unwrap()
            .iter()
            .map(|c| c.group.as_str())
            .collect();
        assert_eq!(groups, vec!["scheduling.run.ai", "scheduling.k8s.io"]);
    }

    #[test]
    fn test_overrides_replace_candidates() {
        let mut overrides = BTreeMap::new();
        overrides.insert(
            QUEUES.to_string(),
            vec![ResourceCoordinate::new(
                "scheduling.run.ai",
                "v3",
                "Queue",
                "queues",
            )],
        );
        let catalog = ResourceCatalog::builtin().with_overrides(&overrides);
        assert_eq!(catalog.candidates(QUEUES).unwrap()[0].version, "v3");
        assert_eq!(catalog.descriptor(QUEUES).unwrap().name, QUEUES);
        assert!(catalog.candidates(PROJECTS).is_some());
    }

    #[test]
    fn test_api_resource_uses_plural_and_group_version() {
        let coord = ResourceCoordinate::new("run.ai", "v2", "Project", "projects");
        let ar = coord.api_resource();
        assert_eq!(ar.api_version, "run.ai/v2");
        assert_eq!(ar.plural, "projects");
        assert_eq!(coord.to_string(), "projects.run.ai/v2");
    }
}
