//! runai-kube: read-only Kubernetes access for RunAI clusters
//!
//! Credential resolution, logical-to-versioned resource resolution, the
//! [`ClusterApi`] read surface and text rendering of what it returns.

pub mod auth;
pub mod catalog;
pub mod client;
pub mod error;
pub mod helm;
pub mod render;
pub mod resolver;

pub use auth::{AuthMethod, ClusterSession, CredentialResolver, CredentialSources, Credentials};
pub use catalog::{ResourceCatalog, ResourceCoordinate, ResourceDescriptor};
pub use client::{ClusterApi, DynamicApi, KubeClusterApi};
pub use error::{AuthError, ClusterError, StrategyError};
pub use resolver::VersionedResolver;

// Re-exported so downstream crates name the same object types
pub use k8s_openapi;
pub use kube::api::DynamicObject;
