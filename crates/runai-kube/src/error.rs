//! Error types for runai-kube

use thiserror::Error;

/// Errors returned by read operations against the cluster API
#[derive(Error, Debug)]
pub enum ClusterError {
    /// The object (or its collection) does not exist
    #[error("{kind} not found: {name}")]
    NotFound { kind: String, name: String },

    /// Any other failure talking to the API server
    #[error("Transport error: {0}")]
    Transport(String),

    /// Logical resource name missing from the catalog
    #[error("unknown resource type: {0}")]
    UnknownResource(String),

    /// Every candidate coordinate failed; carries the last candidate's error
    #[error("could not resolve {resource}: {source}")]
    Unresolved {
        resource: String,
        #[source]
        source: Box<ClusterError>,
    },

    /// Failed to render an object to YAML
    #[error("Failed to render YAML: {0}")]
    Render(#[from] serde_yaml::Error),
}

impl ClusterError {
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        ClusterError::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// True when the error (or the last candidate behind it) is a 404
    pub fn is_not_found(&self) -> bool {
        match self {
            ClusterError::NotFound { .. } => true,
            ClusterError::Unresolved { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// Map a kube client error, turning 404 responses into [`ClusterError::NotFound`]
    pub fn from_kube(err: kube::Error, kind: &str, name: &str) -> Self {
        match err {
            kube::Error::Api(response) if response.code == 404 => {
                ClusterError::not_found(kind, name)
            }
            other => ClusterError::Transport(other.to_string()),
        }
    }
}

/// Errors produced while building a cluster session
#[derive(Error, Debug)]
pub enum AuthError {
    /// No strategy produced a usable configuration
    #[error(
        "no valid Kubernetes authentication method found. Please ensure one of the following:\n\
         1. Running inside a Kubernetes cluster with a service account\n\
         2. Have a valid kubeconfig file at ~/.kube/config or set KUBECONFIG env var\n\
         3. Have a service account token file available with KUBERNETES_SERVICE_HOST and KUBERNETES_SERVICE_PORT set\n\
         4. Have KUBERNETES_SERVICE_HOST and KUBERNETES_SERVICE_PORT environment variables set"
    )]
    NoMethod,

    /// A configuration was found but the client could not be built from it
    #[error("Failed to create Kubernetes client: {0}")]
    ClientCreate(String),
}

/// Why a single credential strategy did not apply; never surfaced on its own
#[derive(Error, Debug)]
#[error("{0}")]
pub struct StrategyError(pub String);
