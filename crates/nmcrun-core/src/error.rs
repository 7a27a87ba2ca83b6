//! Error types for nmcrun-core

use runai_kube::{AuthError, ClusterError};
use std::path::PathBuf;
use thiserror::Error;

/// Failures that stop a collection target
#[derive(Error, Debug)]
pub enum CollectError {
    /// No cluster session could be built
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Rejected before any API call was made
    #[error("invalid workload type: {0}. Valid types: tw, iw, infw, dw, dinfw, ew")]
    InvalidInput(String),

    /// No namespace carries the project's queue label
    #[error("no namespace found for project: {0}")]
    ProjectNamespace(String),

    /// The cluster could not be reached at all
    #[error("cannot connect to Kubernetes cluster: {0}")]
    Connectivity(#[source] ClusterError),

    /// None of the expected RunAI namespaces exist
    #[error("no RunAI namespaces found. Expected '{0}' and/or '{1}'")]
    NoNamespaces(String, String),

    /// The working directory could not be prepared
    #[error("failed to create working directory {path}: {source}")]
    WorkingDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create archive: {0}")]
    Archive(#[from] ArchiveError),
}

/// Failures while sealing an archive
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Explicit file list was empty
    #[error("no files to archive")]
    Empty,

    /// A listed file is not under the working root
    #[error("{0} is outside the working directory")]
    OutsideRoot(PathBuf),
}

/// Errors loading the collector configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Config file not found: {0}")]
    NotFound(String),

    /// Failed to parse configuration
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsed but unusable
    #[error("Invalid config: {0}")]
    Invalid(String),
}
