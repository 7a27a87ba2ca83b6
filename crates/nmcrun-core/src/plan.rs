//! Declarative collection plans
//!
//! A [`CollectionStep`] pairs an output path with a producer future that has
//! not been polled yet. Building a plan performs no I/O; the orchestrator
//! drives the producers.

use futures::TryFutureExt;
use futures::future::BoxFuture;
use runai_kube::ClusterError;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};

/// Lazily evaluated payload; logs are kept as the raw bytes the server sent
pub type Producer<'a> = BoxFuture<'a, Result<Vec<u8>, ClusterError>>;

pub struct CollectionStep<'a> {
    /// Shown in progress output and the narrative
    pub name: String,
    /// Relative to the working root
    pub path: PathBuf,
    pub producer: Producer<'a>,
    /// Run the content validator after writing
    pub validate: bool,
}

impl<'a> CollectionStep<'a> {
    pub fn new<T: Into<Vec<u8>> + 'a>(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        producer: impl Future<Output = Result<T, ClusterError>> + Send + 'a,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            producer: Box::pin(producer.map_ok(Into::<Vec<u8>>::into)),
            validate: false,
        }
    }

    pub fn validated(mut self) -> Self {
        self.validate = true;
        self
    }
}

impl fmt::Debug for CollectionStep<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionStep")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("validate", &self.validate)
            .finish_non_exhaustive()
    }
}

/// Ordered steps for one pass over a working root
#[derive(Debug, Default)]
pub struct CollectionPlan<'a> {
    steps: Vec<CollectionStep<'a>>,
}

impl<'a> CollectionPlan<'a> {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn push(&mut self, step: CollectionStep<'a>) {
        self.steps.push(step);
    }

    pub fn step<T: Into<Vec<u8>> + 'a>(
        &mut self,
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        producer: impl Future<Output = Result<T, ClusterError>> + Send + 'a,
    ) -> &mut Self {
        self.push(CollectionStep::new(name, path, producer));
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.steps.iter().map(|s| s.path.as_path())
    }

    pub fn into_steps(self) -> Vec<CollectionStep<'a>> {
        self.steps
    }
}
