//! Run and outcome types shared by the orchestrator and the bundles

use std::fmt;
use std::path::PathBuf;

/// Advisory raised when a written file carries no real content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmptyContentWarning {
    pub path: PathBuf,
}

impl fmt::Display for EmptyContentWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} contains only comments or is empty",
            self.path.display()
        )
    }
}

/// Result of executing one collection step
#[derive(Debug, Clone, PartialEq)]
pub enum CollectionOutcome {
    Written {
        path: PathBuf,
        bytes: usize,
        warning: Option<EmptyContentWarning>,
    },
    Failed {
        cause: String,
    },
}

impl CollectionOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, CollectionOutcome::Written { .. })
    }
}

/// Orchestrator lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Planning,
    /// Index of the step currently running within the active plan
    Executing(usize),
    Sealing,
    Done,
    PartiallyFailed,
}

/// Step outcome with the step's display name
#[derive(Debug, Clone, PartialEq)]
pub struct StepRecord {
    pub name: String,
    pub outcome: CollectionOutcome,
}

/// Aggregate of every step run into one working root
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub records: Vec<StepRecord>,
    /// Things deliberately not collected, with the reason
    pub skipped: Vec<String>,
}

impl RunSummary {
    pub fn succeeded(&self) -> usize {
        self.records.iter().filter(|r| r.outcome.is_written()).count()
    }

    pub fn failed(&self) -> usize {
        self.records.len() - self.succeeded()
    }

    /// Paths of every file written, in execution order
    pub fn written_files(&self) -> Vec<PathBuf> {
        self.records
            .iter()
            .filter_map(|r| match &r.outcome {
                CollectionOutcome::Written { path, .. } => Some(path.clone()),
                CollectionOutcome::Failed { .. } => None,
            })
            .collect()
    }

    pub fn warnings(&self) -> Vec<&EmptyContentWarning> {
        self.records
            .iter()
            .filter_map(|r| match &r.outcome {
                CollectionOutcome::Written { warning, .. } => warning.as_ref(),
                CollectionOutcome::Failed { .. } => None,
            })
            .collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &str)> {
        self.records.iter().filter_map(|r| match &r.outcome {
            CollectionOutcome::Failed { cause } => Some((r.name.as_str(), cause.as_str())),
            CollectionOutcome::Written { .. } => None,
        })
    }
}

/// What happened to one collection target (namespace, workload, dump)
#[derive(Debug, Clone, PartialEq)]
pub enum TargetStatus {
    /// Archive written
    Archived(PathBuf),
    /// Target did not apply; nothing written
    Skipped(String),
    /// Target-level failure after collection started
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TargetReport {
    pub target: String,
    pub status: TargetStatus,
    pub summary: RunSummary,
}

impl TargetReport {
    pub fn archive(&self) -> Option<&PathBuf> {
        match &self.status {
            TargetStatus::Archived(path) => Some(path),
            _ => None,
        }
    }
}
