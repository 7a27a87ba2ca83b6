//! nmcrun-core: collection engine for RunAI diagnostic bundles
//!
//! Plans describe what to fetch and where to write it, the orchestrator runs
//! them into a working directory, and the archive builder seals the result.
//! [`Collector`] ties these together for each kind of bundle.

pub mod archive;
pub mod bundles;
pub mod cluster_info;
pub mod collector;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod naming;
pub mod narrative;
pub mod orchestrator;
pub mod plan;
pub mod types;
pub mod validate;

#[cfg(test)]
mod testing;

pub use archive::ArchiveBuilder;
pub use bundles::workload::canonical_type;
pub use cluster_info::ClusterUrls;
pub use collector::Collector;
pub use config::CollectorConfig;
pub use diagnostics::{CheckStatus, DiagnosticCheck, DiagnosticReport};
pub use error::{ArchiveError, CollectError, ConfigError};
pub use orchestrator::Orchestrator;
pub use plan::{CollectionPlan, CollectionStep};
pub use types::{
    CollectionOutcome, EmptyContentWarning, RunState, RunSummary, StepRecord, TargetReport,
    TargetStatus,
};
pub use validate::ContentValidator;
