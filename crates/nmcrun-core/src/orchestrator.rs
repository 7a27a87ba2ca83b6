//! Plan execution into a working directory
//!
//! The orchestrator owns one working root for its whole life. A bundle may
//! execute several plans into it (the second plan is usually built from what
//! the first one found) before sealing it into an archive. Step failures are
//! recorded and never stop the run; only the working root and the archive
//! itself are fatal.

use crate::archive::ArchiveBuilder;
use crate::error::{ArchiveError, CollectError};
use crate::narrative::ScriptLog;
use crate::plan::CollectionPlan;
use crate::types::{CollectionOutcome, RunState, RunSummary, StepRecord};
use crate::validate::ContentValidator;
use futures::StreamExt;
use std::fs;
use std::path::{Path, PathBuf};

pub struct Orchestrator {
    root: PathBuf,
    state: RunState,
    concurrency: usize,
    validator: ContentValidator,
    narrative: Option<ScriptLog>,
    summary: RunSummary,
}

impl Orchestrator {
    /// Create the working root and enter planning
    pub fn start(root: impl Into<PathBuf>, concurrency: usize) -> Result<Self, CollectError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| CollectError::WorkingDir {
            path: root.clone(),
            source,
        })?;

        let mut orchestrator = Self {
            root,
            state: RunState::Idle,
            concurrency: concurrency.max(1),
            validator: ContentValidator,
            narrative: None,
            summary: RunSummary::default(),
        };
        orchestrator.transition(RunState::Planning);
        Ok(orchestrator)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// Open `script.log` in the working root; later narration goes there too
    pub fn open_narrative(&mut self) -> Result<&mut ScriptLog, CollectError> {
        let log = ScriptLog::create(&self.root).map_err(|source| CollectError::WorkingDir {
            path: self.root.clone(),
            source,
        })?;
        Ok(self.narrative.insert(log))
    }

    pub fn narrate(&mut self, text: &str) {
        tracing::info!("{}", text);
        if let Some(log) = self.narrative.as_mut() {
            log.line(text);
        }
    }

    pub fn section(&mut self, title: &str) {
        tracing::info!("{}", title);
        if let Some(log) = self.narrative.as_mut() {
            log.section(title);
        }
    }

    /// Record a failure that happened outside any step (e.g. enumerating pods)
    pub fn record_failure(&mut self, name: &str, cause: impl std::fmt::Display) {
        let cause = cause.to_string();
        tracing::warn!("Failed to collect {}: {}", name, cause);
        if let Some(log) = self.narrative.as_mut() {
            log.line(&format!("Warning: failed to collect {}: {}", name, cause));
        }
        self.summary.records.push(StepRecord {
            name: name.to_string(),
            outcome: CollectionOutcome::Failed { cause },
        });
    }

    /// Note something deliberately left out of the bundle
    pub fn skip(&mut self, note: impl Into<String>) {
        let note = note.into();
        self.narrate(&note);
        self.summary.skipped.push(note);
    }

    /// Run every step of `plan`, recording outcomes in plan order
    pub async fn execute(&mut self, plan: CollectionPlan<'_>) {
        let steps = plan.into_steps();
        tracing::debug!("Executing {} step(s) in {}", steps.len(), self.root.display());

        let mut results = futures::stream::iter(steps)
            .map(|step| async move {
                let payload = step.producer.await;
                (step.name, step.path, step.validate, payload)
            })
            .buffered(self.concurrency);

        let mut index = 0;
        while let Some((name, path, validate, payload)) = results.next().await {
            self.transition(RunState::Executing(index));
            index += 1;

            let outcome = match payload {
                Ok(content) => self.write(&path, &content, validate),
                Err(e) => Err(e.to_string()),
            };

            match outcome {
                Ok(outcome) => {
                    if let Some(log) = self.narrative.as_mut() {
                        log.line(&format!("Saved {}", path.display()));
                    }
                    self.summary.records.push(StepRecord { name, outcome });
                }
                Err(cause) => self.record_failure(&name, cause),
            }
        }

        self.transition(RunState::Planning);
    }

    fn write(&self, path: &Path, content: &[u8], validate: bool) -> Result<CollectionOutcome, String> {
        let full = self.root.join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        fs::write(&full, content).map_err(|e| e.to_string())?;

        let warning = if validate {
            self.validator.check(&full).err().map(|w| {
                tracing::warn!("{}", w);
                w
            })
        } else {
            None
        };

        Ok(CollectionOutcome::Written {
            path: path.to_path_buf(),
            bytes: content.len(),
            warning,
        })
    }

    /// Archive the whole working root
    pub fn seal(&mut self, archive: &Path) -> Result<PathBuf, CollectError> {
        self.seal_with(|root| ArchiveBuilder.seal(root, archive))
    }

    /// Archive only the files written so far, flat
    pub fn seal_written(&mut self, archive: &Path) -> Result<PathBuf, CollectError> {
        let files = self.summary.written_files();
        self.seal_with(|root| ArchiveBuilder.seal_files(root, &files, archive))
    }

    fn seal_with<F>(&mut self, seal: F) -> Result<PathBuf, CollectError>
    where
        F: FnOnce(&Path) -> Result<PathBuf, ArchiveError>,
    {
        self.section("Creating Archive");
        // Close script.log before it is packed
        self.narrative = None;
        self.transition(RunState::Sealing);

        match seal(&self.root) {
            Ok(path) => {
                let done = if self.summary.failed() == 0 {
                    RunState::Done
                } else {
                    RunState::PartiallyFailed
                };
                self.transition(done);
                tracing::info!("Created archive: {}", path.display());
                Ok(path)
            }
            Err(e) => {
                self.transition(RunState::PartiallyFailed);
                Err(e.into())
            }
        }
    }

    pub fn into_summary(self) -> RunSummary {
        self.summary
    }

    fn transition(&mut self, to: RunState) {
        tracing::debug!("Orchestrator: {:?} -> {:?}", self.state, to);
        self.state = to;
    }
}
