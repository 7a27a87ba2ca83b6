//! Human-readable run log written into each namespace bundle

use chrono::{DateTime, Local};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub const SCRIPT_LOG: &str = "script.log";

/// Append-only `script.log`; also mirrored to tracing by the orchestrator
#[derive(Debug)]
pub struct ScriptLog {
    path: PathBuf,
    file: File,
}

impl ScriptLog {
    pub fn create(root: &Path) -> io::Result<Self> {
        let path = root.join(SCRIPT_LOG);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(
        &mut self,
        started: &DateTime<Local>,
        namespace: &str,
        cluster_url: &str,
        control_plane_url: &str,
    ) -> io::Result<()> {
        writeln!(
            self.file,
            "=== Log Collection Started at {} ===",
            started.to_rfc3339()
        )?;
        writeln!(self.file, "Namespace: {}", namespace)?;
        writeln!(self.file, "Cluster URL: {}", cluster_url)?;
        writeln!(self.file, "Control Plane URL: {}", control_plane_url)?;
        writeln!(self.file)
    }

    /// `=== {title} ===`
    pub fn section(&mut self, title: &str) {
        self.line(&format!("=== {} ===", title));
    }

    /// Narrative writes never fail a run
    pub fn line(&mut self, text: &str) {
        if let Err(e) = writeln!(self.file, "{}", text) {
            tracing::warn!("Failed to write {}: {}", self.path.display(), e);
        }
    }
}
