//! Gzip tar assembly of a working directory
//!
//! [`ArchiveBuilder::seal`] packs a whole working root under its own
//! directory name; [`ArchiveBuilder::seal_files`] packs an explicit list of
//! files flat. Both remove the working root once the archive is complete and
//! leave it untouched if anything fails.

use crate::error::ArchiveError;
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveBuilder;

impl ArchiveBuilder {
    /// Archive every file and directory under `root` as `{root-name}/...`
    pub fn seal(&self, root: &Path, archive: &Path) -> Result<PathBuf, ArchiveError> {
        let prefix = root
            .file_name()
            .map(PathBuf::from)
            .ok_or_else(|| ArchiveError::OutsideRoot(root.to_path_buf()))?;

        let result = write_archive(archive, |builder| {
            builder.append_dir(&prefix, root)?;
            // Depth-first, each directory's entries in name order
            for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
                let entry = entry.map_err(std::io::Error::from)?;
                let relative = entry
                    .path()
                    .strip_prefix(root)
                    .map_err(|_| ArchiveError::OutsideRoot(entry.path().to_path_buf()))?;
                let name = prefix.join(relative);
                if entry.file_type().is_dir() {
                    builder.append_dir(&name, entry.path())?;
                } else {
                    builder.append_path_with_name(entry.path(), &name)?;
                }
            }
            Ok(())
        });

        finish(result, root, archive)
    }

    /// Archive only the listed files, flat, named by their path relative to `root`
    pub fn seal_files(
        &self,
        root: &Path,
        files: &[PathBuf],
        archive: &Path,
    ) -> Result<PathBuf, ArchiveError> {
        if files.is_empty() {
            return Err(ArchiveError::Empty);
        }

        let mut entries = Vec::with_capacity(files.len());
        for file in files {
            let (full, name) = if file.is_absolute() {
                let name = file
                    .strip_prefix(root)
                    .map_err(|_| ArchiveError::OutsideRoot(file.clone()))?;
                (file.clone(), name.to_path_buf())
            } else {
                (root.join(file), file.clone())
            };
            entries.push((full, name));
        }

        let result = write_archive(archive, |builder| {
            for (full, name) in &entries {
                builder.append_path_with_name(full, name)?;
            }
            Ok(())
        });

        finish(result, root, archive)
    }
}

fn write_archive<F>(archive: &Path, fill: F) -> Result<(), ArchiveError>
where
    F: FnOnce(&mut tar::Builder<GzEncoder<File>>) -> Result<(), ArchiveError>,
{
    let file = File::create(archive)?;
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    fill(&mut builder)?;
    let mut file = builder.into_inner()?.finish()?;
    file.flush()?;
    Ok(())
}

fn finish(
    result: Result<(), ArchiveError>,
    root: &Path,
    archive: &Path,
) -> Result<PathBuf, ArchiveError> {
    if let Err(e) = result {
        // The working root stays for inspection; the partial archive does not
        if archive.is_file() {
            if let Err(remove_err) = fs::remove_file(archive) {
                tracing::warn!("Failed to remove partial archive {}: {}", archive.display(), remove_err);
            }
        }
        return Err(e);
    }

    if let Err(e) = fs::remove_dir_all(root) {
        tracing::warn!("Failed to clean up {}: {}", root.display(), e);
    }
    Ok(archive.to_path_buf())
}
