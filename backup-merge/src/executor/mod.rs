//! Merge run orchestration.
//!
//! Ties together the pieces around the merge engine:
//! - Clearing the working directories of a previous run
//! - Extracting both archives
//! - Running the merge
//! - Packing (and re-reading) the output archive

pub mod report;

use crate::archive::store::ArchiveStore;
use crate::archive::ArchiveTree;
use crate::config::Config;
use crate::fs::cleanup::{clear_stale_dirs, CleanupPolicy};
use crate::merge::MergeEngine;
use crate::utils::{MergeError, Result};
use report::MergeReport;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

/// Unpacked copies of the inputs and the output, kept for inspection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkDirs {
    /// `None` when the input already is a directory
    pub primary: Option<PathBuf>,
    pub target: Option<PathBuf>,
    pub output: PathBuf,
}

impl WorkDirs {
    pub fn for_config(config: &Config) -> Result<Self> {
        let root = &config.workspace.dir;
        let mirror = |archive: &Path| -> Result<Option<PathBuf>> {
            if archive.is_dir() {
                Ok(None)
            } else {
                Ok(Some(root.join(archive_stem(archive)?)))
            }
        };

        let dirs = Self {
            primary: mirror(config.archives.primary.as_path())?,
            target: mirror(config.archives.target.as_path())?,
            output: root.join(archive_stem(&config.archives.output)?),
        };

        for input in [&config.archives.primary, &config.archives.target] {
            if same_path(input, &dirs.output) {
                return Err(MergeError::Config(format!(
                    "output working directory {} would overwrite input {}",
                    dirs.output.display(),
                    input.display()
                )));
            }
        }
        if dirs.primary.is_some() && dirs.primary == dirs.target {
            return Err(MergeError::Config(
                "primary and target archives share a working directory name".into(),
            ));
        }
        Ok(dirs)
    }

    pub fn all(&self) -> Vec<PathBuf> {
        self.primary
            .iter()
            .chain(self.target.iter())
            .cloned()
            .chain(std::iter::once(self.output.clone()))
            .collect()
    }
}

fn archive_stem(archive: &Path) -> Result<String> {
    archive
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| MergeError::Config(format!("no file name in {}", archive.display())))
}

fn same_path(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// First path at which two trees differ, if any
fn first_difference(expected: &ArchiveTree, actual: &ArchiveTree) -> Option<String> {
    for (path, data) in expected.files() {
        if actual.file(path) != Some(data) {
            return Some(path.to_string());
        }
    }
    for (path, _) in actual.files() {
        if !expected.contains_file(path) {
            return Some(path.to_string());
        }
    }
    expected
        .dirs()
        .find(|d| !actual.contains_dir(d))
        .or_else(|| actual.dirs().find(|d| !expected.contains_dir(d)))
        .map(str::to_string)
}

/// Runs one complete merge
pub struct MergeOrchestrator<S: ArchiveStore> {
    config: Config,
    store: S,
}

impl<S: ArchiveStore> MergeOrchestrator<S> {
    pub fn new(config: Config, store: S) -> Self {
        Self { config, store }
    }

    pub fn run(&self) -> Result<MergeReport> {
        let started_at = chrono::Utc::now();
        let start = Instant::now();
        let archives = &self.config.archives;

        let work_dirs = WorkDirs::for_config(&self.config)?;
        info!("Removing prior unpacked archives");
        let policy = CleanupPolicy {
            max_attempts: self.config.cleanup.max_attempts,
            retry_delay: self.config.cleanup.retry_delay(),
        };
        clear_stale_dirs(&work_dirs.all(), &policy)?;

        let primary = self.store.extract(&archives.primary)?;
        let target = self.store.extract(&archives.target)?;

        if self.config.workspace.keep_unpacked {
            for (tree, dir) in [(&primary, &work_dirs.primary), (&target, &work_dirs.target)] {
                if let Some(dir) = dir {
                    debug!("Mirroring unpacked tree to {}", dir.display());
                    tree.write_to_dir(dir)?;
                }
            }
        }

        let outcome = MergeEngine::new(&self.config.merge).merge(&primary, &target)?;

        if self.config.workspace.keep_unpacked {
            outcome.tree.write_to_dir(&work_dirs.output)?;
        }

        info!("Archiving output");
        let output = self.store.pack(&outcome.tree, &archives.output, archives.format)?;

        let verified = if self.config.merge.verify_roundtrip {
            let reread = self.store.extract(&output)?;
            if let Some(path) = first_difference(&outcome.tree, &reread) {
                return Err(MergeError::Archive(format!(
                    "{} does not match the merged tree at {}",
                    output.display(),
                    path
                )));
            }
            info!("Verified {}", output.display());
            true
        } else {
            false
        };

        Ok(MergeReport {
            primary_archive: archives.primary.clone(),
            target_archive: archives.target.clone(),
            output_archive: output,
            format: archives.format,
            started_at,
            duration_ms: start.elapsed().as_millis() as u64,
            verified,
            stats: outcome.stats,
        })
    }
}
