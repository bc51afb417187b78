//! Summary of one merge run.
//!
//! Logged at the end of every run and optionally written as JSON next to the
//! merged archive.

use crate::archive::store::TarFormat;
use crate::merge::MergeStats;
use crate::utils::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Serialize)]
pub struct MergeReport {
    pub primary_archive: PathBuf,
    pub target_archive: PathBuf,
    pub output_archive: PathBuf,
    pub format: TarFormat,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    /// The packed archive was re-read and matched the merged tree
    pub verified: bool,
    pub stats: MergeStats,
}

impl MergeReport {
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn log_summary(&self) {
        let s = &self.stats;
        info!(
            "Merged {} into {} -> {} ({} ms)",
            self.primary_archive.display(),
            self.target_archive.display(),
            self.output_archive.display(),
            self.duration_ms
        );
        info!(
            "  activities +{}, sections +{}, settings +{}",
            s.descriptor.activities, s.descriptor.sections, s.descriptor.settings
        );
        info!(
            "  context id {} -> {}: {} file records, {} block fields",
            s.primary.context_id,
            s.target.context_id,
            s.manifest.context_ids_rewritten,
            s.block_context_ids_rewritten
        );
        info!(
            "  {} sections renumbered, {} index entries, {} files in output",
            s.sections_renumbered, s.index_entries, s.output_files
        );
    }
}
