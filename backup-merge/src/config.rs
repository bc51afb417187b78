//! Configuration management for the backup merger.
//!
//! Loads configuration from a TOML file. Every section is optional; missing
//! values fall back to the defaults below.

use crate::archive::store::TarFormat;
use crate::utils::{MergeError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub archives: ArchivesConfig,
    #[serde(default)]
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub merge: MergeConfig,
    #[serde(default)]
    pub cleanup: CleanupConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchivesConfig {
    /// Archive supplying supplementary content
    #[serde(default = "default_primary")]
    pub primary: PathBuf,

    /// Archive authoritative for context ids and course format
    #[serde(default = "default_target")]
    pub target: PathBuf,

    /// Where the merged archive is written
    #[serde(default = "default_output")]
    pub output: PathBuf,

    /// Tar header variant accepted by the importing system
    #[serde(default)]
    pub format: TarFormat,

    /// Gzip level (0-9)
    #[serde(default = "default_compression_level")]
    pub compression_level: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Directory holding the unpacked primary, target and output trees
    #[serde(default = "default_workspace_dir")]
    pub dir: PathBuf,

    /// Mirror the unpacked trees to disk for inspection
    #[serde(default = "default_true")]
    pub keep_unpacked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Course format forced into the merged descriptors
    #[serde(default = "default_course_format")]
    pub course_format: String,

    /// Top-level files never taken from the primary archive
    #[serde(default = "default_excluded_files")]
    pub excluded_files: Vec<String>,

    /// Path prefixes never taken from the primary archive
    #[serde(default = "default_excluded_prefixes")]
    pub excluded_prefixes: Vec<String>,

    /// Re-read the packed archive and compare it with the merged tree
    #[serde(default = "default_true")]
    pub verify_roundtrip: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupConfig {
    /// Removal passes before giving up on a stale directory
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Pause between removal passes in milliseconds
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default values
fn default_primary() -> PathBuf {
    PathBuf::from("campus.mbz")
}

fn default_target() -> PathBuf {
    PathBuf::from("houghton.mbz")
}

fn default_output() -> PathBuf {
    PathBuf::from("out.mbz")
}

fn default_compression_level() -> u32 {
    6
}

fn default_workspace_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_true() -> bool {
    true
}

fn default_course_format() -> String {
    "tiles".to_string()
}

fn default_excluded_files() -> Vec<String> {
    vec!["users.xml".to_string(), "badges.xml".to_string()]
}

fn default_excluded_prefixes() -> Vec<String> {
    vec!["course/blocks/".to_string()]
}

fn default_max_attempts() -> u32 {
    50
}

fn default_retry_delay_ms() -> u64 {
    100
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ArchivesConfig {
    fn default() -> Self {
        Self {
            primary: default_primary(),
            target: default_target(),
            output: default_output(),
            format: TarFormat::default(),
            compression_level: default_compression_level(),
        }
    }
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            dir: default_workspace_dir(),
            keep_unpacked: true,
        }
    }
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            course_format: default_course_format(),
            excluded_files: default_excluded_files(),
            excluded_prefixes: default_excluded_prefixes(),
            verify_roundtrip: true,
        }
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl CleanupConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| MergeError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the merge cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.merge.course_format.trim().is_empty() {
            return Err(MergeError::Config("merge.course_format must not be empty".into()));
        }
        if self.archives.compression_level > 9 {
            return Err(MergeError::Config(format!(
                "archives.compression_level must be 0-9, got {}",
                self.archives.compression_level
            )));
        }
        if self.archives.primary == self.archives.target {
            return Err(MergeError::Config(
                "primary and target archives must differ".into(),
            ));
        }
        if let Some(name) = self.merge.excluded_files.iter().find(|n| n.contains('/')) {
            return Err(MergeError::Config(format!(
                "excluded file '{}' must be a top-level name",
                name
            )));
        }
        Ok(())
    }
}
