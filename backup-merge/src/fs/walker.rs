//! Directory traversal for unpacked backup trees.
//!
//! Used when an input backup is given as a directory instead of an archive.

use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Options for directory walking
#[derive(Debug, Clone, Default)]
pub struct WalkOptions {
    /// Report directories as well as files
    pub include_dirs: bool,
}

/// Information about an entry discovered during walking
#[derive(Debug, Clone)]
pub struct FileInfo {
    /// Full path to the entry
    pub path: PathBuf,

    /// Relative path from the root
    pub relative_path: PathBuf,

    /// File size in bytes (0 for directories)
    pub size: u64,

    /// Is this a directory?
    pub is_dir: bool,
}

impl FileInfo {
    /// Create FileInfo from a DirEntry.
    /// Returns None for symlinks whose target is missing.
    fn from_entry(entry: &DirEntry, root: &Path) -> std::io::Result<Option<Self>> {
        let path = entry.path().to_path_buf();
        let relative_path = path.strip_prefix(root)
            .unwrap_or(&path)
            .to_path_buf();

        let metadata = match std::fs::metadata(&path) {
            Ok(metadata) => metadata,
            // Broken symlink
            Err(_) if entry.path_is_symlink() => return Ok(None),
            Err(e) => return Err(e),
        };

        Ok(Some(Self {
            path,
            relative_path,
            size: if metadata.is_dir() { 0 } else { metadata.len() },
            is_dir: metadata.is_dir(),
        }))
    }
}

/// Walk a directory tree and collect its entries
///
/// # Arguments
/// * `root` - Root directory to start walking from
/// * `options` - Walking options
///
/// # Returns
/// * `Ok(Vec<FileInfo>)` - Entries in sorted traversal order; the root itself is omitted
/// * `Err(io::Error)` - If directory cannot be read
///
/// # Example
/// ```no_run
/// use backup_merge::fs::walker::{walk_directory, WalkOptions};
/// use std::path::Path;
///
/// let files = walk_directory(Path::new("campus"), WalkOptions::default()).unwrap();
/// println!("Found {} files", files.len());
/// ```
pub fn walk_directory(root: &Path, options: WalkOptions) -> std::io::Result<Vec<FileInfo>> {
    let mut entries = Vec::new();

    let walker = WalkDir::new(root)
        .min_depth(1)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry?;

        if entry.file_type().is_dir() && !options.include_dirs {
            continue;
        }

        if let Some(info) = FileInfo::from_entry(&entry, root)? {
            if info.is_dir && !options.include_dirs {
                continue;
            }
            entries.push(info);
        }
    }

    Ok(entries)
}
