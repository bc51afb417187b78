//! In-memory view of an unpacked course backup.
//!
//! An [`ArchiveTree`] maps normalized relative paths (`/`-separated, no
//! leading `./` or `/`) to file contents and keeps the set of directories
//! separately so that empty directories survive an extract/pack cycle.

pub mod index;
pub mod store;

use crate::fs::walker::{walk_directory, WalkOptions};
use crate::utils::{MergeError, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveTree {
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
}

/// Normalize an entry name to the tree's path form.
///
/// Returns `None` for names that denote the archive root itself.
pub fn normalize_entry_path(raw: &str) -> Option<String> {
    let parts: Vec<&str> = raw
        .split(['/', '\\'])
        .filter(|p| !p.is_empty() && *p != ".")
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Parent directory of a normalized path, `None` at top level.
pub fn parent_dir(path: &str) -> Option<&str> {
    path.rfind('/').map(|i| &path[..i])
}

/// Last component of a normalized path.
pub fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

impl ArchiveTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a file, registering its ancestor directories
    pub fn insert_file(&mut self, path: &str, data: Vec<u8>) {
        let Some(path) = normalize_entry_path(path) else {
            return;
        };
        self.register_ancestors(&path);
        self.files.insert(path, data);
    }

    pub fn insert_dir(&mut self, path: &str) {
        if let Some(path) = normalize_entry_path(path) {
            self.register_ancestors(&path);
            self.dirs.insert(path);
        }
    }

    fn register_ancestors(&mut self, path: &str) {
        let mut current = parent_dir(path);
        while let Some(dir) = current {
            if !self.dirs.insert(dir.to_string()) {
                break;
            }
            current = parent_dir(dir);
        }
    }

    pub fn file(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    /// Fetch a file that must be present
    pub fn require(&self, path: &str) -> Result<&[u8]> {
        self.file(path)
            .ok_or_else(|| MergeError::MissingFile(path.to_string()))
    }

    pub fn contains_file(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn contains_dir(&self, path: &str) -> bool {
        self.dirs.contains(path)
    }

    pub fn files(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.files.iter().map(|(p, d)| (p.as_str(), d.as_slice()))
    }

    pub fn dirs(&self) -> impl Iterator<Item = &str> {
        self.dirs.iter().map(String::as_str)
    }

    /// Names of the immediate subdirectories of `dir`
    pub fn subdirectories(&self, dir: &str) -> Vec<&str> {
        let prefix = format!("{}/", dir);
        self.dirs
            .range(prefix.clone()..)
            .take_while(|d| d.starts_with(&prefix))
            .map(|d| &d[prefix.len()..])
            .filter(|rest| !rest.contains('/'))
            .collect()
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.dirs.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.files.values().map(|d| d.len() as u64).sum()
    }

    /// Materialize the tree below `root`
    pub fn write_to_dir(&self, root: &Path) -> Result<()> {
        fs::create_dir_all(root)?;
        for dir in &self.dirs {
            fs::create_dir_all(root.join(dir))?;
        }
        for (path, data) in &self.files {
            let dest = root.join(path);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(dest, data)?;
        }
        Ok(())
    }

    /// Read an already-unpacked backup directory
    pub fn load_dir(root: &Path) -> Result<Self> {
        let options = WalkOptions { include_dirs: true };

        let mut tree = Self::new();
        for entry in walk_directory(root, options)? {
            let relative = entry.relative_path.to_string_lossy();
            if entry.is_dir {
                tree.insert_dir(&relative);
            } else {
                tree.insert_file(&relative, fs::read(&entry.path)?);
            }
        }
        Ok(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_normalize_entry_path() {
        assert_eq!(normalize_entry_path("./course/course.xml").as_deref(), Some("course/course.xml"));
        assert_eq!(normalize_entry_path("/moodle_backup.xml").as_deref(), Some("moodle_backup.xml"));
        assert_eq!(normalize_entry_path("sections/section_1/").as_deref(), Some("sections/section_1"));
        assert_eq!(normalize_entry_path("./"), None);
        assert_eq!(normalize_entry_path("/"), None);
    }

    #[test]
    fn test_insert_registers_ancestors() {
        let mut tree = ArchiveTree::new();
        tree.insert_file("activities/forum_1/blocks/html_3/block.xml", b"x".to_vec());

        assert!(tree.contains_dir("activities"));
        assert!(tree.contains_dir("activities/forum_1/blocks"));
        assert!(tree.contains_dir("activities/forum_1/blocks/html_3"));
        assert!(!tree.contains_dir("activities/forum_1/blocks/html_3/block.xml"));
    }

    #[test]
    fn test_subdirectories_are_immediate_only() {
        let mut tree = ArchiveTree::new();
        tree.insert_file("sections/section_1/section.xml", vec![]);
        tree.insert_file("sections/section_10/section.xml", vec![]);
        tree.insert_dir("sections/section_2/nested");
        tree.insert_file("sectionsx/other.xml", vec![]);

        let mut subdirs = tree.subdirectories("sections");
        subdirs.sort();
        assert_eq!(subdirs, vec!["section_1", "section_10", "section_2"]);
    }

    #[test]
    fn test_require_missing_file() {
        let tree = ArchiveTree::new();
        assert!(matches!(tree.require("files.xml"), Err(MergeError::MissingFile(p)) if p == "files.xml"));
    }

    #[test]
    fn test_write_and_load_dir() -> Result<()> {
        let temp_dir = TempDir::new()?;

        let mut tree = ArchiveTree::new();
        tree.insert_file("moodle_backup.xml", b"<moodle_backup/>".to_vec());
        tree.insert_file(".ARCHIVE_INDEX", b"Moodle archive file index. Count: 0\n".to_vec());
        tree.insert_file("course/course.xml", b"<course/>".to_vec());
        tree.insert_dir("files");

        tree.write_to_dir(temp_dir.path())?;
        let loaded = ArchiveTree::load_dir(temp_dir.path())?;

        assert_eq!(loaded, tree);
        assert_eq!(loaded.total_bytes(), tree.total_bytes());
        Ok(())
    }
}
