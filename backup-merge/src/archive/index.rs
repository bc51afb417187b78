//! The `.ARCHIVE_INDEX` manifest.
//!
//! First line: `"<description>. Count: <N>"`, then one
//! `filename<TAB>metadata` line per entry. The importer checks the archive
//! against this listing, so the count must match the lines written.

use crate::utils::{MergeError, Result};
use tracing::warn;

pub const DEFAULT_DESCRIPTION: &str = "Moodle archive file index";

const COUNT_MARKER: &str = ". Count: ";

/// One manifest line, split at the first tab
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub filename: String,
    pub metadata: String,
}

impl IndexEntry {
    pub fn new(filename: impl Into<String>, metadata: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            metadata: metadata.into(),
        }
    }

    fn parse(line: &str) -> Self {
        match line.split_once('\t') {
            Some((filename, metadata)) => Self::new(filename, metadata),
            None => Self::new(line, ""),
        }
    }

    /// The line as written, without its newline
    pub fn line(&self) -> String {
        format!("{}\t{}", self.filename, self.metadata)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveIndex {
    pub description: String,
    pub entries: Vec<IndexEntry>,
}

impl ArchiveIndex {
    pub fn new(description: impl Into<String>, entries: Vec<IndexEntry>) -> Self {
        Self {
            description: description.into(),
            entries,
        }
    }

    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = text.lines();
        let header = lines
            .next()
            .filter(|h| !h.trim().is_empty())
            .ok_or_else(|| MergeError::MalformedIndex("missing header line".into()))?;

        let (description, declared) = match header.split_once(COUNT_MARKER) {
            Some((description, count)) => {
                let count = count.trim().parse::<usize>().map_err(|_| {
                    MergeError::MalformedIndex(format!("bad count in header '{}'", header))
                })?;
                (description.to_string(), Some(count))
            }
            None => (header.trim_end_matches('.').to_string(), None),
        };

        let entries: Vec<IndexEntry> = lines
            .filter(|l| !l.is_empty())
            .map(IndexEntry::parse)
            .collect();

        if let Some(declared) = declared {
            if declared != entries.len() {
                warn!(
                    "Index header declares {} entries but lists {}",
                    declared,
                    entries.len()
                );
            }
        }

        Ok(Self::new(description, entries))
    }

    pub fn parse_bytes(data: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(data)
            .map_err(|e| MergeError::MalformedIndex(format!("not UTF-8: {}", e)))?;
        Self::parse(text)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.entries.iter().any(|e| e.filename == filename)
    }

    /// Header plus one line per entry, in the current entry order
    pub fn render(&self) -> String {
        let mut out = format!("{}{}{}\n", self.description, COUNT_MARKER, self.entries.len());
        for entry in &self.entries {
            out.push_str(&entry.line());
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "Moodle archive file index. Count: 3\n\
        course/\td\t0\t?\n\
        course/course.xml\tf\t1024\t1700000000\n\
        moodle_backup.xml\tf\t2048\t1700000000\n";

    #[test]
    fn test_parse_sample() -> Result<()> {
        let index = ArchiveIndex::parse(SAMPLE)?;
        assert_eq!(index.description, DEFAULT_DESCRIPTION);
        assert_eq!(index.len(), 3);
        assert_eq!(index.entries[1].filename, "course/course.xml");
        assert_eq!(index.entries[1].metadata, "f\t1024\t1700000000");
        assert!(index.contains("course/"));
        Ok(())
    }

    #[test]
    fn test_render_restores_text() -> Result<()> {
        let index = ArchiveIndex::parse(SAMPLE)?;
        assert_eq!(index.render(), SAMPLE);
        Ok(())
    }

    #[test]
    fn test_render_recounts() {
        let index = ArchiveIndex::new(
            DEFAULT_DESCRIPTION,
            vec![IndexEntry::new("files.xml", "f\t10\t1")],
        );
        assert!(index.render().starts_with("Moodle archive file index. Count: 1\n"));
    }

    #[test]
    fn test_header_without_count() -> Result<()> {
        let index = ArchiveIndex::parse("Some listing.\nfiles.xml\tf\t1\t1\n")?;
        assert_eq!(index.description, "Some listing");
        assert_eq!(index.len(), 1);
        Ok(())
    }

    #[test]
    fn test_bad_count_is_rejected() {
        let result = ArchiveIndex::parse("Moodle archive file index. Count: many\n");
        assert!(matches!(result, Err(MergeError::MalformedIndex(_))));
    }

    #[test]
    fn test_empty_index_is_rejected() {
        assert!(ArchiveIndex::parse("").is_err());
    }
}
