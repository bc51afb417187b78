//! Merging of the two `.ARCHIVE_INDEX` listings.

use super::exclusion::ExclusionSet;
use crate::archive::index::{ArchiveIndex, IndexEntry};
use std::collections::HashSet;
use tracing::debug;

/// Every target entry, plus each primary entry whose filename the target does
/// not list and no exclusion rule matches. Entries are sorted by their raw
/// line; the description comes from the target.
pub fn merge_indexes(
    primary: &ArchiveIndex,
    target: &ArchiveIndex,
    exclusions: &ExclusionSet,
) -> ArchiveIndex {
    let target_names: HashSet<&str> = target.entries.iter().map(|e| e.filename.as_str()).collect();

    let mut entries: Vec<IndexEntry> = target.entries.clone();
    let mut excluded = 0usize;
    for entry in &primary.entries {
        if target_names.contains(entry.filename.as_str()) {
            continue;
        }
        if exclusions.is_excluded(&entry.filename) {
            excluded += 1;
            continue;
        }
        entries.push(entry.clone());
    }

    entries.sort_by_cached_key(IndexEntry::line);

    debug!(
        "Index merge: {} target + {} primary entries ({} excluded)",
        target.len(),
        entries.len() - target.len(),
        excluded
    );

    ArchiveIndex::new(target.description.clone(), entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::index::DEFAULT_DESCRIPTION;
    use crate::merge::exclusion::ExclusionRule;

    fn index(lines: &[(&str, &str)]) -> ArchiveIndex {
        ArchiveIndex::new(
            DEFAULT_DESCRIPTION,
            lines.iter().map(|(f, m)| IndexEntry::new(*f, *m)).collect(),
        )
    }

    fn names(index: &ArchiveIndex) -> Vec<&str> {
        index.entries.iter().map(|e| e.filename.as_str()).collect()
    }

    #[test]
    fn test_union_with_target_precedence() {
        let primary = index(&[("files.xml", "f\t10\t1"), ("activities/forum_1/", "d\t0\t?")]);
        let target = index(&[("files.xml", "f\t99\t2"), ("moodle_backup.xml", "f\t5\t2")]);

        let merged = merge_indexes(&primary, &target, &ExclusionSet::default());

        assert_eq!(names(&merged), vec!["activities/forum_1/", "files.xml", "moodle_backup.xml"]);
        let files = merged.entries.iter().find(|e| e.filename == "files.xml").unwrap();
        assert_eq!(files.metadata, "f\t99\t2");
    }

    #[test]
    fn test_exclusion_only_hits_bare_names() {
        let primary = index(&[("users.xml", "f\t1\t1"), ("course/users.xml", "f\t1\t1")]);
        let target = index(&[]);
        let exclusions = ExclusionSet::new(vec![ExclusionRule::TopLevelName("users.xml".into())]);

        let merged = merge_indexes(&primary, &target, &exclusions);

        assert_eq!(names(&merged), vec!["course/users.xml"]);
    }

    #[test]
    fn test_target_entries_are_never_excluded() {
        let primary = index(&[]);
        let target = index(&[("users.xml", "f\t1\t1")]);
        let exclusions = ExclusionSet::new(vec![ExclusionRule::TopLevelName("users.xml".into())]);

        let merged = merge_indexes(&primary, &target, &exclusions);

        assert_eq!(names(&merged), vec!["users.xml"]);
    }

    #[test]
    fn test_prefix_exclusion_applies_to_index() {
        let primary = index(&[
            ("course/blocks/", "d\t0\t?"),
            ("course/blocks/html_1/block.xml", "f\t1\t1"),
            ("course/course.xml", "f\t1\t1"),
        ]);
        let target = index(&[]);
        let exclusions = ExclusionSet::new(vec![ExclusionRule::PathPrefix("course/blocks/".into())]);

        let merged = merge_indexes(&primary, &target, &exclusions);

        assert_eq!(names(&merged), vec!["course/course.xml"]);
    }

    #[test]
    fn test_header_count_matches_written_lines() {
        let primary = index(&[("a.xml", "f\t1\t1"), ("b.xml", "f\t1\t1")]);
        let target = index(&[("b.xml", "f\t2\t2"), ("c.xml", "f\t1\t1")]);

        let rendered = merge_indexes(&primary, &target, &ExclusionSet::default()).render();
        let mut lines = rendered.lines();

        assert_eq!(lines.next(), Some("Moodle archive file index. Count: 3"));
        assert_eq!(lines.count(), 3);
    }

    #[test]
    fn test_sorted_by_raw_line() {
        let primary = index(&[("sections/section_10/", "d\t0\t?"), ("sections/section_1/", "d\t0\t?")]);
        let target = index(&[("sections/", "d\t0\t?"), (".ARCHIVE_INDEX", "f\t0\t1")]);

        let merged = merge_indexes(&primary, &target, &ExclusionSet::default());

        assert_eq!(
            names(&merged),
            vec![".ARCHIVE_INDEX", "sections/", "sections/section_1/", "sections/section_10/"]
        );
    }
}
