//! Context id propagation.
//!
//! Everything taken over from the primary archive still carries the primary
//! course's context id. The importer needs one consistent id, so every field
//! holding the primary's original id is switched to the target's.

use super::backup_descriptor::CourseIdentity;
use crate::archive::{base_name, parent_dir, ArchiveTree};
use crate::document::XmlDocument;
use crate::utils::{MergeError, Result};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::debug;

pub const BLOCKS_DIR: &str = "blocks";
pub const BLOCK_DOCUMENT: &str = "block.xml";
pub const PARENT_CONTEXT_FIELD: &str = "parentcontextid";

/// Primary id → target id
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextIdMapping {
    pub from: String,
    pub to: String,
}

impl ContextIdMapping {
    pub fn new(primary: &CourseIdentity, target: &CourseIdentity) -> Self {
        Self {
            from: primary.context_id.clone(),
            to: target.context_id.clone(),
        }
    }

    /// Both archives already share the id
    pub fn is_noop(&self) -> bool {
        self.from == self.to
    }

    /// Rewrite every `field` equal to the primary id; returns the count
    pub fn apply(&self, doc: &mut XmlDocument, field: &str) -> usize {
        if self.is_noop() {
            return 0;
        }
        doc.rewrite_field(field, &self.from, &self.to)
    }
}

/// Directories `.../blocks/<name>` containing any of `paths`
pub fn block_dirs<'a>(paths: impl IntoIterator<Item = &'a str>) -> BTreeSet<String> {
    let mut dirs = BTreeSet::new();
    for path in paths {
        let mut current = Some(path);
        while let Some(candidate) = current {
            let parent = parent_dir(candidate);
            if parent.map(base_name) == Some(BLOCKS_DIR) {
                dirs.insert(candidate.to_string());
            }
            current = parent;
        }
    }
    dirs
}

/// Rewrite `parentcontextid` in the block documents inherited from the
/// primary archive.
///
/// `inherited` lists the output paths (files and directories) that came from
/// the primary. Every inherited block directory must contain its
/// `block.xml`; a block document the target replaced is left alone.
/// Returns the edited documents, including ones with nothing to rewrite.
pub fn rewrite_block_context_ids(
    output: &ArchiveTree,
    inherited: &BTreeSet<String>,
    mapping: &ContextIdMapping,
) -> Result<Vec<(XmlDocument, usize)>> {
    let mut documents = Vec::new();

    for dir in block_dirs(inherited.iter().map(String::as_str)) {
        if !output.contains_dir(&dir) {
            continue;
        }
        let doc_path = format!("{}/{}", dir, BLOCK_DOCUMENT);
        let data = output
            .file(&doc_path)
            .ok_or_else(|| MergeError::MissingFile(doc_path.clone()))?;
        if !inherited.contains(&doc_path) {
            debug!("Keeping target block {}", doc_path);
            continue;
        }

        let mut doc = XmlDocument::parse(&doc_path, data)?;
        let rewritten = mapping.apply(&mut doc, PARENT_CONTEXT_FIELD);
        debug!("Block {}: {} parent context ids rewritten", doc_path, rewritten);
        documents.push((doc, rewritten));
    }

    Ok(documents)
}
