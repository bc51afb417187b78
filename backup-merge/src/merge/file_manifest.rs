//! Merging of the two `files.xml` manifests.

use super::context_ids::ContextIdMapping;
use crate::document::{child_elements, XmlDocument};
use serde::Serialize;
use tracing::debug;
use xmltree::XMLNode;

pub const CONTEXT_ID_FIELD: &str = "contextid";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ManifestMergeStats {
    pub primary_records: usize,
    pub target_records: usize,
    pub context_ids_rewritten: usize,
}

/// Primary records followed by target records, with every `contextid` equal
/// to the primary's id switched to the target's
pub fn merge_file_manifests(
    primary: &XmlDocument,
    target: &XmlDocument,
    mapping: &ContextIdMapping,
) -> (XmlDocument, ManifestMergeStats) {
    let mut merged = primary.clone().relocate(target.path());

    let target_records: Vec<XMLNode> = child_elements(target.root())
        .cloned()
        .map(XMLNode::Element)
        .collect();

    let mut stats = ManifestMergeStats {
        primary_records: child_elements(primary.root()).count(),
        target_records: target_records.len(),
        context_ids_rewritten: 0,
    };
    merged.root_mut().children.extend(target_records);
    stats.context_ids_rewritten = mapping.apply(&mut merged, CONTEXT_ID_FIELD);

    debug!(
        "File manifest merge: {} + {} records, {} context ids rewritten",
        stats.primary_records, stats.target_records, stats.context_ids_rewritten
    );
    (merged, stats)
}
