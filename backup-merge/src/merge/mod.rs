//! The merge engine.
//!
//! Works purely on in-memory trees: the primary and target archives go in,
//! one output tree comes out. The order of the steps matters: both identities
//! are captured before any document is modified, and every edited document
//! is serialized exactly once at the end.

pub mod backup_descriptor;
pub mod context_ids;
pub mod course_format;
pub mod exclusion;
pub mod file_index;
pub mod file_manifest;
pub mod sections;

use crate::archive::index::ArchiveIndex;
use crate::archive::ArchiveTree;
use crate::config::MergeConfig;
use crate::document::writer::DocumentWriter;
use crate::document::XmlDocument;
use crate::utils::Result;
use backup_descriptor::{merge_descriptors, CourseIdentity, DescriptorMergeStats};
use context_ids::{rewrite_block_context_ids, ContextIdMapping};
use course_format::rewrite_course_format;
use exclusion::ExclusionSet;
use file_index::merge_indexes;
use file_manifest::{merge_file_manifests, ManifestMergeStats};
use sections::renumber_sections;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

pub const BACKUP_DESCRIPTOR: &str = "moodle_backup.xml";
pub const FILE_MANIFEST: &str = "files.xml";
pub const ARCHIVE_INDEX: &str = ".ARCHIVE_INDEX";

/// What a merge did, for logging and the run report
#[derive(Debug, Clone, Serialize)]
pub struct MergeStats {
    pub primary: CourseIdentity,
    pub target: CourseIdentity,
    pub course_format: String,
    pub descriptor: DescriptorMergeStats,
    pub manifest: ManifestMergeStats,
    pub files_inherited: usize,
    pub files_excluded: usize,
    pub index_entries: usize,
    pub sections_renumbered: usize,
    pub blocks_inherited: usize,
    pub block_context_ids_rewritten: usize,
    pub output_files: usize,
}

#[derive(Debug)]
pub struct MergeOutcome {
    pub tree: ArchiveTree,
    pub stats: MergeStats,
}

/// Primary entries (minus exclusions) overlaid by every target entry
struct Overlay {
    tree: ArchiveTree,
    /// Output paths, files and directories, that only the primary provides
    inherited: BTreeSet<String>,
    excluded: usize,
}

pub struct MergeEngine {
    course_format: String,
    exclusions: ExclusionSet,
    writer: DocumentWriter,
}

impl MergeEngine {
    pub fn new(config: &MergeConfig) -> Self {
        Self {
            course_format: config.course_format.clone(),
            exclusions: ExclusionSet::from_config(config),
            writer: DocumentWriter::for_import(),
        }
    }

    pub fn merge(&self, primary: &ArchiveTree, target: &ArchiveTree) -> Result<MergeOutcome> {
        let primary_descriptor = parse_required(primary, BACKUP_DESCRIPTOR)?;
        let target_descriptor = parse_required(target, BACKUP_DESCRIPTOR)?;
        let primary_identity = CourseIdentity::capture(&primary_descriptor)?;
        let target_identity = CourseIdentity::capture(&target_descriptor)?;
        let mapping = ContextIdMapping::new(&primary_identity, &target_identity);

        info!(
            "Primary course: context {} ({}), target course: context {} ({})",
            primary_identity.context_id,
            primary_identity.format,
            target_identity.context_id,
            target_identity.format
        );

        let Overlay {
            tree: mut output,
            inherited,
            excluded,
        } = self.overlay(primary, target);
        let files_inherited = inherited.iter().filter(|p| output.contains_file(p)).count();
        info!("Combined trees: {} files inherited from primary, {} excluded", files_inherited, excluded);

        let mut documents: Vec<XmlDocument> = Vec::new();

        info!("Merging {}", BACKUP_DESCRIPTOR);
        let (descriptor, descriptor_stats) =
            merge_descriptors(&primary_descriptor, target_descriptor, &self.course_format)?;
        documents.push(descriptor);

        info!("Merging {}", FILE_MANIFEST);
        let (manifest, manifest_stats) = merge_file_manifests(
            &parse_required(primary, FILE_MANIFEST)?,
            &parse_required(target, FILE_MANIFEST)?,
            &mapping,
        );
        documents.push(manifest);

        info!("Merging {}", ARCHIVE_INDEX);
        let index = merge_indexes(
            &ArchiveIndex::parse_bytes(primary.require(ARCHIVE_INDEX)?)?,
            &ArchiveIndex::parse_bytes(target.require(ARCHIVE_INDEX)?)?,
            &self.exclusions,
        );
        let index_entries = index.len();
        if index.is_empty() {
            warn!("Merged {} lists no entries", ARCHIVE_INDEX);
        }
        output.insert_file(ARCHIVE_INDEX, index.render().into_bytes());

        info!("Renumbering sections");
        let sections = renumber_sections(&output)?;
        let sections_renumbered = sections.len();
        documents.extend(sections);

        info!("Rewriting block context ids");
        let blocks = rewrite_block_context_ids(&output, &inherited, &mapping)?;
        let blocks_inherited = blocks.len();
        let mut block_context_ids_rewritten = 0;
        for (doc, rewritten) in blocks {
            block_context_ids_rewritten += rewritten;
            documents.push(doc);
        }

        info!("Setting course format to {}", self.course_format);
        documents.push(rewrite_course_format(&output, &self.course_format)?);

        for doc in &documents {
            debug!("Writing {}", doc.path());
            output.insert_file(doc.path(), self.writer.write(doc)?);
        }

        let stats = MergeStats {
            primary: primary_identity,
            target: target_identity,
            course_format: self.course_format.clone(),
            descriptor: descriptor_stats,
            manifest: manifest_stats,
            files_inherited,
            files_excluded: excluded,
            index_entries,
            sections_renumbered,
            blocks_inherited,
            block_context_ids_rewritten,
            output_files: output.file_count(),
        };

        Ok(MergeOutcome { tree: output, stats })
    }

    fn overlay(&self, primary: &ArchiveTree, target: &ArchiveTree) -> Overlay {
        let mut tree = ArchiveTree::new();
        let mut inherited = BTreeSet::new();
        let mut excluded = 0;

        for dir in primary.dirs() {
            if self.exclusions.is_excluded_dir(dir) {
                continue;
            }
            tree.insert_dir(dir);
            if !target.contains_dir(dir) {
                inherited.insert(dir.to_string());
            }
        }
        for (path, data) in primary.files() {
            if self.exclusions.is_excluded(path) {
                debug!("Excluding {}", path);
                excluded += 1;
                continue;
            }
            tree.insert_file(path, data.to_vec());
            if !target.contains_file(path) {
                inherited.insert(path.to_string());
            }
        }

        for dir in target.dirs() {
            tree.insert_dir(dir);
        }
        for (path, data) in target.files() {
            tree.insert_file(path, data.to_vec());
        }

        Overlay {
            tree,
            inherited,
            excluded,
        }
    }
}

fn parse_required(tree: &ArchiveTree, path: &str) -> Result<XmlDocument> {
    XmlDocument::parse(path, tree.require(path)?)
}
