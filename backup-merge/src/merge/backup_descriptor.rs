//! Merging of the two `moodle_backup.xml` descriptors.
//!
//! The target descriptor is the base. Primary activities and sections go in
//! front of the target's, primary settings below course level are appended,
//! and the course format is forced.

use crate::document::{child_elements, child_text, XmlDocument};
use crate::utils::{MergeError, Result};
use serde::Serialize;
use tracing::debug;
use xmltree::XMLNode;

pub const ACTIVITIES: &str = "information/contents/activities";
pub const SECTIONS: &str = "information/contents/sections";
pub const SETTINGS: &str = "information/settings";
pub const CONTEXT_ID: &str = "information/original_course_contextid";
pub const COURSE_FORMAT: &str = "information/original_course_format";

const ROOT_LEVEL: &str = "root";

/// Identity fields of one archive, read before anything is modified
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourseIdentity {
    pub context_id: String,
    pub format: String,
}

impl CourseIdentity {
    pub fn capture(descriptor: &XmlDocument) -> Result<Self> {
        Ok(Self {
            context_id: descriptor.text(CONTEXT_ID)?,
            format: descriptor.text(COURSE_FORMAT)?,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DescriptorMergeStats {
    pub activities: usize,
    pub sections: usize,
    pub settings: usize,
    pub root_settings_skipped: usize,
}

/// Merge `primary` into `target`, returning the merged descriptor
pub fn merge_descriptors(
    primary: &XmlDocument,
    mut target: XmlDocument,
    course_format: &str,
) -> Result<(XmlDocument, DescriptorMergeStats)> {
    let mut stats = DescriptorMergeStats::default();

    stats.activities = prepend_children(primary, &mut target, ACTIVITIES)?;
    stats.sections = prepend_children(primary, &mut target, SECTIONS)?;

    let mut carried = Vec::new();
    for setting in child_elements(primary.find(SETTINGS)?) {
        let level = child_text(setting, "level")
            .ok_or_else(|| MergeError::missing_element(primary.path(), "level"))?;
        if level == ROOT_LEVEL {
            stats.root_settings_skipped += 1;
        } else {
            carried.push(XMLNode::Element(setting.clone()));
        }
    }
    stats.settings = carried.len();
    target.find_mut(SETTINGS)?.children.extend(carried);

    target.set_text(COURSE_FORMAT, course_format)?;

    debug!(
        "Descriptor merge: {} activities, {} sections, {} settings ({} root settings kept from target)",
        stats.activities, stats.sections, stats.settings, stats.root_settings_skipped
    );
    Ok((target, stats))
}

/// Insert the element children of `path` in `primary` before those of the
/// same container in `target`, keeping their relative order
fn prepend_children(primary: &XmlDocument, target: &mut XmlDocument, path: &str) -> Result<usize> {
    let mut nodes: Vec<XMLNode> = child_elements(primary.find(path)?)
        .cloned()
        .map(XMLNode::Element)
        .collect();
    let count = nodes.len();

    let container = target.find_mut(path)?;
    nodes.append(&mut container.children);
    container.children = nodes;
    Ok(count)
}
