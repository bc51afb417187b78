//! Section renumbering.
//!
//! Both archives number their sections from 0, so after the merge the
//! `number` fields collide and the importer folds sections together. Each
//! `sections/<dir>/section.xml` gets a fresh number from a single counter.

use crate::archive::ArchiveTree;
use crate::document::XmlDocument;
use crate::utils::{MergeError, Result};
use tracing::debug;

pub const SECTIONS_DIR: &str = "sections";
pub const SECTION_DOCUMENT: &str = "section.xml";
pub const NUMBER_FIELD: &str = "number";

/// Sort directory names by length, then lexicographically.
///
/// For `section_<id>` names this is numeric order without parsing the id.
pub fn sort_section_dirs(dirs: &mut [&str]) {
    dirs.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
}

/// Number every section document of `output` 0, 1, 2, … in directory order
pub fn renumber_sections(output: &ArchiveTree) -> Result<Vec<XmlDocument>> {
    let mut dirs = output.subdirectories(SECTIONS_DIR);
    sort_section_dirs(&mut dirs);

    let mut documents = Vec::with_capacity(dirs.len());
    for (number, dir) in dirs.into_iter().enumerate() {
        let path = format!("{}/{}/{}", SECTIONS_DIR, dir, SECTION_DOCUMENT);
        let data = output
            .file(&path)
            .ok_or_else(|| MergeError::MissingFile(path.clone()))?;

        let mut doc = XmlDocument::parse(&path, data)?;
        doc.set_text(NUMBER_FIELD, &number.to_string())?;
        debug!("{} -> number {}", dir, number);
        documents.push(doc);
    }

    Ok(documents)
}
