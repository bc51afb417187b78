//! Course format override for `course/course.xml`.

use crate::archive::ArchiveTree;
use crate::document::XmlDocument;
use crate::utils::Result;

pub const COURSE_DOCUMENT: &str = "course/course.xml";
pub const FORMAT_FIELD: &str = "format";

/// Parse the output's course descriptor and force its format
pub fn rewrite_course_format(output: &ArchiveTree, course_format: &str) -> Result<XmlDocument> {
    let mut doc = XmlDocument::parse(COURSE_DOCUMENT, output.require(COURSE_DOCUMENT)?)?;
    doc.set_text(FORMAT_FIELD, course_format)?;
    Ok(doc)
}
