//! XML documents of a course backup.
//!
//! Documents are parsed into an element tree once, edited in memory, and
//! written back through a single [`writer::DocumentWriter`].

pub mod reader;
pub mod writer;

use crate::utils::{MergeError, Result};
use xmltree::{Element, XMLNode};

/// A parsed document together with its path inside the archive
#[derive(Debug, Clone)]
pub struct XmlDocument {
    path: String,
    root: Element,
}

impl XmlDocument {
    pub fn parse(path: &str, data: &[u8]) -> Result<Self> {
        let root = reader::read_element(data).map_err(|source| MergeError::MalformedDocument {
            path: path.to_string(),
            source,
        })?;
        Ok(Self {
            path: path.to_string(),
            root,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Store the document under another archive path
    pub fn relocate(mut self, path: &str) -> Self {
        self.path = path.to_string();
        self
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Element {
        &mut self.root
    }

    /// Element at a `/`-separated path below the root
    pub fn find(&self, path: &str) -> Result<&Element> {
        let mut current = &self.root;
        for name in path.split('/') {
            current = current
                .get_child(name)
                .ok_or_else(|| MergeError::missing_element(&self.path, name))?;
        }
        Ok(current)
    }

    pub fn find_mut(&mut self, path: &str) -> Result<&mut Element> {
        let mut current = &mut self.root;
        for name in path.split('/') {
            current = current
                .get_mut_child(name)
                .ok_or_else(|| MergeError::missing_element(&self.path, name))?;
        }
        Ok(current)
    }

    /// Text of a required scalar field
    pub fn text(&self, path: &str) -> Result<String> {
        Ok(element_text(self.find(path)?))
    }

    /// Replace the text of a required scalar field
    pub fn set_text(&mut self, path: &str, value: &str) -> Result<()> {
        set_element_text(self.find_mut(path)?, value);
        Ok(())
    }

    /// See [`rewrite_field_values`]
    pub fn rewrite_field(&mut self, field: &str, from: &str, to: &str) -> usize {
        rewrite_field_values(&mut self.root, field, from, to)
    }

    /// Collect the values of every element named `field`
    pub fn field_values(&self, field: &str) -> Vec<String> {
        let mut values = Vec::new();
        collect_field_values(&self.root, field, &mut values);
        values
    }
}

/// Child elements, skipping text, comments and processing instructions
pub fn child_elements(element: &Element) -> impl Iterator<Item = &Element> {
    element.children.iter().filter_map(XMLNode::as_element)
}

pub fn element_text(element: &Element) -> String {
    element.get_text().map(|t| t.into_owned()).unwrap_or_default()
}

pub fn set_element_text(element: &mut Element, value: &str) {
    element.children = vec![XMLNode::Text(value.to_string())];
}

/// Text of a direct child element, if present
pub fn child_text(element: &Element, name: &str) -> Option<String> {
    element.get_child(name).map(element_text)
}

/// Replace the text of every element named `field` anywhere below `element`
/// whose value is exactly `from`. Returns the number of fields rewritten.
pub fn rewrite_field_values(element: &mut Element, field: &str, from: &str, to: &str) -> usize {
    let mut rewritten = 0;
    if element.name == field && element_text(element) == from {
        set_element_text(element, to);
        rewritten += 1;
    }
    for child in element.children.iter_mut() {
        if let XMLNode::Element(child) = child {
            rewritten += rewrite_field_values(child, field, from, to);
        }
    }
    rewritten
}

fn collect_field_values(element: &Element, field: &str, values: &mut Vec<String>) {
    if element.name == field {
        values.push(element_text(element));
    }
    for child in child_elements(element) {
        collect_field_values(child, field, values);
    }
}
