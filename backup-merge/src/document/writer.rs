//! Serialization of edited documents.
//!
//! The importer rejects any XML prolog other than
//! `<?xml version="1.0" encoding="UTF-8"?>` (the spelling is case sensitive),
//! so every document goes through the same writer and its post-processing
//! rules before it is stored in the output tree.

use super::XmlDocument;
use crate::utils::{MergeError, Result};
use xmltree::EmitterConfig;

pub const IMPORT_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// A textual fix-up applied to every serialized document
pub trait PostProcess {
    fn name(&self) -> &'static str;

    fn apply(&self, text: String) -> String;
}

/// Replaces whatever declaration the serializer produced with
/// [`IMPORT_DECLARATION`] on its own first line
#[derive(Debug, Clone, Copy, Default)]
pub struct UppercaseEncodingDeclaration;

impl PostProcess for UppercaseEncodingDeclaration {
    fn name(&self) -> &'static str {
        "uppercase-encoding-declaration"
    }

    fn apply(&self, text: String) -> String {
        let body = match text.strip_prefix("<?xml") {
            Some(rest) => match rest.find("?>") {
                Some(end) => &rest[end + 2..],
                None => text.as_str(),
            },
            None => text.as_str(),
        };
        format!("{}\n{}", IMPORT_DECLARATION, body.trim_start_matches(['\r', '\n']))
    }
}

/// Serializes documents without reformatting: the text nodes read by
/// [`super::reader`] carry the original layout.
pub struct DocumentWriter {
    rules: Vec<Box<dyn PostProcess>>,
}

impl DocumentWriter {
    /// Writer without post-processing
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Writer producing documents the importer accepts
    pub fn for_import() -> Self {
        Self::new().with_rule(UppercaseEncodingDeclaration)
    }

    pub fn with_rule(mut self, rule: impl PostProcess + 'static) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    pub fn write(&self, doc: &XmlDocument) -> Result<Vec<u8>> {
        let config = EmitterConfig::new()
            .perform_indent(false)
            .normalize_empty_elements(false)
            .autopad_comments(false);

        let mut buf = Vec::new();
        doc.root()
            .write_with_config(&mut buf, config)
            .map_err(|source| MergeError::Serialize {
                path: doc.path().to_string(),
                source,
            })?;

        let mut text = String::from_utf8_lossy(&buf).into_owned();
        for rule in &self.rules {
            text = rule.apply(text);
        }
        Ok(text.into_bytes())
    }
}

impl Default for DocumentWriter {
    fn default() -> Self {
        Self::for_import()
    }
}
