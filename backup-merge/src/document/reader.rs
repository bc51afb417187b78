//! Lossless parsing into an element tree.
//!
//! `Element::parse` drops whitespace-only text, which turns `<fullname> </fullname>`
//! into an empty field. Backup documents are read through this builder
//! instead, so untouched content is written back exactly as it was read.

use std::io::Read;
use xml::reader::{EventReader, ParserConfig, XmlEvent};
use xmltree::{Element, ParseError, XMLNode};

fn parser_config() -> ParserConfig {
    ParserConfig::new()
        .trim_whitespace(false)
        .whitespace_to_characters(true)
        .cdata_to_characters(false)
        .coalesce_characters(true)
        .ignore_comments(false)
}

/// Parse the root element of a document, keeping every text node
pub fn read_element<R: Read>(source: R) -> Result<Element, ParseError> {
    let mut reader = EventReader::new_with_config(source, parser_config());
    loop {
        match reader.next().map_err(ParseError::MalformedXml)? {
            XmlEvent::StartElement {
                name,
                attributes,
                namespace,
            } => {
                let root = start_element(name, attributes, namespace);
                return build(&mut reader, root);
            }
            XmlEvent::EndDocument => return Err(ParseError::CannotParse),
            _ => continue,
        }
    }
}

fn start_element(
    name: xml::name::OwnedName,
    attributes: Vec<xml::attribute::OwnedAttribute>,
    namespace: xml::namespace::Namespace,
) -> Element {
    let mut element = Element::new(&name.local_name);
    element.prefix = name.prefix;
    element.namespace = name.namespace;
    if !namespace.is_essentially_empty() {
        element.namespaces = Some(namespace);
    }
    for attr in attributes {
        element.attributes.insert(attr.name.local_name, attr.value);
    }
    element
}

fn build<R: Read>(reader: &mut EventReader<R>, mut element: Element) -> Result<Element, ParseError> {
    loop {
        match reader.next().map_err(ParseError::MalformedXml)? {
            XmlEvent::EndElement { name } => {
                if name.local_name != element.name {
                    return Err(ParseError::CannotParse);
                }
                return Ok(element);
            }
            XmlEvent::StartElement {
                name,
                attributes,
                namespace,
            } => {
                let child = build(reader, start_element(name, attributes, namespace))?;
                element.children.push(XMLNode::Element(child));
            }
            XmlEvent::Characters(text) | XmlEvent::Whitespace(text) => {
                element.children.push(XMLNode::Text(text))
            }
            XmlEvent::CData(text) => element.children.push(XMLNode::CData(text)),
            XmlEvent::Comment(text) => element.children.push(XMLNode::Comment(text)),
            XmlEvent::ProcessingInstruction { name, data } => {
                element.children.push(XMLNode::ProcessingInstruction(name, data))
            }
            XmlEvent::StartDocument { .. } | XmlEvent::EndDocument => {
                return Err(ParseError::CannotParse)
            }
        }
    }
}
