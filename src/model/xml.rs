//! Owned XML element tree for spec documents.
//!
//! Spec payloads are small (one logical spec per document), so the tree is
//! fully materialized rather than streamed. Element and attribute names are
//! matched ASCII-case-insensitively throughout: the upstream conversion layer
//! is not consistent about casing.

use log::trace;
use quick_xml::Reader;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum XmlTreeError {
    #[error("malformed XML: {0}")]
    Malformed(#[from] quick_xml::Error),

    #[error("invalid attribute: {0}")]
    Attr(String),

    #[error("document has no root element")]
    NoRoot,

    #[error("unexpected element close")]
    UnbalancedClose,

    #[error("missing end tag for `{0}`")]
    MissingEndTag(String),

    #[error("content after the root element")]
    TrailingContent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlAttribute {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<XmlAttribute>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// First matching attribute value, matched case-insensitively.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
            .map(|a| a.value.as_str())
    }

    /// First non-blank value among `candidates`, tried in order.
    pub fn first_attr(&self, candidates: &[&str]) -> Option<&str> {
        candidates
            .iter()
            .filter_map(|name| self.attr(name))
            .map(str::trim)
            .find(|value| !value.is_empty())
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(el) => Some(el),
            XmlNode::Text(_) => None,
        })
    }

    pub fn first_child_element(&self) -> Option<&XmlElement> {
        self.child_elements().next()
    }

    pub fn find_child(&self, name: &str) -> Option<&XmlElement> {
        self.child_elements().find(|el| el.is_named(name))
    }

    /// All element descendants in document order, not including `self`.
    pub fn descendant_elements(&self) -> Vec<&XmlElement> {
        let mut out = Vec::new();
        collect_descendants(self, &mut out);
        out
    }

    /// Concatenated direct text content, trimmed.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for node in &self.children {
            if let XmlNode::Text(text) = node {
                out.push_str(text);
            }
        }
        out.trim().to_string()
    }
}

fn collect_descendants<'a>(element: &'a XmlElement, out: &mut Vec<&'a XmlElement>) {
    for child in element.child_elements() {
        out.push(child);
        collect_descendants(child, out);
    }
}

/// Parses a (normalized) spec payload into an owned element tree.
///
/// The document must have exactly one root element; declarations, comments,
/// processing instructions and doctypes are skipped.
pub fn parse_xml_document(payload: &str) -> Result<XmlElement, XmlTreeError> {
    let mut reader = Reader::from_str(payload);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        match reader.read_event().map_err(XmlTreeError::Malformed)? {
            Event::Start(start) => {
                stack.push(element_from_start(&start)?);
            }
            Event::Empty(start) => {
                let element = element_from_start(&start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack.pop().ok_or(XmlTreeError::UnbalancedClose)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(text) => {
                let raw = String::from_utf8_lossy(text.as_ref()).into_owned();
                let value = match unescape(&raw) {
                    Ok(unescaped) => unescaped.into_owned(),
                    // Keep the raw text; faithfulness over strictness.
                    Err(_) => raw,
                };
                if let Some(top) = stack.last_mut() {
                    if !value.is_empty() {
                        top.children.push(XmlNode::Text(value));
                    }
                } else if !value.trim().is_empty() {
                    trace!("dropping text outside of any element: {value:?}");
                }
            }
            Event::CData(cdata) => {
                let value = String::from_utf8_lossy(cdata.as_ref()).into_owned();
                if let Some(top) = stack.last_mut() {
                    top.children.push(XmlNode::Text(value));
                }
            }
            Event::Eof => break,
            // Decl / Comment / PI / DocType carry nothing a spec tree needs.
            _ => {}
        }
    }

    if let Some(unclosed) = stack.last() {
        // quick-xml reports unclosed tags at EOF itself in most configurations,
        // but an explicit check keeps the contract obvious.
        return Err(XmlTreeError::MissingEndTag(unclosed.name.clone()));
    }

    root.ok_or(XmlTreeError::NoRoot)
}

fn element_from_start(start: &BytesStart<'_>) -> Result<XmlElement, XmlTreeError> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();

    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| XmlTreeError::Attr(e.to_string()))?;
        let raw = String::from_utf8_lossy(&attr.value).into_owned();
        let value = match unescape(&raw) {
            Ok(unescaped) => unescaped.into_owned(),
            Err(_) => raw,
        };
        attributes.push(XmlAttribute {
            name: String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
            value,
        });
    }

    Ok(XmlElement {
        name,
        attributes,
        children: Vec::new(),
    })
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<(), XmlTreeError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(XmlNode::Element(element));
        Ok(())
    } else if root.is_none() {
        *root = Some(element);
        Ok(())
    } else {
        Err(XmlTreeError::TrailingContent)
    }
}
