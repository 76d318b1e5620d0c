//! Minimal XML element tree for SOAP responses.
//!
//! Responses are small, so they are read fully into an owned tree and
//! queried by local name. Namespace prefixes are dropped.

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::{Error, Result};

/// An XML element with its text content and child elements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlNode {
    /// Local name (no prefix)
    pub name: String,
    /// Concatenated, unescaped text and CDATA content
    pub text: String,
    /// Child elements in document order
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    /// Parses a document and returns its root element.
    pub fn parse(input: &str) -> Result<XmlNode> {
        let mut reader = Reader::from_str(input);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<XmlNode> = Vec::new();
        let mut root: Option<XmlNode> = None;

        loop {
            let event = reader.read_event().map_err(|e| {
                Error::xml(format!("at position {}: {e}", reader.buffer_position()))
            })?;
            match event {
                Event::Start(e) => {
                    stack.push(XmlNode {
                        name: local_name(e.local_name().as_ref()),
                        ..XmlNode::default()
                    });
                }
                Event::Empty(e) => {
                    let node = XmlNode {
                        name: local_name(e.local_name().as_ref()),
                        ..XmlNode::default()
                    };
                    attach(&mut stack, &mut root, node)?;
                }
                Event::End(_) => {
                    let node = stack
                        .pop()
                        .ok_or_else(|| Error::xml("unbalanced closing tag"))?;
                    attach(&mut stack, &mut root, node)?;
                }
                Event::Text(t) => {
                    let text = t.unescape().map_err(|e| Error::xml(e.to_string()))?;
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&text);
                    }
                }
                Event::CData(c) => {
                    let raw = c.into_inner();
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&String::from_utf8_lossy(&raw));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(Error::xml(format!(
                "unexpected end of document inside <{}>",
                stack.last().map(|n| n.name.as_str()).unwrap_or_default()
            )));
        }
        root.ok_or_else(|| Error::xml("document has no root element"))
    }

    /// First direct child with the given local name.
    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// All direct children with the given local name.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// First descendant (depth-first, self included) with the given name.
    pub fn find(&self, name: &str) -> Option<&XmlNode> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(name))
    }

    /// Trimmed text of the first direct child named `name`.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(|c| c.text.trim())
    }

    /// Like [`child_text`](Self::child_text) but fails with
    /// [`Error::MissingField`] when the child is absent or empty.
    pub fn require_text(&self, name: &str) -> Result<&str> {
        match self.child_text(name) {
            Some(text) if !text.is_empty() => Ok(text),
            _ => Err(Error::missing_field(format!("{}/{name}", self.name))),
        }
    }

    /// Parses the text of a required child.
    pub fn parse_child<T: std::str::FromStr>(&self, name: &str) -> Result<T> {
        let text = self.require_text(name)?;
        text.parse().map_err(|_| {
            Error::xml(format!("{}/{name}: unexpected value '{text}'", self.name))
        })
    }
}

fn local_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

fn attach(stack: &mut [XmlNode], root: &mut Option<XmlNode>, node: XmlNode) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None if root.is_none() => *root = Some(node),
        None => return Err(Error::xml("multiple root elements")),
    }
    Ok(())
}
