//! Minimal XML tree for EWS responses
//!
//! SOAP responses are small enough to load whole. Element and attribute
//! names are stored without their namespace prefix.

use crate::error::{Error, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlNode {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub text: String,
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    /// Parse a document. The returned node is a nameless root whose
    /// children are the document's top-level elements.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Ews`] if the XML is malformed.
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut stack = vec![Self::default()];

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) => stack.push(Self::from_start(e)?),
                Ok(Event::Empty(ref e)) => {
                    let node = Self::from_start(e)?;
                    push_child(&mut stack, node)?;
                }
                Ok(Event::End(_)) => {
                    if stack.len() < 2 {
                        return Err(Error::Ews("Unbalanced XML end tag".into()));
                    }
                    let node = stack.pop().unwrap_or_default();
                    push_child(&mut stack, node)?;
                }
                Ok(Event::Text(ref e)) => {
                    let text = e.unescape().map_err(xml_error)?;
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&text);
                    }
                }
                Ok(Event::CData(e)) => {
                    let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&text);
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(xml_error(e)),
                _ => {}
            }
        }

        match stack.pop() {
            Some(root) if stack.is_empty() => Ok(root),
            _ => Err(Error::Ews("Unclosed XML element".into())),
        }
    }

    fn from_start(e: &BytesStart<'_>) -> Result<Self> {
        let mut attributes = Vec::new();
        for attr in e.attributes() {
            let attr = attr.map_err(|e| Error::Ews(format!("Invalid XML attribute: {e}")))?;
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
            let value = attr.unescape_value().map_err(xml_error)?.into_owned();
            attributes.push((key, value));
        }

        Ok(Self {
            name: String::from_utf8_lossy(e.local_name().as_ref()).into_owned(),
            attributes,
            ..Self::default()
        })
    }

    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// First direct child called `name`.
    #[must_use]
    pub fn child(&self, name: &str) -> Option<&Self> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Text of the direct child called `name`.
    #[must_use]
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(|c| c.text.as_str())
    }

    /// First element called `name` anywhere below this node, depth first.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&Self> {
        self.children
            .iter()
            .find_map(|c| if c.name == name { Some(c) } else { c.find(name) })
    }

    /// Every element called `name` below this node, in document order.
    #[must_use]
    pub fn find_all<'a>(&'a self, name: &str) -> Vec<&'a Self> {
        let mut found = Vec::new();
        self.collect(name, &mut found);
        found
    }

    fn collect<'a>(&'a self, name: &str, found: &mut Vec<&'a Self>) {
        for child in &self.children {
            if child.name == name {
                found.push(child);
            }
            child.collect(name, found);
        }
    }
}

fn push_child(stack: &mut [XmlNode], node: XmlNode) -> Result<()> {
    stack
        .last_mut()
        .map(|parent| parent.children.push(node))
        .ok_or_else(|| Error::Ews("Unbalanced XML".into()))
}

fn xml_error(e: quick_xml::Error) -> Error {
    Error::Ews(format!("Invalid XML: {e}"))
}
