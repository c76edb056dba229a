//! Minimal element tree over `quick-xml` events.
//!
//! Spans handed to this module are already complete (the extractor has seen
//! the closing delimiter), so any parse failure here means the server sent
//! malformed XML, not that more data is pending.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::mechanism::MechanismSet;
use crate::error::{Result, SaslError};

/// Local name of the elements listing SASL mechanisms.
const MECHANISM_TAG: &str = "mechanism";

/// Generic XML element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlNode {
    /// Qualified name as written (e.g. `stream:features`)
    pub name: String,
    /// Attributes in document order, values unescaped
    pub attributes: Vec<(String, String)>,
    /// Concatenated character data directly inside this element
    pub text: String,
    /// Child elements in document order
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    /// Parse the first root element of `xml`.
    ///
    /// Anything after the root element closes is ignored.
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut stack: Vec<XmlNode> = Vec::new();
        loop {
            match reader.read_event()? {
                Event::Start(start) => stack.push(Self::from_start(&start)?),
                Event::Empty(start) => {
                    let node = Self::from_start(&start)?;
                    if let Some(root) = attach(&mut stack, node) {
                        return Ok(root);
                    }
                },
                Event::End(_) => {
                    let node = stack
                        .pop()
                        .ok_or_else(|| SaslError::Xml("closing tag without opening tag".into()))?;
                    if let Some(root) = attach(&mut stack, node) {
                        return Ok(root);
                    }
                },
                Event::Text(text) => {
                    if let Some(node) = stack.last_mut() {
                        node.text.push_str(&text.unescape()?);
                    }
                },
                Event::CData(data) => {
                    if let Some(node) = stack.last_mut() {
                        node.text.push_str(&String::from_utf8_lossy(&data));
                    }
                },
                Event::Eof => {
                    let reason = if stack.is_empty() {
                        "no root element"
                    } else {
                        "unexpected end of document"
                    };
                    return Err(SaslError::Xml(reason.into()));
                },
                // Declarations, comments, processing instructions
                _ => {},
            }
        }
    }

    /// Parse a byte span, which must be UTF-8.
    pub fn parse_bytes(bytes: &[u8]) -> Result<Self> {
        let xml = std::str::from_utf8(bytes)
            .map_err(|e| SaslError::Xml(format!("span is not UTF-8: {e}")))?;
        Self::parse(xml)
    }

    fn from_start(start: &BytesStart<'_>) -> Result<Self> {
        let mut node = XmlNode {
            name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
            ..Default::default()
        };
        for attr in start.attributes() {
            let attr = attr?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value()?.into_owned();
            node.attributes.push((key, value));
        }
        Ok(node)
    }

    /// Name without namespace prefix
    pub fn local_name(&self) -> &str {
        self.name
            .rsplit_once(':')
            .map_or(self.name.as_str(), |(_, local)| local)
    }

    /// Look up an attribute value by qualified name
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Visit this node and every descendant, parents before children
    pub fn walk<F: FnMut(&XmlNode)>(&self, visit: &mut F) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }

    /// First node (self included) with the given local name
    pub fn find(&self, local_name: &str) -> Option<&XmlNode> {
        if self.local_name() == local_name {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(local_name))
    }
}

fn attach(stack: &mut [XmlNode], node: XmlNode) -> Option<XmlNode> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(node);
            None
        },
        None => Some(node),
    }
}

/// Collect every `<mechanism>` text value found anywhere in `xml`.
pub fn parse_mechanisms(xml: &str) -> Result<MechanismSet> {
    let root = XmlNode::parse(xml)?;
    let mut mechanisms = MechanismSet::new();
    root.walk(&mut |node| {
        if node.local_name() == MECHANISM_TAG && !node.text.is_empty() {
            mechanisms.insert(node.text.clone());
        }
    });
    Ok(mechanisms)
}
