//! Minimal XML element tree for Diaspora documents.
//!
//! Diaspora payloads are small, flat documents, so a full DOM is not needed.
//! Parsing keeps element order, attributes and text; serialisation is
//! deterministic so signed documents can be reproduced byte for byte.

use quick_xml::escape::{escape, partial_escape};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// XML parsing errors.
#[derive(Debug, thiserror::Error)]
pub enum XmlError {
    #[error("malformed XML: {0}")]
    Malformed(String),
    #[error("document has no root element")]
    NoRoot,
    #[error("expected <{expected}> element, found <{found}>")]
    UnexpectedElement { expected: String, found: String },
}

/// One XML element.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct XmlElement {
    /// Qualified name as written, e.g. `me:env`.
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlElement>,
    /// Concatenated direct text content, unescaped.
    pub text: String,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Element with only text content.
    pub fn text_element(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    pub fn with_child(mut self, child: XmlElement) -> Self {
        self.children.push(child);
        self
    }

    /// Name without namespace prefix.
    pub fn local_name(&self) -> &str {
        self.name
            .split_once(':')
            .map_or(self.name.as_str(), |(_, local)| local)
    }

    /// Namespace URI declared for this element's prefix on the element itself.
    pub fn namespace(&self) -> Option<&str> {
        let declaration = match self.name.split_once(':') {
            Some((prefix, _)) => format!("xmlns:{}", prefix),
            None => "xmlns".to_string(),
        };
        self.attribute(&declaration)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// First child with the given local name.
    pub fn child(&self, local_name: &str) -> Option<&XmlElement> {
        self.children
            .iter()
            .find(|child| child.local_name() == local_name)
    }

    pub fn child_mut(&mut self, local_name: &str) -> Option<&mut XmlElement> {
        self.children
            .iter_mut()
            .find(|child| child.local_name() == local_name)
    }

    /// Text of the first child with the given local name.
    pub fn child_text(&self, local_name: &str) -> Option<&str> {
        self.child(local_name).map(|child| child.text.as_str())
    }

    /// Parse a document and return its root element.
    pub fn parse(input: &str) -> Result<Self, XmlError> {
        let mut reader = Reader::from_str(input);
        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            let event = reader
                .read_event()
                .map_err(|e| XmlError::Malformed(e.to_string()))?;
            match event {
                Event::Start(start) => stack.push(element_from_start(&start)?),
                Event::Empty(start) => {
                    let element = element_from_start(&start)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| XmlError::Malformed("unbalanced end tag".to_string()))?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(text) => {
                    if let Some(current) = stack.last_mut() {
                        let text = text
                            .unescape()
                            .map_err(|e| XmlError::Malformed(e.to_string()))?;
                        current.text.push_str(&text);
                    }
                }
                Event::CData(data) => {
                    if let Some(current) = stack.last_mut() {
                        let data = data.into_inner();
                        let text = std::str::from_utf8(&data)
                            .map_err(|e| XmlError::Malformed(e.to_string()))?;
                        current.text.push_str(text);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(XmlError::Malformed("unclosed element".to_string()));
        }
        root.ok_or(XmlError::NoRoot)
    }

    /// Serialise without an XML declaration.
    pub fn to_xml_string(&self) -> String {
        let mut out = String::new();
        self.write_into(&mut out);
        out
    }

    fn write_into(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attributes {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&escape(value.as_str()));
            out.push('"');
        }
        if self.children.is_empty() && self.text.is_empty() {
            out.push_str("/>");
            return;
        }
        out.push('>');
        if self.children.is_empty() {
            out.push_str(&partial_escape(self.text.as_str()));
        } else {
            for child in &self.children {
                child.write_into(out);
            }
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }
}

fn element_from_start(start: &BytesStart<'_>) -> Result<XmlElement, XmlError> {
    let name = std::str::from_utf8(start.name().as_ref())
        .map_err(|e| XmlError::Malformed(e.to_string()))?
        .to_string();
    let mut element = XmlElement::new(name);
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| XmlError::Malformed(e.to_string()))?;
        let key = std::str::from_utf8(attribute.key.as_ref())
            .map_err(|e| XmlError::Malformed(e.to_string()))?
            .to_string();
        let value = attribute
            .unescape_value()
            .map_err(|e| XmlError::Malformed(e.to_string()))?
            .into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<(), XmlError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
    } else if root.is_none() {
        *root = Some(element);
    } else {
        return Err(XmlError::Malformed("multiple root elements".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested() {
        let doc = XmlElement::parse(
            "<?xml version=\"1.0\"?>\n<status_message>\n  <text>a &amp; b</text>\n  <public>true</public>\n</status_message>",
        )
        .unwrap();
        assert_eq!(doc.name, "status_message");
        assert_eq!(doc.children.len(), 2);
        assert_eq!(doc.child_text("text"), Some("a & b"));
        assert_eq!(doc.child_text("public"), Some("true"));
    }

    #[test]
    fn test_namespace_and_attributes() {
        let doc = XmlElement::parse(
            r#"<me:env xmlns:me="http://salmon-protocol.org/ns/magic-env"><me:sig key_id="abc">xyz</me:sig></me:env>"#,
        )
        .unwrap();
        assert_eq!(doc.local_name(), "env");
        assert_eq!(
            doc.namespace(),
            Some("http://salmon-protocol.org/ns/magic-env")
        );
        let sig = doc.child("sig").unwrap();
        assert_eq!(sig.attribute("key_id"), Some("abc"));
        assert_eq!(sig.text, "xyz");
    }

    #[test]
    fn test_serialise_is_deterministic() {
        let element = XmlElement::new("comment")
            .with_child(XmlElement::text_element("guid", "g"))
            .with_child(XmlElement::text_element("text", "1 < 2 & \"q\""));
        assert_eq!(
            element.to_xml_string(),
            "<comment><guid>g</guid><text>1 &lt; 2 &amp; \"q\"</text></comment>"
        );
        assert_eq!(XmlElement::parse(&element.to_xml_string()).unwrap(), element);
    }

    #[test]
    fn test_malformed_rejected() {
        assert!(XmlElement::parse("<a><b></a>").is_err());
        assert!(XmlElement::parse("<a>").is_err());
        assert!(matches!(XmlElement::parse("just text"), Err(XmlError::NoRoot)));
    }
}
