//! XML document handling
//!
//! An in-memory XML tree built from quick-xml events. The same tree type is
//! used for parsed input documents (schema files, coverage inputs) and for
//! documents assembled by the generators, which are then serialized with a
//! pretty-printing writer.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::path::Path;

use crate::error::{Error, Result};
use crate::namespaces::{strip_prefix, NamespaceContext};

/// XML Element in the document tree
#[derive(Debug, Clone)]
pub struct Element {
    /// Element name as written in the source (possibly prefixed)
    pub name: String,
    /// Namespace URI for generated elements (None = no namespace)
    pub namespace: Option<String>,
    /// Element attributes in document/insertion order
    pub attributes: Vec<(String, String)>,
    /// Text content (if any)
    pub text: Option<String>,
    /// Child elements
    pub children: Vec<Element>,
    /// Namespace declarations appearing on this element
    pub namespaces: NamespaceContext,
}

impl Element {
    /// Create a new element
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            attributes: Vec::new(),
            text: None,
            children: Vec::new(),
            namespaces: NamespaceContext::new(),
        }
    }

    /// Create a new element in a namespace
    pub fn in_namespace(name: impl Into<String>, namespace: Option<String>) -> Self {
        let mut elem = Self::new(name);
        elem.namespace = namespace;
        elem
    }

    /// Get the local name of the element (prefix stripped)
    pub fn local_name(&self) -> &str {
        strip_prefix(&self.name)
    }

    /// Get an attribute value by local name
    pub fn get_attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| strip_prefix(key) == name)
            .map(|(_, value)| value.as_str())
    }

    /// Set an attribute, replacing any existing value with the same key
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        if let Some(entry) = self.attributes.iter_mut().find(|(key, _)| *key == name) {
            entry.1 = value;
        } else {
            self.attributes.push((name, value));
        }
    }

    /// Add a child element
    pub fn add_child(&mut self, child: Element) {
        self.children.push(child);
    }

    /// Set text content
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = Some(text.into());
    }

    /// Find the first child element with the given local name
    pub fn find_child(&self, local_name: &str) -> Option<&Element> {
        self.children.iter().find(|e| e.local_name() == local_name)
    }

    /// Find all child elements with the given local name
    pub fn find_children(&self, local_name: &str) -> Vec<&Element> {
        self.children
            .iter()
            .filter(|e| e.local_name() == local_name)
            .collect()
    }
}

/// XML Document representation
#[derive(Debug, Clone)]
pub struct Document {
    /// Root element of the document
    pub root: Option<Element>,
}

impl Document {
    /// Create a new empty document
    pub fn new() -> Self {
        Self { root: None }
    }

    /// Create a document from a root element
    pub fn with_root(root: Element) -> Self {
        Self { root: Some(root) }
    }

    /// Parse an XML document from a string
    pub fn from_string(xml: &str) -> Result<Self> {
        Self::parse(xml.as_bytes())
    }

    /// Parse an XML document from a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse an XML document from bytes
    pub fn parse(xml: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(xml);
        reader.trim_text(true);

        let mut doc = Document::new();
        let mut element_stack: Vec<Element> = Vec::new();
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    let element = Self::parse_element(&e)?;
                    element_stack.push(element);
                }
                Ok(Event::End(_)) => {
                    if let Some(current) = element_stack.pop() {
                        if let Some(parent) = element_stack.last_mut() {
                            parent.add_child(current);
                        } else {
                            doc.root = Some(current);
                        }
                    }
                }
                Ok(Event::Empty(e)) => {
                    let element = Self::parse_element(&e)?;
                    if let Some(parent) = element_stack.last_mut() {
                        parent.add_child(element);
                    } else {
                        doc.root = Some(element);
                    }
                }
                Ok(Event::Text(e)) => {
                    if let Some(current) = element_stack.last_mut() {
                        let text = e
                            .unescape()
                            .map_err(|e| Error::Xml(format!("Failed to unescape text: {}", e)))?
                            .to_string();
                        if !text.trim().is_empty() {
                            current.set_text(text);
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(Error::Xml(format!(
                        "Error parsing XML at position {}: {}",
                        reader.buffer_position(),
                        e
                    )))
                }
                _ => {} // Ignore comments, processing instructions, etc.
            }
            buf.clear();
        }

        if doc.root.is_none() {
            return Err(Error::Xml("Document has no root element".to_string()));
        }

        Ok(doc)
    }

    /// Parse element from BytesStart event
    fn parse_element(start: &BytesStart) -> Result<Element> {
        let name_bytes = start.name();
        let name = std::str::from_utf8(name_bytes.as_ref())
            .map_err(|e| Error::Xml(format!("Invalid element name: {}", e)))?
            .to_string();

        let mut element = Element::new(name);

        for attr_result in start.attributes() {
            let attr = attr_result
                .map_err(|e| Error::Xml(format!("Failed to parse attribute: {}", e)))?;

            let attr_name = std::str::from_utf8(attr.key.as_ref())
                .map_err(|e| Error::Xml(format!("Invalid attribute name: {}", e)))?;

            let attr_value = attr
                .unescape_value()
                .map_err(|e| Error::Xml(format!("Failed to unescape attribute value: {}", e)))?
                .to_string();

            // Namespace declarations are tracked separately from attributes
            if attr_name == "xmlns" {
                element.namespaces.set_default_namespace(&attr_value);
            } else if let Some(prefix) = attr_name.strip_prefix("xmlns:") {
                element.namespaces.add_prefix(prefix, &attr_value);
            } else {
                element.attributes.push((attr_name.to_string(), attr_value));
            }
        }

        Ok(element)
    }

    /// Get the root element
    pub fn root(&self) -> Option<&Element> {
        self.root.as_ref()
    }

    /// Serialize to a pretty-printed UTF-8 XML string with declaration
    pub fn to_pretty_string(&self) -> Result<String> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(|e| Error::Xml(format!("Failed to write XML declaration: {}", e)))?;

        if let Some(ref root) = self.root {
            write_element(&mut writer, root, None)?;
        }

        let bytes = writer.into_inner();
        String::from_utf8(bytes).map_err(|e| Error::Xml(format!("Invalid UTF-8 output: {}", e)))
    }

    /// Serialize and write to a file
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut content = self.to_pretty_string()?;
        content.push('\n');
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

/// Recursively write an element, emitting xmlns when the default namespace
/// changes relative to the enclosing scope
fn write_element(
    writer: &mut Writer<Vec<u8>>,
    elem: &Element,
    inherited_ns: Option<&str>,
) -> Result<()> {
    let mut start = BytesStart::new(elem.name.clone());

    let effective_ns = elem.namespace.as_deref().or(inherited_ns);
    if elem.namespace.as_deref() != inherited_ns {
        match elem.namespace.as_deref() {
            Some(ns) => start.push_attribute(("xmlns", ns)),
            None => {
                if inherited_ns.is_some() {
                    start.push_attribute(("xmlns", ""));
                }
            }
        }
    }

    for (prefix, uri) in elem.namespaces.iter_prefixes() {
        start.push_attribute((format!("xmlns:{}", prefix).as_str(), uri));
    }

    for (key, value) in &elem.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if elem.text.is_none() && elem.children.is_empty() {
        writer
            .write_event(Event::Empty(start))
            .map_err(|e| Error::Xml(format!("Failed to write element: {}", e)))?;
        return Ok(());
    }

    writer
        .write_event(Event::Start(start))
        .map_err(|e| Error::Xml(format!("Failed to write element: {}", e)))?;

    if let Some(ref text) = elem.text {
        writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(|e| Error::Xml(format!("Failed to write text: {}", e)))?;
    }

    for child in &elem.children {
        write_element(writer, child, effective_ns)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new(elem.name.clone())))
        .map_err(|e| Error::Xml(format!("Failed to write end tag: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_xml() {
        let xml = r#"<root><child>text</child></root>"#;
        let doc = Document::from_string(xml).unwrap();

        let root = doc.root.unwrap();
        assert_eq!(root.local_name(), "root");
        assert_eq!(root.children.len(), 1);
        assert_eq!(root.children[0].local_name(), "child");
        assert_eq!(root.children[0].text.as_deref(), Some("text"));
    }

    #[test]
    fn test_parse_with_attributes() {
        let xml = r#"<root attr1="value1" attr2="value2"><child/></root>"#;
        let doc = Document::from_string(xml).unwrap();

        let root = doc.root.unwrap();
        assert_eq!(root.get_attribute("attr1"), Some("value1"));
        assert_eq!(root.get_attribute("attr2"), Some("value2"));
        assert_eq!(root.attributes.len(), 2);
    }

    #[test]
    fn test_parse_with_namespaces() {
        let xml = r#"<root xmlns="http://example.com" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"/>"#;
        let doc = Document::from_string(xml).unwrap();

        let root = doc.root.unwrap();
        assert_eq!(
            root.namespaces.get_default_namespace(),
            Some("http://example.com")
        );
        assert_eq!(
            root.namespaces.get_namespace("xsi"),
            Some("http://www.w3.org/2001/XMLSchema-instance")
        );
    }

    #[test]
    fn test_parse_prefixed_names() {
        let xml = r#"<my:root xmlns:my="http://example.com"><my:child id="1"/></my:root>"#;
        let doc = Document::from_string(xml).unwrap();

        let root = doc.root.unwrap();
        assert_eq!(root.name, "my:root");
        assert_eq!(root.local_name(), "root");
        assert_eq!(root.children[0].local_name(), "child");
    }

    #[test]
    fn test_parse_malformed() {
        assert!(Document::from_string("<root><unclosed></root>").is_err());
        assert!(Document::from_string("not xml at all").is_err());
    }

    #[test]
    fn test_pretty_print() {
        let mut root = Element::in_namespace("Order", Some("http://example.com".to_string()));
        root.set_attribute("id", "1");
        let mut item = Element::in_namespace("Item", Some("http://example.com".to_string()));
        item.set_text("widget");
        root.add_child(item);

        let doc = Document::with_root(root);
        let output = doc.to_pretty_string().unwrap();

        assert!(output.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(output.contains("<Order xmlns=\"http://example.com\" id=\"1\">"));
        assert!(output.contains("<Item>widget</Item>"));
        assert!(output.contains("</Order>"));
    }

    #[test]
    fn test_pretty_print_empty_element() {
        let doc = Document::with_root(Element::new("Empty"));
        let output = doc.to_pretty_string().unwrap();
        assert!(output.contains("<Empty/>"));
    }

    #[test]
    fn test_roundtrip() {
        let mut root = Element::new("A");
        let mut b = Element::new("B");
        b.set_text("value & <escaped>");
        root.add_child(b);

        let doc = Document::with_root(root);
        let output = doc.to_pretty_string().unwrap();
        let parsed = Document::from_string(&output).unwrap();

        let b = parsed.root.unwrap().children[0].clone();
        assert_eq!(b.text.as_deref(), Some("value & <escaped>"));
    }

    #[test]
    fn test_namespace_switch_in_output() {
        let mut root = Element::in_namespace("Root", Some("http://a".to_string()));
        let child = Element::in_namespace("Child", Some("http://b".to_string()));
        root.add_child(child);

        let doc = Document::with_root(root);
        let output = doc.to_pretty_string().unwrap();
        assert!(output.contains("<Root xmlns=\"http://a\">"));
        assert!(output.contains("<Child xmlns=\"http://b\"/>"));
    }
}
