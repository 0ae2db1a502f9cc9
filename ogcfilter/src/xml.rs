//! Minimal XML element tree for filter documents.
//!
//! Namespace prefixes are removed from every element and attribute name while
//! reading, so `ogc:PropertyName` and `fes:PropertyName` both become `PropertyName`.

use crate::error::ParseError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

/// Parses `text` and returns its top-level elements.
pub fn parse_document(text: &str) -> Result<Vec<Element>, ParseError> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut roots = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Start(start) => stack.push(Element::from_start(&start)?),
            Event::Empty(start) => {
                let element = Element::from_start(&start)?;
                attach(&mut stack, &mut roots, element);
            }
            Event::End(_) => {
                let element = stack.pop().ok_or_else(|| ParseError::Xml("unbalanced end tag".to_string()))?;
                attach(&mut stack, &mut roots, element);
            }
            Event::Text(text) => {
                let value = text.unescape()?;
                push_text(&mut stack, &value);
            }
            Event::CData(data) => {
                let bytes = data.into_inner();
                push_text(&mut stack, &String::from_utf8_lossy(&bytes));
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(ParseError::Xml(format!("element <{}> is not closed", open.name)));
    }
    Ok(roots)
}

fn attach(stack: &mut [Element], roots: &mut Vec<Element>, element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(Node::Element(element)),
        None => roots.push(element),
    }
}

fn push_text(stack: &mut [Element], value: &str) {
    if value.is_empty() {
        return;
    }
    if let Some(parent) = stack.last_mut() {
        // adjacent text and CDATA runs form a single value
        if let Some(Node::Text(previous)) = parent.children.last_mut() {
            previous.push_str(value);
        } else {
            parent.children.push(Node::Text(value.to_string()));
        }
    }
}

impl Element {
    fn from_start(start: &BytesStart) -> Result<Self, ParseError> {
        let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        for attribute in start.attributes() {
            let attribute = attribute?;
            if attribute.key.as_namespace_binding().is_some() {
                continue;
            }
            let key = String::from_utf8_lossy(attribute.key.local_name().as_ref()).into_owned();
            let value = attribute.unescape_value()?.into_owned();
            attributes.push((key, value));
        }
        Ok(Element { name, attributes, children: Vec::new() })
    }

    pub fn new(name: &str) -> Self { Element { name: name.to_string(), ..Default::default() } }

    pub fn is(&self, name: &str) -> bool { self.name.eq_ignore_ascii_case(name) }

    /// Child elements in document order.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|child| match child {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        })
    }

    /// First direct child element with the given name (case-insensitive).
    pub fn child(&self, name: &str) -> Option<&Element> { self.elements().find(|e| e.is(name)) }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.elements().filter(move |e| e.is(name))
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.iter().find(|(key, _)| key.eq_ignore_ascii_case(name)).map(|(_, value)| value.as_str())
    }

    /// Text content of an element holding exactly one text run and nothing else.
    pub fn value(&self) -> Option<&str> {
        match self.children.as_slice() {
            [Node::Text(text)] => Some(text.as_str()),
            _ => None,
        }
    }

    /// Resolves a dotted path of child names; the last step may name an attribute.
    pub fn path_value(&self, path: &str) -> Option<&str> {
        let mut steps = path.split('.').peekable();
        let mut current = self;
        while let Some(step) = steps.next() {
            if steps.peek().is_none() {
                return current.attribute(step).or_else(|| current.child(step).and_then(Element::value));
            }
            current = current.child(step)?;
        }
        None
    }

    /// Descendant search: direct children are checked before any subtree.
    pub fn search(&self, name: &str) -> Option<&Element> {
        self.child(name).or_else(|| self.elements().find_map(|e| e.search(name)))
    }
}
