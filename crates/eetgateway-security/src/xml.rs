// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Owned XML element tree.
//
// Every element owns its attributes and children outright; there are no
// parent links.  Navigation goes top-down by path (see `path.rs`), which keeps
// the tree free of shared or cyclic ownership and lets envelope slots be
// mutated through plain `&mut` borrows.
//
// Namespace declarations are ordinary attributes (`xmlns`, `xmlns:p`).  Names
// are kept exactly as written; resolution to URIs only happens during
// canonicalisation.

use std::borrow::Cow;

use eetgateway_core::error::SchemaError;
use quick_xml::Reader;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};

/// A single attribute, kept in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub prefix: Option<String>,
    pub name: String,
    pub value: String,
}

impl Attribute {
    pub fn new(key: &str, value: impl Into<String>) -> Self {
        let (prefix, name) = split_qname(key);
        Self {
            prefix,
            name,
            value: value.into(),
        }
    }

    /// Qualified key as written (`wsu:Id`, `fik`).
    pub fn key(&self) -> String {
        qualified(self.prefix.as_deref(), &self.name)
    }

    /// For `xmlns` / `xmlns:p` declarations, the declared prefix (`""` for
    /// the default namespace).
    pub fn declared_prefix(&self) -> Option<&str> {
        match (self.prefix.as_deref(), self.name.as_str()) {
            (None, "xmlns") => Some(""),
            (Some("xmlns"), prefix) => Some(prefix),
            _ => None,
        }
    }
}

/// Child of an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// An XML element with owned attributes and children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub prefix: Option<String>,
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
}

impl Element {
    /// Create an empty element from a qualified tag (`soapenv:Body`).
    pub fn new(tag: &str) -> Self {
        let (prefix, name) = split_qname(tag);
        Self {
            prefix,
            name,
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Qualified tag as written.
    pub fn full_tag(&self) -> String {
        qualified(self.prefix.as_deref(), &self.name)
    }

    pub fn with_attr(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    /// Set an attribute, replacing an existing one with the same qualified key.
    pub fn set_attr(&mut self, key: &str, value: impl Into<String>) {
        let attr = Attribute::new(key, value);
        match self
            .attributes
            .iter_mut()
            .find(|a| a.prefix == attr.prefix && a.name == attr.name)
        {
            Some(existing) => existing.value = attr.value,
            None => self.attributes.push(attr),
        }
    }

    /// Value of the attribute with the given qualified key.
    pub fn attr(&self, key: &str) -> Option<&str> {
        let (prefix, name) = split_qname(key);
        self.attributes
            .iter()
            .find(|a| a.prefix == prefix && a.name == name)
            .map(|a| a.value.as_str())
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.push_child(child);
        self
    }

    pub fn push_child(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    /// Append text, merging with a trailing text node.
    pub fn push_text(&mut self, text: &str) {
        match self.children.last_mut() {
            Some(Node::Text(existing)) => existing.push_str(text),
            _ => self.children.push(Node::Text(text.to_owned())),
        }
    }

    /// Replace all direct text content with `text`.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.children.retain(|n| matches!(n, Node::Element(_)));
        self.children.insert(0, Node::Text(text.into()));
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.set_text(text);
        self
    }

    /// Concatenated direct text content.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) => Some(t.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    /// First child element with the given local name, any prefix.
    pub fn child(&self, local_name: &str) -> Option<&Element> {
        self.child_elements().find(|e| e.name == local_name)
    }

    pub fn child_mut(&mut self, local_name: &str) -> Option<&mut Element> {
        self.children.iter_mut().find_map(|n| match n {
            Node::Element(e) if e.name == local_name => Some(e),
            _ => None,
        })
    }

    /// Parse a complete document and return its root element.
    ///
    /// Document type declarations are refused so external entities can never
    /// be expanded.  Comments and processing instructions are dropped.
    ///
    /// Line ends are normalised to `\n` and literal whitespace in attribute
    /// values to a space, as an XML processor must; characters written as
    /// references are kept.
    pub fn parse(bytes: &[u8]) -> Result<Element, SchemaError> {
        let mut reader = Reader::from_reader(bytes);
        let mut buf = Vec::new();
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader.read_event_into(&mut buf).map_err(malformed)? {
                Event::Start(start) => stack.push(element_from_start(&start)?),
                Event::Empty(start) => {
                    let element = element_from_start(&start)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| malformed("unexpected closing tag"))?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(text) => {
                    let raw = std::str::from_utf8(&text).map_err(malformed)?;
                    let text = unescape(&normalize_line_ends(raw))
                        .map_err(malformed)?
                        .into_owned();
                    match stack.last_mut() {
                        Some(parent) => parent.push_text(&text),
                        None if text.trim().is_empty() => {}
                        None => return Err(malformed("text outside the root element")),
                    }
                }
                Event::CData(cdata) => {
                    let raw = cdata.into_inner();
                    let text = normalize_line_ends(std::str::from_utf8(&raw).map_err(malformed)?);
                    match stack.last_mut() {
                        Some(parent) => parent.push_text(&text),
                        None => return Err(malformed("CDATA outside the root element")),
                    }
                }
                Event::DocType(_) => return Err(malformed("document type declarations are not allowed")),
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        if let Some(open) = stack.last() {
            return Err(malformed(format!("element {} is not closed", open.full_tag())));
        }
        root.ok_or_else(|| malformed("document has no root element"))
    }

    /// Serialise the element as stored: attributes in order, every element
    /// written as a start/end pair.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_to(&mut out);
        out
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        let tag = self.full_tag();
        out.push(b'<');
        out.extend_from_slice(tag.as_bytes());
        for attr in &self.attributes {
            write_attribute(out, &attr.key(), &attr.value);
        }
        out.push(b'>');
        for child in &self.children {
            match child {
                Node::Element(e) => e.write_to(out),
                Node::Text(t) => escape_text(out, t),
            }
        }
        out.extend_from_slice(b"</");
        out.extend_from_slice(tag.as_bytes());
        out.push(b'>');
    }
}

pub(crate) fn split_qname(qname: &str) -> (Option<String>, String) {
    match qname.split_once(':') {
        Some((prefix, name)) => (Some(prefix.to_owned()), name.to_owned()),
        None => (None, qname.to_owned()),
    }
}

fn qualified(prefix: Option<&str>, name: &str) -> String {
    match prefix {
        Some(prefix) => format!("{prefix}:{name}"),
        None => name.to_owned(),
    }
}

fn malformed(err: impl std::fmt::Display) -> SchemaError {
    SchemaError::MalformedXml(err.to_string())
}

fn element_from_start(start: &BytesStart<'_>) -> Result<Element, SchemaError> {
    let tag = std::str::from_utf8(start.name().as_ref()).map_err(malformed)?.to_owned();
    let mut element = Element::new(&tag);
    for attr in start.attributes() {
        let attr = attr.map_err(malformed)?;
        let key = std::str::from_utf8(attr.key.as_ref()).map_err(malformed)?;
        let raw = std::str::from_utf8(&attr.value).map_err(malformed)?;
        let value = unescape(&normalize_attribute(raw))
            .map_err(malformed)?
            .into_owned();
        element.attributes.push(Attribute::new(key, value));
    }
    Ok(element)
}

/// `\r\n` and a lone `\r` both become `\n`.
fn normalize_line_ends(raw: &str) -> Cow<'_, str> {
    if !raw.contains('\r') {
        return Cow::Borrowed(raw);
    }
    Cow::Owned(raw.replace("\r\n", "\n").replace('\r', "\n"))
}

/// Literal tab, line feed and carriage return in an attribute value become a
/// space, with a `\r\n` pair counting as one line end.
fn normalize_attribute(raw: &str) -> Cow<'_, str> {
    if !raw.contains(['\t', '\n', '\r']) {
        return Cow::Borrowed(raw);
    }
    Cow::Owned(
        normalize_line_ends(raw)
            .chars()
            .map(|c| if matches!(c, '\t' | '\n') { ' ' } else { c })
            .collect(),
    )
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), SchemaError> {
    match stack.last_mut() {
        Some(parent) => parent.push_child(element),
        None if root.is_none() => *root = Some(element),
        None => return Err(malformed("more than one root element")),
    }
    Ok(())
}

pub(crate) fn write_attribute(out: &mut Vec<u8>, key: &str, value: &str) {
    out.push(b' ');
    out.extend_from_slice(key.as_bytes());
    out.extend_from_slice(b"=\"");
    escape_attribute(out, value);
    out.push(b'"');
}

/// Text escaping of Canonical XML: `&`, `<`, `>` and carriage return.
pub(crate) fn escape_text(out: &mut Vec<u8>, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.extend_from_slice(b"&amp;"),
            '<' => out.extend_from_slice(b"&lt;"),
            '>' => out.extend_from_slice(b"&gt;"),
            '\r' => out.extend_from_slice(b"&#xD;"),
            c => push_char(out, c),
        }
    }
}

/// Attribute value escaping of Canonical XML.
pub(crate) fn escape_attribute(out: &mut Vec<u8>, value: &str) {
    for c in value.chars() {
        match c {
            '&' => out.extend_from_slice(b"&amp;"),
            '<' => out.extend_from_slice(b"&lt;"),
            '"' => out.extend_from_slice(b"&quot;"),
            '\t' => out.extend_from_slice(b"&#x9;"),
            '\n' => out.extend_from_slice(b"&#xA;"),
            '\r' => out.extend_from_slice(b"&#xD;"),
            c => push_char(out, c),
        }
    }
}

fn push_char(out: &mut Vec<u8>, c: char) {
    let mut buf = [0u8; 4];
    out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
}
