// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Exclusive XML Canonicalization 1.0 (without comments, empty inclusive
// prefix list) over an owned element subtree.
//
// Only declarations made inside the subtree are visible, which is why the
// envelope code injects the mandated namespaces into the body and SignedInfo
// before canonicalising them.  A namespace is emitted on the first output
// element that visibly uses its prefix and whose nearest output ancestor has
// not already rendered the same binding.

use std::collections::{BTreeMap, BTreeSet};

use crate::xml::{Element, Node, escape_attribute, escape_text, write_attribute};

type Bindings = BTreeMap<String, String>;

/// Canonical octets of `element` and its descendants.
pub fn canonicalize(element: &Element) -> Vec<u8> {
    let mut out = Vec::new();
    write_element(element, &Bindings::new(), &Bindings::new(), &mut out);
    out
}

/// Clone of `element` with `xmlns:prefix="uri"` declarations set on it.
///
/// An empty prefix declares the default namespace.  Existing declarations of
/// the same prefix are overwritten.
pub fn with_namespaces(element: &Element, namespaces: &[(&str, &str)]) -> Element {
    let mut element = element.clone();
    for (prefix, uri) in namespaces {
        if prefix.is_empty() {
            element.set_attr("xmlns", *uri);
        } else {
            element.set_attr(&format!("xmlns:{prefix}"), *uri);
        }
    }
    element
}

fn write_element(element: &Element, in_scope: &Bindings, rendered: &Bindings, out: &mut Vec<u8>) {
    let mut scope = in_scope.clone();
    for attr in &element.attributes {
        if let Some(prefix) = attr.declared_prefix() {
            scope.insert(prefix.to_owned(), attr.value.clone());
        }
    }

    let regular: Vec<_> = element
        .attributes
        .iter()
        .filter(|a| a.declared_prefix().is_none())
        .collect();

    // Prefixes visibly utilised by the element name and its attributes.
    let mut utilised: BTreeSet<&str> = BTreeSet::new();
    utilised.insert(element.prefix.as_deref().unwrap_or(""));
    for attr in &regular {
        match attr.prefix.as_deref() {
            Some("xml") | None => {}
            Some(prefix) => {
                utilised.insert(prefix);
            }
        }
    }

    let mut rendered_here = rendered.clone();
    let mut declarations: Vec<(&str, String)> = Vec::new();
    for prefix in utilised {
        let uri = scope.get(prefix).map(String::as_str).unwrap_or("");
        let previous = rendered.get(prefix).map(String::as_str).unwrap_or("");
        if uri == previous || (uri.is_empty() && !prefix.is_empty()) {
            continue;
        }
        declarations.push((prefix, uri.to_owned()));
        rendered_here.insert(prefix.to_owned(), uri.to_owned());
    }

    let mut sorted = regular;
    sorted.sort_by(|a, b| {
        let uri = |p: Option<&str>| p.and_then(|p| scope.get(p)).map(String::as_str).unwrap_or("");
        (uri(a.prefix.as_deref()), a.name.as_str()).cmp(&(uri(b.prefix.as_deref()), b.name.as_str()))
    });

    let tag = element.full_tag();
    out.push(b'<');
    out.extend_from_slice(tag.as_bytes());
    for (prefix, uri) in &declarations {
        out.extend_from_slice(b" xmlns");
        if !prefix.is_empty() {
            out.push(b':');
            out.extend_from_slice(prefix.as_bytes());
        }
        out.extend_from_slice(b"=\"");
        escape_attribute(out, uri);
        out.push(b'"');
    }
    for attr in sorted {
        write_attribute(out, &attr.key(), &attr.value);
    }
    out.push(b'>');

    for child in &element.children {
        match child {
            Node::Element(e) => write_element(e, &scope, &rendered_here, out),
            Node::Text(t) => escape_text(out, t),
        }
    }

    out.extend_from_slice(b"</");
    out.extend_from_slice(tag.as_bytes());
    out.push(b'>');
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c14n(doc: &str) -> String {
        String::from_utf8(canonicalize(&Element::parse(doc.as_bytes()).unwrap())).unwrap()
    }

    #[test]
    fn drops_unused_declarations_and_expands_empty_elements() {
        assert_eq!(
            c14n(r#"<a:x xmlns:a="urn:a" xmlns:b="urn:b"><a:y/></a:x>"#),
            r#"<a:x xmlns:a="urn:a"><a:y></a:y></a:x>"#
        );
    }

    #[test]
    fn declares_namespace_where_first_used() {
        assert_eq!(
            c14n(r#"<s:Body xmlns:s="urn:s" xmlns:e="urn:e"><e:T><e:H/></e:T></s:Body>"#),
            r#"<s:Body xmlns:s="urn:s"><e:T xmlns:e="urn:e"><e:H></e:H></e:T></s:Body>"#
        );
    }

    #[test]
    fn sorts_declarations_and_attributes() {
        assert_eq!(
            c14n(r#"<x:r xmlns:z="urn:z" xmlns:x="urn:x" z:k="1" b="2" a="3" xmlns="urn:d"/>"#),
            r#"<x:r xmlns:x="urn:x" xmlns:z="urn:z" a="3" b="2" z:k="1"></x:r>"#
        );
    }

    #[test]
    fn default_namespace_is_rendered_once() {
        assert_eq!(
            c14n(r#"<r xmlns="urn:d"><c><d/></c></r>"#),
            r#"<r xmlns="urn:d"><c><d></d></c></r>"#
        );
    }

    #[test]
    fn undeclares_default_namespace_when_needed() {
        assert_eq!(
            c14n(r#"<r xmlns="urn:d"><c xmlns=""/></r>"#),
            r#"<r xmlns="urn:d"><c xmlns=""></c></r>"#
        );
    }

    #[test]
    fn escapes_text_and_attributes() {
        assert_eq!(
            c14n("<r a=\"&quot;&#9;&lt;\">1 &gt; 0 &amp;&#13;</r>"),
            "<r a=\"&quot;&#x9;&lt;\">1 &gt; 0 &amp;&#xD;</r>"
        );
    }

    #[test]
    fn injected_namespaces_resolve_subtree() {
        let env = Element::parse(
            br#"<s:Envelope xmlns:s="urn:s" xmlns:w="urn:w"><s:Body w:Id="b"><T/></s:Body></s:Envelope>"#,
        )
        .unwrap();
        let body = env.child("Body").unwrap();
        let injected = with_namespaces(body, &[("s", "urn:s"), ("w", "urn:w"), ("e", "urn:e")]);
        assert_eq!(
            String::from_utf8(canonicalize(&injected)).unwrap(),
            r#"<s:Body xmlns:s="urn:s" xmlns:w="urn:w" w:Id="b"><T></T></s:Body>"#
        );
    }
}
